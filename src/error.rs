//! Error types for the AR session bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ar_bridge::{Anchor, Result};
//!
//! async fn example(session: &ArSession) -> Result<()> {
//!     let anchor = Anchor::new("table");
//!     if let Some(pose) = session.pose(&anchor).await? {
//!         println!("table at {:?}", pose.translation());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Argument | [`Error::InvalidArgument`] |
//! | Lifecycle | [`Error::AlreadyInitialized`], [`Error::SessionDisposed`], [`Error::ListenerMissing`], [`Error::Config`] |
//! | Decode | [`Error::Decode`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::SessionNotFound`] |
//! | Protocol | [`Error::Protocol`], [`Error::Native`], [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`], [`Error::Image`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{RequestId, SessionId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Invalid argument supplied by the caller.
    ///
    /// Returned synchronously, before any transport call is made.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Lifecycle & Configuration Errors
    // ========================================================================
    /// Session was already initialized.
    #[error("Session {session_id} is already initialized")]
    AlreadyInitialized {
        /// The session that rejected the call.
        session_id: SessionId,
    },

    /// Session has been disposed.
    #[error("Session {session_id} is disposed")]
    SessionDisposed {
        /// The disposed session.
        session_id: SessionId,
    },

    /// A listener required by the session configuration is not bound.
    #[error("Listener missing: {listener}")]
    ListenerMissing {
        /// Name of the missing listener.
        listener: &'static str,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Decode Errors
    // ========================================================================
    /// Payload from the native layer could not be decoded.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out waiting for the native view to connect.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Channel closed unexpectedly or explicitly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No connection registered for the session.
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// The missing session ID.
        session_id: SessionId,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The native layer answered with an error response.
    #[error("Native error ({code}): {message}")]
    Native {
        /// Error code reported by the native layer.
        code: String,
        /// Error message reported by the native layer.
        message: String,
    },

    /// Command request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),

    /// Snapshot image could not be decoded.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an already-initialized error.
    #[inline]
    pub fn already_initialized(session_id: SessionId) -> Self {
        Self::AlreadyInitialized { session_id }
    }

    /// Creates a session disposed error.
    #[inline]
    pub fn session_disposed(session_id: SessionId) -> Self {
        Self::SessionDisposed { session_id }
    }

    /// Creates a listener missing error.
    #[inline]
    pub fn listener_missing(listener: &'static str) -> Self {
        Self::ListenerMissing { listener }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a session not found error.
    #[inline]
    pub fn session_not_found(session_id: SessionId) -> Self {
        Self::SessionNotFound { session_id }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a native error.
    #[inline]
    pub fn native(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Native {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::SessionNotFound { .. }
                | Self::WebSocket(_)
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if the failure happened on the way to or from the native layer.
    ///
    /// These are the failures the session converts into absent results.
    #[inline]
    #[must_use]
    pub fn is_transport_failure(&self) -> bool {
        self.is_connection_error()
            || matches!(
                self,
                Self::RequestTimeout { .. }
                    | Self::Protocol { .. }
                    | Self::Native { .. }
                    | Self::Decode { .. }
                    | Self::Json(_)
            )
    }

    /// Returns `true` if this error reports a programming or configuration mistake.
    #[inline]
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::AlreadyInitialized { .. }
                | Self::SessionDisposed { .. }
                | Self::ListenerMissing { .. }
                | Self::Config { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_invalid_argument_display() {
        let err = Error::invalid_argument("anchor name must not be empty");
        assert_eq!(
            err.to_string(),
            "Invalid argument: anchor name must not be empty"
        );
    }

    #[test]
    fn test_native_display() {
        let err = Error::native("NO_FRAME", "no camera frame available");
        assert_eq!(
            err.to_string(),
            "Native error (NO_FRAME): no camera frame available"
        );
    }

    #[test]
    fn test_lifecycle_display() {
        let id = SessionId::from_u32(4).expect("non-zero");
        assert_eq!(
            Error::already_initialized(id).to_string(),
            "Session 4 is already initialized"
        );
        assert_eq!(
            Error::session_disposed(id).to_string(),
            "Session 4 is disposed"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::ConnectionTimeout { timeout_ms: 5000 };
        let request_err = Error::request_timeout(RequestId::generate(), 100);
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(request_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        let conn_err = Error::connection("test");
        let closed_err = Error::ConnectionClosed;
        let other_err = Error::config("test");

        assert!(conn_err.is_connection_error());
        assert!(closed_err.is_connection_error());
        assert!(!other_err.is_connection_error());
    }

    #[test]
    fn test_transport_vs_usage() {
        assert!(Error::ConnectionClosed.is_transport_failure());
        assert!(Error::native("E", "boom").is_transport_failure());
        assert!(Error::decode("bad").is_transport_failure());
        assert!(!Error::invalid_argument("x").is_transport_failure());

        assert!(Error::invalid_argument("x").is_usage_error());
        assert!(Error::listener_missing("tap").is_usage_error());
        assert!(!Error::ConnectionClosed.is_usage_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_websocket_error() {
        let err: Error = WsError::ConnectionClosed.into();
        assert!(matches!(err, Error::WebSocket(_)));
        assert!(err.is_connection_error());
        assert!(err.is_transport_failure());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
