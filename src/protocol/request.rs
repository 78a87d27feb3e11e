//! Request and Response message types.
//!
//! Defines the message format for command requests and responses between the
//! session (local end) and the native AR view (remote end).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// A command request from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "channel": "ar_session_1",
///   "method": "getAnchorPose",
///   "params": { "anchorId": "table" }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Channel the request is scoped to.
    pub channel: String,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(channel: impl Into<String>, command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            channel: channel.into(),
            command,
        }
    }

    /// Returns the wire method name.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.command.method()
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from remote end to local end.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": "uuid", "type": "success", "result": [1, 0, 0, 0, ...] }
/// ```
///
/// Error:
/// ```json
/// { "id": "uuid", "type": "error", "error": "NO_FRAME", "message": "no camera frame" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Response type.
    #[serde(rename = "type")]
    pub response_type: ResponseType,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error code (if error).
    #[serde(default)]
    pub error: Option<String>,

    /// Error message (if error).
    #[serde(default)]
    pub message: Option<String>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_type == ResponseType::Success
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// A success without `result` yields [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Native`] if the response was an error.
    pub fn into_result(self) -> Result<Value> {
        match self.response_type {
            ResponseType::Success => Ok(self.result.unwrap_or(Value::Null)),
            ResponseType::Error => {
                let code = self.error.unwrap_or_else(|| "unknown error".to_string());
                let message = self.message.unwrap_or_else(|| code.clone());
                Err(Error::native(code, message))
            }
        }
    }

    /// Gets a u64 value from an object result.
    ///
    /// Returns 0 if key not found or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }

    /// Gets a string value from an object result.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

// ============================================================================
// ResponseType
// ============================================================================

/// Response type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// Tests
// ============================================================================
