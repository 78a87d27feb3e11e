//! AR Bridge - Session bridge between application code and native AR views.
//!
//! This library drives a native augmented-reality view (ARKit or ARCore)
//! from async Rust: it configures the view, queries camera and anchor poses,
//! decodes hit tests, captures snapshots and recordings, and relays native
//! errors to the application.
//!
//! # Architecture
//!
//! The bridge follows a client-server model:
//!
//! - **Local End (Rust)**: Sends commands, receives events via WebSocket
//! - **Remote End (native view)**: Runs the AR session, answers queries, emits events
//!
//! Key design principles:
//!
//! - Each [`ArSession`] owns one named channel (`ar_session_<id>`)
//! - Poses travel as 16 numbers in column-major order
//! - Queries return absent or default values instead of transport errors
//! - Event-driven architecture (taps and errors are pushed, never polled)
//!
//! # Quick Start
//!
//! ```no_run
//! use ar_bridge::{Anchor, ArSession, ConnectionPool, LogPresenter, Result, SessionConfig, SessionId};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Listen for native views on a random localhost port
//!     let pool = ConnectionPool::new().await?;
//!     let session_id = SessionId::next();
//!     println!("native view connects to {}", pool.ws_url());
//!
//!     let session = ArSession::attach(&pool, session_id)
//!         .await?
//!         .error_presenter(LogPresenter)
//!         .build()?;
//!
//!     session.initialize(SessionConfig::new().with_planes().with_feature_points())?;
//!
//!     let distance = session
//!         .distance_from_anchor(&Anchor::new("table"))
//!         .await?;
//!     println!("distance to table: {distance:?}");
//!
//!     session.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`ar`] | AR value types: [`Transform`], [`HitTestResult`], [`Anchor`], [`Snapshot`] |
//! | [`session`] | [`ArSession`] and the error relay |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | WebSocket message types (internal) |
//! | [`transport`] | Channel trait and WebSocket transport |

// ============================================================================
// Modules
// ============================================================================

/// AR value types and their wire codecs.
///
/// - [`Transform`] - 4x4 pose, column-major on the wire
/// - [`HitTestResult`] - Decoded hit-test record
/// - [`SessionConfig`] - View configuration sent on `init`
pub mod ar;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for sessions, requests and trackers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// WebSocket protocol message types.
///
/// Internal module defining command/response/event structures.
pub mod protocol;

/// Session management.
///
/// Use [`ArSession::builder()`] or [`ArSession::attach()`] to create a session.
pub mod session;

/// Channel transport layer.
///
/// Internal module handling the WebSocket server and connection management.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// AR types
pub use ar::{
    Anchor, HitTestResult, HitTestResultType, PlaneDetectionConfig, SessionConfig, Snapshot,
    Transform, decode_hit_test_results,
};

// Session types
pub use session::{
    ArSession, ErrorNotice, ErrorPresenter, ErrorRelay, LogPresenter, SessionBuilder,
    SessionState, TapListener,
};

// Transport types
pub use transport::{Channel, ConnectionPool};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{LogoIndex, RequestId, SessionId};
