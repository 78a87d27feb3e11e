//! Channel transport layer.
//!
//! This module carries commands and events between sessions and native AR
//! views.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  ArSession      │                              │  Native AR view │
//! │                 │         WebSocket            │  (ARCore/ARKit) │
//! │  ConnectionPool │◄────────────────────────────►│                 │
//! │  → Connection   │      localhost:PORT          │  WebSocket      │
//! │                 │                              │  Client         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionPool::new` - Bind to localhost with random port
//! 2. Native view connects and sends READY with its session ID and channel name
//! 3. `ConnectionPool::wait_for_session` - Hands out the session's `Connection`
//! 4. `Connection` - Invoke commands, dispatch events
//! 5. `Channel::close` - Close the connection when the session is disposed
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | The `Channel` trait sessions talk through |
//! | `connection` | WebSocket connection and event loop |
//! | `pool` | Multi-session WebSocket server |

// ============================================================================
// Submodules
// ============================================================================

/// The `Channel` trait.
pub mod channel;

/// WebSocket connection and event loop.
pub mod connection;

/// Connection pool keyed by session.
pub mod pool;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{Channel, DispatchHandler};
pub use connection::{Connection, ReadyData};
pub use pool::ConnectionPool;
