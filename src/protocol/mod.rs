//! Wire protocol message types.
//!
//! This module defines the JSON messages exchanged between the session
//! (local end) and the native AR view (remote end).
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Command request |
//! | `Response` | Remote → Local | Command response |
//! | `Event` | Remote → Local | Native notification |
//! | `EventReply` | Local → Remote | Event acknowledgment |
//!
//! Every request carries the channel name of its session
//! (`ar_session_<id>`), so a native process hosting several AR views can
//! route it.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions |
//! | `event` | Event and EventReply types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use event::{Event, EventReply, ParsedEvent};
pub use request::{Request, Response, ResponseType};
