//! The channel seam between a session and its transport.
//!
//! A [`Channel`] is a named, bidirectional, asynchronous message channel for
//! one session:
//!
//! - [`Channel::invoke`] sends a command and awaits its matched response.
//! - The dispatch handler receives events pushed by the native layer. A
//!   returned [`EventReply`] is written back on the same channel.
//!
//! [`Connection`](super::Connection) is the WebSocket implementation. Tests
//! plug in their own.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::{Command, Event, EventReply};

// ============================================================================
// Types
// ============================================================================

/// Dispatch handler callback type.
///
/// Called for each event received from the native layer, in delivery order.
/// Return `Some(EventReply)` to send a reply.
pub type DispatchHandler = Box<dyn Fn(Event) -> Option<EventReply> + Send + Sync>;

// ============================================================================
// Channel
// ============================================================================

/// Bidirectional message channel scoped to one session.
///
/// Concurrent invocations are independent and each response is matched to
/// its own call. Failures surface as `Err`, never as a silent `Null`.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Returns the channel name.
    fn name(&self) -> &str;

    /// Sends a command and waits for its response.
    ///
    /// Commands with no result resolve to [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed, the response is malformed,
    /// the native layer reports an error, or the transport times out.
    async fn invoke(&self, command: Command) -> Result<Value>;

    /// Installs the dispatch handler, replacing any previous one.
    fn set_dispatch_handler(&self, handler: DispatchHandler);

    /// Removes the dispatch handler.
    fn clear_dispatch_handler(&self);

    /// Closes the channel. Later invocations fail.
    fn close(&self);
}
