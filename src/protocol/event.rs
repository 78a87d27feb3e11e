//! Event message types.
//!
//! Events are notifications pushed from the native AR view to the session.
//!
//! | Method | Params | Parsed as |
//! |--------|--------|-----------|
//! | `onError` | string, or `{ "message": string }` | [`ParsedEvent::Error`] |
//! | `onPlaneOrPointTap` | array of hit-test records | [`ParsedEvent::PlaneOrPointTap`] |
//! | `dispose` | none | [`ParsedEvent::Dispose`] |
//! | anything else | any | [`ParsedEvent::Unknown`] |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ar::{HitTestResult, hit_test};
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Native error event.
pub const ON_ERROR: &str = "onError";

/// Native tap event.
pub const ON_PLANE_OR_POINT_TAP: &str = "onPlaneOrPointTap";

/// Native-initiated teardown.
pub const DISPOSE: &str = "dispose";

// ============================================================================
// Event
// ============================================================================

/// An event notification from remote end to local end.
///
/// # Format
///
/// ```json
/// {
///   "id": "event-uuid",
///   "type": "event",
///   "method": "onPlaneOrPointTap",
///   "params": [ ... ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Unique identifier for EventReply correlation.
    pub id: RequestId,

    /// Event type marker (always "event").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event name.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Creates an event, mostly useful for feeding a dispatch handler directly.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: RequestId::generate(),
            event_type: "event".to_string(),
            method: method.into(),
            params,
        }
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.method.as_str() {
            ON_ERROR => ParsedEvent::Error {
                message: self.message(),
            },

            ON_PLANE_OR_POINT_TAP => ParsedEvent::PlaneOrPointTap {
                results: hit_test::decode_hit_test_value(&self.params),
            },

            DISPOSE => ParsedEvent::Dispose,

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }

    /// Reads the error message from either params shape.
    fn message(&self) -> String {
        match &self.params {
            Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

// ============================================================================
// EventReply
// ============================================================================

/// A reply from local end to remote end for events requiring one.
///
/// # Format
///
/// ```json
/// {
///   "id": "event-uuid",
///   "replyTo": "dispose",
///   "result": { "acknowledged": true }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventReply {
    /// Matches the event's ID.
    pub id: RequestId,

    /// Event method being replied to.
    #[serde(rename = "replyTo")]
    pub reply_to: String,

    /// Reply payload.
    pub result: Value,
}

impl EventReply {
    /// Creates a new event reply.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, reply_to: impl Into<String>, result: Value) -> Self {
        Self {
            id,
            reply_to: reply_to.into(),
            result,
        }
    }

    /// Creates an acknowledgment for the given event.
    #[inline]
    #[must_use]
    pub fn ack(event: &Event) -> Self {
        Self::new(event.id, event.method.clone(), json!({ "acknowledged": true }))
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// Native error to relay to the user.
    Error {
        /// Human-readable message.
        message: String,
    },

    /// Tap on the AR view.
    PlaneOrPointTap {
        /// Decoded results, nearest first.
        results: Vec<HitTestResult>,
    },

    /// Native-initiated teardown.
    Dispose,

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

impl ParsedEvent {
    /// Returns the method name this variant was parsed from.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Error { .. } => ON_ERROR,
            Self::PlaneOrPointTap { .. } => ON_PLANE_OR_POINT_TAP,
            Self::Dispose => DISPOSE,
            Self::Unknown { method, .. } => method,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
