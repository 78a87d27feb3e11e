//! In-memory [`Channel`] for session tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{Command, Event, EventReply};
use crate::transport::{Channel, DispatchHandler};

/// Scripted outcome for one method.
#[derive(Clone)]
enum Reply {
    Value(Value),
    Fail,
}

/// Channel that records every command and answers from a script.
///
/// Methods without a script answer `null`.
pub(crate) struct MockChannel {
    name: String,
    calls: Mutex<Vec<Command>>,
    replies: Mutex<FxHashMap<&'static str, Reply>>,
    anchors: Mutex<FxHashMap<String, Value>>,
    delays: Mutex<FxHashMap<&'static str, Duration>>,
    handler: Mutex<Option<Arc<DispatchHandler>>>,
    closed: AtomicBool,
}

impl MockChannel {
    pub(crate) fn new(session_id: u32) -> Arc<Self> {
        let name = SessionId::from_u32(session_id)
            .map(|id| id.channel_name())
            .unwrap_or_default();

        Arc::new(Self {
            name,
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(FxHashMap::default()),
            anchors: Mutex::new(FxHashMap::default()),
            delays: Mutex::new(FxHashMap::default()),
            handler: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn respond(&self, method: &'static str, value: Value) {
        self.replies.lock().insert(method, Reply::Value(value));
    }

    /// Scripts `getAnchorPose` for one anchor. Takes precedence over `respond`.
    pub(crate) fn respond_anchor(&self, anchor_id: &str, value: Value) {
        self.anchors.lock().insert(anchor_id.to_string(), value);
    }

    pub(crate) fn fail(&self, method: &'static str) {
        self.replies.lock().insert(method, Reply::Fail);
    }

    pub(crate) fn delay(&self, method: &'static str, delay: Duration) {
        self.delays.lock().insert(method, delay);
    }

    pub(crate) fn calls(&self) -> Vec<Command> {
        self.calls.lock().clone()
    }

    pub(crate) fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method() == method)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub(crate) fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Delivers an event the way the connection event loop does.
    pub(crate) fn emit(&self, event: Event) -> Option<EventReply> {
        let handler = self.handler.lock().clone();
        handler.and_then(|h| h(event))
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, command: Command) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let method = command.method();
        let anchor = match &command {
            Command::GetAnchorPose { anchor_id } => self.anchors.lock().get(anchor_id).cloned(),
            _ => None,
        };
        self.calls.lock().push(command);

        let delay = self.delays.lock().get(method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(value) = anchor {
            return Ok(value);
        }

        let reply = self.replies.lock().get(method).cloned();
        match reply {
            Some(Reply::Value(value)) => Ok(value),
            Some(Reply::Fail) => Err(Error::native("unavailable", format!("{method} failed"))),
            None => Ok(Value::Null),
        }
    }

    fn set_dispatch_handler(&self, handler: DispatchHandler) {
        *self.handler.lock() = Some(Arc::new(handler));
    }

    fn clear_dispatch_handler(&self) {
        *self.handler.lock() = None;
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
