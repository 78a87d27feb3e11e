//! One native AR view's socket.
//!
//! A [`Connection`] is a cheap handle onto a tokio task that owns the
//! socket. Commands from the session are written out, replies are matched
//! back to their caller by request UUID, and events pushed by the view go
//! to the installed dispatch handler, whose reply is written back.
//!
//! The task ends when either side closes the socket. Callers still waiting
//! get [`Error::ConnectionClosed`] and [`Connection::stopped`] resolves.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Command, Event, EventReply, Request, Response};

use super::channel::{Channel, DispatchHandler};

// ============================================================================
// Constants
// ============================================================================

/// Round-trip budget for one command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Commands in flight beyond this are refused.
const MAX_PENDING_REQUESTS: usize = 100;

/// How long a fresh socket may stay silent before READY.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Types
// ============================================================================

/// Callers awaiting a reply, by request UUID.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

/// Shared slot for the dispatch handler.
type HandlerSlot = Arc<Mutex<Option<Arc<DispatchHandler>>>>;

// ============================================================================
// ReadyData
// ============================================================================

/// Session announcement sent by a native view right after it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyData {
    /// Raw session number, validated by the pool.
    pub session_id: u32,
    /// Channel name announced by the native view.
    pub channel: String,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Messages from handles to the socket task.
enum ConnectionCommand {
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Forget a caller that gave up waiting.
    RemoveCorrelation(RequestId),
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle onto the socket task serving one AR session.
///
/// Clones share the task. It implements [`Channel`], which is how sessions
/// reach it.
#[derive(Clone)]
pub struct Connection {
    /// Channel name this connection serves.
    name: Arc<str>,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    correlation: Arc<Mutex<CorrelationMap>>,
    dispatch_handler: HandlerSlot,
    /// Set once the connection is shut down.
    closed: Arc<AtomicBool>,
    /// Flips to `true` when the event loop exits.
    stopped: watch::Receiver<bool>,
    /// Per-request timeout.
    request_timeout: Duration,
}

impl Connection {
    /// Takes ownership of an upgraded socket and starts its task.
    ///
    /// Unnamed until the pool has read READY.
    pub(crate) fn new(ws_stream: WebSocketStream<TcpStream>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let dispatch_handler: HandlerSlot = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicBool::new(false));
        let (stopped_tx, stopped) = watch::channel(false);

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&dispatch_handler),
            Arc::clone(&closed),
            stopped_tx,
        ));

        Self {
            name: Arc::from(""),
            command_tx,
            correlation,
            dispatch_handler,
            closed,
            stopped,
            request_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Binds the connection to its channel name.
    #[must_use]
    pub(crate) fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Arc::from(name.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Reads the view's READY announcement, which arrives under the nil UUID.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the view stays silent for 30s
    /// - [`Error::ConnectionClosed`] if the socket drops first
    /// - [`Error::Protocol`] if the session number is out of range
    pub async fn wait_ready(&self) -> Result<ReadyData> {
        let (tx, rx) = oneshot::channel();

        {
            let mut correlation = self.correlation.lock();
            correlation.insert(RequestId::ready(), tx);
        }

        let response = timeout(READY_TIMEOUT, rx)
            .await
            .map_err(|_| Error::connection_timeout(READY_TIMEOUT.as_millis() as u64))??;

        let response = response?;

        let session_id = u32::try_from(response.get_u64("sessionId"))
            .map_err(|_| Error::protocol("sessionId in READY does not fit in u32"))?;
        let channel = response.get_string("channel");

        debug!(session_id, channel = %channel, "READY handshake completed");

        Ok(ReadyData {
            session_id,
            channel,
        })
    }

    /// Round-trips a request under the connection's timeout.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::send_with_timeout`].
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_timeout(request, self.request_timeout).await
    }

    /// Round-trips a request under `request_timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] once the socket is gone
    /// - [`Error::RequestTimeout`] if the view does not answer in time
    /// - [`Error::Protocol`] with 100 requests already in flight
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let request_id = request.id;

        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns how many callers are awaiting a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` once the connection has shut down.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the event loop has exited, whoever closed the socket.
    pub async fn stopped(&self) {
        let mut stopped = self.stopped.clone();
        // A dropped sender means the loop is gone too.
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// Returns `true` if both handles drive the same event loop.
    #[inline]
    #[must_use]
    pub(crate) fn same_loop(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.closed, &other.closed)
    }

    /// Asks the socket task to close. Returns without waiting.
    ///
    /// Clones share the event loop, so this closes every clone.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Owns the socket until either side closes it.
    async fn run_event_loop(
        ws_stream: WebSocketStream<TcpStream>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        dispatch_handler: HandlerSlot,
        closed: Arc<AtomicBool>,
        stopped: watch::Sender<bool>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let reply = Self::handle_incoming_message(
                                &text,
                                &correlation,
                                &dispatch_handler,
                            );

                            if let Some(reply) = reply {
                                Self::write_reply(&reply, &mut ws_write).await;
                            }
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // The native view speaks text only; tungstenite answers pings.
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(?request_id, "Removed timed-out correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        closed.store(true, Ordering::Release);
        Self::fail_pending_requests(&correlation);
        stopped.send_replace(true);

        debug!("Event loop terminated");
    }

    /// Handles an incoming text message from the native view.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        dispatch_handler: &HandlerSlot,
    ) -> Option<EventReply> {
        if let Ok(response) = from_str::<Response>(text) {
            let tx = correlation.lock().remove(&response.id);

            if let Some(tx) = tx {
                let _ = tx.send(Ok(response));
            } else {
                warn!(id = %response.id, "Response for unknown request");
            }

            return None;
        }

        if let Ok(event) = from_str::<Event>(text) {
            // Invoke outside the lock so the handler may replace itself.
            let handler = dispatch_handler.lock().clone();
            return match handler {
                Some(handler) => {
                    let method = event.method.clone();
                    match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                        Ok(reply) => reply,
                        Err(_) => {
                            error!(%method, "Dispatch handler panicked");
                            None
                        }
                    }
                }
                None => {
                    warn!(method = %event.method, "Event received with no dispatch handler");
                    None
                }
            };
        }

        warn!(text = %text, "Failed to parse incoming message");
        None
    }

    /// Handles a send command from the session API.
    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Registered first: the reply can beat the send's completion.
        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await
            && let Some(tx) = correlation.lock().remove(&request_id)
        {
            let _ = tx.send(Err(Error::WebSocket(e)));
        }

        trace!(?request_id, method = request.method(), "Request sent");
    }

    /// Writes an event reply back to the native view.
    async fn write_reply(
        reply: &EventReply,
        ws_write: &mut futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>,
    ) {
        let json = match to_string(reply) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, reply_to = %reply.reply_to, "Failed to encode event reply");
                return;
            }
        };

        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            warn!(error = %e, "Failed to send event reply");
        }
    }

    /// Wakes every waiting caller with [`Error::ConnectionClosed`].
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Connection - Channel
// ============================================================================

#[async_trait]
impl Channel for Connection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, command: Command) -> Result<Value> {
        let request = Request::new(self.name.as_ref(), command);
        self.send(request).await?.into_result()
    }

    fn set_dispatch_handler(&self, handler: DispatchHandler) {
        *self.dispatch_handler.lock() = Some(Arc::new(handler));
    }

    fn clear_dispatch_handler(&self) {
        *self.dispatch_handler.lock() = None;
    }

    fn close(&self) {
        self.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_COMMAND_TIMEOUT.as_secs(), 30);
        assert_eq!(MAX_PENDING_REQUESTS, 100);
        assert_eq!(READY_TIMEOUT.as_secs(), 30);
    }

    #[test]
    fn test_ready_data() {
        let data = ReadyData {
            session_id: 2,
            channel: "ar_session_2".to_string(),
        };
        assert_eq!(data.session_id, 2);
        assert_eq!(data.channel, "ar_session_2");
    }

    #[test]
    fn test_connection_is_channel() {
        fn assert_channel<T: Channel + Clone + 'static>() {}
        assert_channel::<Connection>();
    }

    struct Explodes;

    impl Explodes {
        fn handle(&self, event: Event) -> Option<EventReply> {
            if event.method == "boom" {
                panic!("handler failure");
            }
            Some(EventReply::ack(&event))
        }
    }

    fn slot_with(handler: DispatchHandler) -> HandlerSlot {
        Arc::new(Mutex::new(Some(Arc::new(handler))))
    }

    fn event_text(method: &str) -> String {
        serde_json::json!({
            "id": "6f1c2a7e-3b9d-4c5e-8a1f-0d2b4c6e8f10",
            "type": "event",
            "method": method,
            "params": null
        })
        .to_string()
    }

    #[test]
    fn test_panicking_dispatch_handler_is_contained() {
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let explodes = Explodes;
        let slot = slot_with(Box::new(move |event| explodes.handle(event)));

        let reply = Connection::handle_incoming_message(&event_text("boom"), &correlation, &slot);
        assert!(reply.is_none());

        // The slot is still usable for the next event.
        let reply = Connection::handle_incoming_message(&event_text("tap"), &correlation, &slot);
        assert_eq!(reply.expect("ack").reply_to, "tap");
    }

    #[test]
    fn test_event_without_handler_gets_no_reply() {
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let slot: HandlerSlot = Arc::new(Mutex::new(None));

        let reply = Connection::handle_incoming_message(&event_text("tap"), &correlation, &slot);
        assert!(reply.is_none());
    }
}
