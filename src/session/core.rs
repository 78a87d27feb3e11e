//! Session handle, builder, lifecycle and event routing.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::ar::{HitTestResult, SessionConfig};
use crate::error::{Error, Result};
use crate::identifiers::{LogoIndex, SessionId};
use crate::protocol::{Command, Event, EventReply, ParsedEvent};
use crate::transport::{Channel, ConnectionPool};

use super::relay::{ErrorPresenter, ErrorRelay};

// ============================================================================
// Types
// ============================================================================

/// Tap listener callback type.
///
/// Receives the decoded hit-test results of one tap, in delivery order.
pub type TapListener = Box<dyn Fn(Vec<HitTestResult>) + Send + Sync>;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built, `initialize` not called yet.
    Uninitialized,
    /// `initialize` accepted.
    Initialized,
    /// Torn down locally or by the native view. Terminal.
    Disposed,
}

/// Internal shared state for a session.
pub(crate) struct SessionInner {
    /// Session ID.
    pub session_id: SessionId,
    /// Channel to the native view.
    pub channel: Arc<dyn Channel>,
    /// Lifecycle state. Never held across an await.
    state: Mutex<SessionState>,
    /// Logs failed queries when set.
    pub debug: bool,
    /// Index returned by the last `enableLogoTracking`.
    pub logo_index: RwLock<LogoIndex>,
    /// Native error presentation.
    pub relay: ErrorRelay,
    /// Plane or point tap listener.
    tap_listener: Option<TapListener>,
}

// ============================================================================
// ArSession
// ============================================================================

/// A handle to one native AR view.
///
/// Clones share the same session.
///
/// # Example
///
/// ```no_run
/// use ar_bridge::{ArSession, ConnectionPool, LogPresenter, SessionConfig, SessionId};
///
/// # async fn example() -> ar_bridge::Result<()> {
/// let pool = ConnectionPool::new().await?;
/// let session_id = SessionId::next();
///
/// // The native view connects to pool.ws_url() and announces session_id.
/// let session = ArSession::attach(&pool, session_id)
///     .await?
///     .error_presenter(LogPresenter)
///     .on_plane_or_point_tap(|results| println!("{} hits", results.len()))
///     .build()?;
///
/// session.initialize(SessionConfig::new().with_planes().with_taps())?;
///
/// if let Some(pose) = session.camera_pose().await {
///     println!("camera at {}", pose.translation());
/// }
///
/// session.dispose().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ArSession {
    /// Shared inner state.
    pub(crate) inner: Arc<SessionInner>,
}

// ============================================================================
// ArSession - Display
// ============================================================================

impl fmt::Debug for ArSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArSession")
            .field("session_id", &self.inner.session_id)
            .field("channel", &self.inner.channel.name())
            .field("state", &self.state())
            .field("debug", &self.inner.debug)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ArSession - Constructors
// ============================================================================

impl ArSession {
    /// Creates a builder over an existing channel.
    #[must_use]
    pub fn builder(channel: Arc<dyn Channel>) -> SessionBuilder {
        SessionBuilder::new(channel)
    }

    /// Waits for the native view of `session_id` to connect to `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionTimeout`] if the view does not connect in
    /// time, or [`Error::ConnectionClosed`] if the pool shuts down.
    pub async fn attach(pool: &ConnectionPool, session_id: SessionId) -> Result<SessionBuilder> {
        let connection = pool.wait_for_session(session_id).await?;
        Ok(SessionBuilder::new(Arc::new(connection)).session_id(session_id))
    }
}

// ============================================================================
// ArSession - Accessors
// ============================================================================

impl ArSession {
    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    /// Returns the channel name.
    #[inline]
    #[must_use]
    pub fn channel_name(&self) -> &str {
        self.inner.channel.name()
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Returns `true` once the session is disposed.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Returns the error relay, for the current notice and dismissal.
    #[inline]
    #[must_use]
    pub fn error_relay(&self) -> &ErrorRelay {
        &self.inner.relay
    }
}

// ============================================================================
// ArSession - Lifecycle
// ============================================================================

impl ArSession {
    /// Sends the view configuration to the native layer.
    ///
    /// Returns once the configuration is accepted locally. The `init`
    /// command runs on a spawned task and its failure is logged.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid or no tokio
    ///   runtime is running
    /// - [`Error::ListenerMissing`] if `handle_taps` is set without a tap
    ///   listener
    /// - [`Error::AlreadyInitialized`] on a second call
    /// - [`Error::SessionDisposed`] after dispose
    pub fn initialize(&self, config: SessionConfig) -> Result<()> {
        let session_id = self.inner.session_id;
        let mut state = self.inner.state.lock();
        match *state {
            SessionState::Uninitialized => {}
            SessionState::Initialized => return Err(Error::already_initialized(session_id)),
            SessionState::Disposed => return Err(Error::session_disposed(session_id)),
        }

        config.validate()?;

        if config.handle_taps && self.inner.tap_listener.is_none() {
            return Err(Error::listener_missing("plane or point tap"));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::config("initialize requires a running tokio runtime"))?;

        *state = SessionState::Initialized;
        drop(state);

        debug!(session_id = %session_id, ?config, "Initializing session");

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            // Skipped if dispose won the race.
            match inner.invoke(Command::Init(config)).await {
                Ok(_) => info!(session_id = %inner.session_id, "Session initialized"),
                Err(Error::SessionDisposed { .. }) => {
                    debug!(session_id = %inner.session_id, "Session disposed before init was sent");
                }
                Err(e) => warn!(session_id = %inner.session_id, error = %e, "Session init failed"),
            }
        });

        Ok(())
    }

    /// Tears the session down.
    ///
    /// The first call sends `dispose`, clears the dispatch handler and
    /// closes the channel. A failed `dispose` is logged. Later calls do
    /// nothing.
    pub async fn dispose(&self) {
        if !self.inner.mark_disposed() {
            debug!(session_id = %self.inner.session_id, "Session already disposed");
            return;
        }

        if let Err(e) = self.inner.channel.invoke(Command::Dispose).await {
            warn!(session_id = %self.inner.session_id, error = %e, "Dispose failed");
        }

        self.inner.release_channel();
        info!(session_id = %self.inner.session_id, "Session disposed");
    }
}

// ============================================================================
// SessionInner
// ============================================================================

impl SessionInner {
    /// Returns `true` once disposed.
    pub(crate) fn is_disposed(&self) -> bool {
        *self.state.lock() == SessionState::Disposed
    }

    /// Moves to `Disposed`. Returns `false` if already there.
    fn mark_disposed(&self) -> bool {
        let mut state = self.state.lock();
        if *state == SessionState::Disposed {
            return false;
        }
        *state = SessionState::Disposed;
        true
    }

    /// Detaches from the channel and closes it.
    fn release_channel(&self) {
        self.channel.clear_dispatch_handler();
        self.channel.close();
    }

    /// Fails with [`Error::SessionDisposed`] once disposed.
    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::session_disposed(self.session_id));
        }
        Ok(())
    }

    /// Invokes a command whose failure the caller must see.
    pub(crate) async fn invoke(&self, command: Command) -> Result<Value> {
        self.ensure_live()?;
        self.channel.invoke(command).await
    }

    /// Invokes a query. Failures and disposal read as absent.
    pub(crate) async fn query(&self, command: Command) -> Option<Value> {
        if self.is_disposed() {
            return None;
        }

        let method = command.method();
        match self.channel.invoke(command).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.log_failure(method, &e);
                None
            }
        }
    }

    /// Turns a decode failure into absence, logging it in debug mode.
    pub(crate) fn decoded<T>(&self, method: &'static str, decoded: Result<Option<T>>) -> Option<T> {
        decoded.unwrap_or_else(|e| {
            self.log_failure(method, &e);
            None
        })
    }

    /// Logs a query failure when debug mode is on.
    pub(crate) fn log_failure(&self, method: &'static str, e: &Error) {
        if self.debug {
            warn!(session_id = %self.session_id, method, error = %e, "AR query failed");
        }
    }

    /// Routes one inbound event.
    fn route_event(&self, event: Event) -> Option<EventReply> {
        if self.is_disposed() {
            debug!(session_id = %self.session_id, method = %event.method, "Event after dispose dropped");
            return None;
        }

        match event.parse() {
            ParsedEvent::Error { message } => {
                self.relay.relay(message);
                None
            }

            ParsedEvent::PlaneOrPointTap { results } => {
                match &self.tap_listener {
                    Some(listener) => {
                        if catch_unwind(AssertUnwindSafe(|| listener(results))).is_err() {
                            error!(session_id = %self.session_id, "Tap listener panicked");
                        }
                    }
                    None => error!(
                        session_id = %self.session_id,
                        count = results.len(),
                        "Tap received with no tap listener bound"
                    ),
                }
                None
            }

            ParsedEvent::Dispose => {
                let reply = EventReply::ack(&event);
                if self.mark_disposed() {
                    self.release_channel();
                    info!(session_id = %self.session_id, "Session disposed by native view");
                }
                Some(reply)
            }

            ParsedEvent::Unknown { method, .. } => {
                if self.debug {
                    debug!(session_id = %self.session_id, method = %method, "Unknown event ignored");
                }
                None
            }
        }
    }
}

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for [`ArSession`].
///
/// An error presenter is required. Binding it here means no native error
/// can arrive before someone is listening.
pub struct SessionBuilder {
    channel: Arc<dyn Channel>,
    session_id: Option<SessionId>,
    debug: bool,
    presenter: Option<Arc<dyn ErrorPresenter>>,
    tap_listener: Option<TapListener>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("channel", &self.channel.name())
            .field("session_id", &self.session_id)
            .field("debug", &self.debug)
            .field("presenter", &self.presenter.is_some())
            .field("tap_listener", &self.tap_listener.is_some())
            .finish()
    }
}

impl SessionBuilder {
    fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            session_id: None,
            debug: false,
            presenter: None,
            tap_listener: None,
        }
    }

    /// Sets the error presenter. Required.
    #[must_use]
    pub fn error_presenter(mut self, presenter: impl ErrorPresenter + 'static) -> Self {
        self.presenter = Some(Arc::new(presenter));
        self
    }

    /// Sets the plane or point tap listener.
    #[must_use]
    pub fn on_plane_or_point_tap<F>(mut self, listener: F) -> Self
    where
        F: Fn(Vec<HitTestResult>) + Send + Sync + 'static,
    {
        self.tap_listener = Some(Box::new(listener));
        self
    }

    /// Enables logging of failed queries.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the session ID.
    ///
    /// Defaults to the ID in the channel name, or a fresh one.
    #[must_use]
    pub fn session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Builds the session and installs its dispatch handler.
    ///
    /// # Errors
    ///
    /// - [`Error::ListenerMissing`] if no error presenter is set
    /// - [`Error::Config`] if the session ID disagrees with the channel name
    pub fn build(self) -> Result<ArSession> {
        let presenter = self
            .presenter
            .ok_or_else(|| Error::listener_missing("error presenter"))?;

        let named = SessionId::from_channel_name(self.channel.name());
        let session_id = match (self.session_id, named) {
            (Some(given), Some(named)) if given != named => {
                return Err(Error::config(format!(
                    "session {given} does not match channel {}",
                    self.channel.name()
                )));
            }
            (Some(id), _) | (None, Some(id)) => id,
            (None, None) => SessionId::next(),
        };

        let inner = Arc::new(SessionInner {
            session_id,
            channel: self.channel,
            state: Mutex::new(SessionState::Uninitialized),
            debug: self.debug,
            logo_index: RwLock::new(LogoIndex::UNSET),
            relay: ErrorRelay::new(session_id, presenter),
            tap_listener: self.tap_listener,
        });

        let weak: Weak<SessionInner> = Arc::downgrade(&inner);
        inner.channel.set_dispatch_handler(Box::new(move |event| {
            weak.upgrade().and_then(|inner| inner.route_event(event))
        }));

        debug!(session_id = %session_id, channel = %inner.channel.name(), "Session built");

        Ok(ArSession { inner })
    }
}

// ============================================================================
// Tests
// ============================================================================
