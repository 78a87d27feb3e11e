//! Single listening port shared by every native AR view.
//!
//! Views connect, announce their [`SessionId`] in READY and are then handed
//! to whoever waits for that session.
//!
//! # Lifecycle
//!
//! ```text
//!   native view ──TCP──▶ accept loop ──upgrade──▶ Connection
//!                                                    │ READY {sessionId, channel}
//!                                                    ▼
//!   wait_for_session(id) ◀── waiter ◀──── connections[id]
//!                                                    │ event loop exits
//!                                                    ▼
//!                                             entry pruned
//! ```
//!
//! An entry lives exactly as long as its socket task, whichever side
//! closes the socket.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

use super::connection::{Connection, DEFAULT_COMMAND_TIMEOUT};

// ============================================================================
// Constants
// ============================================================================

/// Views live in the same process, so loopback only.
const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// How long [`ConnectionPool::wait_for_session`] waits for a view.
const SESSION_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ConnectionPool
// ============================================================================

/// Live view connections keyed by [`SessionId`].
///
/// # Example
///
/// ```ignore
/// let pool = ConnectionPool::new().await?;
/// tracing::info!(url = %pool.ws_url(), "Waiting for AR views");
///
/// let session_id = SessionId::next();
/// // Hand `session_id` and `pool.ws_url()` to the native view...
/// let connection = pool.wait_for_session(session_id).await?;
/// ```
pub struct ConnectionPool {
    port: u16,

    /// Request timeout applied to every accepted connection.
    request_timeout: Duration,

    /// Only connections whose socket task is still running.
    connections: RwLock<FxHashMap<SessionId, Connection>>,

    /// Waiters for sessions whose native view has not connected yet.
    waiters: Mutex<FxHashMap<SessionId, oneshot::Sender<Connection>>>,

    shutdown: AtomicBool,
}

// ============================================================================
// ConnectionPool - Constructor
// ============================================================================

impl ConnectionPool {
    /// Listens on an ephemeral loopback port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn new() -> Result<Arc<Self>> {
        Self::with_ip_port(DEFAULT_BIND_IP, 0).await
    }

    /// Listens on a fixed loopback port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn with_port(port: u16) -> Result<Arc<Self>> {
        Self::with_ip_port(DEFAULT_BIND_IP, port).await
    }

    /// Listens on `ip:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn with_ip_port(ip: IpAddr, port: u16) -> Result<Arc<Self>> {
        Self::bind(SocketAddr::new(ip, port), DEFAULT_COMMAND_TIMEOUT).await
    }

    /// Creates a pool on `localhost:0` with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero timeout, or [`Error::Io`] if
    /// binding fails.
    pub async fn with_request_timeout(request_timeout: Duration) -> Result<Arc<Self>> {
        if request_timeout.is_zero() {
            return Err(Error::config("request timeout must be non-zero"));
        }
        Self::bind(SocketAddr::new(DEFAULT_BIND_IP, 0), request_timeout).await
    }

    /// Binds the listener and spawns the accept loop.
    async fn bind(addr: SocketAddr, request_timeout: Duration) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        debug!(port = actual_port, "ConnectionPool WebSocket server bound");

        let pool = Arc::new(Self {
            port: actual_port,
            request_timeout,
            connections: RwLock::new(FxHashMap::default()),
            waiters: Mutex::new(FxHashMap::default()),
            shutdown: AtomicBool::new(false),
        });

        let pool_clone = Arc::clone(&pool);
        tokio::spawn(async move {
            pool_clone.accept_loop(listener).await;
        });

        info!(port = actual_port, "ConnectionPool started");

        Ok(pool)
    }
}

// ============================================================================
// ConnectionPool - Public API
// ============================================================================

impl ConnectionPool {
    /// URL handed to native views, `ws://127.0.0.1:{port}`.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Bound port, resolved when created with port 0.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns how many sessions currently have a live view.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns the connection for a session that has already connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if no view serves this session.
    pub fn connection(&self, session_id: SessionId) -> Result<Connection> {
        self.connections
            .read()
            .get(&session_id)
            .filter(|connection| !connection.is_closed())
            .cloned()
            .ok_or_else(|| Error::session_not_found(session_id))
    }

    /// Waits for the native view of a session to connect.
    ///
    /// Returns immediately if it already has.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the view doesn't connect within 30s
    /// - [`Error::Connection`] if the pool shuts down while waiting
    pub async fn wait_for_session(&self, session_id: SessionId) -> Result<Connection> {
        let rx = {
            // Check and register under one lock so a concurrent READY is not missed.
            let mut waiters = self.waiters.lock();
            if let Some(connection) = self.connections.read().get(&session_id)
                && !connection.is_closed()
            {
                return Ok(connection.clone());
            }
            let (tx, rx) = oneshot::channel();
            waiters.insert(session_id, tx);
            rx
        };

        match timeout(SESSION_CONNECT_TIMEOUT, rx).await {
            Ok(Ok(connection)) => {
                debug!(session_id = %session_id, "Session connected");
                Ok(connection)
            }
            Ok(Err(_)) => {
                self.waiters.lock().remove(&session_id);
                Err(Error::connection("Session waiter channel closed"))
            }
            Err(_) => {
                self.waiters.lock().remove(&session_id);
                Err(Error::connection_timeout(
                    SESSION_CONNECT_TIMEOUT.as_millis() as u64,
                ))
            }
        }
    }
}

// ============================================================================
// ConnectionPool - Lifecycle
// ============================================================================

impl ConnectionPool {
    /// Removes a session from the pool and closes its connection.
    pub fn remove(&self, session_id: SessionId) {
        let removed = self.connections.write().remove(&session_id);

        if let Some(connection) = removed {
            connection.shutdown();
            debug!(session_id = %session_id, "Session removed from pool");
        }
    }

    /// Stops accepting, closes every connection and fails pending waiters.
    pub async fn shutdown(&self) {
        info!("ConnectionPool shutting down");

        self.shutdown.store(true, Ordering::SeqCst);

        let connections: Vec<_> = self.connections.write().drain().collect();

        for (session_id, connection) in connections {
            connection.shutdown();
            debug!(session_id = %session_id, "Connection closed during shutdown");
        }

        // Dropping senders wakes the waiters with an error
        let waiters: Vec<_> = self.waiters.lock().drain().collect();
        drop(waiters);

        info!("ConnectionPool shutdown complete");
    }
}

// ============================================================================
// ConnectionPool - Accept Loop
// ============================================================================

impl ConnectionPool {
    /// Accepts sockets until shutdown, one task per socket.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                debug!("Accept loop shutting down");
                break;
            }

            // Bounded so the shutdown flag is seen without a new client.
            match timeout(Duration::from_millis(100), listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let pool = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = pool.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    /// Upgrades a socket, reads READY and publishes the connection.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "New TCP connection");

        let ws_stream = tokio_tungstenite::accept_async(stream).await?;

        info!(?addr, "WebSocket connection established");

        let connection = Connection::new(ws_stream).with_request_timeout(self.request_timeout);
        let ready_data = match connection.wait_ready().await {
            Ok(ready_data) => ready_data,
            Err(e) => {
                connection.shutdown();
                return Err(e);
            }
        };

        let session_id = match Self::validate_ready(ready_data.session_id, &ready_data.channel) {
            Ok(session_id) => session_id,
            Err(e) => {
                connection.shutdown();
                return Err(e);
            }
        };

        let connection = connection.named(ready_data.channel);

        info!(session_id = %session_id, ?addr, "Session READY received");

        let waiter = {
            let mut waiters = self.waiters.lock();
            let previous = self
                .connections
                .write()
                .insert(session_id, connection.clone());
            if let Some(previous) = previous {
                warn!(session_id = %session_id, "Replacing existing connection for session");
                previous.shutdown();
            }
            waiters.remove(&session_id)
        };

        self.watch_close(session_id, connection.clone());

        if let Some(tx) = waiter {
            let _ = tx.send(connection);
        }

        Ok(())
    }

    /// Drops the entry once its event loop exits.
    fn watch_close(self: &Arc<Self>, session_id: SessionId, connection: Connection) {
        let pool = Arc::downgrade(self);
        tokio::spawn(async move {
            connection.stopped().await;
            if let Some(pool) = pool.upgrade() {
                pool.prune(session_id, &connection);
            }
        });
    }

    /// Removes `connection` unless a newer one already took its slot.
    fn prune(&self, session_id: SessionId, connection: &Connection) {
        let mut connections = self.connections.write();
        if connections
            .get(&session_id)
            .is_some_and(|current| current.same_loop(connection))
        {
            connections.remove(&session_id);
            debug!(session_id = %session_id, "Closed connection pruned");
        }
    }

    /// Checks that the READY channel name matches the announced session.
    fn validate_ready(raw_session_id: u32, channel: &str) -> Result<SessionId> {
        let session_id = SessionId::from_u32(raw_session_id)
            .ok_or_else(|| Error::protocol("Invalid sessionId in READY (must be > 0)"))?;

        if channel != session_id.channel_name() {
            return Err(Error::protocol(format!(
                "READY channel {channel:?} does not match session {session_id}"
            )));
        }

        Ok(session_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
