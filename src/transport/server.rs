//! Relay server: accept loop, connection registry, broadcast fan-out.
//!
//! The server wraps each inbound transport in a [`Connection`], assigns it a
//! monotonically increasing [`ConnectionId`], greets it, and registers it.
//! Every text or binary frame a connection delivers is rebroadcast verbatim
//! to all *other* registered connections; the sender never hears its own
//! payload back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               RelayServer                │
//! │  ┌────────────────────────────────────┐  │
//! │  │ ConnectionId=0 → Connection 0      │  │
//! │  │ ConnectionId=1 → Connection 1      │  │
//! │  │ ConnectionId=2 → Connection 2      │  │
//! │  └────────────────────────────────────┘  │
//! │    frame from 1 ──fan-out──▶ 0, 2        │
//! └──────────────────────────────────────────┘
//! ```
//!
//! A fatal failure on one connection is always local: its `PeerListener`
//! removes it from the registry and every other connection keeps running.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, ConnectionIdAllocator};
use crate::protocol::{CloseCode, Frame};
use crate::transport::connection::{Connection, ConnectionListener};
use crate::transport::framed::WsTransport;

// ============================================================================
// Constants
// ============================================================================

/// Accept poll interval; bounds how long shutdown waits on an idle listener.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

// ============================================================================
// RelayServer
// ============================================================================

/// Accepts WebSocket connections and relays frames between them.
///
/// # Example
///
/// ```ignore
/// let server = RelayServer::bind(ServerConfig::with_port(9000)).await?;
/// println!("listening on {}", server.local_addr());
/// // ... later
/// server.shutdown().await;
/// ```
pub struct RelayServer {
    /// Address actually bound (resolves port 0 to the assigned port).
    local_addr: SocketAddr,

    /// Behavior for accepted connections.
    config: ServerConfig,

    /// Active connections by id.
    connections: RwLock<FxHashMap<ConnectionId, Connection>>,

    /// Id source for this server instance.
    ids: ConnectionIdAllocator,

    /// Set once; the accept loop drains and exits.
    shutdown: AtomicBool,
}

// ============================================================================
// RelayServer - Constructor
// ============================================================================

impl RelayServer {
    /// Binds the listener and starts accepting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound. This is fatal
    /// at startup; callers surface it to the operator rather than retrying.
    pub async fn bind(config: ServerConfig) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let server = Arc::new(Self {
            local_addr,
            config,
            connections: RwLock::new(FxHashMap::default()),
            ids: ConnectionIdAllocator::new(),
            shutdown: AtomicBool::new(false),
        });

        let accept_server = Arc::clone(&server);
        tokio::spawn(accept_server.accept_loop(listener));

        info!(addr = %local_addr, "relay server listening");
        Ok(server)
    }
}

// ============================================================================
// RelayServer - Public API
// ============================================================================

impl RelayServer {
    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the number of registered connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Stops accepting, disconnects every registered connection with a
    /// normal-closure code, and clears the registry.
    ///
    /// Safe to call concurrently with in-flight accepts: a connection that
    /// completes its upgrade after this point is disconnected immediately.
    pub async fn shutdown(&self) {
        info!("relay server shutting down");
        self.shutdown.store(true, Ordering::SeqCst);

        let drained: Vec<_> = {
            let mut map = self.connections.write();
            map.drain().collect()
        };

        for (id, conn) in &drained {
            let _ = conn.disconnect(CloseCode::Normal);
            debug!(id = %id, "connection closed during shutdown");
        }
        for (_, conn) in &drained {
            conn.wait_closed().await;
        }

        info!("relay server shutdown complete");
    }
}

// ============================================================================
// RelayServer - Accept Loop
// ============================================================================

impl RelayServer {
    /// Background task accepting new connections until shutdown.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("accept loop started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                debug!("accept loop shutting down");
                break;
            }

            // Bounded wait so the loop re-checks the shutdown flag.
            match timeout(ACCEPT_POLL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    // Transient accept failure; keep the listener alive.
                    error!(error = %e, "accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("accept loop terminated");
    }

    /// Upgrades, registers, starts, and greets a single inbound connection.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "new TCP connection");

        let transport = WsTransport::accept(stream).await?;

        let id = self.ids.next();
        let listener = Arc::new(PeerListener {
            server: Arc::downgrade(&self),
            id,
        });
        let conn = Connection::new(transport, listener, self.config.connection.clone());

        self.connections.write().insert(id, conn.clone());
        conn.connect().await?;

        // Lost the race with shutdown: the registry was already drained.
        if self.shutdown.load(Ordering::SeqCst) {
            self.connections.write().remove(&id);
            let _ = conn.disconnect(CloseCode::GoingAway);
            return Ok(());
        }

        conn.send_text(format!("Welcome you are connection: {id}"))?;
        info!(id = %id, ?addr, "connection registered");
        Ok(())
    }
}

// ============================================================================
// RelayServer - Broadcast & Removal
// ============================================================================

impl RelayServer {
    /// Fans `frame` out to every registered connection except `sender`.
    ///
    /// Best-effort per peer: one failed send is logged and skipped, the rest
    /// still receive the frame.
    fn broadcast_from(&self, sender: ConnectionId, frame: Frame) {
        let peers: Vec<(ConnectionId, Connection)> = {
            let map = self.connections.read();
            map.iter()
                .filter(|(id, _)| **id != sender)
                .map(|(id, conn)| (*id, conn.clone()))
                .collect()
        };

        debug!(from = %sender, kind = frame.kind(), peers = peers.len(), "broadcast");

        for (id, conn) in peers {
            if let Err(e) = conn.send(frame.clone()) {
                warn!(id = %id, error = %e, "broadcast send failed");
            }
        }
    }

    /// Removes a stopped connection from the registry.
    ///
    /// Idempotent: removing an id that is already gone (e.g. drained by
    /// shutdown) is a no-op.
    fn connection_stopped(&self, id: ConnectionId) {
        let removed = self.connections.write().remove(&id);
        if removed.is_some() {
            debug!(id = %id, "connection removed from registry");
        }
    }
}

// ============================================================================
// PeerListener
// ============================================================================

/// Listener installed on every accepted connection.
///
/// Holds the server weakly: the server owns the connection which owns this
/// listener, so a strong reference would cycle.
struct PeerListener {
    server: Weak<RelayServer>,
    id: ConnectionId,
}

impl ConnectionListener for PeerListener {
    fn on_text(&self, text: String) {
        if let Some(server) = self.server.upgrade() {
            server.broadcast_from(self.id, Frame::text(text));
        }
    }

    fn on_binary(&self, data: Vec<u8>) {
        if let Some(server) = self.server.upgrade() {
            server.broadcast_from(self.id, Frame::binary(data));
        }
    }

    fn on_error(&self, error: &Error) {
        warn!(id = %self.id, error = %error, "connection error");
    }

    fn on_disconnected(&self, code: CloseCode, _reason: Option<Vec<u8>>) {
        debug!(id = %self.id, code = %code, "connection stopped");
        if let Some(server) = self.server.upgrade() {
            server.connection_stopped(self.id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
