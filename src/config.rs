//! Runtime configuration for connections and the relay server.
//!
//! Configuration is a plain struct built once at startup and handed to the
//! constructors; nothing in this module reads the environment. The binary
//! populates [`ServerConfig`] from its CLI arguments.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default keepalive interval used when callers enable pinging without
/// picking their own cadence.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Per-connection behavior knobs.
///
/// The defaults match a well-behaved peer: pings are answered automatically
/// and no keepalive or idle timer runs until asked for.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Reply to inbound Ping frames with a Pong automatically.
    ///
    /// When disabled, inbound pings are discarded; they are never delivered
    /// to the listener either way.
    pub auto_reply_ping: bool,

    /// Keepalive ping cadence armed at connect time.
    ///
    /// `None` leaves keepalive off; `Connection::ping` can arm it later.
    /// A ping whose pong has not arrived by the next tick is a liveness
    /// failure and tears the connection down.
    pub ping_interval: Option<Duration>,

    /// Tear the connection down if no inbound frame arrives for this long.
    ///
    /// `None` disables the idle timer.
    pub idle_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            auto_reply_ping: true,
            ping_interval: None,
            idle_timeout: None,
        }
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

/// Relay server configuration.
///
/// # Example
///
/// ```
/// use ws_relay::config::ServerConfig;
///
/// let cfg = ServerConfig::with_port(9000);
/// assert_eq!(cfg.bind_addr.port(), 9000);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    ///
    /// Port 0 asks the OS for an ephemeral port; `RelayServer::port` reports
    /// the one actually bound.
    pub bind_addr: SocketAddr,

    /// Behavior applied to every accepted connection.
    pub connection: ConnectionConfig,
}

impl ServerConfig {
    /// Creates a config bound to localhost on the given port.
    #[must_use]
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
            connection: ConnectionConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_port(0)
    }
}

// ============================================================================
// Tests
// ============================================================================
