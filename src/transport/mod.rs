//! Connection, transport boundary, keepalive, and relay server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │   RelayServer   │                              │  Peer (client)  │
//! │                 │          WebSocket           │                 │
//! │  Connection ◄───┼─────────────────────────────►│  Connection     │
//! │  registry       │        host:PORT             │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `WsTransport::client` / `WsTransport::accept` - obtain a transport
//! 2. `Connection::new` - wrap it with a listener and config
//! 3. `Connection::connect` - start the transport and the receive loop
//! 4. `send` / `ping` / frames flowing to the listener
//! 5. `disconnect` (or remote close / fatal error) - single teardown path
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection handle, listener trait, event loop |
//! | `framed` | Transport boundary trait + tungstenite adapter |
//! | `keepalive` | Per-connection ping scheduling (internal) |
//! | `server` | Accept loop, registry, broadcast |

// ============================================================================
// Submodules
// ============================================================================

/// Connection handle and event loop.
pub mod connection;

/// Framed-message transport boundary.
pub mod framed;

/// Keepalive scheduling.
pub(crate) mod keepalive;

/// Relay server and connection registry.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionListener, ConnectionState};
pub use framed::{FramedTransport, WsTransport};
pub use server::RelayServer;
