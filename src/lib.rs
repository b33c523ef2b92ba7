//! ws-relay - Typed WebSocket connection core with a broadcast relay server.
//!
//! This library turns a raw framed-message transport into a typed-message
//! protocol with keepalive and graceful teardown, and provides a server that
//! accepts many such connections and fans every message out to all other
//! connected peers.
//!
//! # Architecture
//!
//! Two halves, one vocabulary:
//!
//! - **Connection**: owns a transport, runs one receive-loop task, reports
//!   lifecycle and message events to a [`ConnectionListener`]
//! - **RelayServer**: accepts transports, wraps them in Connections keyed by
//!   [`ConnectionId`], and rebroadcasts every inbound payload to the rest
//!
//! Key design principles:
//!
//! - One event-loop task per connection; frames on a connection are handled
//!   strictly in order and outbound writes never interleave
//! - One canonical [`CloseCode`] representation, converted at the transport
//!   boundary
//! - Exactly-once teardown: at most one `on_error`, exactly one
//!   `on_disconnected`, transport released once
//! - Per-connection failures never touch the listener or sibling connections
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ws_relay::{Connection, ConnectionConfig, ConnectionListener, Result, WsTransport};
//!
//! struct Printer;
//!
//! impl ConnectionListener for Printer {
//!     fn on_text(&self, text: String) {
//!         println!("peer says: {text}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = WsTransport::client("ws://127.0.0.1:9000");
//!     let conn = Connection::new(transport, Arc::new(Printer), ConnectionConfig::default());
//!
//!     conn.connect().await?;
//!     conn.send_text("hello")?;
//!     conn.ping(std::time::Duration::from_secs(25))?;
//!     conn.wait_closed().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Connection and server configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe id wrappers and the id allocator |
//! | [`protocol`] | Frame model and close codes |
//! | [`transport`] | Connection, transport boundary, relay server |

// ============================================================================
// Modules
// ============================================================================

/// Connection and server configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible ids at compile time.
pub mod identifiers;

/// Frame model: message kinds and close-code semantics.
pub mod protocol;

/// Connection, transport boundary, and relay server.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{ConnectionConfig, ServerConfig};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, ConnectionIdAllocator};

// Frame model
pub use protocol::{CloseCode, CloseFrame, Frame};

// Transport types
pub use transport::{
    Connection, ConnectionListener, ConnectionState, FramedTransport, RelayServer, WsTransport,
};
