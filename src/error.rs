//! Error types for the relay core.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_relay::{Result, Error};
//!
//! fn example(conn: &Connection) -> Result<()> {
//!     conn.send_text("hello")?;
//!     conn.disconnect(CloseCode::Normal)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::Connection`], [`Error::NotConnected`] |
//! | Protocol | [`Error::Protocol`], [`Error::InvalidUtf8`], [`Error::InvalidCloseCode`] |
//! | Liveness | [`Error::PongTimeout`], [`Error::IdleTimeout`] |
//! | External | [`Error::Io`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::protocol::CloseCode;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection failed or was severed abnormally.
    ///
    /// Returned when the underlying transport cannot be established
    /// or breaks mid-operation.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Operation attempted on a connection that is not open.
    ///
    /// Returned by `send` and friends once the connection has closed;
    /// the payload is never transmitted.
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation in an inbound frame.
    ///
    /// Returned for malformed frames, e.g. a continuation frame with no
    /// message in progress.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Text frame payload is not valid UTF-8.
    ///
    /// Such a payload is a protocol error and is never delivered as a
    /// message.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Close code may not be sent in a Close frame.
    ///
    /// Codes 1004-1006 and 1015 are receive-only per RFC 6455.
    #[error("Close code {code} may not be sent")]
    InvalidCloseCode {
        /// The rejected numeric close code.
        code: u16,
    },

    // ========================================================================
    // Liveness Errors
    // ========================================================================
    /// Peer failed to answer a keepalive ping before the next one was due.
    #[error("No pong within ping interval of {interval_ms}ms")]
    PongTimeout {
        /// The keepalive interval in milliseconds.
        interval_ms: u64,
    },

    /// No inbound frame arrived within the configured idle window.
    #[error("Idle timeout after {timeout_ms}ms")]
    IdleTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid close code error.
    #[inline]
    pub fn invalid_close_code(code: u16) -> Self {
        Self::InvalidCloseCode { code }
    }

    /// Creates a pong timeout error.
    #[inline]
    pub fn pong_timeout(interval_ms: u64) -> Self {
        Self::PongTimeout { interval_ms }
    }

    /// Creates an idle timeout error.
    #[inline]
    pub fn idle_timeout(timeout_ms: u64) -> Self {
        Self::IdleTimeout { timeout_ms }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error terminates the connection it occurred on.
    ///
    /// Fatal errors route through the standard teardown path: one `on_error`
    /// followed by exactly one terminal `on_disconnected`.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotConnected | Self::InvalidCloseCode { .. })
    }

    /// Returns `true` if this is a protocol error.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::InvalidUtf8)
    }

    /// Returns the close code reported when this error tears a connection
    /// down.
    ///
    /// Severed-transport errors map to the receive-only Abnormal code: there
    /// is no close handshake to put a code on, only a local report.
    #[inline]
    #[must_use]
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::InvalidUtf8 => CloseCode::InvalidPayload,
            Self::Protocol { .. } => CloseCode::ProtocolError,
            Self::PongTimeout { .. } | Self::IdleTimeout { .. } => CloseCode::GoingAway,
            _ => CloseCode::Abnormal,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
