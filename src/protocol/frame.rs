//! Typed message frames exchanged over a connection.
//!
//! [`Frame`] is the vocabulary the transport boundary speaks: the transport
//! delivers exactly one `Frame` per wire message and accepts exactly one
//! `Frame` per send. Text payloads cross the boundary as raw bytes; UTF-8
//! validation is the connection's job, so an invalid payload can be rejected
//! as a protocol error instead of being delivered.

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::CloseCode;

// ============================================================================
// CloseFrame
// ============================================================================

/// Close frame contents: status code plus optional reason bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Reason bytes supplied by the closing endpoint (often UTF-8, not
    /// required to be).
    pub reason: Vec<u8>,
}

impl CloseFrame {
    /// Creates a close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One complete message frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Frame {
    /// A text message. Payload bytes must be valid UTF-8 to be delivered.
    Text(Vec<u8>),
    /// A binary message.
    Binary(Vec<u8>),
    /// A ping control frame.
    Ping,
    /// A pong control frame.
    Pong,
    /// A close control frame, optionally carrying a code and reason.
    Close(Option<CloseFrame>),
}

impl Frame {
    /// Creates a text frame from a string.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Frame::Text(s.into().into_bytes())
    }

    /// Creates a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Frame::Binary(data.into())
    }

    /// Creates a close frame with the given code and no reason.
    #[must_use]
    pub fn close(code: CloseCode) -> Self {
        Frame::Close(Some(CloseFrame::new(code, Vec::new())))
    }

    /// Returns `true` for text frames.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Frame::Text(_))
    }

    /// Returns `true` for binary frames.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }

    /// Returns `true` for data frames (text or binary).
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, Frame::Text(_) | Frame::Binary(_))
    }

    /// Returns `true` for control frames (ping, pong, close).
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, Frame::Ping | Frame::Pong | Frame::Close(_))
    }

    /// Borrows the data payload, if this is a data frame.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Frame::Text(data) | Frame::Binary(data) => Some(data),
            _ => None,
        }
    }

    /// Short opcode name for log messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
            Frame::Ping => "ping",
            Frame::Pong => "pong",
            Frame::Close(_) => "close",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
