//! Transport boundary: framed-message carriers underneath a connection.
//!
//! A [`FramedTransport`] is a reliable, ordered carrier that already speaks
//! whole frames — the opening handshake, masking, and fragment reassembly
//! happen below this boundary. [`WsTransport`] is the production
//! implementation over tokio-tungstenite; tests substitute channel-backed
//! mocks.
//!
//! Transport-native close codes are converted to the crate's [`CloseCode`]
//! here, exactly once, in both directions.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{CloseCode, CloseFrame, Frame};

// ============================================================================
// FramedTransport
// ============================================================================

/// A bidirectional, ordered, framed-message carrier.
///
/// One frame in per `recv`, one frame out per `send`. Implementations are
/// driven from a single task; they do not need to be internally
/// synchronized.
#[async_trait]
pub trait FramedTransport: Send {
    /// Starts the transport, returning once it is ready to carry frames.
    ///
    /// Already-established transports (server-accepted streams) return
    /// immediately.
    async fn start(&mut self) -> Result<()>;

    /// Transmits one complete frame.
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Waits for the next inbound frame.
    ///
    /// Returns `Ok(None)` when the peer ends the stream without a Close
    /// frame.
    async fn recv(&mut self) -> Result<Option<Frame>>;

    /// Releases the underlying resources. Safe to call more than once.
    async fn cancel(&mut self);
}

// ============================================================================
// WsTransport
// ============================================================================

/// WebSocket transport over tokio-tungstenite.
///
/// Construct with [`WsTransport::client`] to dial on `start`, or
/// [`WsTransport::accept`] for an inbound TCP stream on the server side.
pub struct WsTransport {
    state: State,
}

enum State {
    /// Client side, not yet dialed. `start` performs the handshake.
    Pending { url: String },
    /// Client-side stream (possibly TLS).
    Client(WebSocketStream<MaybeTlsStream<TcpStream>>),
    /// Server-accepted stream.
    Server(WebSocketStream<TcpStream>),
    /// Resources released.
    Done,
}

impl WsTransport {
    /// Creates a client transport that dials `url` when started.
    #[must_use]
    pub fn client(url: impl Into<String>) -> Self {
        Self {
            state: State::Pending { url: url.into() },
        }
    }

    /// Performs the server-side upgrade handshake on an inbound TCP stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the WebSocket upgrade fails.
    pub async fn accept(stream: TcpStream) -> Result<Self> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        Ok(Self {
            state: State::Server(ws),
        })
    }
}

#[async_trait]
impl FramedTransport for WsTransport {
    async fn start(&mut self) -> Result<()> {
        match &self.state {
            State::Pending { url } => {
                let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
                    .await
                    .map_err(|e| Error::connection(format!("connect to {url} failed: {e}")))?;
                debug!(url = %url, "WebSocket client connected");
                self.state = State::Client(ws);
                Ok(())
            }
            State::Client(_) | State::Server(_) => Ok(()),
            State::Done => Err(Error::NotConnected),
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        let message = outbound(frame)?;
        match &mut self.state {
            State::Client(ws) => ws.send(message).await?,
            State::Server(ws) => ws.send(message).await?,
            State::Pending { .. } | State::Done => return Err(Error::NotConnected),
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Frame>> {
        let message = match &mut self.state {
            State::Client(ws) => ws.next().await,
            State::Server(ws) => ws.next().await,
            State::Pending { .. } | State::Done => return Err(Error::NotConnected),
        };

        match message {
            Some(Ok(msg)) => inbound(msg).map(Some),
            Some(Err(
                tokio_tungstenite::tungstenite::Error::ConnectionClosed
                | tokio_tungstenite::tungstenite::Error::AlreadyClosed,
            ))
            | None => Ok(None),
            Some(Err(e)) => Err(e.into()),
        }
    }

    async fn cancel(&mut self) {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Client(mut ws) => {
                let _ = ws.close(None).await;
            }
            State::Server(mut ws) => {
                let _ = ws.close(None).await;
            }
            State::Pending { .. } | State::Done => {}
        }
    }
}

// ============================================================================
// Frame Conversion
// ============================================================================

/// Converts an inbound tungstenite message to the canonical frame model.
fn inbound(message: Message) -> Result<Frame> {
    match message {
        Message::Text(text) => Ok(Frame::Text(text.as_str().as_bytes().to_vec())),
        Message::Binary(data) => Ok(Frame::Binary(data.to_vec())),
        Message::Ping(_) => Ok(Frame::Ping),
        Message::Pong(_) => Ok(Frame::Pong),
        Message::Close(close) => Ok(Frame::Close(close.map(|cf| {
            CloseFrame::new(
                CloseCode::from_u16(u16::from(cf.code)),
                cf.reason.as_str().as_bytes().to_vec(),
            )
        }))),
        // Raw frames only surface for continuations outside a message;
        // reassembly below the boundary means we never expect one.
        Message::Frame(_) => Err(Error::protocol(
            "continuation frame without a message in progress",
        )),
    }
}

/// Converts an outbound frame to a tungstenite message.
///
/// Text payloads are validated here so a hand-built `Frame::Text` with bad
/// bytes can never reach the wire.
fn outbound(frame: Frame) -> Result<Message> {
    match frame {
        Frame::Text(bytes) => {
            let text = String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?;
            Ok(Message::Text(text.into()))
        }
        Frame::Binary(bytes) => Ok(Message::Binary(bytes.into())),
        Frame::Ping => Ok(Message::Ping(Vec::new().into())),
        Frame::Pong => Ok(Message::Pong(Vec::new().into())),
        Frame::Close(close) => Ok(Message::Close(close.map(|cf| WsCloseFrame {
            code: cf.code.as_u16().into(),
            reason: String::from_utf8_lossy(&cf.reason).into_owned().into(),
        }))),
    }
}

// ============================================================================
// Tests
// ============================================================================
