//! One bidirectional, stateful connection and its event loop.
//!
//! A [`Connection`] wraps a [`FramedTransport`] and runs a receive loop in a
//! spawned tokio task. Inbound frames are decoded and forwarded to the
//! [`ConnectionListener`]; outbound sends from any number of callers are
//! funneled through a command channel into the same task, so writes never
//! interleave.
//!
//! # Event Loop
//!
//! The spawned task owns the transport exclusively and handles:
//!
//! - Inbound frames (text, binary, ping, pong, close)
//! - Outbound commands from `send` / `ping` / `disconnect`
//! - Keepalive ticks and pong-overdue detection
//! - The optional idle timer
//!
//! Every exit path funnels into one teardown sequence, which is how the
//! exactly-once guarantees hold: at most one `on_error`, exactly one
//! `on_disconnected`, and the transport released exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::protocol::{CloseCode, CloseFrame, Frame};
use crate::transport::framed::FramedTransport;
use crate::transport::keepalive::{Keepalive, KeepaliveEvent};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection.
///
/// `Idle →(connect)→ Connecting →(transport ready)→ Open →(disconnect |
/// remote close | fatal error)→ Closing → Closed`. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Constructed, `connect` not yet called.
    #[default]
    Idle,
    /// `connect` called, transport starting.
    Connecting,
    /// Transport ready; frames flow.
    Open,
    /// Teardown in progress.
    Closing,
    /// Terminal. The transport has been released.
    Closed,
}

impl ConnectionState {
    /// Whether the connection has not yet fully closed.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Whether `send` may enqueue a frame in this state.
    ///
    /// Frames enqueued while Connecting are transmitted, in order, once the
    /// transport is ready.
    #[inline]
    #[must_use]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
            ConnectionState::Closing => "Closing",
            ConnectionState::Closed => "Closed",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// ConnectionListener
// ============================================================================

/// Capability interface for connection lifecycle and message events.
///
/// Passed at construction as `Arc<dyn ConnectionListener>`; the connection
/// delivers callbacks to exactly one listener, from its event loop task, and
/// never after the terminal `on_disconnected`.
///
/// All methods default to no-ops so implementors opt into the events they
/// care about.
pub trait ConnectionListener: Send + Sync {
    /// Transport ready; the connection is Open.
    fn on_connected(&self) {}

    /// Terminal event: the connection has torn down.
    ///
    /// Fires exactly once per connected connection, whether by local
    /// disconnect, remote close, or fatal error.
    fn on_disconnected(&self, code: CloseCode, reason: Option<Vec<u8>>) {
        let _ = (code, reason);
    }

    /// A failure occurred. Fatal failures are followed by
    /// `on_disconnected`; fires at most once per connection.
    fn on_error(&self, error: &Error) {
        let _ = error;
    }

    /// A text message arrived (payload already UTF-8 validated).
    fn on_text(&self, text: String) {
        let _ = text;
    }

    /// A binary message arrived.
    fn on_binary(&self, data: Vec<u8>) {
        let _ = data;
    }

    /// The peer answered a ping.
    fn on_pong(&self) {}
}

// ============================================================================
// Commands
// ============================================================================

/// Requests from handle methods to the event loop.
enum Command {
    /// Transmit one frame.
    Send(Frame),
    /// Arm (or re-arm) the keepalive timer.
    Ping(Duration),
    /// Close with the given code.
    Disconnect(CloseCode),
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to one bidirectional connection.
///
/// Cheap to clone; all clones drive the same event loop. The loop owns the
/// transport exclusively and releases it on close. Dropping every handle
/// closes the connection with a normal-closure code.
pub struct Connection {
    command_tx: mpsc::UnboundedSender<Command>,
    state: Arc<Mutex<ConnectionState>>,
    boot: Arc<Mutex<Option<Boot>>>,
    closed_rx: watch::Receiver<bool>,
}

/// Everything the event loop needs, parked until `connect`.
struct Boot {
    transport: Box<dyn FramedTransport>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    listener: Arc<dyn ConnectionListener>,
    config: ConnectionConfig,
    closed_tx: watch::Sender<bool>,
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            state: Arc::clone(&self.state),
            boot: Arc::clone(&self.boot),
            closed_rx: self.closed_rx.clone(),
        }
    }
}

impl Connection {
    /// Creates an Idle connection over `transport`, reporting to `listener`.
    #[must_use]
    pub fn new(
        transport: impl FramedTransport + 'static,
        listener: Arc<dyn ConnectionListener>,
        config: ConnectionConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);

        Self {
            command_tx,
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            boot: Arc::new(Mutex::new(Some(Boot {
                transport: Box::new(transport),
                command_rx,
                listener,
                config,
                closed_tx,
            }))),
            closed_rx,
        }
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Starts the transport and the receive loop.
    ///
    /// Transitions Idle → Connecting → Open and invokes `on_connected`. May
    /// only be called once per connection; a second call fails with
    /// [`Error::Connection`] and leaves the running connection untouched.
    ///
    /// # Errors
    ///
    /// A transport start failure is returned to the caller and also reported
    /// through `on_error` + `on_disconnected` (the connection ends Closed).
    pub async fn connect(&self) -> Result<()> {
        let boot = self
            .boot
            .lock()
            .take()
            .ok_or_else(|| Error::connection("connect may only be called once"))?;

        *self.state.lock() = ConnectionState::Connecting;

        let Boot {
            mut transport,
            command_rx,
            listener,
            config,
            closed_tx,
        } = boot;

        if let Err(e) = transport.start().await {
            *self.state.lock() = ConnectionState::Closed;
            listener.on_error(&e);
            listener.on_disconnected(CloseCode::Abnormal, None);
            let _ = closed_tx.send(true);
            return Err(e);
        }

        *self.state.lock() = ConnectionState::Open;
        listener.on_connected();

        let mut keepalive = Keepalive::new();
        if let Some(every) = config.ping_interval {
            keepalive.arm(every);
        }

        tokio::spawn(run_event_loop(
            transport,
            command_rx,
            keepalive,
            listener,
            config,
            Arc::clone(&self.state),
            closed_tx,
        ));

        Ok(())
    }

    /// Enqueues one data frame for transmission.
    ///
    /// Frames from the same caller go out in call order. After close this
    /// fails with [`Error::NotConnected`] and nothing reaches the wire; a
    /// transmission failure inside the loop surfaces through `on_error`
    /// followed by teardown.
    pub fn send(&self, frame: Frame) -> Result<()> {
        if !self.state().can_send() {
            return Err(Error::NotConnected);
        }
        self.command_tx
            .send(Command::Send(frame))
            .map_err(|_| Error::NotConnected)
    }

    /// Sends a text message.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Frame::text(text.into()))
    }

    /// Sends a binary message.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Frame::binary(data.into()))
    }

    /// Arms the keepalive: one ping every `every`, replacing any previous
    /// schedule.
    ///
    /// A ping whose pong has not arrived by the time the next ping is due is
    /// a liveness failure; the connection tears down with
    /// [`Error::PongTimeout`].
    pub fn ping(&self, every: Duration) -> Result<()> {
        if !self.state().can_send() {
            return Err(Error::NotConnected);
        }
        self.command_tx
            .send(Command::Ping(every))
            .map_err(|_| Error::NotConnected)
    }

    /// Closes the connection, sending a Close frame with `code`.
    ///
    /// Idempotent: calling again once teardown has begun (or before
    /// `connect`) is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCloseCode`] if `code` is receive-only (e.g. 1005,
    /// 1006).
    pub fn disconnect(&self, code: CloseCode) -> Result<()> {
        if !code.is_sendable() {
            return Err(Error::invalid_close_code(code.as_u16()));
        }
        if !self.state().can_send() {
            return Ok(());
        }
        // A lost command here means teardown already started; same outcome.
        let _ = self.command_tx.send(Command::Disconnect(code));
        Ok(())
    }

    /// Resolves once the connection reaches Closed.
    pub async fn wait_closed(&self) {
        let mut rx = self.closed_rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// What woke the event loop up.
enum Action {
    Inbound(Result<Option<Frame>>),
    Command(Option<Command>),
    Keepalive(KeepaliveEvent),
    IdleExpired,
}

/// How the loop ended; decides the teardown behavior.
enum Teardown {
    /// Local `disconnect(code)`: we initiate the close handshake.
    Local(CloseCode),
    /// The peer sent a Close frame; we echo and report its code.
    Remote(Option<CloseFrame>),
    /// A fatal error: `on_error`, then close.
    Fatal(Error),
}

#[allow(clippy::too_many_arguments)]
async fn run_event_loop(
    mut transport: Box<dyn FramedTransport>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    mut keepalive: Keepalive,
    listener: Arc<dyn ConnectionListener>,
    config: ConnectionConfig,
    state: Arc<Mutex<ConnectionState>>,
    closed_tx: watch::Sender<bool>,
) {
    let mut last_inbound = Instant::now();

    let outcome = loop {
        // The select only picks what happened; acting on it waits until its
        // futures are dropped, so the transport is free to use below.
        let action = tokio::select! {
            inbound = transport.recv() => Action::Inbound(inbound),
            command = command_rx.recv() => Action::Command(command),
            event = keepalive.tick() => Action::Keepalive(event),
            () = idle_expiry(last_inbound, config.idle_timeout) => Action::IdleExpired,
        };

        match action {
            Action::Inbound(Ok(Some(frame))) => {
                last_inbound = Instant::now();
                trace!(kind = frame.kind(), "frame received");
                if let Some(teardown) =
                    handle_frame(frame, &mut transport, &mut keepalive, &listener, &config).await
                {
                    break teardown;
                }
            }
            Action::Inbound(Ok(None)) => {
                break Teardown::Fatal(Error::connection("transport ended without a close frame"));
            }
            Action::Inbound(Err(e)) => break Teardown::Fatal(e),

            Action::Command(Some(Command::Send(frame))) => {
                if let Err(e) = transport.send(frame).await {
                    break Teardown::Fatal(e);
                }
            }
            Action::Command(Some(Command::Ping(every))) => keepalive.arm(every),
            Action::Command(Some(Command::Disconnect(code))) => break Teardown::Local(code),
            // Every handle dropped: close out gracefully.
            Action::Command(None) => break Teardown::Local(CloseCode::Normal),

            Action::Keepalive(KeepaliveEvent::SendPing) => {
                if let Err(e) = transport.send(Frame::Ping).await {
                    break Teardown::Fatal(e);
                }
            }
            Action::Keepalive(KeepaliveEvent::PongOverdue) => {
                break Teardown::Fatal(Error::pong_timeout(keepalive.interval_ms()));
            }

            Action::IdleExpired => {
                let timeout_ms = config.idle_timeout.map_or(0, |d| d.as_millis() as u64);
                break Teardown::Fatal(Error::idle_timeout(timeout_ms));
            }
        }
    };

    // Single teardown path. The keepalive stops with the Closing transition,
    // before any await, so no ping can fire against the released transport.
    keepalive.disarm();
    *state.lock() = ConnectionState::Closing;
    command_rx.close();

    let (code, reason) = match outcome {
        Teardown::Local(code) => {
            debug!(code = %code, "closing locally");
            let _ = transport.send(Frame::close(code)).await;
            (code, None)
        }
        Teardown::Remote(close) => {
            debug!("peer closed");
            let echo = match &close {
                Some(cf) if cf.code.is_sendable() => Frame::close(cf.code),
                _ => Frame::Close(None),
            };
            let _ = transport.send(echo).await;
            match close {
                Some(cf) => (cf.code, Some(cf.reason)),
                None => (CloseCode::NoStatus, None),
            }
        }
        Teardown::Fatal(err) => {
            warn!(error = %err, "connection failed");
            listener.on_error(&err);
            let code = err.close_code();
            if code.is_sendable() {
                let _ = transport.send(Frame::close(code)).await;
            }
            (code, None)
        }
    };

    listener.on_disconnected(code, reason);
    transport.cancel().await;
    *state.lock() = ConnectionState::Closed;
    let _ = closed_tx.send(true);

    debug!("event loop terminated");
}

/// Applies the decoding policy to one inbound frame.
///
/// Returns `Some(teardown)` when the frame ends the connection.
async fn handle_frame(
    frame: Frame,
    transport: &mut Box<dyn FramedTransport>,
    keepalive: &mut Keepalive,
    listener: &Arc<dyn ConnectionListener>,
    config: &ConnectionConfig,
) -> Option<Teardown> {
    match frame {
        Frame::Text(bytes) => match String::from_utf8(bytes) {
            Ok(text) => {
                listener.on_text(text);
                None
            }
            Err(_) => Some(Teardown::Fatal(Error::InvalidUtf8)),
        },
        Frame::Binary(data) => {
            listener.on_binary(data);
            None
        }
        // Pings are answered (or discarded), never delivered.
        Frame::Ping => {
            if config.auto_reply_ping {
                if let Err(e) = transport.send(Frame::Pong).await {
                    return Some(Teardown::Fatal(e));
                }
            }
            None
        }
        Frame::Pong => {
            keepalive.pong_received();
            listener.on_pong();
            None
        }
        Frame::Close(close) => Some(Teardown::Remote(close)),
    }
}

/// Resolves when the idle window elapses; pends forever when disabled.
async fn idle_expiry(last_inbound: Instant, idle_timeout: Option<Duration>) {
    match idle_timeout {
        Some(window) => tokio::time::sleep_until(last_inbound + window).await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::time::timeout;

    // ------------------------------------------------------------------------
    // Mock transport
    // ------------------------------------------------------------------------

    /// Channel-backed transport: the test holds the far end of the wire.
    struct MockTransport {
        inbound: mpsc::UnboundedReceiver<Result<Frame>>,
        outbound: mpsc::UnboundedSender<Frame>,
        cancelled: Arc<AtomicUsize>,
        fail_sends: Arc<AtomicBool>,
    }

    /// Far end of a [`MockTransport`].
    struct MockWire {
        inject: mpsc::UnboundedSender<Result<Frame>>,
        sent: mpsc::UnboundedReceiver<Frame>,
        cancelled: Arc<AtomicUsize>,
        fail_sends: Arc<AtomicBool>,
    }

    fn mock_transport() -> (MockTransport, MockWire) {
        let (inject, inbound) = mpsc::unbounded_channel();
        let (outbound, sent) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicUsize::new(0));
        let fail_sends = Arc::new(AtomicBool::new(false));

        (
            MockTransport {
                inbound,
                outbound,
                cancelled: Arc::clone(&cancelled),
                fail_sends: Arc::clone(&fail_sends),
            },
            MockWire {
                inject,
                sent,
                cancelled,
                fail_sends,
            },
        )
    }

    #[async_trait]
    impl FramedTransport for MockTransport {
        async fn start(&mut self) -> Result<()> {
            Ok(())
        }

        async fn send(&mut self, frame: Frame) -> Result<()> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(Error::connection("mock send failure"));
            }
            self.outbound
                .send(frame)
                .map_err(|_| Error::connection("mock wire dropped"))
        }

        async fn recv(&mut self) -> Result<Option<Frame>> {
            match self.inbound.recv().await {
                Some(result) => result.map(Some),
                None => Ok(None),
            }
        }

        async fn cancel(&mut self) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            self.inbound.close();
        }
    }

    /// Transport whose start always fails.
    struct BrokenTransport;

    #[async_trait]
    impl FramedTransport for BrokenTransport {
        async fn start(&mut self) -> Result<()> {
            Err(Error::connection("refused"))
        }
        async fn send(&mut self, _frame: Frame) -> Result<()> {
            Err(Error::NotConnected)
        }
        async fn recv(&mut self) -> Result<Option<Frame>> {
            Ok(None)
        }
        async fn cancel(&mut self) {}
    }

    // ------------------------------------------------------------------------
    // Recording listener
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        Connected,
        Disconnected(CloseCode),
        Error(String),
        Text(String),
        Binary(Vec<u8>),
        Pong,
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<Recorded>>,
        notify: tokio::sync::Notify,
    }

    impl RecordingListener {
        fn push(&self, event: Recorded) {
            self.events.lock().push(event);
            self.notify.notify_one();
        }

        fn events(&self) -> Vec<Recorded> {
            self.events.lock().clone()
        }

        fn count(&self, pred: impl Fn(&Recorded) -> bool) -> usize {
            self.events.lock().iter().filter(|e| pred(e)).count()
        }

        async fn wait_until(&self, pred: impl Fn(&[Recorded]) -> bool) {
            timeout(Duration::from_secs(5), async {
                loop {
                    let notified = self.notify.notified();
                    if pred(&self.events.lock()) {
                        return;
                    }
                    notified.await;
                }
            })
            .await
            .expect("listener condition not reached in time");
        }
    }

    impl ConnectionListener for RecordingListener {
        fn on_connected(&self) {
            self.push(Recorded::Connected);
        }
        fn on_disconnected(&self, code: CloseCode, _reason: Option<Vec<u8>>) {
            self.push(Recorded::Disconnected(code));
        }
        fn on_error(&self, error: &Error) {
            self.push(Recorded::Error(error.to_string()));
        }
        fn on_text(&self, text: String) {
            self.push(Recorded::Text(text));
        }
        fn on_binary(&self, data: Vec<u8>) {
            self.push(Recorded::Binary(data));
        }
        fn on_pong(&self) {
            self.push(Recorded::Pong);
        }
    }

    fn connected_pair(
        config: ConnectionConfig,
    ) -> (Connection, Arc<RecordingListener>, MockWire) {
        let (transport, wire) = mock_transport();
        let listener = Arc::new(RecordingListener::default());
        let conn = Connection::new(transport, listener.clone(), config);
        (conn, listener, wire)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_connect_reaches_open_and_reports() {
        let (conn, listener, _wire) = connected_pair(ConnectionConfig::default());
        assert_eq!(conn.state(), ConnectionState::Idle);

        conn.connect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(listener.events(), vec![Recorded::Connected]);
    }

    #[tokio::test]
    async fn test_connect_twice_fails_without_corruption() {
        let (conn, _listener, mut wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        let second = conn.connect().await;
        assert!(second.is_err());
        assert_eq!(conn.state(), ConnectionState::Open);

        // The running connection is untouched.
        conn.send_text("still works").unwrap();
        let frame = wire.sent.recv().await.unwrap();
        assert_eq!(frame, Frame::text("still works"));
    }

    #[tokio::test]
    async fn test_connect_failure_reports_error_and_terminal() {
        let listener = Arc::new(RecordingListener::default());
        let conn = Connection::new(
            BrokenTransport,
            listener.clone(),
            ConnectionConfig::default(),
        );

        let result = conn.connect().await;
        assert!(result.is_err());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(listener.count(|e| matches!(e, Recorded::Error(_))), 1);
        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Disconnected(_))),
            1
        );
    }

    #[tokio::test]
    async fn test_send_before_connect_is_not_connected() {
        let (conn, _listener, _wire) = connected_pair(ConnectionConfig::default());
        assert!(matches!(
            conn.send_text("too early"),
            Err(Error::NotConnected)
        ));
    }

    // ------------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_sends_preserve_order() {
        let (conn, _listener, mut wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        conn.send_text("one").unwrap();
        conn.send_text("two").unwrap();
        conn.send_binary(vec![3]).unwrap();

        assert_eq!(wire.sent.recv().await.unwrap(), Frame::text("one"));
        assert_eq!(wire.sent.recv().await.unwrap(), Frame::text("two"));
        assert_eq!(wire.sent.recv().await.unwrap(), Frame::binary(vec![3]));
    }

    #[tokio::test]
    async fn test_send_failure_is_fatal_once() {
        let (conn, listener, wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        wire.fail_sends.store(true, Ordering::SeqCst);
        conn.send_text("doomed").unwrap();
        conn.wait_closed().await;

        assert_eq!(listener.count(|e| matches!(e, Recorded::Error(_))), 1);
        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Disconnected(_))),
            1
        );
        assert_eq!(wire.cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_after_close_is_not_connected_and_not_transmitted() {
        let (conn, _listener, mut wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        conn.disconnect(CloseCode::Normal).unwrap();
        conn.wait_closed().await;

        assert!(matches!(
            conn.send_text("ghost"),
            Err(Error::NotConnected)
        ));

        // Drain the wire: only the close frame went out.
        let mut frames = Vec::new();
        while let Ok(frame) = wire.sent.try_recv() {
            frames.push(frame);
        }
        assert_eq!(frames, vec![Frame::close(CloseCode::Normal)]);
    }

    // ------------------------------------------------------------------------
    // Receiving
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_text_and_binary_delivered_in_order() {
        let (conn, listener, wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        wire.inject.send(Ok(Frame::text("hello"))).unwrap();
        wire.inject.send(Ok(Frame::binary(vec![1, 2]))).unwrap();

        listener
            .wait_until(|events| events.iter().any(|e| matches!(e, Recorded::Binary(_))))
            .await;

        assert_eq!(
            listener.events(),
            vec![
                Recorded::Connected,
                Recorded::Text("hello".into()),
                Recorded::Binary(vec![1, 2]),
            ]
        );
    }

    #[tokio::test]
    async fn test_ping_auto_replied_and_not_delivered() {
        let (conn, listener, mut wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        wire.inject.send(Ok(Frame::Ping)).unwrap();
        assert_eq!(wire.sent.recv().await.unwrap(), Frame::Pong);

        // Marker frame proves the ping produced no listener event.
        wire.inject.send(Ok(Frame::text("after"))).unwrap();
        listener
            .wait_until(|events| events.iter().any(|e| matches!(e, Recorded::Text(_))))
            .await;
        assert_eq!(
            listener.events(),
            vec![Recorded::Connected, Recorded::Text("after".into())]
        );
    }

    #[tokio::test]
    async fn test_ping_discarded_when_auto_reply_disabled() {
        let config = ConnectionConfig {
            auto_reply_ping: false,
            ..ConnectionConfig::default()
        };
        let (conn, listener, mut wire) = connected_pair(config);
        conn.connect().await.unwrap();

        wire.inject.send(Ok(Frame::Ping)).unwrap();
        wire.inject.send(Ok(Frame::text("after"))).unwrap();
        listener
            .wait_until(|events| events.iter().any(|e| matches!(e, Recorded::Text(_))))
            .await;

        // No pong went out ahead of further traffic.
        assert!(wire.sent.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pong_routed_to_listener() {
        let (conn, listener, wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        wire.inject.send(Ok(Frame::Pong)).unwrap();
        listener
            .wait_until(|events| events.iter().any(|e| matches!(e, Recorded::Pong)))
            .await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_text_is_protocol_error() {
        let (conn, listener, mut wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        wire.inject
            .send(Ok(Frame::Text(vec![0xff, 0xfe, 0xfd])))
            .unwrap();
        conn.wait_closed().await;

        // One error, one terminal callback, nothing delivered.
        assert_eq!(listener.count(|e| matches!(e, Recorded::Error(_))), 1);
        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Disconnected(CloseCode::InvalidPayload))),
            1
        );
        assert_eq!(listener.count(|e| matches!(e, Recorded::Text(_))), 0);

        // The wire saw a protocol-error close.
        assert_eq!(
            wire.sent.recv().await.unwrap(),
            Frame::close(CloseCode::InvalidPayload)
        );
    }

    // ------------------------------------------------------------------------
    // Close and teardown
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_remote_close_releases_transport_once() {
        let (conn, listener, mut wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        wire.inject
            .send(Ok(Frame::Close(Some(CloseFrame::new(
                CloseCode::GoingAway,
                *b"bye",
            )))))
            .unwrap();
        conn.wait_closed().await;

        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Disconnected(CloseCode::GoingAway))),
            1
        );
        assert_eq!(listener.count(|e| matches!(e, Recorded::Error(_))), 0);
        assert_eq!(wire.cancelled.load(Ordering::SeqCst), 1);

        // The close handshake was echoed.
        assert_eq!(
            wire.sent.recv().await.unwrap(),
            Frame::close(CloseCode::GoingAway)
        );
    }

    #[tokio::test]
    async fn test_disconnect_twice_single_terminal_callback() {
        let (conn, listener, _wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        conn.disconnect(CloseCode::Normal).unwrap();
        conn.wait_closed().await;
        // Second call: no error, no second callback.
        conn.disconnect(CloseCode::Normal).unwrap();

        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Disconnected(_))),
            1
        );
    }

    #[tokio::test]
    async fn test_disconnect_rejects_receive_only_code() {
        let (conn, _listener, _wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        let result = conn.disconnect(CloseCode::Abnormal);
        assert!(matches!(result, Err(Error::InvalidCloseCode { code: 1006 })));
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_dropping_every_handle_closes_gracefully() {
        let (conn, listener, mut wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();
        let listener_ref = listener.clone();
        drop(conn);

        listener_ref
            .wait_until(|events| {
                events
                    .iter()
                    .any(|e| matches!(e, Recorded::Disconnected(_)))
            })
            .await;
        assert_eq!(
            wire.sent.recv().await.unwrap(),
            Frame::close(CloseCode::Normal)
        );
    }

    #[tokio::test]
    async fn test_stream_end_without_close_is_fatal() {
        let (conn, listener, wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        drop(wire.inject);
        conn.wait_closed().await;

        assert_eq!(listener.count(|e| matches!(e, Recorded::Error(_))), 1);
        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Disconnected(CloseCode::Abnormal))),
            1
        );
    }

    // ------------------------------------------------------------------------
    // Keepalive (simulated clock)
    // ------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_three_answered_intervals() {
        let config = ConnectionConfig {
            ping_interval: Some(Duration::from_secs(25)),
            ..ConnectionConfig::default()
        };
        let (conn, listener, mut wire) = connected_pair(config);
        conn.connect().await.unwrap();

        for _ in 0..3 {
            let frame = wire.sent.recv().await.unwrap();
            assert_eq!(frame, Frame::Ping);
            wire.inject.send(Ok(Frame::Pong)).unwrap();
        }

        listener
            .wait_until(|events| {
                events.iter().filter(|e| matches!(e, Recorded::Pong)).count() == 3
            })
            .await;
        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Disconnected(_))),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_missed_pong_tears_down() {
        let config = ConnectionConfig {
            ping_interval: Some(Duration::from_secs(25)),
            ..ConnectionConfig::default()
        };
        let (conn, listener, mut wire) = connected_pair(config);
        conn.connect().await.unwrap();

        // First ping goes out; the peer stays silent.
        assert_eq!(wire.sent.recv().await.unwrap(), Frame::Ping);
        conn.wait_closed().await;

        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Error(msg) if msg.contains("pong") || msg.contains("ping"))),
            1
        );
        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Disconnected(CloseCode::GoingAway))),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_method_arms_keepalive() {
        let (conn, _listener, mut wire) = connected_pair(ConnectionConfig::default());
        conn.connect().await.unwrap();

        conn.ping(Duration::from_secs(10)).unwrap();
        let frame = timeout(Duration::from_secs(11), wire.sent.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, Frame::Ping);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_tears_down() {
        let config = ConnectionConfig {
            idle_timeout: Some(Duration::from_secs(60)),
            ..ConnectionConfig::default()
        };
        let (conn, listener, _wire) = connected_pair(config);
        conn.connect().await.unwrap();

        conn.wait_closed().await;
        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Error(msg) if msg.contains("Idle"))),
            1
        );
        assert_eq!(
            listener.count(|e| matches!(e, Recorded::Disconnected(_))),
            1
        );
    }

    // ------------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------------

    #[test]
    fn test_state_predicates() {
        assert!(ConnectionState::Idle.is_active());
        assert!(ConnectionState::Open.is_active());
        assert!(!ConnectionState::Closed.is_active());

        assert!(!ConnectionState::Idle.can_send());
        assert!(ConnectionState::Connecting.can_send());
        assert!(ConnectionState::Open.can_send());
        assert!(!ConnectionState::Closing.can_send());
        assert!(!ConnectionState::Closed.can_send());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Idle.to_string(), "Idle");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::Closing.to_string(), "Closing");
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    }
}
