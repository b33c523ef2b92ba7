//! Per-connection keepalive scheduling.
//!
//! Each open connection owns at most one [`Keepalive`], polled by its event
//! loop. The timer lives inside the loop, so entering teardown stops it
//! synchronously with the state transition — a ping can never fire against a
//! released transport.
//!
//! Liveness policy: every tick either emits one ping and starts a pong-wait,
//! or reports the previous pong as overdue. An unanswered ping is detected at
//! the next tick, never silently rescheduled.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::{Instant, Interval, interval_at};

// ============================================================================
// KeepaliveEvent
// ============================================================================

/// What the event loop should do when the keepalive timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeepaliveEvent {
    /// Emit one ping frame and wait for its pong.
    SendPing,
    /// The previous ping went unanswered for a full interval.
    PongOverdue,
}

// ============================================================================
// Keepalive
// ============================================================================

/// Recurring ping timer with pong-overdue detection.
///
/// Disarmed by default; [`Keepalive::tick`] never resolves while disarmed.
#[derive(Debug)]
pub(crate) struct Keepalive {
    ticker: Option<Interval>,
    every: Duration,
    awaiting_pong: bool,
}

impl Keepalive {
    /// Creates a disarmed keepalive.
    pub(crate) fn new() -> Self {
        Self {
            ticker: None,
            every: Duration::ZERO,
            awaiting_pong: false,
        }
    }

    /// Arms the timer to fire every `every`, replacing any previous schedule.
    ///
    /// The first tick fires one full interval from now, not immediately.
    pub(crate) fn arm(&mut self, every: Duration) {
        self.ticker = Some(interval_at(Instant::now() + every, every));
        self.every = every;
        self.awaiting_pong = false;
    }

    /// Stops the timer.
    pub(crate) fn disarm(&mut self) {
        self.ticker = None;
        self.awaiting_pong = false;
    }

    /// The armed interval, in milliseconds, for error reporting.
    pub(crate) fn interval_ms(&self) -> u64 {
        self.every.as_millis() as u64
    }

    /// Records the pong answering the outstanding ping.
    pub(crate) fn pong_received(&mut self) {
        self.awaiting_pong = false;
    }

    /// Waits for the next tick.
    ///
    /// Cancel-safe: dropping the future between polls loses nothing.
    pub(crate) async fn tick(&mut self) -> KeepaliveEvent {
        match &mut self.ticker {
            Some(ticker) => {
                ticker.tick().await;
                if self.awaiting_pong {
                    KeepaliveEvent::PongOverdue
                } else {
                    self.awaiting_pong = true;
                    KeepaliveEvent::SendPing
                }
            }
            None => std::future::pending().await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_never_fires() {
        let mut ka = Keepalive::new();
        let fired = timeout(Duration::from_secs(3600), ka.tick()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let mut ka = Keepalive::new();
        ka.arm(Duration::from_secs(25));

        // Nothing before the interval elapses.
        let early = timeout(Duration::from_secs(24), ka.tick()).await;
        assert!(early.is_err());

        let event = timeout(Duration::from_secs(2), ka.tick()).await.unwrap();
        assert_eq!(event, KeepaliveEvent::SendPing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answered_pings_keep_scheduling() {
        let mut ka = Keepalive::new();
        ka.arm(Duration::from_secs(25));

        for _ in 0..3 {
            let event = ka.tick().await;
            assert_eq!(event, KeepaliveEvent::SendPing);
            ka.pong_received();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_pong_is_overdue_at_next_tick() {
        let mut ka = Keepalive::new();
        ka.arm(Duration::from_secs(25));

        assert_eq!(ka.tick().await, KeepaliveEvent::SendPing);
        // No pong_received in between.
        assert_eq!(ka.tick().await, KeepaliveEvent::PongOverdue);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_schedule() {
        let mut ka = Keepalive::new();
        ka.arm(Duration::from_secs(10));
        ka.arm(Duration::from_secs(30));
        assert_eq!(ka.interval_ms(), 30_000);

        // The 10s schedule is gone.
        let early = timeout(Duration::from_secs(15), ka.tick()).await;
        assert!(early.is_err());

        let event = timeout(Duration::from_secs(20), ka.tick()).await.unwrap();
        assert_eq!(event, KeepaliveEvent::SendPing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_clears_pending_wait() {
        let mut ka = Keepalive::new();
        ka.arm(Duration::from_secs(5));
        assert_eq!(ka.tick().await, KeepaliveEvent::SendPing);

        ka.disarm();
        let fired = timeout(Duration::from_secs(60), ka.tick()).await;
        assert!(fired.is_err());
    }
}
