//! Scheduled tasks for the session loop: a cancellable one-shot timer for
//! the coalescing window and a fixed-rate ticker for periodic sends.
//!
//! Neither holds a borrow across `select!`: the loop copies the deadline
//! out, awaits [`wait_until`], and re-syncs the timer in the handler.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// One-shot timer. Once armed it fires at its deadline unless cancelled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Mirror an externally tracked deadline (the throttler's window).
    pub fn sync(&mut self, deadline: Option<std::time::Instant>) {
        match deadline {
            Some(d) => self.arm(Instant::from_std(d)),
            None => self.cancel(),
        }
    }
}

/// Resolve at `deadline`; never resolve when there is none.
pub async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

/// Fixed-rate ticker. Late ticks are delayed rather than bursted, so a
/// stalled loop never sends several updates back to back.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Tick when a ticker exists; otherwise pend forever.
pub async fn tick_opt(ticker: Option<&mut Ticker>) -> Instant {
    match ticker {
        Some(t) => t.tick().await,
        None => std::future::pending().await,
    }
}
