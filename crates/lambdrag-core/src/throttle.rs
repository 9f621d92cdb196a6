//! Outbound throttler: at most one position report per window, always
//! carrying the freshest local state.
//!
//! The slot holds at most one pending update and is overwritten in place;
//! updates are coalesced, never queued. Timing is driven from outside via
//! [`Throttler::deadline`] so this stays free of any async runtime.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::wire::TokenUpdate;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleStrategy {
    /// Trailing-edge coalescing: the first change arms a one-shot timer;
    /// later changes only refresh the payload.
    #[default]
    Coalesce,
    /// A fixed ticker sends the current position every window whether or
    /// not it changed.
    Periodic,
}

impl ThrottleStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coalesce => "coalesce",
            Self::Periodic => "periodic",
        }
    }
}

impl fmt::Display for ThrottleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThrottleStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coalesce" | "trailing" => Ok(Self::Coalesce),
            "periodic" => Ok(Self::Periodic),
            _ => Err(ConfigError::UnknownValue {
                field: "throttle strategy",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Throttler {
    strategy: ThrottleStrategy,
    window: Duration,
    /// The single pending update, if any.
    pending: Option<TokenUpdate>,
    /// When the armed coalescing window expires.
    deadline: Option<Instant>,
}

impl Throttler {
    pub fn new(strategy: ThrottleStrategy, window: Duration) -> Self {
        Self {
            strategy,
            window,
            pending: None,
            deadline: None,
        }
    }

    pub fn strategy(&self) -> ThrottleStrategy {
        self.strategy
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn pending(&self) -> Option<&TokenUpdate> {
        self.pending.as_ref()
    }

    /// Expiry of the armed window. Always `None` for the periodic strategy,
    /// whose cadence comes from an external ticker.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record the latest local state.
    ///
    /// Overwrites the pending payload. Arms the window only when it is not
    /// already armed, so a burst of changes never pushes the send out.
    pub fn record(&mut self, update: TokenUpdate, now: Instant) {
        self.pending = Some(update);
        if self.strategy == ThrottleStrategy::Coalesce && self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// Coalescing expiry: once the deadline has passed, disarm and hand out
    /// the pending update.
    pub fn take_due(&mut self, now: Instant) -> Option<TokenUpdate> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Periodic tick: the slot is cleared and `current` is what goes out.
    pub fn tick(&mut self, current: Option<TokenUpdate>) -> Option<TokenUpdate> {
        self.pending = None;
        current
    }

    /// Drop any pending update and disarm.
    pub fn discard(&mut self) {
        self.pending = None;
        self.deadline = None;
    }
}
