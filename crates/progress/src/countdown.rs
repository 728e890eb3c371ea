//! Countdown to the next unlock.

use ritual_core::{Clock, Time};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Remaining time split for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Countdown {
    /// Whole hours
    pub hours: u64,
    /// Minutes (0-59)
    pub minutes: u8,
    /// Seconds (0-59)
    pub seconds: u8,
}

impl Countdown {
    /// No time remaining.
    pub const ZERO: Countdown = Countdown {
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    /// Time from `now` until `target`, clamped at zero.
    ///
    /// Partial seconds round up, so the countdown is zero only once `target`
    /// has been reached.
    pub fn until(target: Time, now: Time) -> Self {
        let millis = (target - now).num_milliseconds().max(0) as u64;
        Self::from_seconds(millis.div_ceil(1000))
    }

    /// Split a number of seconds.
    pub fn from_seconds(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: ((total % 3600) / 60) as u8,
            seconds: (total % 60) as u8,
        }
    }

    /// Total seconds remaining.
    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    /// Whether the countdown has run out.
    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Yields a fresh countdown once per second until it reaches zero.
///
/// Polling stops when the poller is dropped; there is nothing else to cancel.
/// Must be created inside a tokio runtime.
pub struct CountdownPoller {
    target: Time,
    clock: Arc<dyn Clock>,
    ticker: Interval,
    finished: bool,
}

impl CountdownPoller {
    /// Poll toward `target` with a one second period.
    pub fn new(target: Time, clock: Arc<dyn Clock>) -> Self {
        Self::with_period(target, clock, std::time::Duration::from_secs(1))
    }

    /// Poll toward `target` with a custom period.
    pub fn with_period(target: Time, clock: Arc<dyn Clock>, period: std::time::Duration) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            target,
            clock,
            ticker,
            finished: false,
        }
    }

    /// Instant being counted down to.
    pub fn target(&self) -> Time {
        self.target
    }

    /// Wait for the next tick. Returns `None` after zero has been yielded.
    pub async fn tick(&mut self) -> Option<Countdown> {
        if self.finished {
            return None;
        }
        self.ticker.tick().await;
        let countdown = Countdown::until(self.target, self.clock.now());
        if countdown.is_zero() {
            self.finished = true;
        }
        Some(countdown)
    }
}
