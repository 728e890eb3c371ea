//! Wall-clock source for unlock gating and countdowns.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::sync::Mutex;
use crate::Time;

/// Supplies the current instant and the user's local UTC offset.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Time;

    /// Local UTC offset used for wall-clock rules (unlock hour, calendar days).
    fn offset(&self) -> FixedOffset;

    /// Current instant in local time.
    fn local_now(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&self.offset())
    }
}

/// System clock using the host's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Time {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        *chrono::Local::now().offset()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Time>,
    offset: FixedOffset,
}

impl ManualClock {
    /// Create a clock frozen at `now` in the given offset.
    pub fn new(now: Time, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    /// Jump to an instant.
    pub fn set(&self, now: Time) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}
