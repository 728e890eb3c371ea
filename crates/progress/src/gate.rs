//! Unlock gate - decides whether a new ritual may be submitted.
//!
//! The gate is UNLOCKED until a submission completes, then LOCKED until the
//! next occurrence of the unlock hour (local time) strictly after the
//! completion. The LOCKED -> UNLOCKED edge is derived from stored state and
//! the clock on every query; nothing is scheduled.

use chrono::{Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use ritual_core::{Clock, Namespace, Time, UserProgress};
use ritual_storage::{load_progress, Result, Storage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::countdown::{Countdown, CountdownPoller};

/// Wall-clock rule for unlocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockSchedule {
    unlock_time: NaiveTime,
    offset: FixedOffset,
}

impl UnlockSchedule {
    /// Unlock at `hour:00` in the given offset. Hours past 23 clamp to 23.
    pub fn new(hour: u32, offset: FixedOffset) -> Self {
        let unlock_time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        Self { unlock_time, offset }
    }

    /// Next unlock instant strictly after `completed_at`.
    pub fn next_unlock_after(&self, completed_at: Time) -> Time {
        let local = completed_at.with_timezone(&self.offset).naive_local();
        let today = local.date().and_time(self.unlock_time);
        let target = if local < today {
            today
        } else {
            today + Duration::days(1)
        };
        Utc.from_utc_datetime(&(target - Duration::seconds(i64::from(self.offset.local_minus_utc()))))
    }
}

/// Gate state at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateStatus {
    /// A submission is allowed
    Unlocked,
    /// Submissions are refused until `unlock_at`
    Locked {
        /// Target unlock instant
        unlock_at: Time,
        /// Remaining time
        countdown: Countdown,
    },
}

impl GateStatus {
    /// Whether a submission is allowed.
    pub fn is_unlocked(&self) -> bool {
        matches!(self, GateStatus::Unlocked)
    }

    /// Remaining time, zero when unlocked.
    pub fn countdown(&self) -> Countdown {
        match self {
            GateStatus::Unlocked => Countdown::ZERO,
            GateStatus::Locked { countdown, .. } => *countdown,
        }
    }
}

/// Target unlock instant of a record, `None` if it has no pending completion.
pub fn target_unlock(progress: &UserProgress, schedule: &UnlockSchedule) -> Option<Time> {
    let completed_at = progress.last_completed_at?;
    Some(
        progress
            .unlock_at
            .unwrap_or_else(|| schedule.next_unlock_after(completed_at)),
    )
}

/// Evaluate the gate for a record at `now`.
pub fn evaluate(progress: &UserProgress, now: Time, schedule: &UnlockSchedule) -> GateStatus {
    match target_unlock(progress, schedule) {
        Some(unlock_at) if now < unlock_at => GateStatus::Locked {
            unlock_at,
            countdown: Countdown::until(unlock_at, now),
        },
        _ => GateStatus::Unlocked,
    }
}

/// Unlock gate bound to a store and a clock.
pub struct UnlockGate<S: Storage> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    unlock_hour: u32,
}

impl<S: Storage> UnlockGate<S> {
    /// Create a gate unlocking at `unlock_hour` local time.
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>, unlock_hour: u32) -> Self {
        Self {
            storage,
            clock,
            unlock_hour,
        }
    }

    /// Schedule in the clock's current offset.
    pub fn schedule(&self) -> UnlockSchedule {
        UnlockSchedule::new(self.unlock_hour, self.clock.offset())
    }

    /// Evaluate a record at the current time.
    pub fn evaluate(&self, progress: &UserProgress) -> GateStatus {
        evaluate(progress, self.clock.now(), &self.schedule())
    }

    /// Transition to LOCKED for a completion at `completed_at`.
    ///
    /// Returns the recorded target unlock instant.
    pub fn lock(&self, progress: &mut UserProgress, completed_at: Time) -> Time {
        let unlock_at = self.schedule().next_unlock_after(completed_at);
        progress.last_completed_at = Some(completed_at);
        progress.unlock_at = Some(unlock_at);
        unlock_at
    }

    /// Current gate state of a namespace. A namespace with no record is unlocked.
    pub async fn status(&self, namespace: &Namespace) -> Result<GateStatus> {
        let txn = self.storage.begin(namespace).await?;
        let progress = load_progress(&txn)?;
        drop(txn);
        Ok(progress
            .map(|p| self.evaluate(&p))
            .unwrap_or(GateStatus::Unlocked))
    }

    /// Whether a submission is allowed right now.
    pub async fn is_unlocked(&self, namespace: &Namespace) -> Result<bool> {
        Ok(self.status(namespace).await?.is_unlocked())
    }

    /// Time until the next unlock, zero when unlocked.
    pub async fn countdown(&self, namespace: &Namespace) -> Result<Countdown> {
        Ok(self.status(namespace).await?.countdown())
    }

    /// A one second poller toward the next unlock, `None` when unlocked.
    pub async fn poller(&self, namespace: &Namespace) -> Result<Option<CountdownPoller>> {
        Ok(match self.status(namespace).await? {
            GateStatus::Locked { unlock_at, .. } => {
                Some(CountdownPoller::new(unlock_at, Arc::clone(&self.clock)))
            }
            GateStatus::Unlocked => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ritual_core::ManualClock;
    use ritual_storage::{save_progress, MemoryStorage, StorageExt};

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn kst_time(d: u32, h: u32, m: u32, s: u32) -> Time {
        kst().with_ymd_and_hms(2026, 3, d, h, m, s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_completion_before_unlock_hour_targets_today() {
        let schedule = UnlockSchedule::new(9, kst());
        assert_eq!(schedule.next_unlock_after(kst_time(2, 7, 30, 0)), kst_time(2, 9, 0, 0));
    }

    #[test]
    fn test_completion_after_unlock_hour_targets_tomorrow() {
        let schedule = UnlockSchedule::new(9, kst());
        assert_eq!(schedule.next_unlock_after(kst_time(2, 20, 0, 0)), kst_time(3, 9, 0, 0));
        assert_eq!(schedule.next_unlock_after(kst_time(2, 9, 0, 0)), kst_time(3, 9, 0, 0));
        assert_eq!(schedule.next_unlock_after(kst_time(2, 8, 59, 59)), kst_time(2, 9, 0, 0));
    }

    #[test]
    fn test_schedule_uses_local_date_not_utc_date() {
        // 2026-03-02 23:30 UTC is already 2026-03-03 08:30 in KST.
        let completed = Utc.with_ymd_and_hms(2026, 3, 2, 23, 30, 0).unwrap();
        let schedule = UnlockSchedule::new(9, kst());
        assert_eq!(schedule.next_unlock_after(completed), kst_time(3, 9, 0, 0));
    }

    #[test]
    fn test_no_completion_is_always_unlocked() {
        let schedule = UnlockSchedule::new(9, kst());
        let progress = UserProgress::new(kst_time(2, 20, 0, 0));
        assert!(evaluate(&progress, kst_time(2, 20, 0, 0), &schedule).is_unlocked());
    }

    #[test]
    fn test_locked_until_exact_target() {
        let schedule = UnlockSchedule::new(9, kst());
        let mut progress = UserProgress::new(kst_time(2, 20, 0, 0));
        progress.last_completed_at = Some(kst_time(2, 20, 0, 0));

        let status = evaluate(&progress, kst_time(3, 8, 59, 59), &schedule);
        assert_eq!(status.countdown().total_seconds(), 1);
        assert!(!status.is_unlocked());
        assert!(evaluate(&progress, kst_time(3, 9, 0, 0), &schedule).is_unlocked());
    }

    #[test]
    fn test_locked_countdown_never_reads_zero() {
        let schedule = UnlockSchedule::new(9, kst());
        let mut progress = UserProgress::new(kst_time(2, 20, 0, 0));
        progress.last_completed_at = Some(kst_time(2, 20, 0, 0));

        let status = evaluate(&progress, kst_time(3, 9, 0, 0) - Duration::milliseconds(500), &schedule);
        assert!(!status.is_unlocked());
        assert_eq!(status.countdown().total_seconds(), 1);
    }

    #[tokio::test]
    async fn test_gate_reads_store() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(kst_time(2, 20, 0, 0), kst()));
        let gate = UnlockGate::new(storage.clone(), clock.clone(), 9);
        let ns = Namespace::solo("u1");

        assert!(gate.is_unlocked(&ns).await.unwrap());

        let mut progress = UserProgress::new(clock.now());
        let target = gate.lock(&mut progress, clock.now());
        assert_eq!(target, kst_time(3, 9, 0, 0));
        storage
            .transaction(&ns, |txn| save_progress(txn, &progress))
            .await
            .unwrap();

        assert!(!gate.is_unlocked(&ns).await.unwrap());
        assert_eq!(gate.countdown(&ns).await.unwrap().hours, 13);
        assert!(gate.poller(&ns).await.unwrap().is_some());

        clock.set(kst_time(3, 9, 0, 0));
        assert!(gate.is_unlocked(&ns).await.unwrap());
        assert!(gate.countdown(&ns).await.unwrap().is_zero());
        assert!(gate.poller(&ns).await.unwrap().is_none());
    }
}
