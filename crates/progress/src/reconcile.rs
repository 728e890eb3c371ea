//! Lazy day reconciliation.
//!
//! Day advancement happens when a record is read after its unlock instant has
//! passed. `reconcile` is a pure function: applying it any number of times at
//! any instants yields the same record as applying it once at the unlock
//! instant, because the transition consumes the completion it was derived from.

use ritual_core::{Time, UserProgress};
use crate::gate::{target_unlock, UnlockSchedule};

/// Fold a passed unlock into the record.
///
/// If the record is locked and `now` has reached its unlock instant, the day
/// counter advances by exactly one, the staged next mission is promoted into
/// the new day's mission slot, and the completion is cleared. Otherwise the
/// record is returned unchanged.
pub fn reconcile(progress: &UserProgress, now: Time, schedule: &UnlockSchedule) -> UserProgress {
    let mut next = progress.clone();

    let Some(unlock_at) = target_unlock(progress, schedule) else {
        return next;
    };
    if now < unlock_at || progress.last_unlocked_at == Some(unlock_at) {
        return next;
    }

    next.day += 1;
    if let Some(text) = next.pending_next_mission.take() {
        let day = next.day;
        next.record_mission(day, &text);
    }
    next.last_completed_at = None;
    next.unlock_at = None;
    next.last_unlocked_at = Some(unlock_at);
    next
}
