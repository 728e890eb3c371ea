//! Flat-key layout of a [`UserProgress`] record.
//!
//! Every field lives under its own stable key so that layouts can only grow by
//! adding keys. Per-day missions are stored as `missionDay<N>`.

use ritual_core::{AdminOverride, HistoryEntry, Time, UserProgress};
use std::collections::BTreeMap;
use super::{Result, StorageError, Transaction};

/// Relative key names.
pub mod keys {
    /// Day counter
    pub const DAY_COUNT: &str = "dayCount";
    /// Level counter
    pub const LEVEL_COUNT: &str = "levelCount";
    /// Last successful submission
    pub const LAST_COMPLETED: &str = "lastCompletedDate";
    /// Recorded target unlock instant
    pub const UNLOCK_AT: &str = "unlockAt";
    /// Last reconciled unlock instant
    pub const LAST_UNLOCKED: &str = "lastUnlockedAt";
    /// Mission staged for the next cycle
    pub const PENDING_NEXT_MISSION: &str = "pendingNextMission";
    /// Prefix of per-day mission keys
    pub const MISSION_DAY_PREFIX: &str = "missionDay";
    /// Whether an admin override is stored
    pub const ADMIN_OVERRIDE_ACTIVE: &str = "adminOverrideActive";
    /// Admin override text
    pub const ADMIN_OVERRIDE_TEXT: &str = "adminOverrideText";
    /// Admin override expiry
    pub const ADMIN_OVERRIDE_EXPIRES_AT: &str = "adminOverrideExpiresAt";
    /// Locally retired override awaiting remote confirmation
    pub const RETIRED_OVERRIDE: &str = "retiredOverride";
    /// Reflection history, newest first
    pub const HISTORY: &str = "history";
    /// Onboarding completion
    pub const ONBOARDED_AT: &str = "onboardedAt";

    /// Key of the mission shown on `day`.
    pub fn mission_day(day: u32) -> String {
        format!("{}{}", MISSION_DAY_PREFIX, day)
    }

    /// Day number of a mission key.
    pub fn parse_mission_day(key: &str) -> Option<u32> {
        key.strip_prefix(MISSION_DAY_PREFIX)?.parse().ok()
    }
}

/// Load the record of the transaction's namespace, `None` before onboarding.
pub fn load_progress(txn: &Transaction) -> Result<Option<UserProgress>> {
    let Some(day) = txn.get::<u32>(keys::DAY_COUNT)? else {
        return Ok(None);
    };

    let onboarded_at = txn
        .get::<Time>(keys::ONBOARDED_AT)?
        .ok_or_else(|| StorageError::Corrupt {
            key: txn.namespace().key(keys::ONBOARDED_AT),
            reason: "missing on an onboarded record".to_string(),
        })?;

    let mut missions_by_day = BTreeMap::new();
    for key in txn.keys() {
        if let Some(mission_day) = keys::parse_mission_day(&key) {
            if let Some(text) = txn.get::<String>(&key)? {
                missions_by_day.insert(mission_day, text);
            }
        }
    }

    let admin_override = if txn.get::<bool>(keys::ADMIN_OVERRIDE_ACTIVE)?.unwrap_or(false) {
        txn.get::<String>(keys::ADMIN_OVERRIDE_TEXT)?
            .map(|text| -> Result<AdminOverride> {
                Ok(AdminOverride::new(text, txn.get(keys::ADMIN_OVERRIDE_EXPIRES_AT)?))
            })
            .transpose()?
    } else {
        None
    };

    Ok(Some(UserProgress {
        day,
        level: txn.get(keys::LEVEL_COUNT)?.unwrap_or(1),
        last_completed_at: txn.get(keys::LAST_COMPLETED)?,
        unlock_at: txn.get(keys::UNLOCK_AT)?,
        last_unlocked_at: txn.get(keys::LAST_UNLOCKED)?,
        pending_next_mission: txn.get(keys::PENDING_NEXT_MISSION)?,
        missions_by_day,
        admin_override,
        retired_override: txn.get(keys::RETIRED_OVERRIDE)?,
        history: txn.get::<Vec<HistoryEntry>>(keys::HISTORY)?.unwrap_or_default(),
        onboarded_at,
    }))
}

/// Buffer every field of `progress` into the transaction.
///
/// Unchanged fields produce no writes. Mission keys are never deleted.
pub fn save_progress(txn: &mut Transaction, progress: &UserProgress) -> Result<()> {
    txn.set(keys::DAY_COUNT, &progress.day)?;
    txn.set(keys::LEVEL_COUNT, &progress.level)?;
    txn.set(keys::ONBOARDED_AT, &progress.onboarded_at)?;
    set_optional(txn, keys::LAST_COMPLETED, progress.last_completed_at.as_ref())?;
    set_optional(txn, keys::UNLOCK_AT, progress.unlock_at.as_ref())?;
    set_optional(txn, keys::LAST_UNLOCKED, progress.last_unlocked_at.as_ref())?;
    set_optional(txn, keys::PENDING_NEXT_MISSION, progress.pending_next_mission.as_ref())?;

    for (day, text) in &progress.missions_by_day {
        let key = keys::mission_day(*day);
        if txn.get_raw(&key).is_none() {
            txn.set(&key, text)?;
        }
    }

    match &progress.admin_override {
        Some(o) => {
            txn.set(keys::ADMIN_OVERRIDE_ACTIVE, &true)?;
            txn.set(keys::ADMIN_OVERRIDE_TEXT, &o.text)?;
            set_optional(txn, keys::ADMIN_OVERRIDE_EXPIRES_AT, o.expires_at.as_ref())?;
        }
        None => {
            txn.set(keys::ADMIN_OVERRIDE_ACTIVE, &false)?;
            txn.remove(keys::ADMIN_OVERRIDE_TEXT);
            txn.remove(keys::ADMIN_OVERRIDE_EXPIRES_AT);
        }
    }
    set_optional(txn, keys::RETIRED_OVERRIDE, progress.retired_override.as_ref())?;

    txn.set(keys::HISTORY, &progress.history)?;
    Ok(())
}

fn set_optional<T: serde::Serialize>(txn: &mut Transaction, key: &str, value: Option<&T>) -> Result<()> {
    match value {
        Some(value) => txn.set(key, value),
        None => {
            txn.remove(key);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStorage, Storage, StorageExt};
    use chrono::{TimeZone, Utc};
    use ritual_core::{EntryId, Namespace};

    fn t0() -> Time {
        Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap()
    }

    fn sample() -> UserProgress {
        let mut p = UserProgress::new(t0());
        p.day = 3;
        p.level = 2;
        p.last_completed_at = Some(t0());
        p.pending_next_mission = Some("다음 미션".into());
        p.record_mission(1, "첫째 날");
        p.record_mission(3, "셋째 날");
        p.admin_override = Some(AdminOverride::new("특별 미션 X", None));
        p.push_history(HistoryEntry {
            id: EntryId::new(),
            day: 2,
            submitted_at: t0(),
            reflection_text: "좋았다".into(),
            image_ref: Some("img://1".into()),
            mission_text: "둘째 날".into(),
            analysis_text: "분석".into(),
            feedback_text: "피드백".into(),
            progress_reason: None,
            level_advanced: true,
        });
        p
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let storage = MemoryStorage::new();
        let ns = Namespace::solo("u1");
        let progress = sample();

        storage
            .transaction(&ns, |txn| save_progress(txn, &progress))
            .await
            .unwrap();

        let txn = storage.begin(&ns).await.unwrap();
        let loaded = load_progress(&txn).unwrap().unwrap();
        assert_eq!(loaded, progress);

        let dump = storage.dump(&ns).await;
        assert_eq!(dump.get("solo:u1:dayCount"), Some(&serde_json::json!(3)));
        assert_eq!(dump.get("solo:u1:missionDay3"), Some(&serde_json::json!("셋째 날")));
        assert_eq!(dump.get("solo:u1:adminOverrideActive"), Some(&serde_json::json!(true)));
    }

    #[tokio::test]
    async fn test_load_before_onboarding() {
        let storage = MemoryStorage::new();
        let txn = storage.begin(&Namespace::couple("none")).await.unwrap();
        assert!(load_progress(&txn).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_saving_unchanged_record_is_clean() {
        let storage = MemoryStorage::new();
        let ns = Namespace::solo("u1");
        let progress = sample();
        storage
            .transaction(&ns, |txn| save_progress(txn, &progress))
            .await
            .unwrap();

        let mut txn = storage.begin(&ns).await.unwrap();
        let loaded = load_progress(&txn).unwrap().unwrap();
        save_progress(&mut txn, &loaded).unwrap();
        assert!(!txn.is_dirty());
    }

    #[tokio::test]
    async fn test_cleared_override_removes_keys() {
        let storage = MemoryStorage::new();
        let ns = Namespace::solo("u1");
        let mut progress = sample();
        storage
            .transaction(&ns, |txn| save_progress(txn, &progress))
            .await
            .unwrap();

        progress.admin_override = None;
        storage
            .transaction(&ns, |txn| save_progress(txn, &progress))
            .await
            .unwrap();

        let dump = storage.dump(&ns).await;
        assert_eq!(dump.get("solo:u1:adminOverrideActive"), Some(&serde_json::json!(false)));
        assert!(!dump.contains_key("solo:u1:adminOverrideText"));
    }

    #[test]
    fn test_mission_day_keys() {
        assert_eq!(keys::mission_day(12), "missionDay12");
        assert_eq!(keys::parse_mission_day("missionDay12"), Some(12));
        assert_eq!(keys::parse_mission_day("missionDayX"), None);
        assert_eq!(keys::parse_mission_day("dayCount"), None);
    }
}
