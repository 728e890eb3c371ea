//! Mission resolver - decides which mission text is current for a day.
//!
//! Precedence, first match wins:
//! 1. unexpired admin override
//! 2. special calendar-day mission
//! 3. text already recorded for the day
//! 4. next mission staged by the analysis service (consumed)
//! 5. built-in mission for the day, then the terminal mission
//!
//! Whatever answers is recorded for the day if the day has no text yet.

use chrono::NaiveDate;
use ritual_ai::AdminOverrideService;
use ritual_core::{AdminOverride, Clock, ModeConfig, Namespace, Time, UserProgress};
use ritual_storage::{load_progress, save_progress, Result, Storage, StorageError, StorageExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use crate::calendar::SpecialDayCalendar;

/// Which precedence tier produced a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionSource {
    /// Remotely assigned override
    AdminOverride,
    /// Special calendar day, with the occasion name
    SpecialDay(String),
    /// Text previously recorded for the day
    Staged,
    /// Next mission recommended by the analysis service
    Generated,
    /// Built-in mission for the day
    Default,
    /// Built-in list exhausted
    Terminal,
}

/// Mission chosen for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMission {
    /// Day resolved for
    pub day: u32,
    /// Mission text
    pub text: String,
    /// Tier that answered
    pub source: MissionSource,
}

impl ResolvedMission {
    /// Whether an admin override answered.
    pub fn is_override(&self) -> bool {
        self.source == MissionSource::AdminOverride
    }
}

/// Resolve the mission for `day`, recording it on the record.
///
/// `now` decides override expiry; `today` is the local calendar date.
pub fn resolve_mission(
    progress: &mut UserProgress,
    day: u32,
    now: Time,
    today: NaiveDate,
    mode: &ModeConfig,
    calendar: &SpecialDayCalendar,
) -> ResolvedMission {
    let (text, source) = if let Some(o) = progress.active_override(now) {
        (o.text.clone(), MissionSource::AdminOverride)
    } else if let Some((rule, text)) = calendar.mission_for(today, mode.mode) {
        (text.to_string(), MissionSource::SpecialDay(rule.name.clone()))
    } else if let Some(text) = progress.mission_for(day) {
        (text.to_string(), MissionSource::Staged)
    } else if let Some(text) = progress
        .pending_next_mission
        .take()
        .filter(|t| !t.trim().is_empty())
    {
        (text, MissionSource::Generated)
    } else {
        let source = if (day.max(1) as usize) <= mode.default_missions.len() {
            MissionSource::Default
        } else {
            MissionSource::Terminal
        };
        (mode.default_mission(day).to_string(), source)
    };

    progress.record_mission(day, &text);
    ResolvedMission { day, text, source }
}

/// Mission resolver bound to a store, the admin service and a clock.
pub struct MissionResolver<S: Storage> {
    storage: Arc<S>,
    admin: Arc<dyn AdminOverrideService>,
    clock: Arc<dyn Clock>,
    mode: ModeConfig,
    calendar: SpecialDayCalendar,
    sync_timeout: Duration,
}

impl<S: Storage> MissionResolver<S> {
    /// Create a resolver with the default special-day calendar.
    pub fn new(
        storage: Arc<S>,
        admin: Arc<dyn AdminOverrideService>,
        clock: Arc<dyn Clock>,
        mode: ModeConfig,
    ) -> Self {
        Self {
            storage,
            admin,
            clock,
            mode,
            calendar: SpecialDayCalendar::default(),
            sync_timeout: Duration::from_secs(5),
        }
    }

    /// Bound each admin service call made while syncing.
    pub fn with_sync_timeout(mut self, sync_timeout: Duration) -> Self {
        self.sync_timeout = sync_timeout;
        self
    }

    /// Replace the special-day calendar.
    pub fn with_calendar(mut self, calendar: SpecialDayCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Resolve the mission for `day` in one transaction.
    pub async fn resolve(&self, namespace: &Namespace, day: u32) -> Result<ResolvedMission> {
        let now = self.clock.now();
        let today = self.clock.local_now().date_naive();
        let mode = &self.mode;
        let calendar = &self.calendar;

        let resolved = self
            .storage
            .transaction(namespace, |txn| {
                let mut progress = load_progress(txn)?.ok_or_else(|| {
                    StorageError::NotFound(format!("progress record for {}", namespace))
                })?;
                let resolved = resolve_mission(&mut progress, day, now, today, mode, calendar);
                save_progress(txn, &progress)?;
                Ok::<_, StorageError>(resolved)
            })
            .await?;

        debug!(
            "Resolved mission for {} day {} from {:?}",
            namespace, day, resolved.source
        );
        Ok(resolved)
    }

    /// Pull the remote assignment into the local record.
    ///
    /// Service failures and timeouts are logged and leave the local record
    /// untouched. Returns the override in force after syncing.
    pub async fn sync_admin_override(&self, namespace: &Namespace) -> Result<Option<AdminOverride>> {
        let now = self.clock.now();
        let fetched = match timeout(self.sync_timeout, self.admin.fetch(namespace)).await {
            Ok(Ok(assignment)) => Some(assignment),
            Ok(Err(e)) => {
                warn!("Admin override fetch failed for {}: {}", namespace, e);
                None
            }
            Err(_) => {
                warn!(
                    "Admin override fetch for {} timed out after {:?}",
                    namespace, self.sync_timeout
                );
                None
            }
        };
        let Some(assignment) = fetched else {
            let txn = self.storage.begin(namespace).await?;
            let progress = load_progress(&txn)?;
            self.storage.rollback(txn).await?;
            return Ok(progress.and_then(|p| p.active_override(now).cloned()));
        };
        let remote = assignment.to_override();

        let (active, stale) = self
            .storage
            .transaction(namespace, |txn| {
                let Some(mut progress) = load_progress(txn)? else {
                    return Ok::<_, StorageError>((None, None));
                };
                let mut stale = None;
                match remote {
                    Some(o) if progress.retired_override.as_ref() == Some(&o) => {
                        stale = Some(o);
                    }
                    Some(o) => {
                        progress.admin_override = Some(o);
                        progress.retired_override = None;
                    }
                    None => {
                        progress.admin_override = None;
                        progress.retired_override = None;
                    }
                }
                save_progress(txn, &progress)?;
                Ok((progress.active_override(now).cloned(), stale))
            })
            .await?;

        if let Some(retired) = stale {
            debug!("Remote still holds a retired override for {}, clearing again", namespace);
            let clear = confirm_retirement(self.storage.as_ref(), self.admin.as_ref(), namespace, &retired);
            if timeout(self.sync_timeout, clear).await.is_err() {
                warn!("Admin override clear for {} timed out, retrying on next sync", namespace);
            }
        }
        Ok(active)
    }
}

/// Clear an override server-side and drop its local tombstone on success.
///
/// Failures are logged; the tombstone stays so the next sync retries.
pub async fn confirm_retirement<S: Storage + ?Sized>(
    storage: &S,
    admin: &dyn AdminOverrideService,
    namespace: &Namespace,
    retired: &AdminOverride,
) {
    if let Err(e) = admin.clear(namespace).await {
        warn!(
            "Failed to clear admin override remotely for {}: {}; retrying on next sync",
            namespace, e
        );
        return;
    }

    let result = storage
        .transaction(namespace, |txn| {
            if let Some(mut progress) = load_progress(txn)? {
                if progress.retired_override.as_ref() == Some(retired) {
                    progress.retired_override = None;
                    save_progress(txn, &progress)?;
                }
            }
            Ok::<_, StorageError>(())
        })
        .await;

    match result {
        Ok(()) => info!("Retired admin override for {}", namespace),
        Err(e) => warn!("Failed to drop override tombstone for {}: {}", namespace, e),
    }
}
