//! Progression controller - runs the daily submit, analyze and unlock cycle.

use ritual_ai::{AdminOverrideService, AnalysisRequest, AnalysisResponse, AnalysisService, HistoryDigest, ServiceError};
use ritual_core::{Clock, EngineConfig, EntryId, HistoryEntry, ModeConfig, Namespace, Time, UserProgress};
use ritual_progress::{
    confirm_retirement, evaluate, resolve_mission, Countdown, CountdownPoller, GateStatus,
    MissionResolver, MissionSource, ResolvedMission, SpecialDayCalendar, UnlockGate, UnlockSchedule,
};
use ritual_storage::{load_progress, save_progress, Storage, StorageExt, Transaction};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use crate::error::{Result, RitualError};
use crate::outcome::{RitualSnapshot, Submission, SubmissionOutcome};

/// Drives one mode's ritual over a store and the two external services.
pub struct ProgressionController<S: Storage + 'static> {
    storage: Arc<S>,
    analysis: Arc<dyn AnalysisService>,
    admin: Arc<dyn AdminOverrideService>,
    clock: Arc<dyn Clock>,
    mode: ModeConfig,
    config: EngineConfig,
    calendar: SpecialDayCalendar,
    gate: UnlockGate<S>,
    resolver: MissionResolver<S>,
}

impl<S: Storage + 'static> ProgressionController<S> {
    /// Create a controller with the default configuration and calendar.
    ///
    /// Fails if the mode parameters are unusable.
    pub fn new(
        storage: Arc<S>,
        analysis: Arc<dyn AnalysisService>,
        admin: Arc<dyn AdminOverrideService>,
        clock: Arc<dyn Clock>,
        mode: ModeConfig,
    ) -> Result<Self> {
        mode.validate()?;
        let config = EngineConfig::default();
        let gate = UnlockGate::new(Arc::clone(&storage), Arc::clone(&clock), config.unlock_hour);
        let resolver = MissionResolver::new(
            Arc::clone(&storage),
            Arc::clone(&admin),
            Arc::clone(&clock),
            mode.clone(),
        )
        .with_sync_timeout(config.admin_sync_timeout());
        Ok(Self {
            storage,
            analysis,
            admin,
            clock,
            mode,
            config,
            calendar: SpecialDayCalendar::default(),
            gate,
            resolver,
        })
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.gate = UnlockGate::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.clock),
            config.unlock_hour,
        );
        self.resolver = self.resolver.with_sync_timeout(config.admin_sync_timeout());
        self.config = config;
        Ok(self)
    }

    /// Set the special-day calendar.
    pub fn with_calendar(mut self, calendar: SpecialDayCalendar) -> Self {
        self.resolver = self.resolver.with_calendar(calendar.clone());
        self.calendar = calendar;
        self
    }

    /// Mode parameters.
    pub fn mode(&self) -> &ModeConfig {
        &self.mode
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Namespace of an identity in this controller's mode.
    pub fn namespace(&self, id: &str) -> Namespace {
        self.mode.namespace(id)
    }

    /// Create the progress record once onboarding completes.
    ///
    /// Onboarding an identity twice returns the existing record.
    pub async fn onboard(&self, id: &str) -> Result<UserProgress> {
        let namespace = self.namespace(id);
        let now = self.clock.now();

        let (progress, created) = self
            .storage
            .transaction(&namespace, |txn| {
                if let Some(existing) = load_progress(txn)? {
                    return Ok::<_, RitualError>((existing, false));
                }
                let progress = UserProgress::new(now);
                save_progress(txn, &progress)?;
                Ok((progress, true))
            })
            .await?;

        if created {
            info!("Onboarded {}", namespace);
        }
        Ok(progress)
    }

    /// Fold a passed unlock into the stored record and return it.
    pub async fn reconcile(&self, id: &str) -> Result<UserProgress> {
        self.reconcile_namespace(&self.namespace(id)).await
    }

    /// Screen focus: reconcile, sync the admin override, resolve today's
    /// mission and evaluate the gate.
    ///
    /// The admin check is bounded by `admin_sync_timeout_secs`; a slow or
    /// failing service leaves the local override state as it was.
    pub async fn open(&self, id: &str) -> Result<RitualSnapshot> {
        let namespace = self.namespace(id);
        let progress = self.reconcile_namespace(&namespace).await?;
        self.resolver.sync_admin_override(&namespace).await?;
        let mission = self.resolver.resolve(&namespace, progress.day).await?;

        Ok(RitualSnapshot {
            day: progress.day,
            level: progress.level,
            phase_label: progress.phase_label(&self.mode).to_string(),
            mission,
            gate: self.gate.evaluate(&progress),
            recent_history: progress
                .recent_history(self.config.recent_history_len)
                .to_vec(),
            namespace,
        })
    }

    /// Full reflection history, newest first.
    pub async fn history(&self, id: &str) -> Result<Vec<HistoryEntry>> {
        let namespace = self.namespace(id);
        let txn = self.storage.begin(&namespace).await?;
        let progress = require(&txn)?;
        self.storage.rollback(txn).await?;
        Ok(progress.history)
    }

    /// Whether a submission is allowed right now.
    pub async fn is_unlocked(&self, id: &str) -> Result<bool> {
        Ok(self.gate.is_unlocked(&self.namespace(id)).await?)
    }

    /// Time until the next unlock, zero when unlocked.
    pub async fn countdown(&self, id: &str) -> Result<Countdown> {
        Ok(self.gate.countdown(&self.namespace(id)).await?)
    }

    /// One second countdown ticker, `None` when unlocked.
    pub async fn countdown_poller(&self, id: &str) -> Result<Option<CountdownPoller>> {
        Ok(self.gate.poller(&self.namespace(id)).await?)
    }

    /// Submit today's reflection.
    ///
    /// The analysis call runs outside any transaction; its result is applied
    /// in a single commit that re-checks the gate. A failed or timed out call
    /// leaves the record untouched.
    pub async fn submit_reflection(&self, id: &str, submission: Submission) -> Result<SubmissionOutcome> {
        let namespace = self.namespace(id);
        let text = submission.text.trim().to_string();
        let min = self.mode.min_reflection_length.max(1);
        let actual = text.chars().count();
        if actual < min {
            return Err(RitualError::Validation { min, actual });
        }

        let (progress, mission) = self.prepare(&namespace).await?;

        let request = AnalysisRequest {
            namespace: namespace.to_string(),
            day: progress.day,
            reflection_text: text.clone(),
            image_ref: submission.image_ref.clone(),
            current_mission_text: mission.text.clone(),
            recent_history: progress
                .recent_history(self.config.recent_history_len)
                .iter()
                .map(HistoryDigest::from)
                .collect(),
        };
        info!("Analyzing reflection for {} day {}", namespace, progress.day);
        let response = self.analyze(&request).await?;

        let completed_at = self.clock.now();
        let schedule = self.gate.schedule();
        let mode = &self.mode;
        let gate = &self.gate;

        let (outcome, retired) = self
            .storage
            .transaction(&namespace, |txn| {
                let stored = require(txn)?;
                let mut progress = ritual_progress::reconcile(&stored, completed_at, &schedule);
                ensure_unlocked(&progress, completed_at, &schedule)?;

                let day = progress.day;
                progress.record_mission(day, &mission.text);
                if mission.source == MissionSource::Generated
                    && progress.pending_next_mission.as_deref() == Some(mission.text.as_str())
                {
                    progress.pending_next_mission = None;
                }

                let retired = if mission.is_override()
                    && progress
                        .admin_override
                        .as_ref()
                        .is_some_and(|o| o.text == mission.text)
                {
                    let retired = progress.admin_override.take();
                    progress.retired_override = retired.clone();
                    retired
                } else {
                    None
                };

                let level_advanced = response.should_advance() && progress.advance_level(mode.max_level);
                if let Some(next) = response.next_mission() {
                    progress.pending_next_mission = Some(next.to_string());
                }

                let entry = HistoryEntry {
                    id: EntryId::new(),
                    day,
                    submitted_at: completed_at,
                    reflection_text: text.clone(),
                    image_ref: submission.image_ref.clone(),
                    mission_text: mission.text.clone(),
                    analysis_text: response.analysis_text.clone(),
                    feedback_text: response.feedback_text.clone(),
                    progress_reason: response.progress_reason.clone(),
                    level_advanced,
                };
                progress.push_history(entry.clone());
                let unlock_at = gate.lock(&mut progress, completed_at);
                save_progress(txn, &progress)?;

                let outcome = SubmissionOutcome {
                    entry,
                    day,
                    level: progress.level,
                    phase_label: progress.phase_label(mode).to_string(),
                    level_advanced,
                    next_mission: progress.pending_next_mission.clone(),
                    unlock_at,
                    countdown: Countdown::until(unlock_at, completed_at),
                    override_retired: retired.is_some(),
                };
                Ok::<_, RitualError>((outcome, retired))
            })
            .await?;

        info!(
            "Completed day {} for {} (level {}, unlocks at {})",
            outcome.day, namespace, outcome.level, outcome.unlock_at
        );

        if let Some(retired) = retired {
            let storage = Arc::clone(&self.storage);
            let admin = Arc::clone(&self.admin);
            tokio::spawn(async move {
                confirm_retirement(storage.as_ref(), admin.as_ref(), &namespace, &retired).await;
            });
        }

        Ok(outcome)
    }

    /// Reconciled record and current mission, computed without writing.
    async fn prepare(&self, namespace: &Namespace) -> Result<(UserProgress, ResolvedMission)> {
        let now = self.clock.now();
        let today = self.clock.local_now().date_naive();
        let schedule = self.gate.schedule();

        let txn = self.storage.begin(namespace).await?;
        let stored = require(&txn)?;
        self.storage.rollback(txn).await?;

        let mut progress = ritual_progress::reconcile(&stored, now, &schedule);
        ensure_unlocked(&progress, now, &schedule)?;
        let day = progress.day;
        let mission = resolve_mission(&mut progress, day, now, today, &self.mode, &self.calendar);
        Ok((progress, mission))
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let limit = self.config.analysis_timeout();
        let response = match timeout(limit, self.analysis.analyze(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Analysis failed for {}: {}", request.namespace, e);
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    "Analysis for {} timed out after {}s",
                    request.namespace, self.config.analysis_timeout_secs
                );
                return Err(ServiceError::Timeout(self.config.analysis_timeout_secs).into());
            }
        };

        if !response.success {
            let reason = response
                .progress_reason
                .clone()
                .unwrap_or_else(|| "analysis reported failure".to_string());
            warn!("Analysis rejected reflection for {}: {}", request.namespace, reason);
            return Err(ServiceError::Rejected(reason).into());
        }

        debug!("Analysis succeeded for {}", request.namespace);
        Ok(response.with_default_feedback(&self.config.default_feedback))
    }

    async fn reconcile_namespace(&self, namespace: &Namespace) -> Result<UserProgress> {
        let now = self.clock.now();
        let schedule = self.gate.schedule();

        self.storage
            .transaction(namespace, |txn| {
                let stored = require(txn)?;
                let next = ritual_progress::reconcile(&stored, now, &schedule);
                if next != stored {
                    save_progress(txn, &next)?;
                    info!("{} unlocked, now on day {}", namespace, next.day);
                }
                Ok::<_, RitualError>(next)
            })
            .await
    }
}

fn require(txn: &Transaction) -> Result<UserProgress> {
    load_progress(txn)?.ok_or_else(|| RitualError::NotOnboarded(txn.namespace().clone()))
}

fn ensure_unlocked(progress: &UserProgress, now: Time, schedule: &UnlockSchedule) -> Result<()> {
    match evaluate(progress, now, schedule) {
        GateStatus::Unlocked => Ok(()),
        GateStatus::Locked { unlock_at, countdown } => Err(RitualError::Locked { countdown, unlock_at }),
    }
}
