//! Progress model - per-namespace day/level state and reflection history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::id::EntryId;
use crate::mode::ModeConfig;
use crate::Time;

/// Progression state for one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    /// Day counter, starts at 1 and grows by one per completed cycle
    pub day: u32,

    /// Growth / relationship level, starts at 1 and never decreases
    pub level: u32,

    /// When the last successful submission completed
    pub last_completed_at: Option<Time>,

    /// Target unlock instant recorded when the gate locked
    pub unlock_at: Option<Time>,

    /// Unlock instant most recently reconciled
    pub last_unlocked_at: Option<Time>,

    /// Mission recommended by the analysis service for the next cycle
    pub pending_next_mission: Option<String>,

    /// Mission text shown on each day (append-only)
    pub missions_by_day: BTreeMap<u32, String>,

    /// Remotely assigned mission outranking every other source
    pub admin_override: Option<AdminOverride>,

    /// Last override cleared locally, kept until the remote clear is confirmed
    pub retired_override: Option<AdminOverride>,

    /// Reflection history, newest first
    pub history: Vec<HistoryEntry>,

    /// When onboarding completed
    pub onboarded_at: Time,
}

impl UserProgress {
    /// Fresh record created at onboarding completion.
    pub fn new(onboarded_at: Time) -> Self {
        Self {
            day: 1,
            level: 1,
            last_completed_at: None,
            unlock_at: None,
            last_unlocked_at: None,
            pending_next_mission: None,
            missions_by_day: BTreeMap::new(),
            admin_override: None,
            retired_override: None,
            history: Vec::new(),
            onboarded_at,
        }
    }

    /// Phase label for the current level.
    pub fn phase_label<'a>(&self, mode: &'a ModeConfig) -> &'a str {
        mode.phase_label(self.level)
    }

    /// Mission recorded for a day, if any.
    pub fn mission_for(&self, day: u32) -> Option<&str> {
        self.missions_by_day.get(&day).map(|s| s.as_str())
    }

    /// Record the mission shown on a day. Existing entries are never replaced.
    ///
    /// Returns `true` if the text was written.
    pub fn record_mission(&mut self, day: u32, text: &str) -> bool {
        if text.trim().is_empty() || self.missions_by_day.contains_key(&day) {
            return false;
        }
        self.missions_by_day.insert(day, text.to_string());
        true
    }

    /// The admin override if it is still in force at `now`.
    pub fn active_override(&self, now: Time) -> Option<&AdminOverride> {
        self.admin_override.as_ref().filter(|o| o.is_active(now))
    }

    /// Advance one level, capped at `max_level`. Returns `true` if the level changed.
    pub fn advance_level(&mut self, max_level: u32) -> bool {
        if self.level < max_level {
            self.level += 1;
            true
        } else {
            false
        }
    }

    /// Prepend a history entry (history is newest first).
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.insert(0, entry);
    }

    /// The most recent `limit` history entries, newest first.
    pub fn recent_history(&self, limit: usize) -> &[HistoryEntry] {
        &self.history[..self.history.len().min(limit)]
    }
}

/// A mission assigned by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverride {
    /// Mission text
    pub text: String,

    /// When the assignment stops applying; `None` means no expiry
    pub expires_at: Option<Time>,
}

impl AdminOverride {
    /// Create an override.
    pub fn new(text: impl Into<String>, expires_at: Option<Time>) -> Self {
        Self {
            text: text.into(),
            expires_at,
        }
    }

    /// Whether the override applies at `now`.
    pub fn is_active(&self, now: Time) -> bool {
        !self.text.trim().is_empty() && self.expires_at.map_or(true, |at| at > now)
    }
}

/// One completed reflection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Unique identifier
    pub id: EntryId,

    /// Day the reflection was submitted on
    pub day: u32,

    /// Submission time
    pub submitted_at: Time,

    /// What the user wrote
    pub reflection_text: String,

    /// Optional reference to an attached image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    /// Mission the reflection answered
    pub mission_text: String,

    /// Analysis returned by the service
    pub analysis_text: String,

    /// Feedback shown to the user
    pub feedback_text: String,

    /// Why the service decided (not) to advance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_reason: Option<String>,

    /// Whether this cycle advanced the level
    #[serde(default)]
    pub level_advanced: bool,
}
