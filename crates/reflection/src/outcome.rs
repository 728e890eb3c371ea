//! Inputs and results of controller operations.

use ritual_core::{HistoryEntry, Namespace, Time};
use ritual_progress::{Countdown, GateStatus, ResolvedMission};
use serde::{Deserialize, Serialize};

/// A reflection as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Reflection text
    pub text: String,
    /// Attached image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl Submission {
    /// Text-only submission.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_ref: None,
        }
    }

    /// Attach an image reference.
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }
}

/// Result of a committed submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// History entry that was recorded
    pub entry: HistoryEntry,
    /// Day counter (unchanged until the next unlock)
    pub day: u32,
    /// Level after the submission
    pub level: u32,
    /// Phase label for `level`
    pub phase_label: String,
    /// Whether the level went up
    pub level_advanced: bool,
    /// Mission staged for the next day
    pub next_mission: Option<String>,
    /// When the gate unlocks again
    pub unlock_at: Time,
    /// Time until `unlock_at`
    pub countdown: Countdown,
    /// Whether an admin override was consumed and cleared
    pub override_retired: bool,
}

/// Everything a screen needs when it gains focus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualSnapshot {
    /// Namespace shown
    pub namespace: Namespace,
    /// Current day
    pub day: u32,
    /// Current level
    pub level: u32,
    /// Phase label for `level`
    pub phase_label: String,
    /// Mission for the current day
    pub mission: ResolvedMission,
    /// Gate state
    pub gate: GateStatus,
    /// Most recent history entries, newest first
    pub recent_history: Vec<HistoryEntry>,
}
