//! Reflection Analysis Service contract.

use async_trait::async_trait;
use ritual_core::{HistoryEntry, Time};
use serde::{Deserialize, Serialize};
use crate::ServiceError;

/// What the engine sends for one reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Namespace, e.g. `solo:abc`
    pub namespace: String,

    /// Current day counter
    pub day: u32,

    /// The user's reflection
    pub reflection_text: String,

    /// Attached image, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    /// Mission the reflection answers
    pub current_mission_text: String,

    /// Recent cycles, newest first
    pub recent_history: Vec<HistoryDigest>,
}

/// Condensed history entry passed as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDigest {
    /// Day of the entry
    pub day: u32,
    /// When it was submitted
    pub submitted_at: Time,
    /// Mission answered
    pub mission_text: String,
    /// What the user wrote
    pub reflection_text: String,
    /// Feedback given
    pub feedback_text: String,
}

impl From<&HistoryEntry> for HistoryDigest {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            day: entry.day,
            submitted_at: entry.submitted_at,
            mission_text: entry.mission_text.clone(),
            reflection_text: entry.reflection_text.clone(),
            feedback_text: entry.feedback_text.clone(),
        }
    }
}

/// What the service answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    /// Whether the service considers the call successful
    #[serde(default = "default_success")]
    pub success: bool,

    /// Feedback shown to the user
    #[serde(default)]
    pub feedback_text: String,

    /// Longer analysis kept in history
    #[serde(default)]
    pub analysis_text: String,

    /// Mission suggested for the next cycle
    #[serde(default)]
    pub recommended_next_mission_text: Option<String>,

    /// Whether the user is ready to advance a level
    #[serde(default)]
    pub should_progress: Option<bool>,

    /// Explanation of the progression decision
    #[serde(default)]
    pub progress_reason: Option<String>,
}

fn default_success() -> bool {
    true
}

impl AnalysisResponse {
    /// Successful response carrying only feedback.
    pub fn feedback(text: impl Into<String>) -> Self {
        Self {
            success: true,
            feedback_text: text.into(),
            analysis_text: String::new(),
            recommended_next_mission_text: None,
            should_progress: None,
            progress_reason: None,
        }
    }

    /// Whether to advance a level. An omitted flag counts as `true`.
    pub fn should_advance(&self) -> bool {
        self.should_progress.unwrap_or(true)
    }

    /// Recommended mission with blank values dropped.
    pub fn next_mission(&self) -> Option<&str> {
        self.recommended_next_mission_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Replace blank feedback with `default_feedback`.
    pub fn with_default_feedback(mut self, default_feedback: &str) -> Self {
        if self.feedback_text.trim().is_empty() {
            self.feedback_text = default_feedback.to_string();
        }
        self
    }
}

/// Reflection Analysis Service.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Analyze one reflection.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let response: AnalysisResponse =
            serde_json::from_str(r#"{ "feedbackText": "잘했어요" }"#).unwrap();
        assert!(response.success);
        assert!(response.should_advance());
        assert!(response.next_mission().is_none());
    }

    #[test]
    fn test_should_progress_false_is_respected() {
        let response: AnalysisResponse =
            serde_json::from_str(r#"{ "success": true, "shouldProgress": false }"#).unwrap();
        assert!(!response.should_advance());
    }

    #[test]
    fn test_blank_next_mission_is_ignored() {
        let mut response = AnalysisResponse::feedback("ok");
        response.recommended_next_mission_text = Some("   ".into());
        assert!(response.next_mission().is_none());
        response.recommended_next_mission_text = Some(" 산책하기 ".into());
        assert_eq!(response.next_mission(), Some("산책하기"));
    }

    #[test]
    fn test_default_feedback_fills_blank() {
        let response = AnalysisResponse::feedback(" ").with_default_feedback("기본");
        assert_eq!(response.feedback_text, "기본");
    }
}
