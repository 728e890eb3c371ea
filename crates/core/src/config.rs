//! Engine-wide configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Value out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration shared by both modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Local hour (0-23) at which a locked ritual unlocks
    pub unlock_hour: u32,

    /// Upper bound on one analysis service call
    pub analysis_timeout_secs: u64,

    /// Upper bound on the admin override check made when a screen opens
    pub admin_sync_timeout_secs: u64,

    /// History entries sent to the analysis service as context
    pub recent_history_len: usize,

    /// Feedback shown when the service returns nothing usable
    pub default_feedback: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unlock_hour: 9,
            analysis_timeout_secs: 45,
            admin_sync_timeout_secs: 5,
            recent_history_len: 5,
            default_feedback: "오늘의 기록을 남겨 주셔서 고마워요. 내일 또 만나요.".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the unlock hour.
    pub fn with_unlock_hour(mut self, hour: u32) -> Self {
        self.unlock_hour = hour;
        self
    }

    /// Set the analysis timeout.
    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout_secs = timeout.as_secs();
        self
    }

    /// Analysis timeout as a duration.
    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    /// Set the admin override sync timeout.
    pub fn with_admin_sync_timeout(mut self, timeout: Duration) -> Self {
        self.admin_sync_timeout_secs = timeout.as_secs();
        self
    }

    /// Admin override sync timeout as a duration.
    pub fn admin_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.admin_sync_timeout_secs)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unlock_hour > 23 {
            return Err(ConfigError::Invalid(format!(
                "unlock_hour must be 0-23, got {}",
                self.unlock_hour
            )));
        }
        if self.analysis_timeout_secs == 0 {
            return Err(ConfigError::Invalid("analysis_timeout_secs must be positive".into()));
        }
        if self.admin_sync_timeout_secs == 0 {
            return Err(ConfigError::Invalid("admin_sync_timeout_secs must be positive".into()));
        }
        Ok(())
    }
}
