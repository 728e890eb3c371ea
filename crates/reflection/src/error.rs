//! Errors surfaced by the progression controller.

use ritual_ai::ServiceError;
use ritual_core::{ConfigError, Namespace, Time};
use ritual_progress::Countdown;
use ritual_storage::StorageError;

/// Result alias for controller operations.
pub type Result<T> = std::result::Result<T, RitualError>;

/// Why a controller operation failed.
#[derive(Debug, thiserror::Error)]
pub enum RitualError {
    /// The gate is locked until the next unlock instant
    #[error("ritual is locked for another {countdown} (until {unlock_at})")]
    Locked {
        /// Remaining time
        countdown: Countdown,
        /// When the gate unlocks
        unlock_at: Time,
    },

    /// The reflection is shorter than the mode allows
    #[error("reflection has {actual} characters, at least {min} required")]
    Validation {
        /// Minimum length for the mode
        min: usize,
        /// Length of the trimmed submission
        actual: usize,
    },

    /// The analysis service failed or timed out; nothing was stored
    #[error("analysis service error: {0}")]
    AnalysisService(#[from] ServiceError),

    /// The store failed; nothing was committed
    #[error("storage error: {0}")]
    Store(#[from] StorageError),

    /// No progress record exists for the namespace
    #[error("{0} has not completed onboarding")]
    NotOnboarded(Namespace),

    /// Mode or engine parameters are unusable
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RitualError {
    /// Whether the caller may retry or correct the input and try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RitualError::Locked { .. } | RitualError::Validation { .. } | RitualError::AnalysisService(_)
        )
    }

    /// Remaining lock time, if this is a lock refusal.
    pub fn countdown(&self) -> Option<Countdown> {
        match self {
            RitualError::Locked { countdown, .. } => Some(*countdown),
            _ => None,
        }
    }
}
