//! Ritual core data models.
//!
//! This crate defines the progression record shared by the solo and couple
//! modes, the per-mode configuration that parameterizes the engine, and the
//! clock abstraction every time-gated decision reads from.

#![warn(missing_docs)]

// Core identities
mod id;
mod namespace;

// Progression state
mod progress;
mod mode;

// Time and configuration
mod clock;
mod config;

// Re-exports
pub use id::EntryId;
pub use namespace::{Mode, Namespace, ParseNamespaceError};

pub use progress::{AdminOverride, HistoryEntry, UserProgress};
pub use mode::ModeConfig;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
