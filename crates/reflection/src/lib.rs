//! Reflection layer - the daily submit, analyze and unlock cycle.
//!
//! [`ProgressionController`] is the one entry point screens talk to. It is
//! generic over the store and parameterized by a [`ritual_core::ModeConfig`],
//! so the solo and couple rituals run the same engine.

#![warn(missing_docs, unused_crate_dependencies)]

mod engine;
mod error;
mod outcome;

pub use engine::ProgressionController;
pub use error::{Result, RitualError};
pub use outcome::{RitualSnapshot, Submission, SubmissionOutcome};
