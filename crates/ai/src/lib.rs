//! External services consumed by the ritual engine.
//!
//! Contracts for the Reflection Analysis Service and the Admin Override
//! Service, tolerant parsing of analysis replies, and HTTP clients for both.

#![warn(missing_docs)]

pub mod error;
pub mod analysis;
pub mod admin;
pub mod repair;
pub mod http;

pub use error::ServiceError;
pub use analysis::{AnalysisRequest, AnalysisResponse, AnalysisService, HistoryDigest};
pub use admin::{AdminAssignment, AdminOverrideService};
pub use repair::repair_analysis;
pub use http::{HttpAdminOverrideClient, HttpAnalysisClient, HttpServiceConfig};
