//! Admin Override Service contract.

use async_trait::async_trait;
use ritual_core::{AdminOverride, Namespace, Time};
use serde::{Deserialize, Serialize};
use crate::ServiceError;

/// Remote assignment for one namespace identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAssignment {
    /// Assigned mission text, absent when nothing is assigned
    #[serde(default)]
    pub assigned_mission: Option<String>,

    /// When the assignment expires
    #[serde(default)]
    pub mission_expires_at: Option<Time>,
}

impl AdminAssignment {
    /// The assignment as a local override, `None` if no mission is assigned.
    pub fn to_override(&self) -> Option<AdminOverride> {
        self.assigned_mission
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| AdminOverride::new(text, self.mission_expires_at))
    }
}

/// Admin Override Service.
#[async_trait]
pub trait AdminOverrideService: Send + Sync {
    /// Fetch the current assignment.
    async fn fetch(&self, namespace: &Namespace) -> Result<AdminAssignment, ServiceError>;

    /// Clear the assignment server-side.
    async fn clear(&self, namespace: &Namespace) -> Result<(), ServiceError>;
}
