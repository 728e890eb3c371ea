//! HTTP clients for the analysis and admin override services.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode, Url};
use ritual_core::Namespace;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::{
    repair_analysis, AdminAssignment, AdminOverrideService, AnalysisRequest, AnalysisResponse,
    AnalysisService, ServiceError,
};

/// Connection settings for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpServiceConfig {
    /// Base URL without trailing slash
    pub base_url: String,

    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".to_string(),
            timeout_secs: 45,
        }
    }
}

impl HttpServiceConfig {
    /// Config for a base URL with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Check the base URL and build a client carrying the timeout.
    fn client(&self) -> Result<Client, ServiceError> {
        Url::parse(&self.base_url)
            .map_err(|e| ServiceError::Transport(format!("invalid base URL {}: {}", self.base_url, e)))?;
        ClientBuilder::new()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {}", e)))
    }
}

/// Reflection Analysis Service over HTTP.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    /// HTTP client
    client: Client,

    /// Service settings
    config: HttpServiceConfig,

    /// Feedback used when the reply is unusable
    default_feedback: String,
}

impl HttpAnalysisClient {
    /// Create a new analysis client.
    pub fn new(config: HttpServiceConfig, default_feedback: impl Into<String>) -> Result<Self, ServiceError> {
        Ok(Self {
            client: config.client()?,
            config,
            default_feedback: default_feedback.into(),
        })
    }

    async fn post_raw(&self, request: &AnalysisRequest) -> Result<(StatusCode, String)> {
        debug!(
            "Requesting analysis for {} day {} ({} chars)",
            request.namespace,
            request.day,
            request.reflection_text.chars().count()
        );

        let response = self
            .client
            .post(format!("{}/analyze", self.config.base_url))
            .json(request)
            .send()
            .await
            .context("Failed to call analysis API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read analysis response")?;
        Ok((status, body))
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ServiceError> {
        let (status, body) = self
            .post_raw(request)
            .await
            .map_err(|e| ServiceError::from_anyhow(e, self.config.timeout_secs))?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(repair_analysis(&body, &self.default_feedback))
    }
}

/// Admin Override Service over HTTP.
///
/// `GET <base>/<mode>/<id>/mission` reads the assignment and
/// `PUT` with `{"assignedMission": null}` clears it.
#[derive(Clone)]
pub struct HttpAdminOverrideClient {
    /// HTTP client
    client: Client,

    /// Service settings
    config: HttpServiceConfig,
}

impl HttpAdminOverrideClient {
    /// Create a new admin override client.
    pub fn new(config: HttpServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: config.client()?,
            config,
        })
    }

    /// Mission endpoint with each path segment percent-encoded.
    fn mission_url(&self, namespace: &Namespace) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .with_context(|| format!("Invalid admin base URL {}", self.config.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Admin base URL {} cannot take a path", self.config.base_url))?
            .pop_if_empty()
            .extend([namespace.mode().as_str(), namespace.id(), "mission"]);
        Ok(url)
    }

    async fn get_assignment(&self, namespace: &Namespace) -> Result<Option<AdminAssignment>> {
        let response = self
            .client
            .get(self.mission_url(namespace)?)
            .send()
            .await
            .context("Failed to call admin mission API")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .context("Admin mission API returned an error status")?;

        let assignment = response
            .json::<AdminAssignment>()
            .await
            .context("Failed to parse admin mission response")?;
        Ok(Some(assignment))
    }

    async fn put_clear(&self, namespace: &Namespace) -> Result<()> {
        self.client
            .put(self.mission_url(namespace)?)
            .json(&serde_json::json!({ "assignedMission": null }))
            .send()
            .await
            .context("Failed to call admin mission API")?
            .error_for_status()
            .context("Admin mission API rejected the clear")?;
        Ok(())
    }
}

#[async_trait]
impl AdminOverrideService for HttpAdminOverrideClient {
    async fn fetch(&self, namespace: &Namespace) -> Result<AdminAssignment, ServiceError> {
        self.get_assignment(namespace)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| ServiceError::from_anyhow(e, self.config.timeout_secs))
    }

    async fn clear(&self, namespace: &Namespace) -> Result<(), ServiceError> {
        self.put_clear(namespace)
            .await
            .map_err(|e| ServiceError::from_anyhow(e, self.config.timeout_secs))
    }
}
