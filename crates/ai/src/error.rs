//! Errors returned by external services.

/// Failure talking to an external service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No reply within the allowed time
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Connection or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("service returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The service answered but reported failure
    #[error("service reported failure: {0}")]
    Rejected(String),
}

impl ServiceError {
    /// Classify an error raised inside an HTTP client.
    pub fn from_anyhow(error: anyhow::Error, timeout_secs: u64) -> Self {
        if let Some(e) = error.downcast_ref::<reqwest::Error>() {
            if e.is_timeout() {
                return ServiceError::Timeout(timeout_secs);
            }
        }
        ServiceError::Transport(format!("{:#}", error))
    }
}
