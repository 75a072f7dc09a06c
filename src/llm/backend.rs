use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which of the two model services produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendSource {
    /// Gemini API authenticated with an API key.
    Primary,
    /// Vertex AI authenticated with the host's service identity.
    Secondary,
}

/// Failure of a single model call, classified for the retry driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("model {0} was not found")]
    ModelNotFound(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit or quota exceeded: {0}")]
    RateLimited(String),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("{0}")]
    Transient(String),
}

impl BackendError {
    /// Classifies a non-success HTTP response.
    pub fn from_status(status: u16, body: &str, model: &str) -> Self {
        match status {
            404 => BackendError::ModelNotFound(model.to_string()),
            401 | 403 => BackendError::Authentication(body.to_string()),
            429 => BackendError::RateLimited(body.to_string()),
            _ => Self::from_message(&format!("status {}: {}", status, body)),
        }
    }

    /// Classifies an error that only carries a message (transport errors,
    /// proxies that rewrite status codes).
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("resource_exhausted") || lower.contains("quota") || lower.contains("rate limit") {
            BackendError::RateLimited(message.to_string())
        } else if lower.contains("permission_denied") || lower.contains("unauthenticated") {
            BackendError::Authentication(message.to_string())
        } else {
            BackendError::Transient(message.to_string())
        }
    }
}

/// One model service. Implementations perform exactly one request per call
/// and leave retries, fallback and caching to
/// [`ModelGateway`](crate::llm::ModelGateway).
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn source(&self) -> BackendSource;

    /// Model names in the order they should be tried.
    fn models(&self) -> &[String];

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            BackendError::from_status(404, "models/x is not found", "gemini-x"),
            BackendError::ModelNotFound("gemini-x".to_string())
        );
        assert!(matches!(BackendError::from_status(403, "denied", "m"), BackendError::Authentication(_)));
        assert!(matches!(BackendError::from_status(401, "bad key", "m"), BackendError::Authentication(_)));
        assert!(matches!(BackendError::from_status(429, "slow down", "m"), BackendError::RateLimited(_)));
        assert!(matches!(
            BackendError::from_status(400, "RESOURCE_EXHAUSTED: quota", "m"),
            BackendError::RateLimited(_)
        ));
        assert!(matches!(BackendError::from_status(500, "oops", "m"), BackendError::Transient(_)));
    }
}
