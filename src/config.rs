use crate::error::{FinancialDocumentError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODELS: [&str; 3] =
    ["gemini-2.5-flash", "gemini-2.0-flash", "gemini-2.0-flash-lite"];
pub const DEFAULT_VERTEX_LOCATION: &str = "us-central1";
pub const DEFAULT_VERTEX_MODEL: &str = "gemini-1.5-pro";
const PLACEHOLDER_PROJECT_ID: &str = "your-gcp-project-id";

/// Which model backends exist and how hard to retry them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub gemini_api_key: Option<String>,
    pub vertex: Option<VertexConfig>,
    /// Tried in order, cheapest first.
    pub gemini_models: Vec<String>,
    pub retry: RetryPolicy,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            vertex: None,
            gemini_models: DEFAULT_GEMINI_MODELS.iter().map(|m| m.to_string()).collect(),
            retry: RetryPolicy::default(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexConfig {
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_vertex_model")]
    pub model: String,
    /// Bearer token. When absent the metadata server of the host is asked
    /// for the default service account's token.
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_location() -> String {
    DEFAULT_VERTEX_LOCATION.to_string()
}

fn default_vertex_model() -> String {
    DEFAULT_VERTEX_MODEL.to_string()
}

impl GatewayConfig {
    /// Reads `GEMINI_API_KEY` and the `VERTEXAI_*` variables.
    pub fn from_env() -> Self {
        let vertex = non_empty_var("VERTEXAI_PROJECT_ID")
            .filter(|id| id != PLACEHOLDER_PROJECT_ID)
            .map(|project_id| VertexConfig {
                project_id,
                location: non_empty_var("VERTEXAI_LOCATION").unwrap_or_else(default_location),
                model: non_empty_var("VERTEXAI_MODEL").unwrap_or_else(default_vertex_model),
                access_token: non_empty_var("VERTEXAI_ACCESS_TOKEN"),
            });

        Self {
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            vertex,
            ..Self::default()
        }
    }

    pub fn has_backend(&self) -> bool {
        self.gemini_api_key.is_some() || self.vertex.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.has_backend() {
            return Err(FinancialDocumentError::ModelUnavailable);
        }
        if self.gemini_api_key.is_some() && self.gemini_models.is_empty() {
            return Err(FinancialDocumentError::Configuration(
                "gemini_models must name at least one model".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Retry budget and linear backoff units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub rate_limit_backoff_ms: u64,
    pub transient_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_backoff_ms: 2_000,
            transient_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Used by tests and batch tools that do
    /// their own pacing.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            rate_limit_backoff_ms: 0,
            transient_backoff_ms: 0,
        }
    }

    /// Wait before retrying after the zero-based `attempt` hit a rate limit.
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms * u64::from(attempt + 1))
    }

    /// Wait before retrying after a transient failure or empty response.
    pub fn transient_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.transient_backoff_ms * u64::from(attempt + 1))
    }
}

/// Limits and lifetimes used by the document pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_retries: u32,
    pub llm_cache_ttl_secs: u64,
    pub document_cache_ttl_secs: u64,
    /// Characters of OCR text sent for extraction.
    pub extraction_text_limit: usize,
    pub classification_text_limit: usize,
    pub report_text_limit: usize,
    /// Characters of serialized extraction embedded in report prompts.
    pub report_base_data_limit: usize,
    pub audit_document_text_limit: usize,
    pub audit_combined_text_limit: usize,
    /// Characters of per-workbook summaries in the GST spreadsheet audit.
    pub gst_summary_text_limit: usize,
    /// Characters of row-by-row spreadsheet data in the GST spreadsheet audit.
    pub gst_data_text_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            llm_cache_ttl_secs: crate::cache::LLM_CACHE_TTL.as_secs(),
            document_cache_ttl_secs: crate::cache::DOCUMENT_CACHE_TTL.as_secs(),
            extraction_text_limit: 8_000,
            classification_text_limit: 3_000,
            report_text_limit: 4_000,
            report_base_data_limit: 3_000,
            audit_document_text_limit: 10_000,
            audit_combined_text_limit: 50_000,
            gst_summary_text_limit: 80_000,
            gst_data_text_limit: 100_000,
        }
    }
}

impl PipelineConfig {
    pub fn llm_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.llm_cache_ttl_secs)
    }

    pub fn document_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.document_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.gemini_models[0], "gemini-2.5-flash");
        assert_eq!(config.retry.max_retries, 3);
        assert!(matches!(
            config.validate(),
            Err(FinancialDocumentError::ModelUnavailable)
        ));

        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.llm_cache_ttl(), Duration::from_secs(86_400));
        assert_eq!(pipeline.document_cache_ttl(), Duration::from_secs(604_800));
    }

    #[test]
    fn test_linear_backoff() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.rate_limit_delay(0), Duration::from_secs(2));
        assert_eq!(retry.rate_limit_delay(2), Duration::from_secs(6));
        assert_eq!(retry.transient_delay(1), Duration::from_secs(2));
        assert_eq!(RetryPolicy::immediate(5).rate_limit_delay(4), Duration::ZERO);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: GatewayConfig = serde_json::from_str(
            r#"{"vertex": {"project_id": "ledger-prod"}, "retry": {"max_retries": 1}}"#,
        )
        .unwrap();
        let vertex = config.vertex.as_ref().unwrap();
        assert_eq!(vertex.location, "us-central1");
        assert_eq!(vertex.model, "gemini-1.5-pro");
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.rate_limit_backoff_ms, 2_000);
        assert!(config.validate().is_ok());
    }
}
