use crate::config::{GatewayConfig, VertexConfig};
use crate::error::{FinancialDocumentError, Result};
use crate::llm::backend::{BackendError, BackendSource, ModelBackend};
use crate::llm::types::{AccessToken, GenerateContentRequest, GenerateContentResponse};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

fn http_client(config: &GatewayConfig) -> Result<Client> {
    Ok(Client::builder().timeout(config.request_timeout()).build()?)
}

async fn read_generation(response: Response, model: &str) -> std::result::Result<String, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        return Err(BackendError::from_status(status.as_u16(), &body, model));
    }

    let body: GenerateContentResponse = response
        .json()
        .await
        .map_err(|e| BackendError::Transient(format!("invalid response body: {}", e)))?;
    body.text().ok_or(BackendError::EmptyResponse)
}

/// Gemini API backend authenticated with an API key.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    models: Vec<String>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, models: Vec<String>, config: &GatewayConfig) -> Result<Self> {
        if models.is_empty() {
            return Err(FinancialDocumentError::Configuration(
                "at least one Gemini model name is required".to_string(),
            ));
        }
        Ok(Self {
            client: http_client(config)?,
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            models,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    fn source(&self) -> BackendSource {
        BackendSource::Primary
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn generate(&self, model: &str, prompt: &str) -> std::result::Result<String, BackendError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        debug!("Gemini request to {} ({} prompt chars)", model, prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| BackendError::from_message(&e.to_string()))?;

        read_generation(response, model).await
    }
}

/// Vertex AI backend authenticated as the host's service account.
#[derive(Clone)]
pub struct VertexClient {
    client: Client,
    config: VertexConfig,
    models: Vec<String>,
}

impl VertexClient {
    pub fn new(config: VertexConfig, gateway: &GatewayConfig) -> Result<Self> {
        let models = vec![config.model.clone()];
        Ok(Self {
            client: http_client(gateway)?,
            config,
            models,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
            loc = self.config.location,
            project = self.config.project_id,
            model = model
        )
    }

    /// Static token from the configuration, else one from the metadata server.
    async fn access_token(&self) -> std::result::Result<String, BackendError> {
        if let Some(token) = &self.config.access_token {
            return Ok(token.clone());
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| BackendError::Authentication(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(BackendError::Authentication(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| BackendError::Authentication(format!("invalid token payload: {}", e)))?;
        debug!("Obtained service account token (expires in {:?}s)", token.expires_in);
        Ok(token.access_token)
    }
}

#[async_trait]
impl ModelBackend for VertexClient {
    fn source(&self) -> BackendSource {
        BackendSource::Secondary
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn generate(&self, model: &str, prompt: &str) -> std::result::Result<String, BackendError> {
        let token = self.access_token().await?;
        debug!("Vertex AI request to {} in {}", model, self.config.location);

        let response = self
            .client
            .post(self.endpoint(model))
            .bearer_auth(token)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| BackendError::from_message(&e.to_string()))?;

        read_generation(response, model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_endpoint() {
        let vertex = VertexConfig {
            project_id: "ledger-prod".to_string(),
            location: "us-central1".to_string(),
            model: "gemini-1.5-pro".to_string(),
            access_token: Some("token".to_string()),
        };
        let client = VertexClient::new(vertex, &GatewayConfig::default()).unwrap();
        assert_eq!(client.models(), ["gemini-1.5-pro".to_string()]);
        assert_eq!(
            client.endpoint("gemini-1.5-pro"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/ledger-prod/locations/us-central1/publishers/google/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn test_gemini_requires_models() {
        assert!(GeminiClient::new("key", Vec::new(), &GatewayConfig::default()).is_err());
    }
}
