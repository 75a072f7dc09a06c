use crate::cache::{llm_cache_key, CacheStore, LLM_CACHE_TTL};
use crate::config::RetryPolicy;
use crate::error::{FinancialDocumentError, Result};
use crate::llm::backend::{BackendError, BackendSource, ModelBackend};
use crate::llm::prompts::JSON_DIRECTIVE;
use crate::llm::repair::strip_code_fences;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Text produced by one gateway call plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    /// Model name, or `"cache"` when served from the raw-call cache.
    pub model_used: String,
    /// Backend requests issued for this call, zero on a cache hit.
    pub attempt_count: u32,
    pub source: BackendSource,
    #[serde(default)]
    pub from_cache: bool,
}

/// Drives one or two [`ModelBackend`]s through model-name fallback, retry
/// with linear backoff and cross-backend fallback, memoizing successful
/// responses in an optional [`CacheStore`].
///
/// Fallback order is data: the primary backend's models in order, then the
/// fallback backend's models in order. A model that exhausts its retry
/// budget hands over to the next model. A backend is abandoned when one of
/// its models fails authentication or every model has failed; the fallback
/// backend is then tried exactly once.
#[derive(Clone)]
pub struct ModelGateway {
    primary: Arc<dyn ModelBackend>,
    fallback: Option<Arc<dyn ModelBackend>>,
    cache: Option<Arc<dyn CacheStore>>,
    cache_ttl: Duration,
    retry: RetryPolicy,
}

impl ModelGateway {
    pub fn new(primary: Arc<dyn ModelBackend>) -> Self {
        Self {
            primary,
            fallback: None,
            cache: None,
            cache_ttl: LLM_CACHE_TTL,
            retry: RetryPolicy::default(),
        }
    }

    /// Builds the single backend the configuration selects: the keyed Gemini
    /// API when a key is present, otherwise Vertex AI.
    #[cfg(feature = "gemini")]
    pub fn from_config(config: &crate::config::GatewayConfig) -> Result<Self> {
        use crate::llm::client::{GeminiClient, VertexClient};

        config.validate()?;
        let primary: Arc<dyn ModelBackend> = match (&config.gemini_api_key, &config.vertex) {
            (Some(key), _) => {
                info!("Using Gemini API with models {:?}", config.gemini_models);
                Arc::new(GeminiClient::new(key.clone(), config.gemini_models.clone(), config)?)
            }
            (None, Some(vertex)) => {
                info!(
                    "Using Vertex AI project {} in {} ({})",
                    vertex.project_id, vertex.location, vertex.model
                );
                Arc::new(VertexClient::new(vertex.clone(), config)?)
            }
            (None, None) => return Err(FinancialDocumentError::ModelUnavailable),
        };
        Ok(Self::new(primary).with_retry_policy(config.retry))
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ModelBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Generates text for `prompt` with the configured retry budget.
    pub async fn generate(&self, prompt: &str, require_json: bool) -> Result<String> {
        self.generate_detailed(prompt, require_json, self.retry.max_retries)
            .await
            .map(|response| response.text)
    }

    /// Generates text for `prompt`, retrying each model up to `max_retries`
    /// times on rate limits, empty responses and transient errors.
    ///
    /// With `require_json` a JSON-only directive is appended to the prompt
    /// sent to the model and code fences are stripped from the reply. The
    /// cache key covers the prompt as given plus the flag.
    pub async fn generate_detailed(
        &self,
        prompt: &str,
        require_json: bool,
        max_retries: u32,
    ) -> Result<ModelResponse> {
        let key = llm_cache_key(prompt, require_json);

        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(text)) => {
                    debug!("LLM cache hit for {}", key);
                    return Ok(ModelResponse {
                        text,
                        model_used: "cache".to_string(),
                        attempt_count: 0,
                        source: self.primary.source(),
                        from_cache: true,
                    });
                }
                Ok(None) => debug!("LLM cache miss for {}", key),
                Err(e) => warn!("LLM cache lookup failed, calling the model: {}", e),
            }
        }

        let sent = if require_json {
            format!("{}{}", prompt, JSON_DIRECTIVE)
        } else {
            prompt.to_string()
        };

        let mut response = match self.run_backend(self.primary.as_ref(), &sent, max_retries).await {
            Ok(response) => response,
            Err(primary_error) => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        "{:?} backend failed ({}), trying {:?} backend",
                        self.primary.source(),
                        primary_error,
                        fallback.source()
                    );
                    self.run_backend(fallback.as_ref(), &sent, max_retries).await?
                }
                None => return Err(primary_error),
            },
        };

        if require_json {
            response.text = strip_code_fences(&response.text).to_string();
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&key, &response.text, self.cache_ttl).await {
                warn!("Failed to cache LLM response: {}", e);
            }
        }

        Ok(response)
    }

    async fn run_backend(
        &self,
        backend: &dyn ModelBackend,
        prompt: &str,
        max_retries: u32,
    ) -> Result<ModelResponse> {
        let attempts_per_model = max_retries.max(1);
        let mut total_attempts = 0u32;
        let mut last_error: Option<FinancialDocumentError> = None;

        'models: for model in backend.models() {
            let mut attempt = 0u32;
            loop {
                total_attempts += 1;
                let error = match backend.generate(model, prompt).await {
                    Ok(text) if !text.trim().is_empty() => {
                        debug!("{} answered after {} attempt(s)", model, total_attempts);
                        return Ok(ModelResponse {
                            text,
                            model_used: model.clone(),
                            attempt_count: total_attempts,
                            source: backend.source(),
                            from_cache: false,
                        });
                    }
                    Ok(_) => BackendError::EmptyResponse,
                    Err(e) => e,
                };

                let exhausted = attempt + 1 >= attempts_per_model;
                let delay = match error {
                    BackendError::ModelNotFound(_) => {
                        info!("Model {} not found, trying next model", model);
                        continue 'models;
                    }
                    BackendError::Authentication(message) => {
                        return Err(FinancialDocumentError::ModelAuthFailure(message));
                    }
                    BackendError::RateLimited(message) => {
                        if exhausted {
                            warn!("{} quota exhausted, trying next model", model);
                            last_error = Some(FinancialDocumentError::ModelRateLimited {
                                attempts: total_attempts,
                                message,
                            });
                            continue 'models;
                        }
                        self.retry.rate_limit_delay(attempt)
                    }
                    other @ (BackendError::EmptyResponse | BackendError::Transient(_)) => {
                        if exhausted {
                            warn!("{} kept failing ({}), trying next model", model, other);
                            last_error = Some(FinancialDocumentError::ModelRequestFailed {
                                attempts: total_attempts,
                                message: other.to_string(),
                            });
                            continue 'models;
                        }
                        self.retry.transient_delay(attempt)
                    }
                };

                warn!(
                    "{} attempt {}/{} failed, retrying in {:?}",
                    model,
                    attempt + 1,
                    attempts_per_model,
                    delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }

        Err(last_error.unwrap_or(FinancialDocumentError::ModelRequestFailed {
            attempts: total_attempts,
            message: "no configured model is available".to_string(),
        }))
    }
}
