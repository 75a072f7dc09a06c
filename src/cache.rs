//! Content-addressed memoization of model calls and whole-document results.
//!
//! The store is an external collaborator behind [`CacheStore`]. Callers treat
//! every cache error as a miss: caching never decides whether a request
//! succeeds.

use crate::error::{FinancialDocumentError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Raw prompt/response pairs live for a day.
pub const LLM_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Whole-document results live for a week.
pub const DOCUMENT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const LLM_NAMESPACE: &str = "gemini_cache";
const DOCUMENT_NAMESPACE: &str = "document_cache";

/// Key for a raw model call: `gemini_cache:<md5("{prompt}_{True|False}")>`.
pub fn llm_cache_key(prompt: &str, require_json: bool) -> String {
    let flag = if require_json { "True" } else { "False" };
    let digest = md5::compute(format!("{}_{}", prompt, flag));
    format!("{}:{:x}", LLM_NAMESPACE, digest)
}

/// Key for a processed file: `document_cache:<sha256(bytes)>:<type|auto>`.
pub fn document_cache_key(file_bytes: &[u8], declared_type: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_bytes);
    let hash = format!("{:x}", hasher.finalize());
    let kind = declared_type
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("auto");
    format!("{}:{}:{}", DOCUMENT_NAMESPACE, hash, kind)
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

/// Process-local store with per-entry expiry. Expired entries are dropped
/// when read and on every write.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| FinancialDocumentError::Cache(e.to_string()))?;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| FinancialDocumentError::Cache(e.to_string()))?;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }
}

#[cfg(feature = "redis-cache")]
pub use redis_store::RedisCache;

#[cfg(feature = "redis-cache")]
mod redis_store {
    use super::CacheStore;
    use crate::error::{FinancialDocumentError, Result};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Redis-backed store using `GET` and `SETEX`.
    pub struct RedisCache {
        client: redis::Client,
    }

    impl RedisCache {
        pub fn new(url: &str) -> Result<Self> {
            let client = redis::Client::open(url).map_err(cache_error)?;
            Ok(Self { client })
        }

        async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(cache_error)
        }
    }

    fn cache_error(e: redis::RedisError) -> FinancialDocumentError {
        FinancialDocumentError::Cache(e.to_string())
    }

    #[async_trait]
    impl CacheStore for RedisCache {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let mut conn = self.connection().await?;
            let value: Option<String> = redis::cmd("GET")
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(cache_error)?;
            Ok(value)
        }

        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
            let mut conn = self.connection().await?;
            let _: () = redis::cmd("SETEX")
                .arg(key)
                .arg(ttl.as_secs().max(1))
                .arg(value)
                .query_async(&mut conn)
                .await
                .map_err(cache_error)?;
            Ok(())
        }
    }
}
