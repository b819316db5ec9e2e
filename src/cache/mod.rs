//! Best-effort key-value cache backing sitemap artifacts and API response caches.
//!
//! Every operation degrades to a logged miss or no-op when the backing store is
//! absent or failing. Callers never see a cache error: a cache outage must not
//! take content serving down with it.

pub mod memory;
pub mod redis_backend;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub use memory::MemoryStore;
pub use redis_backend::RedisStore;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    #[error("invalid key pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Raw string storage underneath [`Cache`].
///
/// Implementations only move strings around; serialization and the
/// failure-to-miss policy live in [`Cache`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value`, replacing whatever was there. `None` means no expiry.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Delete the given keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError>;

    /// List live keys matching a glob pattern (`*` and `?`).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
}

/// Cloneable cache handle. Clone-cheap (one `Arc`).
///
/// A handle with no store behaves as a permanently empty cache.
#[derive(Clone)]
pub struct Cache {
    store: Option<Arc<dyn CacheStore>>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A cache with no backing store. Reads miss, writes are dropped.
    pub fn disabled() -> Self {
        warn!("cache backend not configured, caching disabled");
        Self { store: None }
    }

    /// In-process store, used when no Redis URL is configured and in tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn backend(&self) -> &'static str {
        self.store.as_ref().map_or("disabled", |s| s.name())
    }

    /// Read and deserialize a value. Any failure is reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let store = self.store.as_ref()?;

        let raw = match store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                error!(key, error = %e, "cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "cached payload could not be decoded, treating as miss");
                None
            }
        }
    }

    /// Serialize and store a value. `ttl_secs == 0` stores without expiry.
    ///
    /// Returns whether the write reached the backend.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(e) => {
                error!(key, error = %e, "failed to encode cache payload");
                return false;
            }
        };

        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));
        match store.set(key, payload, ttl).await {
            Ok(()) => {
                debug!(key, ttl_secs, "cached");
                true
            }
            Err(e) => {
                error!(key, error = %e, "cache write failed");
                false
            }
        }
    }

    /// Live keys matching a glob pattern, sorted. Failures are logged and read as none.
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        let Some(store) = self.store.as_ref() else {
            return Vec::new();
        };
        match store.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                error!(pattern, error = %e, "cache key scan failed");
                Vec::new()
            }
        }
    }

    /// Delete one exact key, or every key matching `pattern` when it contains `*`.
    ///
    /// Matching nothing is not an error. Returns whether the backend was reached.
    pub async fn delete_matching(&self, pattern: &str) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let keys = if pattern.contains('*') {
            match store.keys(pattern).await {
                Ok(keys) => keys,
                Err(e) => {
                    error!(pattern, error = %e, "cache key scan failed");
                    return false;
                }
            }
        } else {
            vec![pattern.to_owned()]
        };

        if keys.is_empty() {
            debug!(pattern, "no cache keys matched");
            return true;
        }

        match store.delete(&keys).await {
            Ok(deleted) => {
                debug!(pattern, deleted, "deleted cache keys");
                true
            }
            Err(e) => {
                error!(pattern, error = %e, "cache delete failed");
                false
            }
        }
    }
}

/// Compile a Redis-style glob (`*`, `?`) into an anchored regex.
pub(crate) fn glob_to_regex(pattern: &str) -> Result<regex::Regex, CacheError> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    expr.push_str(&regex::escape(&literal));
    expr.push('$');

    regex::Regex::new(&expr).map_err(|source| CacheError::InvalidPattern {
        pattern: pattern.to_owned(),
        source,
    })
}
