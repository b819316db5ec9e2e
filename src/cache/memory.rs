//! In-process cache store.
//!
//! Same shape as the per-feature DashMap caches elsewhere in the service, but
//! with per-entry expiry instead of one fixed TTL. Expiry uses
//! `tokio::time::Instant`, so tests can drive it with a paused clock.

use super::{CacheError, CacheStore, glob_to_regex};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        // Expired: evict lazily. The read guard above is already released.
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_owned(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError> {
        let now = Instant::now();
        let deleted = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, entry)| entry.is_live(now))
            .count();
        Ok(deleted)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let matcher = glob_to_regex(pattern)?;
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_live(now) && matcher.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;

    #[tokio::test(start_paused = true)]
    async fn ttl_entry_expires_after_deadline() {
        let cache = Cache::in_memory();
        cache.set("api:public:posts:page=1", "payload", 60).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(
            cache.get::<String>("api:public:posts:page=1").await.as_deref(),
            Some("payload")
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get::<String>("api:public:posts:page=1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_never_expires() {
        let cache = Cache::in_memory();
        cache.set("sitemap:root", "<sitemapindex/>", 0).await;

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(
            cache.get::<String>("sitemap:root").await.as_deref(),
            Some("<sitemapindex/>")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_evicted_and_hidden_from_scans() {
        let store = MemoryStore::new();
        store
            .set("api:a", "1".into(), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        store.set("api:b", "2".into(), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.keys("api:*").await.unwrap(), vec!["api:b".to_owned()]);

        assert_eq!(store.get("api:a").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn set_resets_expiry() {
        let store = MemoryStore::new();
        store
            .set("k", "old".into(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        store.set("k", "new".into(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.delete(&["k".to_owned(), "x".to_owned()]).await.unwrap(), 1);
        assert!(store.is_empty());
    }
}
