use super::cached_data::{CachedData, FetchStatus};
use super::config::{DEFAULT_LIST_TTL_SECS, DEFAULT_MAX_CACHED_QUERIES};
use super::{ListQuery, ObjectCache};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Shared TTL layer over an upstream [`ObjectCache`].
///
/// Every watcher of a registry reads through one `MetadataCache`, so a kind
/// listed by several releases within the TTL costs a single upstream call.
pub struct MetadataCache {
    upstream: Arc<dyn ObjectCache>,
    entries: RwLock<HashMap<String, CachedData<HashSet<String>>>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    #[must_use]
    pub fn new(upstream: Arc<dyn ObjectCache>) -> Self {
        Self::with_ttl(upstream, Duration::from_secs(DEFAULT_LIST_TTL_SECS))
    }

    #[must_use]
    pub fn with_ttl(upstream: Arc<dyn ObjectCache>, ttl: Duration) -> Self {
        Self {
            upstream,
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: DEFAULT_MAX_CACHED_QUERIES,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    async fn fresh(&self, key: &str) -> Option<HashSet<String>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.data.clone())
    }

    async fn store(&self, key: String, names: HashSet<String>) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&key) {
            entry.update(names);
            return;
        }

        if entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_updated)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, CachedData::new(names, self.ttl));
    }

    /// Force the next read of `query` to go upstream
    pub async fn invalidate(&self, query: &ListQuery) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&query.cache_key()) {
            entry.mark_stale();
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    #[allow(clippy::significant_drop_tightening)]
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let fresh_entries = entries.values().filter(|e| e.is_fresh()).count();
        let error_entries = entries
            .values()
            .filter(|e| matches!(e.fetch_status, FetchStatus::Error(_)))
            .count();

        CacheStats {
            total_entries: entries.len(),
            fresh_entries,
            error_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl ObjectCache for MetadataCache {
    async fn list_names(&self, query: &ListQuery) -> Result<HashSet<String>> {
        let key = query.cache_key();
        if let Some(names) = self.fresh(&key).await {
            debug!("🎯 Cache HIT: {}", key);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(names);
        }

        debug!("❌ Cache MISS: {}", key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.fetch(query, key).await
    }

    async fn refresh_names(&self, query: &ListQuery) -> Result<HashSet<String>> {
        let key = query.cache_key();
        debug!("🔄 Cache REFRESH: {}", key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.fetch(query, key).await
    }
}

impl MetadataCache {
    async fn fetch(&self, query: &ListQuery, key: String) -> Result<HashSet<String>> {
        match self.upstream.refresh_names(query).await {
            Ok(names) => {
                self.store(key, names.clone()).await;
                Ok(names)
            }
            Err(e) => {
                warn!("Failed to refresh {}: {}", key, e);
                if let Some(entry) = self.entries.write().await.get_mut(&key) {
                    entry.mark_error(e.to_string());
                }
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub error_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Share of reads answered without going upstream (0.0 to 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
