use super::{ListQuery, ObjectCache};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// Object view held entirely in memory, keyed by list query.
///
/// Suits embedders that already maintain a synced view of the cluster. A query
/// that was never populated observes no objects.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    objects: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the names observed for `query`
    pub fn set_names<I, S>(&self, query: &ListQuery, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(query.cache_key(), names);
    }

    /// Add one observed object
    pub fn insert_name(&self, query: &ListQuery, name: &str) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(query.cache_key())
            .or_default()
            .insert(name.to_string());
    }

    /// Forget one observed object; returns whether it was present
    pub fn remove_name(&self, query: &ListQuery, name: &str) -> bool {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&query.cache_key())
            .is_some_and(|names| names.remove(name))
    }
}

#[async_trait]
impl ObjectCache for InMemoryCache {
    async fn list_names(&self, query: &ListQuery) -> Result<HashSet<String>> {
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&query.cache_key())
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ResourceKey;

    fn services() -> ListQuery {
        ListQuery::for_key(&ResourceKey::new("", "v1", "Service", "ns1"))
    }

    #[tokio::test]
    async fn test_unknown_query_observes_nothing() {
        let cache = InMemoryCache::new();
        assert!(cache.list_names(&services()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let cache = InMemoryCache::new();
        cache.set_names(&services(), ["api"]);
        cache.insert_name(&services(), "metrics");
        assert_eq!(cache.list_names(&services()).await.unwrap().len(), 2);

        assert!(cache.remove_name(&services(), "api"));
        assert!(!cache.remove_name(&services(), "api"));
        let names = cache.list_names(&services()).await.unwrap();
        assert!(names.contains("metrics"));
        assert!(!names.contains("api"));
    }
}
