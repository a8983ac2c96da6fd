use super::index::ResourceKey;
use crate::error::Result;
use crate::k8s::cache::{ListQuery, ObjectCache};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Reports which objects of a [`ResourceKey`] the shared cache currently sees.
#[derive(Clone)]
pub struct Prober {
    cache: Arc<dyn ObjectCache>,
}

impl Prober {
    #[must_use]
    pub fn new(cache: Arc<dyn ObjectCache>) -> Self {
        Self { cache }
    }

    /// Names observed for `key`; cache errors are returned unchanged.
    ///
    /// # Errors
    ///
    /// Propagates whatever the cache reports.
    pub async fn observe(&self, key: &ResourceKey) -> Result<HashSet<String>> {
        self.cache.list_names(&ListQuery::for_key(key)).await
    }

    /// First name of `expected` that is not observed, in name order.
    ///
    /// A name missing from the cached view is re-checked against a refreshed
    /// list before it is reported, so an object created after the list was
    /// cached never reads as absent.
    ///
    /// # Errors
    ///
    /// Propagates whatever the cache reports.
    pub async fn first_missing(
        &self,
        key: &ResourceKey,
        expected: &BTreeSet<String>,
    ) -> Result<Option<String>> {
        let observed = self.observe(key).await?;
        if expected.iter().all(|name| observed.contains(name.as_str())) {
            return Ok(None);
        }

        let observed = self.cache.refresh_names(&ListQuery::for_key(key)).await?;
        Ok(expected
            .iter()
            .find(|name| !observed.contains(name.as_str()))
            .cloned())
    }
}
