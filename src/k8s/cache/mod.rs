pub mod api_cache;
pub mod cached_data;
pub mod config;
pub mod data_cache;
pub mod memory;

pub use api_cache::ApiServerCache;
pub use cached_data::{CachedData, FetchStatus};
pub use data_cache::{CacheStats, MetadataCache};
pub use memory::InMemoryCache;

use crate::error::Result;
use crate::monitor::ResourceKey;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;

/// A partial-metadata list request: `group/version/<Kind>List`, optionally
/// restricted to one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListQuery {
    pub group: String,
    pub version: String,
    pub list_kind: String,
    pub namespace: Option<String>,
}

impl ListQuery {
    /// The list request that observes every object a key may declare
    #[must_use]
    pub fn for_key(key: &ResourceKey) -> Self {
        Self {
            group: key.group.clone(),
            version: key.version.clone(),
            list_kind: key.list_kind(),
            namespace: (!key.namespace.is_empty()).then(|| key.namespace.clone()),
        }
    }

    /// Item kind of the list
    #[must_use]
    pub fn kind(&self) -> &str {
        self.list_kind
            .strip_suffix("List")
            .unwrap_or(&self.list_kind)
    }

    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.group,
            self.version,
            self.list_kind,
            self.namespace.as_deref().unwrap_or("all")
        )
    }
}

impl fmt::Display for ListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.list_kind)?;
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.list_kind)?;
        }
        match &self.namespace {
            Some(namespace) => write!(f, " in {namespace}"),
            None => write!(f, " cluster-wide"),
        }
    }
}

/// Read-only view of cluster objects answering list queries with object names.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    /// Names of every object currently observed for `query`.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying view cannot answer the query.
    async fn list_names(&self, query: &ListQuery) -> Result<HashSet<String>>;

    /// Like [`list_names`](Self::list_names), but read past any caching layer
    /// so the answer is at least as new as the call.
    ///
    /// # Errors
    ///
    /// Returns an error when the source of truth cannot answer the query.
    async fn refresh_names(&self, query: &ListQuery) -> Result<HashSet<String>> {
        self.list_names(query).await
    }
}
