//! Manifest indexing
//!
//! Turns a rendered multi-document manifest into a [`ResourceIndex`]: the set
//! of object names a release declares, grouped by kind and namespace so that a
//! single list query per group can verify them.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

const LIST_SUFFIX: &str = "List";

/// Identifies one homogeneous list query: group/version/kind plus namespace.
/// An empty namespace means cluster-scoped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
}

impl ResourceKey {
    #[must_use]
    pub fn new(group: &str, version: &str, kind: &str, namespace: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            namespace: namespace.to_string(),
        }
    }

    #[must_use]
    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }

    /// The apiVersion string this key was parsed from
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Kubernetes list-kind naming convention
    #[must_use]
    pub fn list_kind(&self) -> String {
        format!("{}{LIST_SUFFIX}", self.kind)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)?;
        if !self.namespace.is_empty() {
            write!(f, "@{}", self.namespace)?;
        }
        Ok(())
    }
}

/// Declared object names per [`ResourceKey`]. Names are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIndex {
    entries: BTreeMap<ResourceKey, BTreeSet<String>>,
}

impl ResourceIndex {
    fn insert(&mut self, key: ResourceKey, name: String) {
        self.entries.entry(key).or_default().insert(name);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of declared objects across all keys
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &BTreeSet<String>)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn names(&self, key: &ResourceKey) -> Option<&BTreeSet<String>> {
        self.entries.get(key)
    }
}

/// Only the fields needed to place a document in the index; `spec`, `data`
/// and everything else is skipped without being materialized.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentHeader {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    metadata: Option<DocumentMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

/// Split an apiVersion into (group, version). `v1` belongs to the core group.
fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version
        .rsplit_once('/')
        .map_or(("", api_version), |(group, version)| (group, version))
}

/// Build a [`ResourceIndex`] from a rendered manifest stream.
///
/// Documents without `apiVersion` and `kind` are skipped, as are `*List`
/// aggregates and objects without a name (generated names cannot be verified).
///
/// # Errors
///
/// Returns `Error::IndexBuild` on a malformed document and `Error::EmptyGvk`
/// when a document carries an apiVersion or kind that does not resolve to a
/// full group/version/kind.
pub fn build_index(manifest: &str) -> Result<ResourceIndex> {
    let mut index = ResourceIndex::default();
    if manifest.trim().is_empty() {
        return Ok(index);
    }

    // documents are decoded in place from the borrowed manifest, one at a time
    for (position, document) in serde_yaml::Deserializer::from_str(manifest).enumerate() {
        let Some(header) = Option::<DocumentHeader>::deserialize(document).map_err(Error::IndexBuild)?
        else {
            continue;
        };

        let api_version = header.api_version.unwrap_or_default();
        let kind = header.kind.unwrap_or_default();
        if api_version.is_empty() && kind.is_empty() {
            continue;
        }

        let (group, version) = split_api_version(api_version.trim());
        let kind = kind.trim();
        if version.is_empty() || kind.is_empty() {
            return Err(Error::EmptyGvk {
                document: position,
                detail: format!("apiVersion={api_version:?} kind={kind:?}"),
            });
        }

        if kind.ends_with(LIST_SUFFIX) {
            debug!("📦 Skipping {} aggregate in document {}", kind, position);
            continue;
        }

        let metadata = header.metadata.unwrap_or_default();
        let name = metadata.name.unwrap_or_default();
        if name.is_empty() {
            debug!("📦 Skipping unnamed {} in document {}", kind, position);
            continue;
        }

        let namespace = metadata.namespace.unwrap_or_default();
        index.insert(ResourceKey::new(group, version, kind, &namespace), name);
    }

    Ok(index)
}
