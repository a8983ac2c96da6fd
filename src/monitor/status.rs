use super::config::DEPLOYED_STATUS;
use crate::error::Result;
use async_trait::async_trait;

/// Latest revision of a release as recorded by the Helm storage driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRevision {
    pub revision: String,
    pub status: String,
}

impl ReleaseRevision {
    #[must_use]
    pub fn new(revision: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            status: status.into(),
        }
    }

    /// What a release that was never installed reports: revision `"0"`, no status
    #[must_use]
    pub fn absent() -> Self {
        Self::new("0", "")
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.revision == "0"
    }

    /// Case-sensitive match against `deployed`
    #[must_use]
    pub fn is_deployed(&self) -> bool {
        self.status == DEPLOYED_STATUS
    }
}

/// Tells a watcher whether its release is settled in the deployed phase.
#[async_trait]
pub trait ReleaseStatus: Send + Sync {
    /// Latest revision and its status. A release that does not exist yields
    /// [`ReleaseRevision::absent`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error only when the storage backend cannot be queried.
    async fn last_status(&self, namespace: &str, release: &str) -> Result<ReleaseRevision>;
}

/// Reads the manifest checksum recorded on the latest release revision.
#[async_trait]
pub trait ReleaseChecksum: Send + Sync {
    /// `None` when the release or its checksum label does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only when the storage backend cannot be queried.
    async fn recorded_checksum(&self, namespace: &str, release: &str) -> Result<Option<String>>;
}
