/**
 * Decides whether a release must be (re)installed before it can be trusted.
 *
 * Checks run cheapest first: the recorded revision and status, then the
 * manifest checksum, and only then a live sweep of the declared resources.
 */
use crate::error::Result;
use crate::monitor::{MonitorRegistry, ReleaseChecksum, ReleaseStatus};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeReason {
    FirstInstall,
    NotDeployed,
    ChecksumChanged,
    ResourcesAbsent,
}

impl fmt::Display for UpgradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::FirstInstall => "release is not installed",
            Self::NotDeployed => "last revision is not deployed",
            Self::ChecksumChanged => "manifest checksum changed",
            Self::ResourcesAbsent => "declared resources are missing",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeDecision {
    UpToDate,
    Required(UpgradeReason),
}

impl UpgradeDecision {
    #[must_use]
    pub fn is_required(self) -> bool {
        matches!(self, Self::Required(_))
    }
}

/// SHA-256 of the rendered manifest, lowercase hex.
#[must_use]
pub fn manifest_checksum(manifest: &str) -> String {
    format!("{:x}", Sha256::digest(manifest.as_bytes()))
}

pub struct UpgradePlanner {
    status: Arc<dyn ReleaseStatus>,
    checksums: Arc<dyn ReleaseChecksum>,
    registry: Arc<MonitorRegistry>,
}

impl UpgradePlanner {
    #[must_use]
    pub fn new(
        status: Arc<dyn ReleaseStatus>,
        checksums: Arc<dyn ReleaseChecksum>,
        registry: Arc<MonitorRegistry>,
    ) -> Self {
        Self {
            status,
            checksums,
            registry,
        }
    }

    /// Decide whether `release` needs an install or upgrade for
    /// `rendered_manifest`.
    ///
    /// # Errors
    ///
    /// Returns status or checksum query failures, and any sweep failure other
    /// than drift (drift itself yields `Required(ResourcesAbsent)`).
    pub async fn plan(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        release: &str,
        rendered_manifest: &str,
    ) -> Result<UpgradeDecision> {
        let revision = self.status.last_status(namespace, release).await?;
        if revision.is_absent() {
            return Ok(self.required(release, UpgradeReason::FirstInstall));
        }
        if !revision.status.eq_ignore_ascii_case(crate::monitor::config::DEPLOYED_STATUS) {
            return Ok(self.required(release, UpgradeReason::NotDeployed));
        }

        let checksum = manifest_checksum(rendered_manifest);
        let recorded = self.checksums.recorded_checksum(namespace, release).await?;
        if recorded.as_deref() != Some(checksum.as_str()) {
            debug!(
                "🔢 Checksum for {}: recorded {:?}, rendered {}",
                release, recorded, checksum
            );
            return Ok(self.required(release, UpgradeReason::ChecksumChanged));
        }

        match self.registry.check_now(cancel, release).await {
            Ok(()) => {
                debug!("✅ Release {} is up to date", release);
                Ok(UpgradeDecision::UpToDate)
            }
            Err(e) if e.is_absent_manifest() => {
                Ok(self.required(release, UpgradeReason::ResourcesAbsent))
            }
            Err(e) => Err(e),
        }
    }

    #[allow(clippy::unused_self)]
    fn required(&self, release: &str, reason: UpgradeReason) -> UpgradeDecision {
        info!("⬆️  Release {} needs upgrade: {}", release, reason);
        UpgradeDecision::Required(reason)
    }
}
