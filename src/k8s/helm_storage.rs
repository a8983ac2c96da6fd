/**
 * Release status read from the Helm storage driver records.
 *
 * Helm stores each release revision as a `Secret` (default) or `ConfigMap`
 * labelled `owner=helm,name=<release>,version=<n>,status=<phase>`. Only object
 * metadata is listed; the encoded release payload is never fetched.
 */
use crate::error::{Error, Result};
use crate::monitor::{ReleaseChecksum, ReleaseRevision, ReleaseStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ListParams};
use kube::Client;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const VERSION_LABEL: &str = "version";
const STATUS_LABEL: &str = "status";
const CHECKSUM_LABEL: &str = "packageChecksum";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageDriver {
    #[default]
    Secret,
    ConfigMap,
}

impl FromStr for StorageDriver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "secret" | "secrets" => Ok(Self::Secret),
            "configmap" | "configmaps" => Ok(Self::ConfigMap),
            other => Err(Error::Custom(format!("unsupported storage driver: {other}"))),
        }
    }
}

impl fmt::Display for StorageDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret => write!(f, "secret"),
            Self::ConfigMap => write!(f, "configmap"),
        }
    }
}

pub struct HelmStorage {
    client: Client,
    driver: StorageDriver,
}

impl HelmStorage {
    #[must_use]
    pub fn new(client: Client, driver: StorageDriver) -> Self {
        Self { client, driver }
    }

    /// Labels of the highest-numbered revision record, `None` when the release
    /// has no records. Records without a numeric `version` label are ignored.
    async fn latest_labels(
        &self,
        namespace: &str,
        release: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        let params = ListParams::default().labels(&format!("owner=helm,name={release}"));
        let records: Vec<ObjectMeta> = match self.driver {
            StorageDriver::Secret => Api::<Secret>::namespaced(self.client.clone(), namespace)
                .list_metadata(&params)
                .await?
                .items
                .into_iter()
                .map(|object| object.metadata)
                .collect(),
            StorageDriver::ConfigMap => {
                Api::<ConfigMap>::namespaced(self.client.clone(), namespace)
                    .list_metadata(&params)
                    .await?
                    .items
                    .into_iter()
                    .map(|object| object.metadata)
                    .collect()
            }
        };

        debug!(
            "📦 Found {} {} records for release {}/{}",
            records.len(),
            self.driver,
            namespace,
            release
        );

        Ok(records
            .into_iter()
            .filter_map(|meta| meta.labels)
            .filter_map(|labels| {
                let version = labels.get(VERSION_LABEL)?.parse::<u64>().ok()?;
                Some((version, labels))
            })
            .max_by_key(|(version, _)| *version)
            .map(|(_, labels)| labels))
    }
}

#[async_trait]
impl ReleaseStatus for HelmStorage {
    async fn last_status(&self, namespace: &str, release: &str) -> Result<ReleaseRevision> {
        let Some(labels) = self.latest_labels(namespace, release).await? else {
            return Ok(ReleaseRevision::absent());
        };
        Ok(ReleaseRevision::new(
            labels.get(VERSION_LABEL).cloned().unwrap_or_default(),
            labels.get(STATUS_LABEL).cloned().unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl ReleaseChecksum for HelmStorage {
    async fn recorded_checksum(&self, namespace: &str, release: &str) -> Result<Option<String>> {
        Ok(self
            .latest_labels(namespace, release)
            .await?
            .and_then(|mut labels| labels.remove(CHECKSUM_LABEL)))
    }
}
