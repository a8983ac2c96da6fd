//! In-process collaborators for unit tests

use super::status::{ReleaseChecksum, ReleaseRevision, ReleaseStatus};
use super::watcher::DriftCallback;
use crate::error::{Error, Result};
use crate::k8s::cache::{InMemoryCache, ListQuery, ObjectCache};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DEPLOYMENT_MANIFEST: &str = r"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: api
  namespace: ns1
spec:
  replicas: 1
";

pub struct FakeStatus {
    revision: Mutex<ReleaseRevision>,
    checksum: Mutex<Option<String>>,
    fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeStatus {
    pub fn with(revision: &str, status: &str) -> Arc<Self> {
        Arc::new(Self {
            revision: Mutex::new(ReleaseRevision::new(revision, status)),
            checksum: Mutex::new(None),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn deployed() -> Arc<Self> {
        Self::with("1", "deployed")
    }

    pub fn set(&self, revision: &str, status: &str) {
        *self.revision.lock().unwrap() = ReleaseRevision::new(revision, status);
    }

    pub fn set_checksum(&self, checksum: &str) {
        *self.checksum.lock().unwrap() = Some(checksum.to_string());
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReleaseStatus for FakeStatus {
    async fn last_status(&self, _namespace: &str, _release: &str) -> Result<ReleaseRevision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Custom("storage unavailable".to_string()));
        }
        Ok(self.revision.lock().unwrap().clone())
    }
}

#[async_trait]
impl ReleaseChecksum for FakeStatus {
    async fn recorded_checksum(&self, _namespace: &str, _release: &str) -> Result<Option<String>> {
        Ok(self.checksum.lock().unwrap().clone())
    }
}

/// In-memory cache that counts list calls and can be told to fail
#[derive(Default)]
pub struct CountingCache {
    pub objects: InMemoryCache,
    pub calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectCache for CountingCache {
    async fn list_names(&self, query: &ListQuery) -> Result<HashSet<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Custom("cache not synced".to_string()));
        }
        self.objects.list_names(query).await
    }
}

/// Cache whose lists never complete
#[derive(Default)]
pub struct StallingCache {
    pub calls: AtomicUsize,
}

impl StallingCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ObjectCache for StallingCache {
    async fn list_names(&self, _query: &ListQuery) -> Result<HashSet<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Records every drift notification
#[derive(Default)]
pub struct DriftRecorder {
    releases: Mutex<Vec<String>>,
}

impl DriftRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn callback(self: &Arc<Self>) -> DriftCallback {
        let recorder = self.clone();
        Arc::new(move |release: &str| {
            recorder.releases.lock().unwrap().push(release.to_string());
        })
    }

    pub fn count(&self) -> usize {
        self.releases.lock().unwrap().len()
    }

    pub fn releases(&self) -> Vec<String> {
        self.releases.lock().unwrap().clone()
    }
}
