use super::watcher::{DriftCallback, ReleaseWatcher, WatcherContext};
use crate::error::{Error, Result};
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Release name → watcher. At most one watcher, and so one loop, per release.
pub struct MonitorRegistry {
    monitors: Mutex<HashMap<String, Arc<ReleaseWatcher>>>,
    context: WatcherContext,
    on_drift: DriftCallback,
}

impl MonitorRegistry {
    #[must_use]
    pub fn new(context: WatcherContext, on_drift: DriftCallback) -> Self {
        Self {
            monitors: Mutex::new(HashMap::new()),
            context,
            on_drift,
        }
    }

    /// Start monitoring `release`, replacing (and fully stopping) any watcher
    /// already registered under that name.
    pub async fn add(&self, namespace: &str, release: &str, manifest: String) {
        let mut monitors = self.monitors.lock().await;
        if let Some(previous) = monitors.remove(release) {
            debug!("🔄 Replacing monitor for release {}", release);
            previous.stop().await;
        }

        let watcher = Arc::new(ReleaseWatcher::new(namespace, release, manifest, &self.context));
        watcher.start(self.on_drift.clone());
        monitors.insert(release.to_string(), watcher);
        info!("➕ Monitoring release {}/{}", namespace, release);
    }

    /// Stop and forget the watcher of `release`; a no-op when absent.
    pub async fn remove(&self, release: &str) {
        let mut monitors = self.monitors.lock().await;
        if let Some(watcher) = monitors.remove(release) {
            watcher.stop().await;
            info!("🗑️  Stopped monitoring release {}", release);
        }
    }

    pub async fn has(&self, release: &str) -> bool {
        self.monitors.lock().await.contains_key(release)
    }

    /// Live watcher handle of `release`
    pub async fn get(&self, release: &str) -> Option<Arc<ReleaseWatcher>> {
        self.monitors.lock().await.get(release).cloned()
    }

    pub async fn pause(&self, release: &str) {
        if let Some(watcher) = self.monitors.lock().await.get(release) {
            watcher.pause();
        }
    }

    pub async fn resume(&self, release: &str) {
        if let Some(watcher) = self.monitors.lock().await.get(release) {
            watcher.resume();
        }
    }

    /// Sweep `release` immediately. An unknown release is not an error, so
    /// callers may check speculatively. The same holds when the watcher is
    /// removed or replaced while the sweep runs: the check ends with `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the watcher's error wrapped with the release name; drift stays
    /// recognisable through `Error::is_absent_manifest`. `Cancelled` is only
    /// returned when `cancel` itself fired.
    pub async fn check_now(&self, cancel: &CancellationToken, release: &str) -> Result<()> {
        let Some(watcher) = self.get(release).await else {
            return Ok(());
        };

        match watcher.check_now(cancel).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() && !cancel.is_cancelled() => {
                debug!("Monitor for release {} stopped during check", release);
                Ok(())
            }
            Err(e) => Err(Error::Release {
                release: release.to_string(),
                source: Box::new(e),
            }),
        }
    }

    /// Stop every watcher and wait for all loops to exit.
    pub async fn stop_all(&self) {
        let mut monitors = self.monitors.lock().await;
        let count = monitors.len();
        for (_, watcher) in monitors.drain() {
            watcher.stop().await;
        }
        if count > 0 {
            info!("🛑 Stopped {} release monitors", count);
        }
    }

    pub async fn len(&self) -> usize {
        self.monitors.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.monitors.lock().await.is_empty()
    }

    /// Monitored release names, sorted
    pub async fn releases(&self) -> Vec<String> {
        self.monitors.lock().await.keys().cloned().sorted().collect()
    }
}
