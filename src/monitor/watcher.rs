/**
 * Release watcher
 *
 * One background loop per release. Every period the loop asks the status
 * adapter whether the release is deployed, and if it is (and nobody paused the
 * watcher) sweeps every indexed kind through the prober. A declared object
 * that the cache does not observe fires the drift callback.
 */
use super::config::MonitorConfig;
use super::index::{ResourceIndex, ResourceKey, build_index};
use super::prober::Prober;
use super::status::ReleaseStatus;
use crate::error::{Error, Result};
use crate::k8s::cache::ObjectCache;
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, StreamExt, TryStreamExt, stream};
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Invoked with the release name when a sweep finds a declared object missing
pub type DriftCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Collaborators shared by every watcher of a registry
#[derive(Clone)]
pub struct WatcherContext {
    pub cache: Arc<dyn ObjectCache>,
    pub status: Arc<dyn ReleaseStatus>,
    pub config: MonitorConfig,
    /// Parent of every watcher's cancellation scope
    pub shutdown: CancellationToken,
}

impl WatcherContext {
    #[must_use]
    pub fn new(cache: Arc<dyn ObjectCache>, status: Arc<dyn ReleaseStatus>) -> Self {
        Self {
            cache,
            status,
            config: MonitorConfig::default(),
            shutdown: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    Stopped,
}

/// Resolves once the loop task has exited; `false` if it panicked
type LoopExit = Shared<BoxFuture<'static, bool>>;

enum Lifecycle {
    NotStarted,
    Running { exit: LoopExit, period: Duration },
    Stopped { exit: Option<LoopExit> },
}

/// Raw manifest until the first successful build, then only the index
struct ManifestSlot {
    raw: String,
    index: Option<Arc<ResourceIndex>>,
}

struct WatcherCore {
    namespace: String,
    release: String,
    manifest: Mutex<ManifestSlot>,
    pause_depth: AtomicUsize,
    pause_lock: Mutex<()>,
    prober: Prober,
    status: Arc<dyn ReleaseStatus>,
    config: MonitorConfig,
    on_drift: OnceLock<DriftCallback>,
}

pub struct ReleaseWatcher {
    core: Arc<WatcherCore>,
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

impl ReleaseWatcher {
    /// Create a watcher for `namespace/release`. Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(namespace: &str, release: &str, manifest: String, context: &WatcherContext) -> Self {
        let core = WatcherCore {
            namespace: namespace.to_string(),
            release: release.to_string(),
            manifest: Mutex::new(ManifestSlot {
                raw: manifest,
                index: None,
            }),
            pause_depth: AtomicUsize::new(0),
            pause_lock: Mutex::new(()),
            prober: Prober::new(context.cache.clone()),
            status: context.status.clone(),
            config: context.config.clone(),
            on_drift: OnceLock::new(),
        };

        Self {
            core: Arc::new(core),
            cancel: context.shutdown.child_token(),
            lifecycle: Mutex::new(Lifecycle::NotStarted),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.core.namespace
    }

    #[must_use]
    pub fn release(&self) -> &str {
        &self.core.release
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        match *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) {
            Lifecycle::NotStarted => LifecycleState::NotStarted,
            Lifecycle::Running { .. } => LifecycleState::Running,
            Lifecycle::Stopped { .. } => LifecycleState::Stopped,
        }
    }

    /// Effective sweep period, known once the loop runs
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        match *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) {
            Lifecycle::Running { period, .. } => Some(period),
            _ => None,
        }
    }

    #[must_use]
    pub fn pause_depth(&self) -> usize {
        self.core.pause_depth.load(Ordering::Acquire)
    }

    /// Number of indexed kinds, `None` until the index has been built
    #[must_use]
    pub fn index_len(&self) -> Option<usize> {
        self.core
            .manifest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .index
            .as_ref()
            .map(|index| index.len())
    }

    /// Spawn the periodic loop. Only the first call on a fresh watcher has an
    /// effect; a stopped watcher is never restarted.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self, on_drift: DriftCallback) {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*lifecycle, Lifecycle::NotStarted) {
            debug!("Monitor for release {} already started", self.core.release);
            return;
        }

        let _ = self.core.on_drift.set(on_drift.clone());
        let period = self.core.config.jittered_period();
        let handle = tokio::spawn(self.core.clone().run(self.cancel.clone(), on_drift, period));
        let release = self.core.release.clone();
        let exit = handle
            .map(move |joined| match joined {
                Ok(()) => true,
                Err(e) => {
                    error!("❌ Monitor loop for release {} ended abnormally: {}", release, e);
                    false
                }
            })
            .boxed()
            .shared();
        *lifecycle = Lifecycle::Running { exit, period };
    }

    /// Cancel the loop and wait for it to exit. Safe before `start` and when
    /// called repeatedly; concurrent callers all wait for the same exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let (exit, first_stop) = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped { exit: None }) {
                Lifecycle::NotStarted => (None, false),
                Lifecycle::Running { exit, .. } => {
                    *lifecycle = Lifecycle::Stopped {
                        exit: Some(exit.clone()),
                    };
                    (Some(exit), true)
                }
                Lifecycle::Stopped { exit } => {
                    *lifecycle = Lifecycle::Stopped { exit: exit.clone() };
                    (exit, false)
                }
            }
        };

        if let Some(exit) = exit {
            exit.await;
            if first_stop {
                info!("🛑 Monitor for release {} stopped", self.core.release);
            }
        }
    }

    pub fn pause(&self) {
        let depth = self.core.pause_depth.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("⏸️  Monitor for release {} paused (depth {})", self.core.release, depth);
    }

    /// Undo one `pause`; a no-op at depth zero.
    pub fn resume(&self) {
        let _guard = self.core.pause_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self
            .core
            .pause_depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| depth.checked_sub(1));
        match previous {
            Ok(depth) => debug!("▶️  Monitor for release {} resumed (depth {})", self.core.release, depth - 1),
            Err(_) => debug!("Monitor for release {} was not paused", self.core.release),
        }
    }

    /// Sweep right now on the caller's task, regardless of the pause depth.
    /// Drift still fires the callback registered at `start`.
    ///
    /// # Errors
    ///
    /// Returns the (possibly `AbsentManifest`) sweep error, a `StatusQuery`
    /// error, or `Cancelled` when either the caller or `stop` cancels.
    pub async fn check_now(&self, cancel: &CancellationToken) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let scope = cancel.child_token();
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.core.check(&scope) => result,
        };

        if let Err(e) = &result {
            if e.is_absent_manifest() {
                if let Some(on_drift) = self.core.on_drift.get() {
                    self.core.notify_drift(&self.cancel, on_drift, e);
                }
            }
        }
        result
    }
}

impl Drop for ReleaseWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl WatcherCore {
    async fn run(self: Arc<Self>, cancel: CancellationToken, on_drift: DriftCallback, period: Duration) {
        info!(
            "🚀 Monitor for release {}/{} started (period {}s)",
            self.namespace,
            self.release,
            period.as_secs()
        );

        // Delay re-arms after a slow sweep instead of bursting missed ticks
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.tick(&cancel, &on_drift) => {}
            }
        }

        debug!("Monitor loop for release {} exited", self.release);
    }

    async fn tick(&self, cancel: &CancellationToken, on_drift: &DriftCallback) {
        let revision = match self.status.last_status(&self.namespace, &self.release).await {
            Ok(revision) => revision,
            Err(e) => {
                error!("❌ Failed to query status of release {}: {}", self.release, e);
                return;
            }
        };

        if !revision.is_deployed() {
            debug!(
                "Release {} is {:?} at revision {}, skipping sweep",
                self.release, revision.status, revision.revision
            );
            return;
        }

        if self.pause_depth.load(Ordering::Acquire) > 0 {
            debug!("Monitor for release {} is paused, skipping sweep", self.release);
            return;
        }

        match self.sweep(cancel).await {
            Ok(()) => debug!("✅ Release {} has every declared object", self.release),
            Err(e) if e.is_absent_manifest() => self.notify_drift(cancel, on_drift, &e),
            Err(e) if e.is_cancelled() => debug!("Sweep of release {} cancelled", self.release),
            Err(e) => error!("❌ Sweep of release {} failed: {}", self.release, e),
        }
    }

    async fn check(&self, scope: &CancellationToken) -> Result<()> {
        let revision = self
            .status
            .last_status(&self.namespace, &self.release)
            .await
            .map_err(|e| Error::StatusQuery {
                release: self.release.clone(),
                source: Box::new(e),
            })?;

        if !revision.is_deployed() {
            return Ok(());
        }
        self.sweep(scope).await
    }

    fn notify_drift(&self, cancel: &CancellationToken, on_drift: &DriftCallback, cause: &Error) {
        if cancel.is_cancelled() {
            return;
        }

        warn!("⚠️  Release {}/{} drifted: {}", self.namespace, self.release, cause);
        if std::panic::catch_unwind(AssertUnwindSafe(|| on_drift(self.release.as_str()))).is_err() {
            error!("❌ Drift callback for release {} panicked", self.release);
        }
    }

    /// Build the index on first use and drop the raw manifest afterwards.
    /// A failed build keeps the manifest so the next sweep retries.
    fn index(&self) -> Result<Arc<ResourceIndex>> {
        let mut slot = self.manifest.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = &slot.index {
            return Ok(index.clone());
        }

        let index = Arc::new(build_index(&slot.raw)?);
        drop(std::mem::take(&mut slot.raw));
        slot.index = Some(index.clone());

        info!(
            "📇 Indexed release {}: {} objects across {} kinds",
            self.release,
            index.object_count(),
            index.len()
        );
        Ok(index)
    }

    async fn sweep(&self, cancel: &CancellationToken) -> Result<()> {
        let index = self.index()?;
        if index.is_empty() {
            return Ok(());
        }

        // first failure cancels every probe still queued or in flight
        let scope = cancel.child_token();
        let _abort_pending = scope.clone().drop_guard();

        stream::iter(index.iter())
            .map(Ok::<_, Error>)
            .try_for_each_concurrent(self.config.workers(), |(key, expected)| {
                let scope = scope.clone();
                async move { self.probe(&scope, key, expected).await }
            })
            .await
    }

    async fn probe(
        &self,
        scope: &CancellationToken,
        key: &ResourceKey,
        expected: &BTreeSet<String>,
    ) -> Result<()> {
        if scope.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let missing = tokio::select! {
            biased;
            () = scope.cancelled() => return Err(Error::Cancelled),
            missing = self.prober.first_missing(key, expected) => missing,
        };

        match missing {
            Ok(None) => Ok(()),
            Ok(Some(name)) => {
                scope.cancel();
                Err(Error::AbsentManifest {
                    key: key.to_string(),
                    name,
                })
            }
            Err(e) => {
                scope.cancel();
                Err(e)
            }
        }
    }
}
