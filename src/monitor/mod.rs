/**
 * Release resource monitoring
 *
 * A release manifest is indexed once per watcher into `(group, version, kind,
 * namespace) -> names`. Each registered release gets a watcher whose loop
 * sweeps that index against the shared object cache and reports the first
 * declared object it cannot find.
 */
pub mod config;
pub mod index;
pub mod prober;
pub mod registry;
pub mod status;
pub mod watcher;

#[cfg(test)]
pub(crate) mod fakes;

pub use config::MonitorConfig;
pub use index::{ResourceIndex, ResourceKey, build_index};
pub use prober::Prober;
pub use registry::MonitorRegistry;
pub use status::{ReleaseChecksum, ReleaseRevision, ReleaseStatus};
pub use watcher::{DriftCallback, LifecycleState, ReleaseWatcher, WatcherContext};
