/**
 * Configuration constants for release watchers
 */
use std::time::Duration;

/// Base period between two sweeps of one release
pub const SCAN_INTERVAL: Duration = Duration::from_secs(240);

/// Upper bound of the random delay added to the period once per watcher start
pub const MAX_JITTER: Duration = Duration::from_secs(60);

/// Number of concurrent existence probes per sweep
pub const PROBE_WORKERS: usize = 5;

/// Status string reported for a release whose latest revision is deployed
pub const DEPLOYED_STATUS: &str = "deployed";

/// Tunables shared by every watcher of a registry
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Base period between sweeps
    pub scan_interval: Duration,
    /// Jitter ceiling; zero disables jitter
    pub max_jitter: Duration,
    /// Probe fan-out per sweep
    pub probe_workers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scan_interval: SCAN_INTERVAL,
            max_jitter: MAX_JITTER,
            probe_workers: PROBE_WORKERS,
        }
    }
}

impl MonitorConfig {
    /// Draw the effective period for one watcher: `scan_interval` plus a uniform
    /// jitter in `[0, max_jitter]`.
    #[must_use]
    pub fn jittered_period(&self) -> Duration {
        use rand::Rng;

        let ceiling = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = rand::thread_rng().gen_range(0..=ceiling);
        self.scan_interval + Duration::from_millis(jitter)
    }

    /// Fan-out actually used by a sweep; never zero
    #[must_use]
    pub fn workers(&self) -> usize {
        self.probe_workers.max(1)
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(SCAN_INTERVAL.as_secs() > 0, "SCAN_INTERVAL must be greater than 0");
    assert!(PROBE_WORKERS > 0, "PROBE_WORKERS must be greater than 0");
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jittered_period_stays_in_bounds() {
        let config = MonitorConfig::default();
        for _ in 0..100 {
            let period = config.jittered_period();
            assert!(period >= SCAN_INTERVAL);
            assert!(period <= SCAN_INTERVAL + MAX_JITTER);
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let config = MonitorConfig {
            max_jitter: Duration::ZERO,
            ..MonitorConfig::default()
        };
        assert_eq!(config.jittered_period(), SCAN_INTERVAL);
    }

    #[test]
    fn test_workers_never_zero() {
        let config = MonitorConfig {
            probe_workers: 0,
            ..MonitorConfig::default()
        };
        assert_eq!(config.workers(), 1);
    }
}
