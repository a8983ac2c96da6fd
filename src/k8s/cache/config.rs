/**
 * Configuration constants for the shared object caches
 */
/// How long a list result stays fresh in the `MetadataCache`
pub const DEFAULT_LIST_TTL_SECS: u64 = 30;

/// Upper bound on remembered list queries before the oldest is evicted
pub const DEFAULT_MAX_CACHED_QUERIES: usize = 1024;

/// Validate configuration constants at compile time
const _: () = {
    assert!(DEFAULT_LIST_TTL_SECS > 0, "DEFAULT_LIST_TTL_SECS must be greater than 0");
    assert!(DEFAULT_MAX_CACHED_QUERIES > 0, "DEFAULT_MAX_CACHED_QUERIES must be greater than 0");
};
