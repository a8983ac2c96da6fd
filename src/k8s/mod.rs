pub mod cache;
pub mod client;
pub mod helm_storage;

/// Default user agent, derived from the package name and version.
///
/// All API clients should be created with `client::new(Some(USER_AGENT))` so
/// monitor traffic is identifiable in API server audit logs.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
