use crate::error::Result;
use hyper::http::{HeaderName, HeaderValue};
use kube::{Client, Config};
use tracing::warn;

/// Create a client for the cluster inferred from the environment
/// (in-cluster service account first, then kubeconfig).
///
/// # Errors
///
/// Will return `Err` if no cluster configuration can be inferred or the
/// client cannot be built from it.
pub async fn new(user_agent: Option<&str>) -> Result<Client> {
    let mut config = Config::infer().await?;
    if let Some(user_agent) = user_agent {
        add_user_agent_header(&mut config, user_agent);
    }
    Ok(Client::try_from(config)?)
}

/// Append a `user-agent` header; an invalid value leaves kube's default in place.
pub fn add_user_agent_header(config: &mut Config, user_agent: &str) {
    match HeaderValue::from_str(user_agent) {
        Ok(value) => config
            .headers
            .push((HeaderName::from_static("user-agent"), value)),
        Err(e) => warn!("⚠️ Ignoring invalid user agent {:?}: {}", user_agent, e),
    }
}
