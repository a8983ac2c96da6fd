use anyhow::Context;
use clap::Parser;
use release_monitor::k8s::cache::{ApiServerCache, MetadataCache};
use release_monitor::k8s::helm_storage::{HelmStorage, StorageDriver};
use release_monitor::k8s::{USER_AGENT, client};
use release_monitor::monitor::{DriftCallback, MonitorRegistry, WatcherContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace the release is installed in
    #[arg(short, long)]
    namespace: String,

    /// Release name
    #[arg(short, long)]
    release: String,

    /// Rendered manifest of the release (multi-document YAML)
    #[arg(short, long)]
    manifest: PathBuf,

    /// Helm storage driver holding release records
    #[arg(long, default_value = "secret")]
    driver: StorageDriver,

    /// Seconds an object list stays cached
    #[arg(long, default_value_t = release_monitor::k8s::cache::config::DEFAULT_LIST_TTL_SECS)]
    cache_ttl: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("release_monitor=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let manifest = std::fs::read_to_string(&args.manifest)
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;

    let client = client::new(Some(USER_AGENT))
        .await
        .context("creating Kubernetes client")?;

    let cache = Arc::new(MetadataCache::with_ttl(
        Arc::new(ApiServerCache::new(client.clone())),
        Duration::from_secs(args.cache_ttl),
    ));
    let status = Arc::new(HelmStorage::new(client, args.driver));

    let on_drift: DriftCallback = Arc::new(|release: &str| {
        warn!("🚨 Release {} is missing declared resources, an upgrade is required", release);
    });
    let registry = MonitorRegistry::new(WatcherContext::new(cache, status), on_drift);

    registry.add(&args.namespace, &args.release, manifest).await;
    info!(
        "👀 Watching release {}/{} (storage driver {})",
        args.namespace, args.release, args.driver
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    info!("Shutting down");
    registry.stop_all().await;
    Ok(())
}
