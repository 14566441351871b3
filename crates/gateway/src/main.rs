//! stash gateway - multi-tenant resource storage behind per-key buckets
//!
//! Serves the resource API over HTTP and sweeps expired per-request keys in
//! the background.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use service::http::{run_api, Config as HttpConfig};
use service::config::BlobStoreConfig;
use service::{Config, ServiceState};

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const DELEGATION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// stash gateway - multi-tenant resource storage and access control
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a stash.toml config file
    #[arg(short, long, env = "STASH_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on for HTTP requests, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a local blob storage directory, overrides the config file
    #[arg(short, long)]
    blobs: Option<PathBuf>,

    /// Secret bucket ids are derived with, overrides the config file
    #[arg(long, env = "STASH_BUCKET_SECRET", hide_env_values = true)]
    bucket_secret: Option<String>,

    /// Log level (error, warn, info, debug, trace), overrides the config file
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(port) = self.port {
            config.listen_addr = SocketAddr::new(config.listen_addr.ip(), port);
        }
        if let Some(path) = self.blobs {
            config.blob_store = BlobStoreConfig::Local { path };
        }
        if let Some(secret) = self.bucket_secret {
            config.bucket_secret = secret;
        }
        if let Some(level) = self.log_level {
            config.log_level = level
                .parse()
                .with_context(|| format!("invalid log level: {}", level))?;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stdout_layer).init();

    let build = common::prelude::build_info();
    tracing::info!(
        version = build.version,
        build_profile = build.build_profile,
        "Starting stash gateway"
    );

    // Create state
    let state = match ServiceState::from_config(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to create service state: {}", e);
            std::process::exit(1);
        }
    };

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let graceful_shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {}", e);
        }
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    };
    tokio::spawn(graceful_shutdown);

    // Sweep expired per-request keys
    let delegations = state.delegations().clone();
    let mut sweep_rx = shutdown_rx.clone();
    let sweep_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(DELEGATION_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = delegations.sweep_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = delegations.len(), "swept expired per-request keys");
                    }
                }
                _ = sweep_rx.changed() => break,
            }
        }
    });

    run_api(HttpConfig::from(&config), state, shutdown_rx).await?;

    // Wait for the sweeper to stop
    let _ = tokio::time::timeout(FINAL_SHUTDOWN_TIMEOUT, sweep_handle).await;

    tracing::info!("Gateway shutdown complete");
    Ok(())
}
