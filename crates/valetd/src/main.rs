//! valetd — the Valet daemon.
//!
//! Loads `valet.toml`, opens the request/result store and serves the
//! placement REST API until interrupted.
//!
//! # Usage
//!
//! ```text
//! valetd --config /etc/valet/valet.toml --port 8080
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use valet_core::ValetConfig;
use valet_core::config::{StoreBackend, StoreConfig};
use valet_placement::PollSettings;
use valet_store::{LocalStore, MusicClient, PlacementStore};

const DEFAULT_FILTER: &str = "info,valetd=debug,valet=debug";

#[derive(Parser)]
#[command(name = "valetd", about = "Valet placement API daemon")]
struct Cli {
    /// Path to valet.toml. Defaults apply when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides `[server] port`).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ValetConfig::from_file(path)?,
        None => ValetConfig::default(),
    };

    init_tracing(config.logging.json);
    if let Some(path) = &cli.config {
        info!(path = %path.display(), "configuration loaded");
    }

    let port = cli.port.unwrap_or(config.server.port);
    run(config, port).await
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn PlacementStore>> {
    match config.backend {
        StoreBackend::Music => {
            let client = MusicClient::new(config)?;
            info!(
                keyspace = %config.keyspace,
                endpoints = client.endpoints().len(),
                "using replicated row store"
            );
            Ok(Arc::new(client))
        }
        StoreBackend::Local => {
            std::fs::create_dir_all(&config.data_dir)?;
            let path = config.data_dir.join("valet.redb");
            let store = LocalStore::open(&path)?;
            info!(path = ?path, "using local row store");
            Ok(Arc::new(store))
        }
    }
}

async fn run(config: ValetConfig, port: u16) -> anyhow::Result<()> {
    info!("Valet daemon starting");

    let store = open_store(&config.store)?;
    let settings = PollSettings::from(&config.polling);
    info!(
        wait_until = ?settings.wait_until,
        poll_every = ?settings.poll_every,
        "polling configured"
    );

    let mut state = valet_api::ApiState::new(store, settings);
    state.log_ping = config.logging.ping;
    let router = valet_api::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Valet daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            error!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    }
}
