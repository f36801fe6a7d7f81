//! Queueline Backup Server
//!
//! A small file-serving process behind the queue-ticketing pages: it
//! mirrors the credential collection and per-queue state documents as
//! pretty-printed JSON files, serves the static front-end assets, and
//! sweeps queues that have been inactive for more than a day.

mod cleanup;
mod config;
mod error;
mod handlers;
mod server;
mod storage;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "queueline-server", about = "Queueline backup/document server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "queueline.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Data directory override
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Static assets directory override
    #[arg(short, long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        config::ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        config::ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(data_dir) = cli.data_dir {
        cfg.data_dir = data_dir;
    }
    if let Some(static_dir) = cli.static_dir {
        cfg.static_dir = static_dir;
    }

    tracing::info!("Starting Queueline server on {}", cfg.listen_addr);

    let store = storage::DocumentStore::open(&cfg.data_dir)?;
    let cleanup_handle = cleanup::CleanupHandle::new(
        store.clone(),
        cfg.retention_secs,
        cfg.sweep_interval_secs,
    );
    cleanup::spawn_cleanup_task(cleanup_handle.clone());

    let state = handlers::AppState {
        store,
        cleanup: cleanup_handle,
    };
    let app = server::build_router(state, &cfg);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
