mod api;
mod collector;
mod config;
mod consensus;
mod descriptor;
mod encoding;
mod error;
mod extract;
mod models;
mod scheduler;
mod state;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::ApiState;
use crate::config::{load_config, AppConfig};
use crate::scheduler::Monitor;
use crate::state::SnapshotStore;

/// CLI arguments
#[derive(Parser)]
#[command(name = "pool-watch", about = "Mining pool height consensus monitor")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// IP address to bind the server to
    #[arg(long)]
    listen_ip: Option<String>,

    /// Port to bind the server to
    #[arg(long)]
    port: Option<u16>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Cli::parse();
    let mut config: AppConfig = load_config(&args.config)?;

    // CLI flags win over the TOML file
    if let Some(ip) = args.listen_ip {
        config.server.listen_ip = Some(ip);
    }
    if let Some(port) = args.port {
        config.server.port = Some(port);
    }
    let addr = config.listen_addr()?;

    let store = Arc::new(SnapshotStore::new());
    let monitor = Arc::new(Monitor::new(config.pools.clone(), store.clone())?);

    if let Err(e) = monitor.bootstrap().await {
        error!("Failed to fetch pool list: {}", e);
        return Err(e.into());
    }

    let poll_loop = monitor.clone().spawn_poll_loop();
    let descriptor_loop = monitor.spawn_descriptor_loop();

    let app = api::router(ApiState {
        store,
        max_divergence: config.pools.max_divergence,
    });

    info!("Server running on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poll_loop.abort();
    descriptor_loop.abort();
    Ok(())
}
