//! Detection relay service binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use relay_core::detector::DetectorKind;
use relay_server::config::ServerConfig;
use relay_server::routes::router;
use relay_server::state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time detection relay and telemetry service")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// File the latest metrics snapshot is persisted to
    #[arg(long, default_value = "metrics.json")]
    metrics_path: PathBuf,

    /// Maximum retained frame samples before the oldest are evicted
    #[arg(long, default_value = "10000")]
    metrics_retention: usize,

    /// Detector strategy: "color" or "null"
    #[arg(long, default_value = "color")]
    detector: DetectorKind,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = ServerConfig {
        metrics_path: args.metrics_path,
        metrics_retention: args.metrics_retention,
        detector: args.detector,
    };
    let state = AppState::new(config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(addr = %args.bind, detector = ?args.detector, "relay server listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
