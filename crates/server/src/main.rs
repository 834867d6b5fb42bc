//! rpiped — the remote pipe daemon.
//!
//! Serves the job API on `--bind` and the metrics/debug endpoints on a
//! separate `--metrics` listener, so a long-running upload can never
//! starve observability. SIGINT drops both listeners; in-flight jobs are
//! not drained.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rpipe_server::AppState;

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Remote pipe daemon: runs shell commands fed by rpipe clients"
)]
struct Args {
    /// Listen address for rpipe jobs.
    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Listen address for metrics and debug endpoints.
    #[arg(long, default_value = "0.0.0.0:2100")]
    metrics: SocketAddr,

    /// HTTP timeout applied uniformly to the job API, e.g. "500ms" or
    /// "30s". Zero means none, the normal operating mode (used primarily
    /// for testing connection breakages).
    #[arg(long, default_value = "0s")]
    timeout: humantime::Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    rpipe_server::init_metrics();

    let state = AppState::new();
    let timeout: Duration = *args.timeout;
    let jobs = rpipe_server::job_api(state.clone(), (!timeout.is_zero()).then_some(timeout));
    let observability = rpipe_server::observability_api(state);

    let job_listener = TcpListener::bind(args.bind).await?;
    let metrics_listener = TcpListener::bind(args.metrics).await?;
    info!(addr = %args.bind, "listening for rpipe jobs");
    info!(addr = %args.metrics, "listening for metrics and debug");

    tokio::select! {
        result = axum::serve(job_listener, jobs).into_future() => result?,
        result = axum::serve(metrics_listener, observability).into_future() => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupt signal caught, shutting down"),
    }

    Ok(())
}
