//! rpipe — stream stdin over HTTP into a shell command running on rpiped.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rpipe_client::{parse_extra_headers, Session, Streamer};

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Stream stdin over HTTP into a command running on a rpiped server"
)]
struct Args {
    /// Base URL of the rpiped server.
    #[arg(long)]
    url: String,

    /// Shell command the server will run.
    #[arg(long)]
    command: String,

    /// Extra headers applied to every request, as comma-separated k=v pairs.
    #[arg(long, default_value = "")]
    headers: String,

    /// Chunk size in megabytes.
    #[arg(long, default_value_t = 10)]
    chunk_size: usize,

    /// Resume an existing job instead of starting a new one.
    #[arg(long)]
    resume_job_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Progress goes to stderr; stdin carries the payload.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    reqwest::Url::parse(&args.url).context("--url must be an absolute URL")?;
    anyhow::ensure!(!args.command.trim().is_empty(), "invalid command");
    anyhow::ensure!(
        args.chunk_size >= 1,
        "--chunk-size must be at least 1 (megabytes)"
    );
    let extra_headers = parse_extra_headers(&args.headers)?;

    let session = Session::new(&args.url, extra_headers)?;
    let streamer = Streamer::new(session, args.chunk_size * rpipe_protocol::MEBIBYTE);
    streamer
        .run(
            tokio::io::stdin(),
            &args.command,
            args.resume_job_id.as_deref(),
        )
        .await?;
    Ok(())
}
