use anyhow::Result;
use clap::Parser;
use proxypool::{Worker, WorkerConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "proxypool-worker")]
#[command(about = "proxypool worker: runs forwarded tasks and heartbeats to the manager")]
#[command(version = proxypool::VERSION)]
struct Args {
    /// TOML config file; environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Task API port, also announced to the manager (overrides WORKER_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Manager host (overrides MANAGER_HOST)
    #[arg(long)]
    manager_host: Option<String>,

    /// Manager port (overrides MANAGER_PORT)
    #[arg(long)]
    manager_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = WorkerConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.worker_port = port;
    }
    if let Some(host) = args.manager_host {
        config.manager_host = host;
    }
    if let Some(port) = args.manager_port {
        config.manager_port = port;
    }
    config.validate()?;

    tracing::info!("Starting proxypool worker {}", proxypool::VERSION);

    Worker::new(config).serve().await?;

    Ok(())
}
