//! Manager binary

use clap::{Parser, Subcommand};
use proxypool::{Manager, ManagerConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "proxypool-manager")]
#[command(about = "proxypool manager: membership, proxy election and task dispatch")]
#[command(version = proxypool::VERSION)]
struct Cli {
    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the manager server
    Serve {
        /// TOML config file; environment variables override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bind host (overrides BIND_HOST)
        #[arg(long)]
        host: Option<String>,

        /// HTTP port (overrides MANAGER_PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Number of proxies to elect (overrides ELECTION_K)
        #[arg(long)]
        k: Option<usize>,
    },
    /// Print the effective configuration and exit
    Config {
        /// TOML config file; environment variables override it
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            k,
        } => {
            let mut config = ManagerConfig::load(config.as_deref())?;
            // CLI has priority over file and environment
            if let Some(host) = host {
                config.bind_host = host;
            }
            if let Some(port) = port {
                config.manager_port = port;
            }
            if let Some(k) = k {
                config.election_k = k;
            }
            config.validate()?;

            Manager::new(config)?.serve().await?;
        }
        Commands::Config { config } => {
            let config = ManagerConfig::load(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
