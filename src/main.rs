//! repkg - on-demand cache/proxy for an npm-compatible package registry.

use clap::Parser;
use repkg::{RepkgConfig, RepkgError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "repkg",
    version,
    about = "On-demand cache/proxy for an npm-compatible package registry"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the configuration file)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Upstream registry base URL (overrides the configuration file)
    #[arg(short, long)]
    registry: Option<String>,

    /// Cache root directory (overrides the configuration file)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), RepkgError> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("repkg=info"),
        1 => EnvFilter::new("repkg=debug"),
        _ => EnvFilter::new("repkg=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => RepkgConfig::load(path)?,
        None => RepkgConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(registry) = cli.registry {
        config.registry.base_url = registry;
    }
    if let Some(root) = cli.root {
        config.cache.root_dir = root;
    }
    config.validate()?;

    repkg::server::serve(config).await
}
