//! ---
//! rda_section: "01-core-functionality"
//! rda_subsection: "binary"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Binary entrypoint for the dashboard access daemon."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{ArgAction, Parser};
use rda_api::{spawn_api_server, Runtime};
use rda_common::config::AppConfig;
use rda_common::logging::init_tracing;
use rda_common::version_string;
use tokio::signal;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Dashboard access daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "ADDR", help = "Override the API listen address")]
    listen: Option<SocketAddr>,

    #[arg(
        long,
        help = "Run the legacy settings migration and exit without serving the API"
    )]
    migrate_only: bool,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", version_string());
        return Ok(());
    }

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/rda.toml"));
    candidates.push(PathBuf::from("configs/example.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(listen) = cli.listen {
        config.api.listen = listen;
    }
    init_tracing("rdad", &config.logging)?;
    info!(
        config_path = %loaded.source.display(),
        elapsed_ms = load_started.elapsed().as_millis() as u64,
        "configuration loaded"
    );

    let runtime = Runtime::from_config(&config)?;
    if cli.migrate_only {
        info!(capability = %runtime.resolver.capability(), "settings initialised; exiting");
        return Ok(());
    }

    if !config.api.enabled {
        info!("api server disabled by configuration; nothing left to run");
        return Ok(());
    }

    let server = spawn_api_server(Arc::new(runtime.into_state()), config.api.listen)?;
    info!(address = %server.addr(), "daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    server.shutdown().await?;

    Ok(())
}
