//! ---
//! rda_section: "05-networking-external-interfaces"
//! rda_subsection: "binary"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Control CLI for administrators managing dashboard access."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use rda_common::config::AppConfig;
use rda_common::logging;
use rda_common::version_string;

mod lockout;
mod settings;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Dashboard access administrative control utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
    #[command(flatten)]
    global: GlobalOptions,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct GlobalOptions {
    /// Path to the configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut candidates = Vec::new();
        if let Some(path) = &self.config {
            candidates.push(path.clone());
        }
        candidates.push(PathBuf::from("configs/rda.toml"));
        candidates.push(PathBuf::from("configs/example.toml"));
        AppConfig::load(&candidates)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand, about = "Inspect and change persisted settings")]
    Settings(settings::SettingsCommand),
    #[command(about = "Check whether an operator would lock themselves out")]
    CheckLockout(lockout::CheckLockoutArgs),
}

fn main() -> Result<()> {
    logging::init_cli();
    let cli = Cli::parse();
    if cli.version {
        println!("{}", version_string());
        return Ok(());
    }
    match cli.command {
        Some(Commands::Settings(cmd)) => settings::run(cmd, &cli.global)?,
        Some(Commands::CheckLockout(args)) => lockout::run(args, &cli.global)?,
        None => println!("no command given; see --help"),
    }
    Ok(())
}
