//! syncroom CLI
//!
//! Command-line interface and daemon for syncroom - synchronized media
//! playback across a room.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use syncroom_core::Config;

mod client;
mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "syncroom")]
#[command(about = "syncroom - Watch media in sync with a room")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync daemon in the foreground
    Daemon,
    /// Host a room (a random id is generated if none is given)
    Create {
        /// Room id
        room: Option<String>,
    },
    /// Join a room as a viewer
    Join {
        /// Room id (case-insensitive)
        room: String,
    },
    /// Leave the current room
    Leave,
    /// Show the daemon's room status
    Status,
    /// Send a URL to every viewer in the hosted room
    Broadcast {
        /// Media URL
        url: String,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (relay_url, control_addr, data_dir, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Commands that don't need a loaded config
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;

    let is_daemon = matches!(cli.command, Commands::Daemon);
    init_logging(&config, if is_daemon { "info" } else { "warn" });

    match cli.command {
        Commands::Daemon => commands::daemon::run(&config).await,
        Commands::Create { room } => commands::room::create(&config, room, &output).await,
        Commands::Join { room } => commands::room::join(&config, room, &output).await,
        Commands::Leave => commands::room::leave(&config, &output).await,
        Commands::Status => commands::status::show(&config, &output).await,
        Commands::Broadcast { url } => commands::room::broadcast(&config, url, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// SYNCROOM_LOG takes an EnvFilter directive and overrides `default_level`.
/// Logs go to `config.log_file` when set, stderr otherwise.
fn init_logging(config: &Config, default_level: &str) {
    let env_filter = EnvFilter::try_from_env("SYNCROOM_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "syncroom_core={},syncroom_cli={}",
            default_level, default_level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    match &config.log_file {
        Some(log_path) => match File::create(log_path) {
            Ok(log_file) => {
                let _ = builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(log_file))
                    .try_init();
            }
            Err(e) => {
                eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
                let _ = builder.with_writer(std::io::stderr).try_init();
            }
        },
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}
