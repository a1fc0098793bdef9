//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod config;
pub mod serve;

/// Load configuration with graceful fallback to defaults.
///
/// If the config file doesn't exist or can't be parsed, commands run
/// with defaults rather than refusing to start.
pub fn load_config() -> paircast_core::config::Config {
    paircast_core::config::Config::load().unwrap_or_default()
}

/// Paircast - Desktop-to-mobile LAN pairing
#[derive(Parser)]
#[command(name = "paircast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Start a pairing session and wait for the mobile peer
    Serve(ServeArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Parser)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Destination folder for received files (overrides config)
    #[arg(short, long)]
    pub folder: Option<PathBuf>,

    /// Start with clipboard sync disabled
    #[arg(long)]
    pub no_clipboard: bool,

    /// Print the invite as a JSON line instead of a QR code
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// The config action to perform
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the active configuration
    Show,

    /// Print the config file path
    Path,

    /// Change one or more settings
    Set(ConfigSetArgs),
}

/// Settings accepted by `config set`
#[derive(Parser)]
pub struct ConfigSetArgs {
    /// Display name announced to the peer
    #[arg(long)]
    pub device_name: Option<String>,

    /// Destination folder for received files
    #[arg(long)]
    pub sync_folder: Option<PathBuf>,

    /// Listening port
    #[arg(long)]
    pub port: Option<u16>,

    /// Enable or disable clipboard sync
    #[arg(long)]
    pub clipboard_sync: Option<bool>,

    /// Accept incoming files without prompting
    #[arg(long)]
    pub auto_accept_files: Option<bool>,
}
