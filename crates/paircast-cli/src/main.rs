//! Paircast CLI - Desktop-to-mobile LAN pairing from the terminal
//!
//! Paircast pairs a desktop with a mobile device over the local network
//! for clipboard sync and file drops.
//!
//! ## Quick Start
//!
//! ```bash
//! # Start a session and show the pairing QR code
//! paircast serve
//!
//! # Inspect or adjust settings
//! paircast config show
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::Parser;

mod commands;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => commands::serve::run(args).await,
        Command::Config(args) => commands::config::run(&args),
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,paircast=info,paircast_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
