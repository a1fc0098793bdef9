//! Configuration command implementation.

use anyhow::{Context, Result};

use paircast_core::config::Config;

use super::{ConfigAction, ConfigArgs, ConfigSetArgs};

/// Run the config command.
pub fn run(args: &ConfigArgs) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show(),
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
            Ok(())
        }
        ConfigAction::Set(set_args) => set(set_args),
    }
}

fn show() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let rendered = toml::to_string_pretty(&config).context("failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

fn set(args: &ConfigSetArgs) -> Result<()> {
    let mut config = Config::load().context("failed to load configuration")?;

    if let Some(device_name) = &args.device_name {
        config.device_name.clone_from(device_name);
    }
    if let Some(sync_folder) = &args.sync_folder {
        config.sync_folder.clone_from(sync_folder);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(clipboard_sync) = args.clipboard_sync {
        config.clipboard_sync = clipboard_sync;
    }
    if let Some(auto_accept_files) = args.auto_accept_files {
        config.auto_accept_files = auto_accept_files;
    }

    config.save().context("failed to save configuration")?;
    println!("Configuration saved to {}", Config::config_path().display());
    Ok(())
}
