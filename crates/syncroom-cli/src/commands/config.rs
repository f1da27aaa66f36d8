//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use syncroom_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str =
    "data_dir, relay_url, control_addr, keepalive_secs, reconnect_initial_ms, reconnect_max_secs, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "relay_url": config.relay_url,
                    "control_addr": config.control_addr,
                    "keepalive_secs": config.keepalive_secs,
                    "reconnect_initial_ms": config.reconnect_initial_ms,
                    "reconnect_max_secs": config.reconnect_max_secs,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.relay_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!("  relay_url:            {}", config.relay_url);
            println!("  control_addr:         {}", config.control_addr);
            println!("  keepalive_secs:       {}", config.keepalive_secs);
            println!("  reconnect_initial_ms: {}", config.reconnect_initial_ms);
            println!("  reconnect_max_secs:   {}", config.reconnect_max_secs);
            println!(
                "  log_file:             {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "relay_url" => {
            if !(value.starts_with("ws://") || value.starts_with("wss://")) {
                bail!("relay_url must start with ws:// or wss://");
            }
            config.relay_url = value.to_string();
        }
        "control_addr" => {
            config.control_addr = value.to_string();
        }
        "keepalive_secs" => {
            config.keepalive_secs = parse_number(key, value)?;
        }
        "reconnect_initial_ms" => {
            config.reconnect_initial_ms = parse_number(key, value)?;
        }
        "reconnect_max_secs" => {
            config.reconnect_max_secs = parse_number(key, value)?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    let number: u64 = value
        .parse()
        .with_context(|| format!("Invalid value for {}. Use a whole number.", key))?;
    if number == 0 {
        bail!("{} must be greater than zero", key);
    }
    Ok(number)
}
