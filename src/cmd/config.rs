//! Configuration view and validation commands — `fieldsync config`.

use anyhow::Result;
use std::path::Path;

use fieldsync::config::{CONFIG_FILE, ENV_TOKEN, FieldsyncToml};

use super::load_config;
use crate::{Cli, ConfigCommands};

fn print_toml(toml: &FieldsyncToml) {
    println!("[gateway]");
    if let Some(url) = &toml.gateway.base_url {
        println!("  base_url = \"{}\"", url);
    }
    if let Some(collection) = &toml.gateway.collection {
        println!("  collection = \"{}\"", collection);
    }
    if let Some(tenant) = &toml.gateway.tenant {
        println!("  tenant = \"{}\"", tenant);
    }
    println!("  timeout_secs = {}", toml.gateway.timeout_secs);
    println!();
    println!("[autosave]");
    println!("  base_delay_ms = {}", toml.autosave.base_delay_ms);
    println!("  min_new_field_delay_ms = {}", toml.autosave.min_new_field_delay_ms);
    println!();
    println!("[cache]");
    println!("  field_types_ttl_secs = {}", toml.cache.field_types_ttl_secs);
    println!();
}

pub fn cmd_config(project_dir: &Path, cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    let config = load_config(project_dir, cli)?;
    let config_path = config.config_path();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Fieldsync Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No {} found at {}", CONFIG_FILE, config_path.display());
                println!("Using default configuration:");
            }
            println!();
            print_toml(&config.toml);

            println!("Effective values (with env/CLI overrides):");
            println!(
                "  base_url = {}",
                config.base_url().as_deref().unwrap_or("(not set)")
            );
            println!(
                "  collection = {}",
                config.collection().as_deref().unwrap_or("(not set)")
            );
            println!("  tenant = {}", config.tenant().as_deref().unwrap_or("(not set)"));
            println!(
                "  token = {}",
                if config.token().is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            let autosave = config.autosave();
            println!("  base_delay = {:?}", autosave.base_delay);
            println!("  min_new_field_delay = {:?}", autosave.min_new_field_delay);
            println!();
            if !config_path.exists() {
                println!("Run 'fieldsync config init' to create a {} file.", CONFIG_FILE);
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists at {}", CONFIG_FILE, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !config.config_dir.exists() {
                std::fs::create_dir_all(&config.config_dir)?;
            }

            FieldsyncToml::default().save(&config_path)?;

            println!("Created {} at {}", CONFIG_FILE, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [gateway] base_url, collection, tenant, timeout_secs");
            println!("  - [autosave] base_delay_ms, min_new_field_delay_ms");
            println!("  - [cache] field_types_ttl_secs");
            println!();
            println!("Set the API token with {} (or in .env).", ENV_TOKEN);
            println!();
        }
    }

    Ok(())
}
