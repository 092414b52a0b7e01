//! Configuration view and validation commands: `platewise config`.

use std::path::Path;

use anyhow::Result;
use console::style;
use platewise::config::PlatewiseToml;
use platewise::ui::icons::{CHECK, WARN};

use super::super::ConfigCommands;

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let mut config = PlatewiseToml::resolve(config_path)?;
            if config.llm.token.is_some() {
                config.llm.token = Some("********".to_string());
            }

            println!();
            println!("{}", style("Platewise Configuration").bold());
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No config file at {} (using defaults)", config_path.display());
            }
            println!("Effective values (with env overrides):");
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            println!();
            println!(
                "  secret_key = {}",
                if config.server.secret_key.is_some() { "set" } else { "not set (random per process)" }
            );
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = if config_path.exists() {
                PlatewiseToml::load(config_path)?
            } else {
                println!("No platewise.toml found. Using defaults.");
                PlatewiseToml::default()
            };
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("{}Configuration is valid.", CHECK);
            } else {
                println!("{}Configuration warnings:", WARN);
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }
            if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            PlatewiseToml::default().save(config_path)?;

            println!("{}Created {}", CHECK, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, db_path, session_ttl_hours");
            println!("  - [llm] endpoint, default_model, coach_model and [[llm.models]]");
            println!("  - [logging] level, json, dir");
            println!();
            println!("Secrets stay in the environment: GITHUB_TOKEN and SECRET_KEY.");
            println!();
        }
    }

    Ok(())
}
