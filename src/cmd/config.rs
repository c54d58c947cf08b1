//! Configuration view and validation commands: `recap config`.

use anyhow::{Context, Result};

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use recap::recap_config::{CONFIG_FILE, RECAP_DIR, RecapConfig, RecapToml};

    let recap_dir = project_dir.join(RECAP_DIR);
    let config_path = recap_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Recap Configuration");
            println!("===================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                RecapToml::load(&config_path)?
            } else {
                println!("No recap.toml found at {}", config_path.display());
                println!("Using default configuration:");
                RecapToml::default()
            };
            println!();
            let rendered =
                toml::to_string_pretty(&toml).context("Failed to serialize recap.toml")?;
            for line in rendered.lines() {
                println!("  {}", line);
            }
            println!();

            println!("Effective values (with env overrides):");
            let config = RecapConfig::new(project_dir.to_path_buf())?;
            println!("  model = \"{}\"", config.model());
            println!("  base_url = \"{}\"", config.toml.llm.base_url);
            println!("  budget = \"{}\"", config.budget_limit());
            println!("  port = {}", config.toml.webhook.port);
            println!(
                "  OPENAI_API_KEY = {}",
                if config.api_key.is_some() { "set" } else { "not set" }
            );
            println!(
                "  DISCORD_TOKEN = {}",
                if config.discord_token.is_some() { "set" } else { "not set" }
            );
            println!();
            if !config_path.exists() {
                println!("Run 'recap config init' to create a recap.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No recap.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = RecapToml::load(&config_path)?;
            let warnings = toml.validate();

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
                println!("recap.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !recap_dir.exists() {
                std::fs::create_dir_all(&recap_dir)?;
            }

            let toml = RecapToml::default();
            toml.save(&config_path)?;

            println!("Created recap.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [llm] base_url, model");
            println!("  - [chunking] mode, max_tokens_fraction, chunk_size");
            println!("  - [schedule] start_date, end_date, payload_file and [[schedule.weekly]] jobs");
            println!("  - [models.\"name\"] context_length for models not built in");
            println!();
        }
    }

    Ok(())
}
