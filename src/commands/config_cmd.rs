use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;

use danceconnect::config::Config;

use super::OutputFormat;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("backend.kind: {}", config.backend.kind);
                        if let Some(url) = &config.backend.url {
                            println!("backend.url: {}", url);
                        }
                        println!(
                            "backend.anon_key: {}",
                            if config.backend.anon_key.is_some() {
                                "(set)"
                            } else {
                                "(not set)"
                            }
                        );
                        if !config.backend.is_configured() {
                            println!("  warning: rest backend needs url and anon_key");
                        }
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!("write_policy: {}", config.write_policy.value);
                        println!("  source: {}", config.write_policy.source);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                // Check if config already exists
                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'dc config show' to view current configuration.");
                    return Ok(());
                }

                // Create parent directory
                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                // Write default config
                let default_config = r#"# danceconnect configuration

backend:
  # memory: built-in demo backend with fixture data
  # rest: hosted backend; requires url and anon_key
  kind: memory
  # url: https://abc.example.co
  # anon_key: public-anon-key

# Directory for local storage (favorites, cached session)
# data_dir: ~/.local/share/danceconnect

# strict: mutation failures are reported to you
# optimistic: mutation failures are logged and the command stays quiet
write_policy: strict
"#;

                let mut file = fs::File::create(&config_path)?;
                file.write_all(default_config.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}
