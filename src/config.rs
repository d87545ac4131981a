use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub api_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the analytics database file
    #[arg(long)]
    pub database: Option<String>,

    /// Load a JSON export into the database and exit
    #[arg(long, value_name = "FILE")]
    pub load: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder()
            .set_default("database.path", "nl-vidstats.duckdb")?
            .set_default("database.pool_size", 4)?
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 3000)?
            .set_default("llm.model", "deepseek-chat")?
            .set_default("llm.api_url", "https://api.deepseek.com/v1/chat/completions")?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-vidstats/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Credentials come from the environment, e.g. NLV__LLM__API_KEY
        config_builder =
            config_builder.add_source(Environment::with_prefix("NLV").separator("__"));

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.database.path = database.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "nl-vidstats.duckdb".to_string(),
                pool_size: 4,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                model: "deepseek-chat".to_string(),
                api_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
                api_key: None,
            },
        }
    }
}
