use std::{io::ErrorKind, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "statement-ledger",
    about = "Replays deposits, withdrawals and transfers from CSV and prints balances"
)]
pub struct CliArgs {
    /// CSV file with `email,name` rows; missing users are registered
    pub users: PathBuf,

    /// CSV file with `type,user,receiver,amount,description` rows
    pub operations: PathBuf,

    /// Path to config file
    #[arg(short, long, default_value = "statement-ledger.toml")]
    pub config: PathBuf,

    /// SQLite database file (overrides the configured storage)
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Memory,
    Sqlite {
        path: PathBuf,
    },
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("Failed to parse config file")
    }

    /// Reads the config file (defaults when it does not exist) and applies CLI overrides.
    pub fn load(cli: &CliArgs) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Self::from_toml(&contents)
                .with_context(|| format!("Invalid config `{}`", cli.config.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => Config::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read `{}`", cli.config.display()));
            }
        };

        if let Some(path) = &cli.database {
            config.storage = StorageConfig::Sqlite { path: path.clone() };
        }
        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }
        Ok(config)
    }
}

impl LoggingConfig {
    /// Logs go to stderr; stdout carries the CSV report. `RUST_LOG` wins over `level`.
    pub fn init_tracing(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false);
        // ignore a subscriber that was already installed
        let _ = if self.json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
    }
}
