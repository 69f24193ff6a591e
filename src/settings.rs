use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Runtime configuration, read from the environment (after dotenv) and an
/// optional `btc-etl.toml` next to the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Postgres connection string.
    pub database_url: String,

    /// When set, a second log sink captures everything at DEBUG level.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(File::with_name("btc-etl").required(false))
            .add_source(Environment::default())
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration (is DATABASE_URL set?)")
    }
}
