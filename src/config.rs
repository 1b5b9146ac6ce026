use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::engine::policy::ModerationPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // Populated from the .env file
    pub database_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub trusted_gateway_ips: String,
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub moderation: ModerationPolicy,
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;
        Self::from_current_env()
    }

    /// Builds the configuration from variables already in the process environment.
    pub fn from_current_env() -> Result<Self, config::ConfigError> {
        let database_path = env::var("DATABASE_PATH").map_err(|_| {
            config::ConfigError::Message(
                "FATAL: Environment variable 'DATABASE_PATH' is not set in your .env file.".to_string(),
            )
        })?;
        if Path::new(&database_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'DATABASE_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                database_path
            )));
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let trusted_gateway_ips = env::var("TRUSTED_GATEWAY_IPS").unwrap_or_else(|_| "*".to_string());
        let sweep_interval_secs = match env::var("SWEEP_INTERVAL_SECS") {
            Ok(raw) => raw.parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
                config::ConfigError::Message(format!(
                    "FATAL: 'SWEEP_INTERVAL_SECS' must be a positive number of seconds, got '{}'.",
                    raw
                ))
            })?,
            Err(_) => 300,
        };

        config::Config::builder()
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8080)?
            // Base settings (web host/port, [moderation] policy) from the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml).required(false))
            .set_override("database_path", database_path)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("trusted_gateway_ips", trusted_gateway_ips)?
            .set_override("sweep_interval_secs", sweep_interval_secs as i64)?
            .build()?
            .try_deserialize()
    }

    /// Full path of the moderation database file.
    pub fn moderation_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("moderation").join("moderation.db")
    }
}
