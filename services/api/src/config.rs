//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use study_tracker_core::edit_window::DEFAULT_EDIT_WINDOW_MINUTES;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Directory holding the mirror store's JSON documents.
    pub mirror_dir: PathBuf,
    /// Linked as the external backup directory at boot when none is stored yet.
    pub backup_dir: Option<PathBuf>,
    pub edit_window_minutes: i64,
    pub allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://study_tracker.db?mode=rwc".to_string());
        if !database_url.starts_with("sqlite:") {
            return Err(ConfigError::InvalidValue(
                "DATABASE_URL".to_string(),
                format!("'{}' is not a sqlite URL", database_url),
            ));
        }

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Storage Tier Settings ---
        let mirror_dir = lookup("MIRROR_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./mirror"));
        let backup_dir = lookup("BACKUP_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let edit_window_minutes = match lookup("EDIT_WINDOW_MINUTES") {
            None => DEFAULT_EDIT_WINDOW_MINUTES,
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|minutes| *minutes >= 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "EDIT_WINDOW_MINUTES".to_string(),
                        format!("'{}' is not a non-negative number of minutes", raw),
                    )
                })?,
        };

        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            mirror_dir,
            backup_dir,
            edit_window_minutes,
            allowed_origin,
        })
    }
}
