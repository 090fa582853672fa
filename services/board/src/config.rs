//! services/board/src/config.rs
//!
//! Defines the board's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where notes are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store: StoreBackend,
    pub log_level: Level,
    pub page_size: usize,
    pub image_bucket_path: PathBuf,
    pub public_base_url: String,
    pub local_storage_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server ---
        let bind_address: SocketAddr =
            parse_or("BIND_ADDRESS", lookup("BIND_ADDRESS"), "127.0.0.1:3000")?;

        // --- Store ---
        let backend = lookup("STORE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let store = match backend.to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres {
                database_url: lookup("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Board behaviour ---
        let page_size: usize = parse_or("PAGE_SIZE", lookup("PAGE_SIZE"), "8")?;
        if page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Local files ---
        let image_bucket_path = lookup("IMAGE_BUCKET_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./bucket"));
        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{}", bind_address))
            .trim_end_matches('/')
            .to_string();
        let local_storage_path = lookup("LOCAL_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.secretboard/local_storage.json"));

        Ok(Self {
            bind_address,
            store,
            log_level,
            page_size,
            image_bucket_path,
            public_base_url,
            local_storage_path,
        })
    }
}

fn parse_or<T>(name: &str, value: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = value.unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
