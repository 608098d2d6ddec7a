//! API server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! Pricing behavior lives in `pricing.toml` (see [`crate::settings`]).

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP server port
    pub port: u16,

    /// Address to bind
    pub bind_address: String,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Explicit pricing.toml path (platform config dir otherwise)
    pub settings_path: Option<PathBuf>,

    /// Most requests accepted in one batch call
    pub max_batch_size: usize,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = ApiConfig {
            port: lookup("PRINTCOST_API_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PRINTCOST_API_PORT".to_string()))?,

            bind_address: lookup("PRINTCOST_API_BIND").unwrap_or_else(|| "127.0.0.1".to_string()),

            database_path: lookup("PRINTCOST_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./printcost_dev.db")),

            settings_path: lookup("PRINTCOST_SETTINGS").map(PathBuf::from),

            max_batch_size: lookup("PRINTCOST_MAX_BATCH_SIZE")
                .unwrap_or_else(|| "100".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PRINTCOST_MAX_BATCH_SIZE".to_string()))?,
        };

        if config.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue("PRINTCOST_MAX_BATCH_SIZE".to_string()));
        }

        Ok(config)
    }

    /// Socket address the server binds.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PRINTCOST_API_BIND".to_string()))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
