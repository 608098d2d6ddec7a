//! # Pricing Settings
//!
//! Rounding, currency and retry behavior of the calculation service.
//!
//! ## Configuration File Format
//! ```toml
//! # pricing.toml
//! default_currency = "RUB"
//!
//! [rounding]
//! increment = "0.01"              # totals and displayed line totals
//! unit_price_increment = "0.0001" # unit prices after conversion
//!
//! [[rates]]
//! from = "USD"
//! to = "RUB"
//! rate = "92.50"
//!
//! [retry]
//! initial_backoff_ms = 100
//! max_backoff_ms = 2000
//! max_elapsed_ms = 10000
//!
//! [bridge]
//! allowed_schemes = ["https"]
//! channel_capacity = 32
//! ```
//!
//! ## Load Order (later overrides earlier)
//! 1. Default values
//! 2. `pricing.toml` (explicit path, else the platform config directory)
//! 3. `PRINTCOST_*` environment variables

use std::path::PathBuf;
use std::time::Duration;

use backoff::ExponentialBackoff;
use printcost_bridge::{BridgeError, BridgeSettings};
use printcost_core::pricing::ConversionRate;
use printcost_core::{ConversionTable, Currency, PricingResolver, RoundingPolicy, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// Errors
// =============================================================================

/// Settings loading and validation errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),

    #[error("Invalid pricing settings: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid bridge settings: {0}")]
    Bridge(#[from] BridgeError),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

// =============================================================================
// Retry Settings
// =============================================================================

/// Backoff for retryable persistence failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Total time spent retrying one load before giving up.
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_ms: u64,
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    2_000
}

fn default_max_elapsed() -> u64 {
    10_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_elapsed_ms: default_max_elapsed(),
        }
    }
}

impl RetrySettings {
    /// Creates the exponential backoff configuration.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_backoff_ms),
            max_interval: Duration::from_millis(self.max_backoff_ms),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_millis(self.max_elapsed_ms)),
            ..Default::default()
        }
    }
}

// =============================================================================
// Pricing Settings
// =============================================================================

/// Everything the service needs to price a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    #[serde(default)]
    pub rounding: RoundingPolicy,

    /// Currency used when a request names none.
    #[serde(default = "default_currency")]
    pub default_currency: Currency,

    /// Declared conversion rates. Only same-currency prices resolve
    /// without them.
    #[serde(default)]
    pub rates: Vec<ConversionRate>,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub bridge: BridgeSettings,
}

fn default_currency() -> Currency {
    Currency::default()
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            rounding: RoundingPolicy::default(),
            default_currency: default_currency(),
            rates: Vec::new(),
            retry: RetrySettings::default(),
            bridge: BridgeSettings::default(),
        }
    }
}

impl PricingSettings {
    /// Loads settings from file, environment, and defaults.
    pub fn load(settings_path: Option<PathBuf>) -> SettingsResult<Self> {
        let mut settings = Self::default();

        if let Some(path) = settings_path.or_else(Self::default_settings_path) {
            if path.exists() {
                info!(?path, "Loading pricing settings from file");
                let contents = std::fs::read_to_string(&path)?;
                settings = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Settings file not found, using defaults");
            }
        }

        settings.apply_env_overrides();
        settings.validate()?;

        Ok(settings)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> SettingsResult<Self> {
        let settings: PricingSettings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings.
    pub fn validate(&self) -> SettingsResult<()> {
        self.rounding.validate()?;
        self.conversion_table()?;
        self.bridge.validate()?;

        if self.retry.initial_backoff_ms == 0 {
            return Err(SettingsError::Invalid(
                "retry.initial_backoff_ms must be greater than 0".into(),
            ));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(SettingsError::Invalid(
                "retry.max_backoff_ms must not be below retry.initial_backoff_ms".into(),
            ));
        }

        Ok(())
    }

    /// Applies `PRINTCOST_*` environment overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(code) = std::env::var("PRINTCOST_DEFAULT_CURRENCY") {
            match code.parse::<Currency>() {
                Ok(currency) => {
                    debug!(currency = %currency, "Overriding default currency from environment");
                    self.default_currency = currency;
                }
                Err(e) => warn!(value = %code, error = %e, "Ignoring invalid default currency"),
            }
        }

        if let Ok(increment) = std::env::var("PRINTCOST_ROUNDING_INCREMENT") {
            match increment.parse::<Decimal>() {
                Ok(value) => {
                    debug!(increment = %value, "Overriding rounding increment from environment");
                    self.rounding.increment = value;
                }
                Err(_) => warn!(value = %increment, "Ignoring invalid rounding increment"),
            }
        }

        if let Ok(elapsed) = std::env::var("PRINTCOST_RETRY_MAX_ELAPSED_MS") {
            if let Ok(ms) = elapsed.parse::<u64>() {
                self.retry.max_elapsed_ms = ms;
            }
        }

        self.bridge.apply_env_overrides();
    }

    /// Returns the default settings file path.
    fn default_settings_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "printcost", "printcost")
            .map(|dirs| dirs.config_dir().join("pricing.toml"))
    }

    /// Builds the conversion table from the declared rates.
    pub fn conversion_table(&self) -> Result<ConversionTable, ValidationError> {
        ConversionTable::from_rates(&self.rates)
    }

    /// Builds the resolver the engine prices with.
    pub fn pricing_resolver(&self) -> Result<PricingResolver, ValidationError> {
        Ok(PricingResolver::new(self.conversion_table()?, self.rounding))
    }
}
