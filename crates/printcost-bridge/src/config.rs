//! # Bridge Configuration
//!
//! Settings shared by the host actor and the embedded calculator.
//!
//! ## Configuration File Format
//! The settings live in the `[bridge]` section of `pricing.toml`:
//! ```toml
//! [bridge]
//! allowed_schemes = ["https"]   # apiBase schemes accepted in INIT
//! channel_capacity = 32         # frames buffered per direction
//! ```
//!
//! `PRINTCOST_BRIDGE_CHANNEL_CAPACITY` overrides the capacity.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{BridgeError, BridgeResult};

/// Bridge behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// URL schemes accepted for `apiBase`.
    #[serde(default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,

    /// Frames buffered in each direction before senders wait.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

fn default_channel_capacity() -> usize {
    32
}

impl Default for BridgeSettings {
    fn default() -> Self {
        BridgeSettings {
            allowed_schemes: default_allowed_schemes(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl BridgeSettings {
    /// Parses settings from a standalone TOML document.
    pub fn from_toml_str(contents: &str) -> BridgeResult<Self> {
        let settings: BridgeSettings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.channel_capacity == 0 {
            return Err(BridgeError::InvalidConfig(
                "channel_capacity must be greater than 0".into(),
            ));
        }

        if self.allowed_schemes.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "allowed_schemes must name at least one scheme".into(),
            ));
        }

        if let Some(bad) = self
            .allowed_schemes
            .iter()
            .find(|s| s.as_str() != "http" && s.as_str() != "https")
        {
            return Err(BridgeError::InvalidConfig(format!(
                "Unsupported api base scheme '{}'. Valid options: http, https",
                bad
            )));
        }

        Ok(())
    }

    /// Applies `PRINTCOST_BRIDGE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(capacity) = std::env::var("PRINTCOST_BRIDGE_CHANNEL_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(c) => {
                    debug!(capacity = c, "Overriding bridge channel capacity from environment");
                    self.channel_capacity = c;
                }
                Err(_) => warn!(value = %capacity, "Ignoring invalid bridge channel capacity"),
            }
        }
    }

    /// Checks that `api_base` is an absolute URL with an allowed scheme.
    pub fn check_api_base(&self, api_base: &str) -> BridgeResult<Url> {
        let url = Url::parse(api_base)?;

        if !self.allowed_schemes.iter().any(|s| s == url.scheme()) {
            return Err(BridgeError::InvalidUrl(format!(
                "scheme '{}' not allowed for {}",
                url.scheme(),
                api_base
            )));
        }

        if url.host_str().is_none() {
            return Err(BridgeError::InvalidUrl(format!("{} has no host", api_base)));
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.channel_capacity, 32);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_section() {
        let settings = BridgeSettings::from_toml_str("allowed_schemes = [\"https\"]").unwrap();
        assert_eq!(settings.allowed_schemes, vec!["https".to_string()]);
        assert_eq!(settings.channel_capacity, 32);
    }

    #[test]
    fn test_validation() {
        let mut settings = BridgeSettings::default();
        settings.channel_capacity = 0;
        assert!(settings.validate().is_err());

        let mut settings = BridgeSettings::default();
        settings.allowed_schemes = vec!["ftp".into()];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_check_api_base() {
        let settings = BridgeSettings::default();
        assert!(settings.check_api_base("https://shop.example/bitrix/api").is_ok());
        assert!(settings.check_api_base("/relative/path").is_err());
        assert!(settings.check_api_base("ftp://files.example").is_err());

        let strict = BridgeSettings {
            allowed_schemes: vec!["https".into()],
            ..Default::default()
        };
        assert!(strict.check_api_base("http://shop.example").is_err());
    }
}
