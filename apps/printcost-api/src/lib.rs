//! # PrintCost API
//!
//! HTTP surface of the print cost calculator, and the backend the embedded
//! calculator's bridge session runs against.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PrintCost API                                  │
//! │                                                                         │
//! │  ┌────────────────┐  ┌──────────────────────┐  ┌─────────────────────┐  │
//! │  │  routes        │  │  CalculationService  │  │  printcost-db       │  │
//! │  │                │  │                      │  │                     │  │
//! │  │ • calculate    │─►│ • snapshot + retry   │─►│ • CatalogRepository │  │
//! │  │ • batch        │  │ • JoinSet batches    │  │ • OfferConfigRepo   │  │
//! │  │ • offer config │  │ • CalculationBackend │  │                     │  │
//! │  └────────────────┘  └──────────┬───────────┘  └─────────────────────┘  │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │                      printcost-core CalculationEngine                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `PRINTCOST_API_PORT` - HTTP port (default: 8080)
//! - `PRINTCOST_API_BIND` - Bind address (default: 127.0.0.1)
//! - `PRINTCOST_DB_PATH` - SQLite file (default: ./printcost_dev.db)
//! - `PRINTCOST_SETTINGS` - pricing.toml path (default: platform config dir)
//! - `PRINTCOST_MAX_BATCH_SIZE` - Requests per batch call (default: 100)
//! - `RUST_LOG` - Log filter (default: info)

pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use service::{BatchEntry, CalculationService};
pub use settings::{PricingSettings, RetrySettings, SettingsError};

/// Shared application state.
pub struct AppState {
    pub service: CalculationService,
    pub config: ApiConfig,
}
