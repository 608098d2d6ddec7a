//! # Repository Module
//!
//! Database repository implementations for PrintCost.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CalculationService                                                     │
//! │       │                                                                 │
//! │       │  db.catalog().load_snapshot("flyer")                            │
//! │       ▼                                                                 │
//! │  CatalogRepository                                                      │
//! │  ├── load_snapshot(&self, preset_id)   one read transaction             │
//! │  ├── get_preset(&self, id)                                              │
//! │  ├── get_resource(&self, reference)                                     │
//! │  ├── insert_preset(&self, preset)      seed + tests                     │
//! │  └── insert_resource(&self, resource)  seed + tests                     │
//! │                                                                         │
//! │  OfferConfigRepository                                                  │
//! │  ├── get(&self, offer_id)                                               │
//! │  ├── save(&self, offer_id, config)     upsert, revision + 1             │
//! │  └── delete(&self, offer_id)           explicit admin action            │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod offer_config;

use rust_decimal::Decimal;

use crate::error::{DbError, DbResult};

/// Parses a decimal TEXT column.
pub(crate) fn parse_decimal(column: &str, value: &str) -> DbResult<Decimal> {
    value
        .parse::<Decimal>()
        .map_err(|e| DbError::invalid_data(column, format!("'{}': {}", value, e)))
}

/// Parses an optional decimal TEXT column.
pub(crate) fn parse_optional_decimal(column: &str, value: Option<&str>) -> DbResult<Option<Decimal>> {
    value.map(|v| parse_decimal(column, v)).transpose()
}
