//! # printcost-db: Persistence Adapter for PrintCost
//!
//! This crate loads catalog snapshots and stores offer calculation configs.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PrintCost Data Flow                              │
//! │                                                                         │
//! │  POST /api/calculate  /  CALC_SAVE_CONFIG                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   printcost-db (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐   │    │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │   │    │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │   │    │
//! │  │   │               │    │ CatalogRepo    │    │ 001_catalog  │   │    │
//! │  │   │ SqlitePool    │◄───│ OfferConfigRepo│    │ 002_offer_.. │   │    │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘   │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CatalogSnapshot ──► printcost-core engine (no DB access from there)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Catalog and offer config repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use printcost_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("printcost.db")).await?;
//!
//! let snapshot = db.catalog().load_snapshot("flyer").await?;
//! let saved = db.offer_configs().save(42, &request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::offer_config::OfferConfigRepository;
