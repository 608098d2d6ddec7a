//! # Database Pool
//!
//! One SQLite pool backs both repositories. Snapshot loads are read-only
//! transactions; offer config upserts are the only writes at request time.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CalculationService                                                     │
//! │    ├── POST /api/calculate/batch                                        │
//! │    │     preset "flyer"    ──► catalog().load_snapshot  ─┐  concurrent  │
//! │    │     preset "brochure" ──► catalog().load_snapshot  ─┤  readers     │
//! │    └── PUT  /api/offers/{id}/config                      │  (WAL)       │
//! │          offer_configs().save ──► single writer ─────────┘              │
//! │                                                                         │
//! │  writer holds the lock ──► others wait up to busy_timeout               │
//! │                        ──► still locked: DbError::Busy (retryable)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Files are opened in WAL mode so batch snapshot loads never wait on a
//! config save. `:memory:` has no file to log to and uses a single
//! connection, since every connection would otherwise see its own database.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::offer_config::OfferConfigRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings.
///
/// ```rust,ignore
/// let config = DbConfig::new("./printcost.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created if missing, or `:memory:`.
    pub database_path: PathBuf,

    /// Upper bound on concurrent snapshot loads. Default: 5
    pub max_connections: u32,

    pub min_connections: u32,

    /// How long a request waits for a free connection. Default: 30 s
    pub acquire_timeout: Duration,

    pub idle_timeout: Duration,

    /// How long a statement waits on a locked database before failing with
    /// `DbError::Busy`. Default: 5 s
    pub busy_timeout: Duration,

    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Isolated single-connection database for tests.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(IN_MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the catalog and offer config store.
///
/// Cheap to clone (the pool is reference counted). The HTTP service keeps
/// one in its shared state and hands repositories out per request.
///
/// ```rust,ignore
/// let snapshot = db.catalog().load_snapshot("flyer").await?;
/// let config = db.offer_configs().get(1042).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and applies pending migrations.
    ///
    /// ## Errors
    /// `DbError::ConnectionFailed` when the file cannot be opened, or any
    /// migration error.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening calculator database"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let journal_mode = if config.is_in_memory() {
            SqliteJournalMode::Memory
        } else {
            SqliteJournalMode::Wal
        };

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(journal_mode)
            .synchronous(SqliteSynchronous::Normal)
            // Offer configs reference presets.
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!(?journal_mode, busy_timeout = ?config.busy_timeout, "Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Database pool created");

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        info!("Catalog schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Presets, resources and snapshot loading.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Saved calculator configs per offer.
    pub fn offer_configs(&self) -> OfferConfigRepository {
        OfferConfigRepository::new(self.pool.clone())
    }

    /// Closes the pool on shutdown. Later repository calls fail with
    /// `DbError::ConnectionFailed`, which the service reports as
    /// `PERSISTENCE_UNAVAILABLE`.
    pub async fn close(&self) {
        info!("Closing calculator database");
        self.pool.close().await;
    }

    /// Whether the database answers a trivial query. Backs `GET /health`.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_in_memory_runs_migrations() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 2);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_busy_timeout_applied() {
        let config = DbConfig::in_memory().busy_timeout(Duration::from_millis(250));
        let db = Database::new(config).await.unwrap();
        let (timeout_ms,): (i64,) = sqlx::query_as("PRAGMA busy_timeout")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(timeout_ms, 250);
    }

    #[tokio::test]
    async fn test_closed_database_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_config_defaults() {
        let config = DbConfig::new("/tmp/printcost.db").max_connections(8);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
        assert_eq!(DbConfig::in_memory().max_connections, 1);
    }
}
