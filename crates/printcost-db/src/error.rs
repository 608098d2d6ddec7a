//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization                │
//! │       │                                                                 │
//! │       ├── is_retryable()? ──► CalculationService retries with backoff   │
//! │       ▼                                                                 │
//! │  ApiError (in printcost-api) ← ErrorKind + message for callers          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use printcost_core::{ErrorKind, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and for the retry decision.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a preset or resource id that already exists
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Saving an offer config for a preset that does not exist
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A stored value could not be decoded (bad decimal, bad JSON column).
    #[error("Invalid stored data in {column}: {reason}")]
    InvalidData { column: String, reason: String },

    /// Catalog record rejected before it reached the database.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Database is locked by another writer (SQLITE_BUSY).
    #[error("Database busy: {0}")]
    Busy(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidData error for a column.
    pub fn invalid_data(column: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        DbError::InvalidData {
            column: column.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the same call may succeed if tried again.
    ///
    /// ```text
    /// ConnectionFailed, Busy, PoolExhausted, TransactionFailed → retry
    /// everything else (not found, constraint, bad data)        → give up
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::ConnectionFailed(_)
                | DbError::Busy(_)
                | DbError::PoolExhausted
                | DbError::TransactionFailed(_)
        )
    }

    /// Machine-readable kind for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. }
            | DbError::ForeignKeyViolation { .. }
            | DbError::Validation(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::PersistenceUnavailable,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint / lock
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database is busy") {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DbError::PoolExhausted.is_retryable());
        assert!(DbError::Busy("locked".into()).is_retryable());
        assert!(DbError::ConnectionFailed("gone".into()).is_retryable());
        assert!(!DbError::not_found("Preset", "x").is_retryable());
        assert!(!DbError::invalid_data("price_amount", "bad").is_retryable());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(DbError::not_found("Preset", "x").kind(), ErrorKind::NotFound);
        assert_eq!(DbError::PoolExhausted.kind(), ErrorKind::PersistenceUnavailable);
        assert_eq!(
            DbError::ForeignKeyViolation { message: "fk".into() }.kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_pool_timeout_maps_to_exhausted() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));
    }
}
