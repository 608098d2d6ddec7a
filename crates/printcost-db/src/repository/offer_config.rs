//! # Offer Config Repository
//!
//! Per-offer calculator bindings saved from the embedded calculator.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CALC_SAVE_CONFIG (first time)  ──► INSERT      revision = 1            │
//! │  CALC_SAVE_CONFIG (again)       ──► ON CONFLICT revision + 1            │
//! │                                     created_at untouched                │
//! │  DELETE /api/offers/{id}/config ──► row removed                         │
//! │                                                                         │
//! │  Removing an offer from the calculator session (CALC_REMOVE_OFFER)      │
//! │  never deletes its saved config.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use printcost_core::validation::{validate_identifier, validate_offer_id};
use printcost_core::{CustomFieldValues, OfferCalcConfig, SaveOfferConfig};

#[derive(Debug, sqlx::FromRow)]
struct OfferConfigRow {
    offer_id: i64,
    preset_id: String,
    custom_fields: String,
    revision: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OfferConfigRow> for OfferCalcConfig {
    type Error = DbError;

    fn try_from(row: OfferConfigRow) -> DbResult<Self> {
        let custom_fields: CustomFieldValues = serde_json::from_str(&row.custom_fields)
            .map_err(|e| DbError::invalid_data("custom_fields", e))?;
        Ok(OfferCalcConfig {
            offer_id: row.offer_id,
            preset_id: row.preset_id,
            custom_fields,
            revision: row.revision,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for offer calculation configs.
#[derive(Debug, Clone)]
pub struct OfferConfigRepository {
    pool: SqlitePool,
}

impl OfferConfigRepository {
    /// Creates a new OfferConfigRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OfferConfigRepository { pool }
    }

    /// Gets the saved config for an offer.
    pub async fn get(&self, offer_id: i64) -> DbResult<Option<OfferCalcConfig>> {
        let row = sqlx::query_as::<_, OfferConfigRow>(
            r#"
            SELECT offer_id, preset_id, custom_fields, revision, created_at, updated_at
            FROM offer_calc_configs
            WHERE offer_id = ?
            "#,
        )
        .bind(offer_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OfferCalcConfig::try_from).transpose()
    }

    /// Creates or overwrites the config for an offer.
    ///
    /// ## Errors
    /// * `DbError::Validation` - Non-positive offer id or malformed preset id
    /// * `DbError::ForeignKeyViolation` - Preset does not exist
    pub async fn save(&self, offer_id: i64, config: &SaveOfferConfig) -> DbResult<OfferCalcConfig> {
        validate_offer_id(offer_id)?;
        validate_identifier("preset id", &config.preset_id)?;

        let custom_fields = serde_json::to_string(&config.custom_fields)
            .map_err(|e| DbError::invalid_data("custom_fields", e))?;
        let now = Utc::now();

        let row = sqlx::query_as::<_, OfferConfigRow>(
            r#"
            INSERT INTO offer_calc_configs
                (offer_id, preset_id, custom_fields, revision, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT (offer_id) DO UPDATE SET
                preset_id = excluded.preset_id,
                custom_fields = excluded.custom_fields,
                revision = offer_calc_configs.revision + 1,
                updated_at = excluded.updated_at
            RETURNING offer_id, preset_id, custom_fields, revision, created_at, updated_at
            "#,
        )
        .bind(offer_id)
        .bind(&config.preset_id)
        .bind(custom_fields)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let saved = OfferCalcConfig::try_from(row)?;
        info!(
            offer_id = saved.offer_id,
            preset_id = %saved.preset_id,
            revision = saved.revision,
            "Offer config saved"
        );
        Ok(saved)
    }

    /// Deletes the config for an offer. Returns whether a row existed.
    pub async fn delete(&self, offer_id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM offer_calc_configs WHERE offer_id = ?")
            .bind(offer_id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        debug!(offer_id, deleted, "Offer config delete");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use printcost_core::catalog::Preset;
    use printcost_core::FieldValue;
    use rust_decimal::Decimal;

    async fn db_with_preset() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog()
            .insert_preset(&Preset {
                id: "flyer".into(),
                name: "Flyer".into(),
                stages: Vec::new(),
                custom_fields: Vec::new(),
            })
            .await
            .unwrap();
        db
    }

    fn save_request() -> SaveOfferConfig {
        let mut custom_fields = CustomFieldValues::new();
        custom_fields.insert("pages".into(), FieldValue::Number(Decimal::from(24)));
        custom_fields.insert("lamination".into(), FieldValue::Bool(true));
        SaveOfferConfig {
            preset_id: "flyer".into(),
            custom_fields,
        }
    }

    #[tokio::test]
    async fn test_first_save_creates_revision_one() {
        let db = db_with_preset().await;
        let saved = db.offer_configs().save(42, &save_request()).await.unwrap();
        assert_eq!(saved.offer_id, 42);
        assert_eq!(saved.revision, 1);
        assert_eq!(saved.custom_fields, save_request().custom_fields);

        let loaded = db.offer_configs().get(42).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_resave_overwrites_and_bumps_revision() {
        let db = db_with_preset().await;
        let repo = db.offer_configs();
        let first = repo.save(42, &save_request()).await.unwrap();

        let mut changed = save_request();
        changed.custom_fields.remove("lamination");
        let second = repo.save(42, &changed).await.unwrap();

        assert_eq!(second.revision, 2);
        assert_eq!(second.created_at, first.created_at);
        assert!(!second.custom_fields.contains_key("lamination"));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let db = db_with_preset().await;
        let repo = db.offer_configs();
        repo.save(7, &save_request()).await.unwrap();

        assert!(repo.delete(7).await.unwrap());
        assert!(!repo.delete(7).await.unwrap());
        assert!(repo.get(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_preset_is_foreign_key_violation() {
        let db = db_with_preset().await;
        let mut request = save_request();
        request.preset_id = "missing".into();
        let err = db.offer_configs().save(1, &request).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_non_positive_offer_id_rejected() {
        let db = db_with_preset().await;
        let err = db.offer_configs().save(0, &save_request()).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }
}
