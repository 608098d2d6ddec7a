//! # Calculation Service
//!
//! Orchestrates catalog loads, offer configs and the engine.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CalculationRequest                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  load_snapshot(preset_id) ── retryable DbError? ──► backoff, try again  │
//! │       │                                                                 │
//! │       ▼  Arc<CatalogSnapshot> (immutable, one read transaction)         │
//! │  spawn_blocking(engine.calculate_request)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CostBreakdown | CalculationError (never retried)                       │
//! │                                                                         │
//! │  Batch: one snapshot per distinct preset, one blocking task per         │
//! │  request on a JoinSet, results returned in request order.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use backoff::backoff::Backoff;
use printcost_bridge::CalculationBackend;
use printcost_core::{
    CalculationEngine, CalculationFailure, CalculationRequest, CatalogSnapshot, CostBreakdown,
    Currency, OfferCalcConfig, OfferCalculation, SaveOfferConfig, ValidationError,
};
use printcost_db::{Database, DbResult};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::settings::{PricingSettings, RetrySettings};

// =============================================================================
// Batch Types
// =============================================================================

/// Outcome of one request in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    /// Position of the request in the batch.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<CostBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CalculationFailure>,
}

impl BatchEntry {
    fn succeeded(index: usize, breakdown: CostBreakdown) -> Self {
        BatchEntry {
            index,
            breakdown: Some(breakdown),
            error: None,
        }
    }

    fn failed(index: usize, failure: CalculationFailure) -> Self {
        BatchEntry {
            index,
            breakdown: None,
            error: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.breakdown.is_some()
    }
}

// =============================================================================
// Calculation Service
// =============================================================================

/// Calculation service shared by the HTTP handlers and the bridge backend.
#[derive(Debug, Clone)]
pub struct CalculationService {
    db: Database,
    engine: Arc<CalculationEngine>,
    default_currency: Currency,
    retry: RetrySettings,
}

impl CalculationService {
    pub fn new(db: Database, settings: &PricingSettings) -> Result<Self, ValidationError> {
        let engine = CalculationEngine::new(settings.pricing_resolver()?);
        Ok(CalculationService {
            db,
            engine: Arc::new(engine),
            default_currency: settings.default_currency.clone(),
            retry: settings.retry,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs a persistence read, retrying transient failures with backoff.
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let mut backoff = self.retry.backoff();
        let mut attempt: u32 = 1;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(operation, attempt, ?delay, error = %e, "Persistence unavailable, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        error!(operation, attempt, error = %e, "Persistence unavailable, giving up");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Loads the catalog snapshot for a preset.
    pub async fn load_snapshot(&self, preset_id: &str) -> DbResult<Arc<CatalogSnapshot>> {
        let catalog = self.db.catalog();
        let snapshot = self
            .with_retry("load_snapshot", || catalog.load_snapshot(preset_id))
            .await?;
        Ok(Arc::new(snapshot))
    }

    /// Calculates one request.
    pub async fn calculate(&self, request: CalculationRequest) -> ApiResult<CostBreakdown> {
        let snapshot = self.load_snapshot(&request.preset_id).await?;
        self.run(snapshot, request).await
    }

    async fn run(
        &self,
        snapshot: Arc<CatalogSnapshot>,
        request: CalculationRequest,
    ) -> ApiResult<CostBreakdown> {
        let engine = Arc::clone(&self.engine);
        let currency = self.default_currency.clone();

        let breakdown = tokio::task::spawn_blocking(move || {
            engine.calculate_request(&snapshot, &request, &currency)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("calculation task failed: {}", e)))??;

        Ok(breakdown)
    }

    /// Calculates many requests in parallel.
    ///
    /// Each preset's snapshot is loaded once and shared; a failing entry
    /// never affects the others.
    pub async fn calculate_batch(&self, requests: Vec<CalculationRequest>) -> Vec<BatchEntry> {
        let mut snapshots: HashMap<String, Result<Arc<CatalogSnapshot>, CalculationFailure>> =
            HashMap::new();
        for request in &requests {
            if !snapshots.contains_key(&request.preset_id) {
                let loaded = self
                    .load_snapshot(&request.preset_id)
                    .await
                    .map_err(|e| ApiError::from(e).to_failure());
                snapshots.insert(request.preset_id.clone(), loaded);
            }
        }

        let total = requests.len();
        let mut slots: Vec<Option<BatchEntry>> = vec![None; total];
        let mut tasks = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            match snapshots.get(&request.preset_id) {
                Some(Ok(snapshot)) => {
                    let snapshot = Arc::clone(snapshot);
                    let engine = Arc::clone(&self.engine);
                    let currency = self.default_currency.clone();
                    tasks.spawn_blocking(move || {
                        (index, engine.calculate_request(&snapshot, &request, &currency))
                    });
                }
                Some(Err(failure)) => slots[index] = Some(BatchEntry::failed(index, failure.clone())),
                None => {}
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(breakdown))) => {
                    slots[index] = Some(BatchEntry::succeeded(index, breakdown));
                }
                Ok((index, Err(e))) => {
                    slots[index] = Some(BatchEntry::failed(index, e.to_failure()));
                }
                Err(e) => error!(error = %e, "Batch calculation task failed"),
            }
        }

        let entries: Vec<BatchEntry> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    BatchEntry::failed(
                        index,
                        ApiError::Internal("calculation task failed".into()).to_failure(),
                    )
                })
            })
            .collect();

        let succeeded = entries.iter().filter(|e| e.is_success()).count();
        info!(total, succeeded, failed = total - succeeded, "Batch calculation completed");
        entries
    }

    // =========================================================================
    // Offer Configs
    // =========================================================================

    fn check_offer_id(offer_id: i64) -> ApiResult<()> {
        if offer_id <= 0 {
            return Err(ApiError::InvalidRequest(format!(
                "offer id {} is not positive",
                offer_id
            )));
        }
        Ok(())
    }

    /// Returns the saved calculator config for an offer.
    pub async fn get_config(&self, offer_id: i64) -> ApiResult<OfferCalcConfig> {
        Self::check_offer_id(offer_id)?;
        let repo = self.db.offer_configs();
        self.with_retry("get_offer_config", || repo.get(offer_id))
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("no calculator config saved for offer {}", offer_id))
            })
    }

    /// Creates or overwrites an offer's calculator config.
    pub async fn save_config(
        &self,
        offer_id: i64,
        config: &SaveOfferConfig,
    ) -> ApiResult<OfferCalcConfig> {
        Self::check_offer_id(offer_id)?;
        let saved = self.db.offer_configs().save(offer_id, config).await?;
        info!(
            offer_id,
            preset_id = %saved.preset_id,
            revision = saved.revision,
            "Offer config saved"
        );
        Ok(saved)
    }

    /// Deletes an offer's calculator config. Returns whether one existed.
    pub async fn delete_config(&self, offer_id: i64) -> ApiResult<bool> {
        Self::check_offer_id(offer_id)?;
        let deleted = self.db.offer_configs().delete(offer_id).await?;
        debug!(offer_id, deleted, "Offer config delete");
        Ok(deleted)
    }

    /// Calculates an offer from its saved config plus format and run.
    pub async fn calculate_for_offer(
        &self,
        offer_id: i64,
        input: OfferCalculation,
    ) -> ApiResult<CostBreakdown> {
        let config = self.get_config(offer_id).await?;
        debug!(offer_id, preset_id = %config.preset_id, revision = config.revision, "Calculating offer");
        self.calculate(input.into_request(&config)).await
    }
}

impl CalculationBackend for CalculationService {
    async fn calculate_offer(
        &self,
        offer_id: i64,
        input: &OfferCalculation,
    ) -> Result<CostBreakdown, CalculationFailure> {
        self.calculate_for_offer(offer_id, input.clone())
            .await
            .map_err(|e| e.to_failure())
    }

    async fn save_offer_config(
        &self,
        offer_id: i64,
        config: &SaveOfferConfig,
    ) -> Result<(), CalculationFailure> {
        self.save_config(offer_id, config)
            .await
            .map(|_| ())
            .map_err(|e| e.to_failure())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
