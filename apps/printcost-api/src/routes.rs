//! # HTTP Routes
//!
//! ```text
//! GET     /health                           liveness + database check
//! POST    /api/calculate                    CalculationRequest → CostBreakdown
//! POST    /api/calculate/batch              { requests: [...] } → per-entry results
//! POST    /api/offers/{offerId}/calculate   OfferCalculation → CostBreakdown
//! GET     /api/offers/{offerId}/config      saved OfferCalcConfig
//! PUT     /api/offers/{offerId}/config      SaveOfferConfig → OfferCalcConfig
//! DELETE  /api/offers/{offerId}/config      204, or 404 if none saved
//! ```
//!
//! Errors are `CalculationFailure` bodies (see [`crate::error`]).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use printcost_core::{
    CalculationRequest, CostBreakdown, OfferCalcConfig, OfferCalculation, SaveOfferConfig,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::service::BatchEntry;
use crate::AppState;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/calculate", post(calculate_handler))
        .route("/api/calculate/batch", post(batch_handler))
        .route("/api/offers/{offer_id}/calculate", post(offer_calculate_handler))
        .route(
            "/api/offers/{offer_id}/config",
            get(get_config_handler)
                .put(save_config_handler)
                .delete(delete_config_handler),
        )
        .with_state(state)
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub requests: Vec<CalculationRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchEntry>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.service.database().health_check().await;
    let (status, label) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            database,
        }),
    )
}

async fn calculate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CalculationRequest>,
) -> ApiResult<Json<CostBreakdown>> {
    let breakdown = state.service.calculate(request).await?;
    Ok(Json(breakdown))
}

async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    if batch.requests.is_empty() {
        return Err(ApiError::InvalidRequest("batch has no requests".into()));
    }
    if batch.requests.len() > state.config.max_batch_size {
        return Err(ApiError::InvalidRequest(format!(
            "batch of {} exceeds the limit of {}",
            batch.requests.len(),
            state.config.max_batch_size
        )));
    }

    let results = state.service.calculate_batch(batch.requests).await;
    let succeeded = results.iter().filter(|r| r.is_success()).count();
    Ok(Json(BatchResponse {
        succeeded,
        failed: results.len() - succeeded,
        results,
    }))
}

async fn offer_calculate_handler(
    State(state): State<Arc<AppState>>,
    Path(offer_id): Path<i64>,
    Json(input): Json<OfferCalculation>,
) -> ApiResult<Json<CostBreakdown>> {
    let breakdown = state.service.calculate_for_offer(offer_id, input).await?;
    Ok(Json(breakdown))
}

async fn get_config_handler(
    State(state): State<Arc<AppState>>,
    Path(offer_id): Path<i64>,
) -> ApiResult<Json<OfferCalcConfig>> {
    Ok(Json(state.service.get_config(offer_id).await?))
}

async fn save_config_handler(
    State(state): State<Arc<AppState>>,
    Path(offer_id): Path<i64>,
    Json(config): Json<SaveOfferConfig>,
) -> ApiResult<Json<OfferCalcConfig>> {
    Ok(Json(state.service.save_config(offer_id, &config).await?))
}

async fn delete_config_handler(
    State(state): State<Arc<AppState>>,
    Path(offer_id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.service.delete_config(offer_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "no calculator config saved for offer {}",
            offer_id
        )))
    }
}
