//! Error types for the PrintCost API.
//!
//! Every error leaves the service as a `CalculationFailure` body:
//! ```json
//! { "kind": "AMBIGUOUS_MATCH", "stageId": "print", "variantId": null,
//!   "message": "Ambiguous match between variants [\"print-0\", \"print-1\"]" }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use printcost_core::{CalculationError, CalculationFailure, ErrorKind};
use printcost_db::DbError;

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Calculation(#[from] CalculationError),

    #[error("{0}")]
    Database(#[from] DbError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Machine-readable kind for the response body.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Calculation(e) => e.kind(),
            ApiError::Database(e) => e.kind(),
            ApiError::InvalidRequest(_) => ErrorKind::InvalidInput,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Internal(_) => ErrorKind::PersistenceUnavailable,
        }
    }

    /// Converts into the serialized failure shape.
    pub fn to_failure(&self) -> CalculationFailure {
        match self {
            ApiError::Calculation(e) => e.to_failure(),
            other => CalculationFailure {
                kind: other.kind(),
                stage_id: None,
                variant_id: None,
                message: other.to_string(),
            },
        }
    }

    /// HTTP status for the error.
    ///
    /// ```text
    /// NOT_FOUND                → 404
    /// INVALID_INPUT            → 400
    /// PERSISTENCE_UNAVAILABLE  → 503  (500 for internal failures)
    /// UNAUTHORIZED_MESSAGE     → 401
    /// calculation kinds        → 422
    /// ```
    pub fn status(&self) -> StatusCode {
        if let ApiError::Internal(_) = self {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::PersistenceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::UnauthorizedMessage => StatusCode::UNAUTHORIZED,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(self.to_failure())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printcost_core::CoreError;

    #[test]
    fn test_calculation_error_keeps_location() {
        let err = ApiError::from(CalculationError::at_stage(
            CoreError::EmptyPreset {
                preset_id: "flyer".into(),
            },
            "print",
        ));
        let failure = err.to_failure();
        assert_eq!(failure.kind, ErrorKind::EmptyPreset);
        assert_eq!(failure.stage_id.as_deref(), Some("print"));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Database(DbError::not_found("preset", "flyer")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Database(DbError::Busy("locked".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::InvalidRequest("empty batch".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("task panicked".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_status() {
        let response = ApiError::NotFound("offer 42".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
