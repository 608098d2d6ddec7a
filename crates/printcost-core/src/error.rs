//! # Error Types
//!
//! Domain-specific error types for printcost-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  printcost-core errors (this file)                                      │
//! │  ├── ValidationError    - Input validation failures                     │
//! │  ├── CoreError          - Calculation failures (format, match, ...)     │
//! │  ├── CalculationError   - CoreError + stage id + variant id             │
//! │  └── CalculationFailure - Serialized form sent to callers               │
//! │                                                                         │
//! │  printcost-db errors (separate crate)                                   │
//! │  └── DbError            - Database operation failures                   │
//! │                                                                         │
//! │  printcost-bridge errors (separate crate)                               │
//! │  └── BridgeError        - Protocol / session failures                   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CalculationError → Failure         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error maps to exactly one [`ErrorKind`], the machine-readable code
//! that crosses process boundaries (HTTP responses, `CALC_ERROR` messages).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Machine-readable error code, serialized as SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorKind {
    InvalidFormat,
    AmbiguousMatch,
    InvalidFormula,
    UnknownCurrency,
    EmptyPreset,
    UnauthorizedMessage,
    PersistenceUnavailable,
    UnknownCustomField,
    InvalidCustomField,
    CurrencyMismatch,
    UnknownResource,
    CyclicDetail,
    InvalidInput,
    NotFound,
    ArithmeticOverflow,
}

impl ErrorKind {
    /// Returns the wire code (`"INVALID_FORMAT"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidFormat => "INVALID_FORMAT",
            ErrorKind::AmbiguousMatch => "AMBIGUOUS_MATCH",
            ErrorKind::InvalidFormula => "INVALID_FORMULA",
            ErrorKind::UnknownCurrency => "UNKNOWN_CURRENCY",
            ErrorKind::EmptyPreset => "EMPTY_PRESET",
            ErrorKind::UnauthorizedMessage => "UNAUTHORIZED_MESSAGE",
            ErrorKind::PersistenceUnavailable => "PERSISTENCE_UNAVAILABLE",
            ErrorKind::UnknownCustomField => "UNKNOWN_CUSTOM_FIELD",
            ErrorKind::InvalidCustomField => "INVALID_CUSTOM_FIELD",
            ErrorKind::CurrencyMismatch => "CURRENCY_MISMATCH",
            ErrorKind::UnknownResource => "UNKNOWN_RESOURCE",
            ErrorKind::CyclicDetail => "CYCLIC_DETAIL",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::ArithmeticOverflow => "ARITHMETIC_OVERFLOW",
        }
    }

    /// Only persistence outages are worth retrying. Calculation errors are
    /// deterministic: the same input fails the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::PersistenceUnavailable)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Calculation failures raised by the pure engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Format code could not be parsed.
    ///
    /// ## When This Occurs
    /// - Missing or repeated separator (`"210"`, `"1x2x3"`)
    /// - Non-numeric or non-positive dimension (`"abcx297"`, `"0x297"`)
    #[error("Invalid format '{input}': {reason}")]
    InvalidFormat { input: String, reason: String },

    /// Two or more variants are equally specific for the context.
    ///
    /// ## Workflow
    /// ```text
    /// Stage "Printing"
    ///   ├── variant A: volume 1..1000
    ///   └── variant B: volume 1..1000
    ///           │
    ///           ▼  volume = 500 → both survive, same specificity
    /// AmbiguousMatch { candidates: ["A", "B"] }
    /// ```
    /// The catalog has to be fixed; the engine never guesses.
    #[error("Ambiguous match between variants {candidates:?}")]
    AmbiguousMatch { candidates: Vec<String> },

    /// Stage quantity formula is unknown or malformed.
    #[error("Invalid formula '{kind}': {reason}")]
    InvalidFormula { kind: String, reason: String },

    /// No conversion rate between the price currency and the target.
    #[error("No conversion rate from {from} to {to} for variant {variant_id}")]
    UnknownCurrency {
        variant_id: String,
        from: String,
        to: String,
    },

    /// Preset has no stages; raised before any catalog lookup.
    #[error("Preset {preset_id} has no stages")]
    EmptyPreset { preset_id: String },

    /// A field condition or formula references a code missing from the context.
    #[error("Unknown custom field: {code}")]
    UnknownCustomField { code: String },

    /// A custom field value does not satisfy its declaration.
    #[error("Invalid custom field {code}: {reason}")]
    InvalidCustomField { code: String, reason: String },

    /// Money of different currencies was added.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// A stage or detail references a resource absent from the snapshot.
    #[error("Unknown {kind} resource: {id}")]
    UnknownResource { kind: String, id: String },

    /// A detail contains itself, directly or through other details.
    #[error("Detail {resource_id} contains itself")]
    CyclicDetail { resource_id: String },

    /// A product or sum left the range of `Decimal`.
    ///
    /// ## When This Occurs
    /// - Huge coefficients or prices in the catalog multiplied by a long run
    #[error("Arithmetic overflow computing {operation}")]
    Overflow { operation: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub(crate) fn overflow(operation: impl Into<String>) -> Self {
        CoreError::Overflow {
            operation: operation.into(),
        }
    }

    /// Returns the machine-readable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            CoreError::AmbiguousMatch { .. } => ErrorKind::AmbiguousMatch,
            CoreError::InvalidFormula { .. } => ErrorKind::InvalidFormula,
            CoreError::UnknownCurrency { .. } => ErrorKind::UnknownCurrency,
            CoreError::EmptyPreset { .. } => ErrorKind::EmptyPreset,
            CoreError::UnknownCustomField { .. } => ErrorKind::UnknownCustomField,
            CoreError::InvalidCustomField { .. } => ErrorKind::InvalidCustomField,
            CoreError::CurrencyMismatch { .. } => ErrorKind::CurrencyMismatch,
            CoreError::UnknownResource { .. } => ErrorKind::UnknownResource,
            CoreError::CyclicDetail { .. } => ErrorKind::CyclicDetail,
            CoreError::Overflow { .. } => ErrorKind::ArithmeticOverflow,
            CoreError::Validation(_) => ErrorKind::InvalidInput,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request or catalog input doesn't meet requirements.
/// Used for early validation before the engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad currency code, bad URL).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate stage id in a preset).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Calculation Error
// =============================================================================

/// A [`CoreError`] located in the preset: which stage, which variant.
///
/// Any stage failure aborts the whole calculation, so there is at most one
/// of these per calculation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{source}{}", location_suffix(.stage_id, .variant_id))]
pub struct CalculationError {
    #[source]
    pub source: CoreError,
    pub stage_id: Option<String>,
    pub variant_id: Option<String>,
}

fn location_suffix(stage_id: &Option<String>, variant_id: &Option<String>) -> String {
    match (stage_id, variant_id) {
        (Some(stage), Some(variant)) => format!(" (stage {}, variant {})", stage, variant),
        (Some(stage), None) => format!(" (stage {})", stage),
        (None, Some(variant)) => format!(" (variant {})", variant),
        (None, None) => String::new(),
    }
}

impl CalculationError {
    /// Wraps an error that is not tied to a stage (format, volume, empty preset).
    pub fn unlocated(source: CoreError) -> Self {
        CalculationError {
            source,
            stage_id: None,
            variant_id: None,
        }
    }

    /// Wraps an error raised while evaluating `stage_id`.
    pub fn at_stage(source: CoreError, stage_id: impl Into<String>) -> Self {
        CalculationError {
            source,
            stage_id: Some(stage_id.into()),
            variant_id: None,
        }
    }

    /// Attaches the variant id where the failure happened.
    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    /// Returns the machine-readable kind.
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Converts into the serialized failure shape.
    pub fn to_failure(&self) -> CalculationFailure {
        CalculationFailure {
            kind: self.kind(),
            stage_id: self.stage_id.clone(),
            variant_id: self.variant_id.clone(),
            message: self.source.to_string(),
        }
    }
}

impl From<CoreError> for CalculationError {
    fn from(source: CoreError) -> Self {
        CalculationError::unlocated(source)
    }
}

impl From<ValidationError> for CalculationError {
    fn from(err: ValidationError) -> Self {
        CalculationError::unlocated(CoreError::Validation(err))
    }
}

/// Failure response of a calculation.
///
/// ```json
/// { "kind": "AMBIGUOUS_MATCH", "stageId": "printing", "variantId": null,
///   "message": "Ambiguous match between variants [\"a\", \"b\"]" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CalculationFailure {
    pub kind: ErrorKind,
    pub stage_id: Option<String>,
    pub variant_id: Option<String>,
    pub message: String,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result of a full calculation.
pub type CalculationResult<T> = Result<T, CalculationError>;

// =============================================================================
// Unit Tests
// =============================================================================
