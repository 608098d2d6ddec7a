//! # Domain Types
//!
//! Calculation inputs and outputs used throughout PrintCost.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  INPUT                               OUTPUT                             │
//! │  ┌──────────────────────┐            ┌──────────────────────┐           │
//! │  │ CalculationRequest   │            │   CostBreakdown      │           │
//! │  │  presetId            │            │    presetId          │           │
//! │  │  formatCode "210x297"│   engine   │    items[]  ─────────┼──┐        │
//! │  │  volume              │ ─────────► │    subtotal (exact)  │  │        │
//! │  │  customFields        │            │    total (rounded)   │  │        │
//! │  │  targetCurrency      │            └──────────────────────┘  │        │
//! │  └──────────┬───────────┘            ┌──────────────────────┐  │        │
//! │             │ context_from_request   │   CostLineItem       │◄─┘        │
//! │             ▼                        │    stage / variants  │           │
//! │  ┌──────────────────────┐            │    quantity          │           │
//! │  │ SelectionContext     │            │    unitPrice         │           │
//! │  │  Format (mm)         │            │    lineTotal (exact) │           │
//! │  │  volume, fields, cur │            │    displayTotal      │           │
//! │  └──────────────────────┘            └──────────────────────┘           │
//! │                                                                         │
//! │  PERSISTED: OfferCalcConfig (offer id → preset + custom fields)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Currency, Money};

// =============================================================================
// Format
// =============================================================================

/// Physical format of the printed item, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Format {
    pub width: Decimal,
    pub length: Decimal,
}

impl Format {
    pub fn new(width: Decimal, length: Decimal) -> Self {
        Format { width, length }
    }

    /// Area in mm².
    ///
    /// `Format` can be built directly, bypassing the parser's size limit, so
    /// the product is checked.
    pub fn area(&self) -> CoreResult<Decimal> {
        self.width
            .checked_mul(self.length)
            .ok_or_else(|| CoreError::overflow(format!("area of {}", self)))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.length)
    }
}

// =============================================================================
// Custom Field Values
// =============================================================================

/// A typed custom field value.
///
/// JSON shape is the natural one: `true`, `24`, `"matte"`. Numbers are
/// decimals, never floats.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Bool(bool),
    Number(Decimal),
    Text(String),
}

impl FieldValue {
    /// Returns the number if this is a numeric value.
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Name of the value's type, matching `FieldType` spelling.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "boolean",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Number(n) => {
                let number: serde_json::Number = n
                    .normalize()
                    .to_string()
                    .parse()
                    .map_err(serde::ser::Error::custom)?;
                number.serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Bool(b) => Ok(FieldValue::Bool(b)),
            serde_json::Value::String(s) => Ok(FieldValue::Text(s)),
            serde_json::Value::Number(n) => {
                let text = n.to_string();
                text.parse::<Decimal>()
                    .or_else(|_| Decimal::from_scientific(&text))
                    .map(FieldValue::Number)
                    .map_err(D::Error::custom)
            }
            other => Err(D::Error::custom(format!(
                "custom field value must be a boolean, number or string, got {}",
                other
            ))),
        }
    }
}

/// Custom field values keyed by field code.
pub type CustomFieldValues = BTreeMap<String, FieldValue>;

// =============================================================================
// Selection Context
// =============================================================================

/// Everything variant matching and formulas may read.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionContext {
    pub format: Format,
    /// Print run, always ≥ 1.
    pub volume: u64,
    pub custom_fields: CustomFieldValues,
    pub currency: Currency,
}

impl SelectionContext {
    pub fn new(format: Format, volume: u64, currency: Currency) -> Self {
        SelectionContext {
            format,
            volume,
            custom_fields: CustomFieldValues::new(),
            currency,
        }
    }

    /// Builder: set a custom field value.
    pub fn with_field(mut self, code: impl Into<String>, value: FieldValue) -> Self {
        self.custom_fields.insert(code.into(), value);
        self
    }

    #[inline]
    pub fn volume_decimal(&self) -> Decimal {
        Decimal::from(self.volume)
    }

    pub fn field(&self, code: &str) -> Option<&FieldValue> {
        self.custom_fields.get(code)
    }
}

// =============================================================================
// Request / Response
// =============================================================================

/// A calculation request as received from callers.
///
/// ```json
/// { "presetId": "flyer", "formatCode": "210x297", "volume": 500,
///   "customFields": { "lamination": true }, "targetCurrency": "RUB" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRequest {
    pub preset_id: String,
    pub format_code: String,
    /// Signed so a negative run is reported as a validation error rather
    /// than a deserialization error.
    pub volume: i64,
    #[serde(default)]
    pub custom_fields: CustomFieldValues,
    /// Falls back to the configured default currency when absent.
    #[serde(default)]
    pub target_currency: Option<String>,
}

/// One stage's contribution to the cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CostLineItem {
    pub stage_id: String,
    pub stage_name: String,
    pub stage_variant_id: String,
    pub resource_id: String,
    pub resource_variant_id: String,
    #[ts(type = "string")]
    pub quantity: Decimal,
    pub unit_price: Money,
    /// Full precision, feeds the grand total.
    pub line_total: Money,
    /// Rounded for display only, never summed.
    pub display_total: Money,
}

/// Itemized result of a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CostBreakdown {
    pub preset_id: String,
    pub items: Vec<CostLineItem>,
    #[ts(type = "string")]
    pub currency: Currency,
    /// Σ full-precision line totals.
    pub subtotal: Money,
    /// `subtotal` rounded by the rounding policy.
    pub total: Money,
}

// =============================================================================
// Offer Calculation Config
// =============================================================================

/// Per-offer calculator binding, saved when the admin saves a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCalcConfig {
    pub offer_id: i64,
    pub preset_id: String,
    #[serde(default)]
    pub custom_fields: CustomFieldValues,
    /// Starts at 1, incremented on every overwrite.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for saving an offer config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOfferConfig {
    pub preset_id: String,
    #[serde(default)]
    pub custom_fields: CustomFieldValues,
}

/// Format and run for one host offer.
///
/// The preset and the stored custom fields come from the offer's saved
/// config; fields given here win over stored ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCalculation {
    pub format_code: String,
    pub volume: i64,
    #[serde(default)]
    pub custom_fields: CustomFieldValues,
    #[serde(default)]
    pub target_currency: Option<String>,
}

impl OfferCalculation {
    /// Builds the calculation request for an offer's saved config.
    pub fn into_request(self, config: &OfferCalcConfig) -> CalculationRequest {
        let mut custom_fields = config.custom_fields.clone();
        custom_fields.extend(self.custom_fields);
        CalculationRequest {
            preset_id: config.preset_id.clone(),
            format_code: self.format_code,
            volume: self.volume,
            custom_fields,
            target_currency: self.target_currency,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
