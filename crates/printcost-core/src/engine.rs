//! # Calculation Engine
//!
//! Runs a preset's stages in order and aggregates the itemized breakdown.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CalculationRequest ──► context_from_request ──► SelectionContext       │
//! │   (format code, volume,   parse format, check volume,                   │
//! │    fields, currency)      resolve custom fields                         │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │  calculate(snapshot, context)                                           │
//! │    ├── no stages? ───────────────────────────────► EmptyPreset          │
//! │    └── for stage in preset.stages (in order):                           │
//! │          StageAggregator::evaluate(stage, ctx, subtotal)                │
//! │            ├── Some(line) → push, subtotal += line.line_total           │
//! │            ├── None       → stage omitted                               │
//! │            └── Err        → abort whole calculation                     │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │  CostBreakdown { items, subtotal, total = round(subtotal) }             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is synchronous and holds no mutable state: the same snapshot
//! and context always produce the same breakdown.

use tracing::{debug, info};

use crate::catalog::{CatalogSnapshot, CustomFieldDef, FieldType, Preset};
use crate::error::{CalculationError, CalculationResult, CoreError, CoreResult};
use crate::format;
use crate::money::{Currency, Money};
use crate::pricing::PricingResolver;
use crate::stage::StageAggregator;
use crate::types::{
    CalculationRequest, CostBreakdown, CustomFieldValues, FieldValue, SelectionContext,
};
use crate::validation;

/// Stateless calculator configured with a pricing resolver.
#[derive(Debug, Clone, Default)]
pub struct CalculationEngine {
    pricing: PricingResolver,
}

impl CalculationEngine {
    pub fn new(pricing: PricingResolver) -> Self {
        CalculationEngine { pricing }
    }

    pub fn pricing(&self) -> &PricingResolver {
        &self.pricing
    }

    /// Calculates the snapshot's preset for `context`.
    ///
    /// ## Errors
    /// - `EmptyPreset` before any lookup when the preset has no stages
    /// - any stage failure, carrying the stage id (and variant id if known)
    pub fn calculate(
        &self,
        snapshot: &CatalogSnapshot,
        context: &SelectionContext,
    ) -> CalculationResult<CostBreakdown> {
        let preset = snapshot.preset();
        if preset.stages.is_empty() {
            return Err(CoreError::EmptyPreset {
                preset_id: preset.id.clone(),
            }
            .into());
        }

        let aggregator = StageAggregator::new(snapshot, &self.pricing);
        let mut items = Vec::with_capacity(preset.stages.len());
        let mut subtotal = Money::zero(context.currency.clone());

        for stage in &preset.stages {
            let Some(line) = aggregator.evaluate(stage, context, &subtotal)? else {
                continue;
            };
            subtotal = subtotal
                .checked_add(&line.line_total)
                .map_err(|e| CalculationError::at_stage(e, stage.id.clone()))?;
            items.push(line);
        }

        let total = self.pricing.rounding().round_total(&subtotal);
        info!(
            preset_id = %preset.id,
            format = %context.format,
            volume = context.volume,
            lines = items.len(),
            total = %total,
            "Calculation completed"
        );

        Ok(CostBreakdown {
            preset_id: preset.id.clone(),
            items,
            currency: context.currency.clone(),
            subtotal,
            total,
        })
    }

    /// Builds the context from `request` and calculates it.
    pub fn calculate_request(
        &self,
        snapshot: &CatalogSnapshot,
        request: &CalculationRequest,
        default_currency: &Currency,
    ) -> CalculationResult<CostBreakdown> {
        let preset = snapshot.preset();
        if preset.stages.is_empty() {
            return Err(CoreError::EmptyPreset {
                preset_id: preset.id.clone(),
            }
            .into());
        }
        let context = context_from_request(preset, request, default_currency)?;
        self.calculate(snapshot, &context)
    }
}

// =============================================================================
// Request → Context
// =============================================================================

/// Builds a [`SelectionContext`] from a request.
///
/// - format code parsed by [`format::parse`]
/// - volume must be within `1..=MAX_VOLUME`
/// - currency from the request, else `default_currency`
/// - custom fields resolved against the preset's declarations
pub fn context_from_request(
    preset: &Preset,
    request: &CalculationRequest,
    default_currency: &Currency,
) -> CalculationResult<SelectionContext> {
    let format = format::parse(&request.format_code)?;
    let volume = validation::validate_volume(request.volume)?;
    let currency = match &request.target_currency {
        Some(code) => Currency::new(code)?,
        None => default_currency.clone(),
    };
    let custom_fields = resolve_custom_fields(&preset.custom_fields, &request.custom_fields)?;

    Ok(SelectionContext {
        format,
        volume,
        custom_fields,
        currency,
    })
}

/// Resolves provided values against declarations.
///
/// Declared fields get their default when absent; a required field with
/// neither value nor default, or a value of the wrong type, is
/// `InvalidCustomField`. Values for undeclared codes are passed through.
pub fn resolve_custom_fields(
    declarations: &[CustomFieldDef],
    provided: &CustomFieldValues,
) -> CoreResult<CustomFieldValues> {
    let mut resolved = provided.clone();

    for def in declarations {
        let value = match provided.get(&def.code).or(def.default.as_ref()) {
            Some(value) => value,
            None if def.required => {
                return Err(CoreError::InvalidCustomField {
                    code: def.code.clone(),
                    reason: "required field has no value".to_string(),
                });
            }
            None => continue,
        };

        let type_ok = matches!(
            (def.field_type, value),
            (FieldType::Number, FieldValue::Number(_))
                | (FieldType::Text, FieldValue::Text(_))
                | (FieldType::Boolean, FieldValue::Bool(_))
        );
        if !type_ok {
            return Err(CoreError::InvalidCustomField {
                code: def.code.clone(),
                reason: format!(
                    "expected {}, got {}",
                    def.field_type.as_str(),
                    value.type_name()
                ),
            });
        }
        resolved.insert(def.code.clone(), value.clone());
    }

    for code in provided.keys() {
        if !declarations.iter().any(|d| &d.code == code) {
            debug!(code = %code, "Undeclared custom field passed through");
        }
    }
    Ok(resolved)
}

// =============================================================================
// Unit Tests
// =============================================================================
