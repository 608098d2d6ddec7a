//! # Validation Module
//!
//! Input and catalog validation for PrintCost.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request deserialization (serde)                               │
//! │  ├── Shape and types of the JSON body                                   │
//! │  └── Currency codes (Currency::try_from)                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Request values: volume, offer id, identifiers                      │
//! │  └── Catalog records: presets, resources, ranges (before insert)        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL / UNIQUE constraints                                      │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Catalog validation rejects structurally broken records at write time.
//! Semantic problems that depend on the selection (ambiguous ranges, unknown
//! formula kinds) are still reported by the engine for the stage involved.
//!
//! ## Usage
//! ```rust
//! use printcost_core::validation::{validate_offer_id, validate_volume};
//!
//! assert_eq!(validate_volume(500).unwrap(), 500);
//! assert!(validate_volume(0).is_err());
//! assert!(validate_offer_id(-3).is_err());
//! ```

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::catalog::{
    CustomFieldDef, FieldType, MatchCriteria, Preset, RangeFilter, Resource, ResourceKind,
    VariantCost,
};
use crate::error::ValidationError;
use crate::types::FieldValue;
use crate::{MAX_IDENTIFIER_LEN, MAX_VOLUME};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a print run.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_VOLUME
pub fn validate_volume(volume: i64) -> ValidationResult<u64> {
    if volume <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "volume".to_string(),
        });
    }
    if volume as u64 > MAX_VOLUME {
        return Err(ValidationError::OutOfRange {
            field: "volume".to_string(),
            min: 1,
            max: MAX_VOLUME as i64,
        });
    }
    Ok(volume as u64)
}

/// Validates an offer id (host platform element id, always positive).
pub fn validate_offer_id(offer_id: i64) -> ValidationResult<()> {
    if offer_id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "offer id".to_string(),
        });
    }
    Ok(())
}

/// Validates a catalog identifier (preset, stage, variant, resource, field code).
///
/// ## Rules
/// - Must not be empty
/// - At most MAX_IDENTIFIER_LEN characters
/// - Letters, digits, `-`, `_` and `.` only
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, '-', '_' and '.'".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Catalog Validators
// =============================================================================

/// Validates a range: both bounds non-negative and `min <= max`.
pub fn validate_range(field: &str, range: &RangeFilter) -> ValidationResult<()> {
    if range.min < Decimal::ZERO || range.min > range.max {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("[{}, {}] is not a valid range", range.min, range.max),
        });
    }
    Ok(())
}

/// Validates every range of a criteria set and its field condition codes.
pub fn validate_criteria(criteria: &MatchCriteria) -> ValidationResult<()> {
    if let Some(range) = &criteria.width {
        validate_range("width range", range)?;
    }
    if let Some(range) = &criteria.length {
        validate_range("length range", range)?;
    }
    if let Some(range) = &criteria.volume {
        validate_range("volume range", range)?;
    }
    for condition in &criteria.fields {
        validate_identifier("field condition code", &condition.code)?;
    }
    Ok(())
}

/// Validates a custom field declaration, including its default's type.
pub fn validate_custom_field(def: &CustomFieldDef) -> ValidationResult<()> {
    validate_identifier("custom field code", &def.code)?;
    if let Some(default) = &def.default {
        let type_ok = matches!(
            (def.field_type, default),
            (FieldType::Number, FieldValue::Number(_))
                | (FieldType::Text, FieldValue::Text(_))
                | (FieldType::Boolean, FieldValue::Bool(_))
        );
        if !type_ok {
            return Err(ValidationError::InvalidFormat {
                field: format!("default of {}", def.code),
                reason: format!("expected {}, got {}", def.field_type.as_str(), default.type_name()),
            });
        }
    }
    Ok(())
}

/// Validates a preset before it is stored.
///
/// ## Rules
/// - Identifiers well formed, name not empty
/// - Stage ids unique within the preset
/// - Variant ids unique within their stage
/// - Custom field codes unique
///
/// An empty stage list is allowed here: calculating it reports `EmptyPreset`.
pub fn validate_preset(preset: &Preset) -> ValidationResult<()> {
    validate_identifier("preset id", &preset.id)?;
    if preset.name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "preset name".to_string(),
        });
    }

    let mut stage_ids = HashSet::new();
    for stage in &preset.stages {
        validate_identifier("stage id", &stage.id)?;
        if !stage_ids.insert(stage.id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "stage id".to_string(),
                value: stage.id.clone(),
            });
        }

        let mut variant_ids = HashSet::new();
        for variant in &stage.variants {
            validate_identifier("stage variant id", &variant.id)?;
            validate_identifier("resource id", &variant.resource.id)?;
            validate_criteria(&variant.criteria)?;
            if !variant_ids.insert(variant.id.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: "stage variant id".to_string(),
                    value: variant.id.clone(),
                });
            }
        }
    }

    let mut codes = HashSet::new();
    for def in &preset.custom_fields {
        validate_custom_field(def)?;
        if !codes.insert(def.code.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "custom field code".to_string(),
                value: def.code.clone(),
            });
        }
    }
    Ok(())
}

/// Validates a resource before it is stored.
///
/// ## Rules
/// - Details are priced by components, other kinds by a unit price
/// - Unit prices are non-negative, component quantities positive
/// - Variant ids unique within the resource
pub fn validate_resource(resource: &Resource) -> ValidationResult<()> {
    validate_identifier("resource id", &resource.id)?;

    let mut variant_ids = HashSet::new();
    for variant in &resource.variants {
        validate_identifier("resource variant id", &variant.id)?;
        validate_criteria(&variant.criteria)?;
        if !variant_ids.insert(variant.id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "resource variant id".to_string(),
                value: variant.id.clone(),
            });
        }

        match (&variant.cost, resource.kind) {
            (VariantCost::Components { components }, ResourceKind::Detail) => {
                for component in components {
                    validate_identifier("component resource id", &component.resource.id)?;
                    if component.quantity <= Decimal::ZERO {
                        return Err(ValidationError::MustBePositive {
                            field: format!("quantity of {}", component.resource),
                        });
                    }
                }
            }
            (VariantCost::Unit { price }, kind) if kind != ResourceKind::Detail => {
                if price.amount() < Decimal::ZERO {
                    return Err(ValidationError::OutOfRange {
                        field: format!("price of {}", variant.id),
                        min: 0,
                        max: i64::MAX,
                    });
                }
            }
            _ => {
                return Err(ValidationError::InvalidFormat {
                    field: format!("cost of {}", variant.id),
                    reason: format!("{} resources cannot be priced this way", resource.kind),
                });
            }
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        DetailComponent, FormulaSpec, ResourceRef, ResourceVariant, Stage, StageVariant,
    };
    use crate::money::{Currency, Money};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn stage(id: &str, variant_ids: &[&str]) -> Stage {
        Stage {
            id: id.to_string(),
            name: id.to_string(),
            formula: FormulaSpec::of("FIXED"),
            variants: variant_ids
                .iter()
                .map(|v| StageVariant {
                    id: v.to_string(),
                    name: v.to_string(),
                    criteria: MatchCriteria::any(),
                    resource: ResourceRef::new(ResourceKind::Material, "paper"),
                })
                .collect(),
        }
    }

    fn preset(stages: Vec<Stage>) -> Preset {
        Preset {
            id: "flyer".to_string(),
            name: "Flyer".to_string(),
            stages,
            custom_fields: vec![],
        }
    }

    #[test]
    fn test_validate_volume() {
        assert_eq!(validate_volume(1).unwrap(), 1);
        assert_eq!(validate_volume(MAX_VOLUME as i64).unwrap(), MAX_VOLUME);
        assert!(validate_volume(0).is_err());
        assert!(validate_volume(-5).is_err());
        assert!(validate_volume(MAX_VOLUME as i64 + 1).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("id", "paper-a4_130g.v2").is_ok());
        assert!(validate_identifier("id", "").is_err());
        assert!(validate_identifier("id", "has space").is_err());
        assert!(validate_identifier("id", &"a".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("r", &RangeFilter::new(d("0"), d("0"))).is_ok());
        assert!(validate_range("r", &RangeFilter::new(d("10"), d("5"))).is_err());
        assert!(validate_range("r", &RangeFilter::new(d("-1"), d("5"))).is_err());
    }

    #[test]
    fn test_validate_preset_duplicates() {
        assert!(validate_preset(&preset(vec![stage("a", &["x"]), stage("b", &["x"])])).is_ok());
        assert!(matches!(
            validate_preset(&preset(vec![stage("a", &["x"]), stage("a", &["y"])])),
            Err(ValidationError::Duplicate { .. })
        ));
        assert!(matches!(
            validate_preset(&preset(vec![stage("a", &["x", "x"])])),
            Err(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_validate_preset_allows_no_stages() {
        assert!(validate_preset(&preset(vec![])).is_ok());
    }

    #[test]
    fn test_validate_custom_field_default_type() {
        let def = CustomFieldDef {
            code: "pages".to_string(),
            name: "Pages".to_string(),
            field_type: FieldType::Number,
            required: false,
            default: Some(FieldValue::Text("four".to_string())),
        };
        assert!(validate_custom_field(&def).is_err());
    }

    #[test]
    fn test_validate_resource_cost_shape() {
        let rub = Currency::new("RUB").unwrap();
        let mut resource = Resource {
            id: "cover".to_string(),
            kind: ResourceKind::Detail,
            name: "Cover".to_string(),
            variants: vec![ResourceVariant {
                id: "cover-v".to_string(),
                name: "Cover".to_string(),
                criteria: MatchCriteria::any(),
                cost: VariantCost::Unit {
                    price: Money::new(d("1"), rub.clone()),
                },
            }],
        };
        assert!(validate_resource(&resource).is_err());

        resource.variants[0].cost = VariantCost::Components {
            components: vec![DetailComponent {
                resource: ResourceRef::new(ResourceKind::Material, "board"),
                quantity: d("2"),
            }],
        };
        assert!(validate_resource(&resource).is_ok());

        resource.kind = ResourceKind::Material;
        assert!(validate_resource(&resource).is_err());
    }
}
