//! # Catalog Types
//!
//! The catalog data the engine evaluates: presets, stages, variants and the
//! priced resources they point at.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Catalog Types                                   │
//! │                                                                         │
//! │  Preset ──┬── CustomFieldDef*        (calculator-scoped declarations)   │
//! │           └── Stage* (ordered)                                          │
//! │                 ├── FormulaSpec      (PER_AREA, PER_VOLUME, FIXED, ...) │
//! │                 └── StageVariant*    (MatchCriteria + ResourceRef)      │
//! │                                             │                           │
//! │                                             ▼                           │
//! │  Resource (Material │ Operation │ Equipment │ Detail)                   │
//! │     └── ResourceVariant*  (MatchCriteria + VariantCost)                 │
//! │              ├── Unit { price }                 priced resources        │
//! │              └── Components [ResourceRef × qty] details                 │
//! │                                                                         │
//! │  CatalogSnapshot = Preset + every Resource reachable from it            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Variants are plain data. Selecting one is a range-containment test
//! (see [`crate::matcher`]), not a polymorphic call.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::FieldValue;

// =============================================================================
// Match Criteria
// =============================================================================

/// Inclusive numeric range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub min: Decimal,
    pub max: Decimal,
}

impl RangeFilter {
    /// Creates a range. Bounds are not checked here, see
    /// [`crate::validation::validate_range`].
    pub fn new(min: Decimal, max: Decimal) -> Self {
        RangeFilter { min, max }
    }

    /// Whether `value` lies inside the range, bounds included.
    #[inline]
    pub fn contains(&self, value: Decimal) -> bool {
        self.min <= value && value <= self.max
    }

    /// Width of the range (`max - min`), saturating at `Decimal::MAX`.
    #[inline]
    pub fn span(&self) -> Decimal {
        self.max.checked_sub(self.min).unwrap_or(Decimal::MAX)
    }
}

/// Custom-field equality condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub code: String,
    pub equals: FieldValue,
}

/// Applicability of a variant. An absent filter matches any value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<RangeFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<RangeFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<RangeFilter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldCondition>,
}

impl MatchCriteria {
    /// Criteria that match everything.
    pub fn any() -> Self {
        MatchCriteria::default()
    }

    /// Builder: constrain the format to `[min_w, max_w] × [min_l, max_l]`.
    pub fn with_format(mut self, width: RangeFilter, length: RangeFilter) -> Self {
        self.width = Some(width);
        self.length = Some(length);
        self
    }

    /// Builder: constrain the print run.
    pub fn with_volume(mut self, volume: RangeFilter) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Builder: require a custom field value.
    pub fn with_field(mut self, code: impl Into<String>, equals: FieldValue) -> Self {
        self.fields.push(FieldCondition {
            code: code.into(),
            equals,
        });
        self
    }

    /// Declared numeric ranges, in width/length/volume order.
    pub fn ranges(&self) -> impl Iterator<Item = &RangeFilter> {
        [&self.width, &self.length, &self.volume]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// Number of constrained dimensions, one per field condition included.
    pub fn constrained_dimensions(&self) -> usize {
        self.ranges().count() + self.fields.len()
    }
}

// =============================================================================
// Resources
// =============================================================================

/// The four kinds of priced resource a stage can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum ResourceKind {
    Material,
    Operation,
    Equipment,
    Detail,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Material => "material",
            ResourceKind::Operation => "operation",
            ResourceKind::Equipment => "equipment",
            ResourceKind::Detail => "detail",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "material" => Ok(ResourceKind::Material),
            "operation" => Ok(ResourceKind::Operation),
            "equipment" => Ok(ResourceKind::Equipment),
            "detail" => Ok(ResourceKind::Detail),
            _ => Err(ValidationError::NotAllowed {
                field: "resource kind".to_string(),
                allowed: vec![
                    "material".to_string(),
                    "operation".to_string(),
                    "equipment".to_string(),
                    "detail".to_string(),
                ],
            }),
        }
    }
}

/// Typed pointer to a resource in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        ResourceRef {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One component of a detail: `quantity` units of `resource` per detail unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailComponent {
    pub resource: ResourceRef,
    pub quantity: Decimal,
}

/// How a resource variant is priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VariantCost {
    /// Material, Operation, Equipment: a price per unit.
    Unit { price: Money },
    /// Detail: the sum of its components.
    Components { components: Vec<DetailComponent> },
}

/// A matchable, priced option of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceVariant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub criteria: MatchCriteria,
    pub cost: VariantCost,
}

/// A material, operation, equipment item or composite detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub kind: ResourceKind,
    pub name: String,
    pub variants: Vec<ResourceVariant>,
}

impl Resource {
    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(self.kind, self.id.clone())
    }
}

// =============================================================================
// Stages & Presets
// =============================================================================

/// Quantity formula declaration, as stored in the catalog.
///
/// `kind` stays a raw string: the catalog is edited outside this system and
/// an unknown tag must surface as `InvalidFormula` for the stage that
/// declares it, not as a load failure for the whole catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficient: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl FormulaSpec {
    /// A formula of the given kind with no parameters.
    pub fn of(kind: impl Into<String>) -> Self {
        FormulaSpec {
            kind: kind.into(),
            coefficient: None,
            constant: None,
            field: None,
        }
    }

    pub fn with_coefficient(mut self, coefficient: Decimal) -> Self {
        self.coefficient = Some(coefficient);
        self
    }

    pub fn with_constant(mut self, constant: Decimal) -> Self {
        self.constant = Some(constant);
        self
    }

    pub fn with_field(mut self, code: impl Into<String>) -> Self {
        self.field = Some(code.into());
        self
    }
}

/// One selectable option within a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageVariant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub criteria: MatchCriteria,
    pub resource: ResourceRef,
}

/// One production step of a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    pub formula: FormulaSpec,
    pub variants: Vec<StageVariant>,
}

/// Declared type of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum FieldType {
    Number,
    Text,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
        }
    }
}

impl FromStr for FieldType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(FieldType::Number),
            "text" => Ok(FieldType::Text),
            "boolean" => Ok(FieldType::Boolean),
            _ => Err(ValidationError::NotAllowed {
                field: "field type".to_string(),
                allowed: vec![
                    "number".to_string(),
                    "text".to_string(),
                    "boolean".to_string(),
                ],
            }),
        }
    }
}

/// A custom field a calculator (preset) accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub code: String,
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
}

/// A named calculator: ordered stages plus custom field declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDef>,
}

impl Preset {
    /// Every resource referenced directly by a stage variant.
    pub fn referenced_resources(&self) -> Vec<ResourceRef> {
        let mut refs: Vec<ResourceRef> = Vec::new();
        for variant in self.stages.iter().flat_map(|s| s.variants.iter()) {
            if !refs.contains(&variant.resource) {
                refs.push(variant.resource.clone());
            }
        }
        refs
    }
}

// =============================================================================
// Catalog Snapshot
// =============================================================================

/// Immutable view of one preset and every resource it can reach.
///
/// Loaded in a single read before the engine runs and shared behind an `Arc`
/// between concurrent calculations. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    preset: Preset,
    resources: HashMap<ResourceRef, Resource>,
}

impl CatalogSnapshot {
    /// Builds a snapshot. A resource appearing twice keeps its last copy.
    pub fn new(preset: Preset, resources: impl IntoIterator<Item = Resource>) -> Self {
        let resources = resources
            .into_iter()
            .map(|r| (r.reference(), r))
            .collect();
        CatalogSnapshot { preset, resources }
    }

    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    /// Looks up a resource by kind and id.
    pub fn resource(&self, reference: &ResourceRef) -> Option<&Resource> {
        self.resources.get(reference)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn d(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = RangeFilter::new(d(100), d(200));
        assert!(range.contains(d(100)));
        assert!(range.contains(d(200)));
        assert!(!range.contains(d(99)));
        assert!(!range.contains(d(201)));
        assert_eq!(range.span(), d(100));
    }

    #[test]
    fn test_constrained_dimensions_counts_fields() {
        let criteria = MatchCriteria::any()
            .with_volume(RangeFilter::new(d(1), d(1000)))
            .with_field("lamination", FieldValue::Bool(true));
        assert_eq!(criteria.constrained_dimensions(), 2);
        assert_eq!(MatchCriteria::any().constrained_dimensions(), 0);
    }

    #[test]
    fn test_resource_kind_round_trips_through_str() {
        for kind in [
            ResourceKind::Material,
            ResourceKind::Operation,
            ResourceKind::Equipment,
            ResourceKind::Detail,
        ] {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("paper".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_variant_cost_json_shape() {
        let cost = VariantCost::Unit {
            price: Money::new(Decimal::new(250, 2), Currency::new("RUB").unwrap()),
        };
        let json = serde_json::to_value(&cost).unwrap();
        assert_eq!(json["type"], "unit");
        assert_eq!(json["price"]["amount"], "2.50");
    }

    #[test]
    fn test_preset_referenced_resources_deduplicates() {
        let variant = |id: &str, res: &str| StageVariant {
            id: id.to_string(),
            name: id.to_string(),
            criteria: MatchCriteria::any(),
            resource: ResourceRef::new(ResourceKind::Material, res),
        };
        let preset = Preset {
            id: "p".to_string(),
            name: "Preset".to_string(),
            stages: vec![Stage {
                id: "s".to_string(),
                name: "Stage".to_string(),
                formula: FormulaSpec::of("FIXED"),
                variants: vec![variant("a", "paper"), variant("b", "paper"), variant("c", "ink")],
            }],
            custom_fields: vec![],
        };
        assert_eq!(preset.referenced_resources().len(), 2);
    }

    #[test]
    fn test_snapshot_lookup_by_kind_and_id() {
        let paper = Resource {
            id: "paper".to_string(),
            kind: ResourceKind::Material,
            name: "Paper".to_string(),
            variants: vec![],
        };
        let preset = Preset {
            id: "p".to_string(),
            name: "Preset".to_string(),
            stages: vec![],
            custom_fields: vec![],
        };
        let snapshot = CatalogSnapshot::new(preset, vec![paper]);
        assert!(snapshot
            .resource(&ResourceRef::new(ResourceKind::Material, "paper"))
            .is_some());
        assert!(snapshot
            .resource(&ResourceRef::new(ResourceKind::Operation, "paper"))
            .is_none());
    }
}
