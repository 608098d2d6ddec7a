//! # Quantity Formulas
//!
//! A stage's [`FormulaSpec`] says how many units of the matched resource the
//! stage consumes. A `FormulaSpec` is raw catalog data; it is parsed into a
//! [`QuantityFormula`] when the stage is evaluated so that a bad declaration
//! is reported against that stage.
//!
//! ## Kinds
//! ```text
//! ┌─────────────────┬──────────────────────────────────────────────┐
//! │ PER_AREA        │ width × length × coefficient                 │
//! │ PER_VOLUME      │ volume × coefficient                         │
//! │ FIXED           │ constant (1 when not declared)               │
//! │ PER_AREA_VOLUME │ width × length × volume × coefficient        │
//! │ PER_FIELD       │ custom field `field` × coefficient           │
//! │ PER_SUBTOTAL    │ subtotal of earlier stages × coefficient     │
//! └─────────────────┴──────────────────────────────────────────────┘
//! coefficient defaults to 1 and must not be negative
//! ```

use rust_decimal::Decimal;

use crate::catalog::FormulaSpec;
use crate::error::{CoreError, CoreResult};
use crate::types::{FieldValue, SelectionContext};

pub const PER_AREA: &str = "PER_AREA";
pub const PER_VOLUME: &str = "PER_VOLUME";
pub const FIXED: &str = "FIXED";
pub const PER_AREA_VOLUME: &str = "PER_AREA_VOLUME";
pub const PER_FIELD: &str = "PER_FIELD";
pub const PER_SUBTOTAL: &str = "PER_SUBTOTAL";

/// A validated quantity formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityFormula {
    PerArea { coefficient: Decimal },
    PerVolume { coefficient: Decimal },
    Fixed { constant: Decimal },
    PerAreaVolume { coefficient: Decimal },
    PerField { field: String, coefficient: Decimal },
    PerSubtotal { coefficient: Decimal },
}

impl QuantityFormula {
    /// Parses a catalog declaration. Kind tags are case-insensitive.
    pub fn parse(spec: &FormulaSpec) -> CoreResult<Self> {
        let kind = spec.kind.trim().to_ascii_uppercase();
        let coefficient = spec.coefficient.unwrap_or(Decimal::ONE);
        if coefficient < Decimal::ZERO {
            return Err(invalid(spec, "coefficient must not be negative"));
        }

        let formula = match kind.as_str() {
            PER_AREA => QuantityFormula::PerArea { coefficient },
            PER_VOLUME => QuantityFormula::PerVolume { coefficient },
            FIXED => {
                let constant = spec.constant.unwrap_or(Decimal::ONE);
                if constant < Decimal::ZERO {
                    return Err(invalid(spec, "constant must not be negative"));
                }
                QuantityFormula::Fixed { constant }
            }
            PER_AREA_VOLUME => QuantityFormula::PerAreaVolume { coefficient },
            PER_FIELD => {
                let field = spec
                    .field
                    .as_deref()
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| invalid(spec, "PER_FIELD requires a field code"))?;
                QuantityFormula::PerField {
                    field: field.to_string(),
                    coefficient,
                }
            }
            PER_SUBTOTAL => QuantityFormula::PerSubtotal { coefficient },
            _ => return Err(invalid(spec, "unknown formula kind")),
        };
        Ok(formula)
    }

    /// Evaluates the quantity. `subtotal` is the cumulative amount of the
    /// stages evaluated before this one.
    ///
    /// ## Errors
    /// `CoreError::Overflow` when a product leaves the `Decimal` range.
    pub fn quantity(&self, context: &SelectionContext, subtotal: Decimal) -> CoreResult<Decimal> {
        let volume = context.volume_decimal();

        let quantity = match self {
            QuantityFormula::PerArea { coefficient } => {
                product(&[context.format.area()?, *coefficient])?
            }
            QuantityFormula::PerVolume { coefficient } => product(&[volume, *coefficient])?,
            QuantityFormula::Fixed { constant } => *constant,
            QuantityFormula::PerAreaVolume { coefficient } => {
                product(&[context.format.area()?, volume, *coefficient])?
            }
            QuantityFormula::PerField { field, coefficient } => {
                match context.field(field) {
                    None => {
                        return Err(CoreError::UnknownCustomField {
                            code: field.clone(),
                        })
                    }
                    Some(FieldValue::Number(n)) if *n >= Decimal::ZERO => {
                        product(&[*n, *coefficient])?
                    }
                    Some(other) => {
                        return Err(CoreError::InvalidFormula {
                            kind: PER_FIELD.to_string(),
                            reason: format!(
                                "field {} must be a non-negative number, got {} '{}'",
                                field,
                                other.type_name(),
                                other
                            ),
                        })
                    }
                }
            }
            QuantityFormula::PerSubtotal { coefficient } => product(&[subtotal, *coefficient])?,
        };
        Ok(quantity)
    }
}

fn product(factors: &[Decimal]) -> CoreResult<Decimal> {
    factors
        .iter()
        .try_fold(Decimal::ONE, |acc, factor| acc.checked_mul(*factor))
        .ok_or_else(|| CoreError::overflow(format!("quantity {:?}", factors)))
}

fn invalid(spec: &FormulaSpec, reason: &str) -> CoreError {
    CoreError::InvalidFormula {
        kind: spec.kind.clone(),
        reason: reason.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::types::Format;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn context() -> SelectionContext {
        SelectionContext::new(
            Format::new(d("210"), d("297")),
            500,
            Currency::new("RUB").unwrap(),
        )
        .with_field("pages", FieldValue::Number(d("24")))
        .with_field("finish", FieldValue::Text("matte".into()))
    }

    fn eval(spec: FormulaSpec) -> CoreResult<Decimal> {
        QuantityFormula::parse(&spec)?.quantity(&context(), d("1000"))
    }

    #[test]
    fn test_per_area() {
        assert_eq!(eval(FormulaSpec::of(PER_AREA)).unwrap(), d("62370"));
        assert_eq!(
            eval(FormulaSpec::of(PER_AREA).with_coefficient(d("0.5"))).unwrap(),
            d("31185")
        );
    }

    #[test]
    fn test_per_volume_defaults_coefficient() {
        assert_eq!(eval(FormulaSpec::of(PER_VOLUME)).unwrap(), d("500"));
        assert_eq!(eval(FormulaSpec::of("per_volume").with_coefficient(d("2"))).unwrap(), d("1000"));
    }

    #[test]
    fn test_fixed() {
        assert_eq!(eval(FormulaSpec::of(FIXED)).unwrap(), d("1"));
        assert_eq!(eval(FormulaSpec::of(FIXED).with_constant(d("3"))).unwrap(), d("3"));
    }

    #[test]
    fn test_per_area_volume() {
        assert_eq!(eval(FormulaSpec::of(PER_AREA_VOLUME)).unwrap(), d("31185000"));
    }

    #[test]
    fn test_per_field() {
        let spec = FormulaSpec::of(PER_FIELD).with_field("pages").with_coefficient(d("500"));
        assert_eq!(eval(spec).unwrap(), d("12000"));
    }

    #[test]
    fn test_per_field_errors() {
        assert!(matches!(
            eval(FormulaSpec::of(PER_FIELD)),
            Err(CoreError::InvalidFormula { .. })
        ));
        assert!(matches!(
            eval(FormulaSpec::of(PER_FIELD).with_field("missing")),
            Err(CoreError::UnknownCustomField { .. })
        ));
        assert!(matches!(
            eval(FormulaSpec::of(PER_FIELD).with_field("finish")),
            Err(CoreError::InvalidFormula { .. })
        ));
    }

    #[test]
    fn test_per_subtotal() {
        let spec = FormulaSpec::of(PER_SUBTOTAL).with_coefficient(d("0.1"));
        assert_eq!(eval(spec).unwrap(), d("100"));
    }

    #[test]
    fn test_largest_run_with_huge_coefficient_overflows_cleanly() {
        let roll = SelectionContext::new(
            Format::new(d("100000"), d("100000")),
            10_000_000,
            Currency::new("RUB").unwrap(),
        );
        let formula =
            QuantityFormula::parse(&FormulaSpec::of(PER_AREA_VOLUME).with_coefficient(d("1000000000000000")))
                .unwrap();
        let err = formula.quantity(&roll, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, CoreError::Overflow { .. }));
    }

    #[test]
    fn test_rejects_unknown_kind_and_negative_coefficient() {
        match eval(FormulaSpec::of("PER_PAGE")) {
            Err(CoreError::InvalidFormula { kind, .. }) => assert_eq!(kind, "PER_PAGE"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            eval(FormulaSpec::of(PER_AREA).with_coefficient(d("-1"))),
            Err(CoreError::InvalidFormula { .. })
        ));
        assert!(matches!(
            eval(FormulaSpec::of(FIXED).with_constant(d("-1"))),
            Err(CoreError::InvalidFormula { .. })
        ));
    }
}
