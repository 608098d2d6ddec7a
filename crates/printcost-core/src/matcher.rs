//! # Variant Matcher
//!
//! Picks the single applicable variant for a [`SelectionContext`].
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  candidates ──► 1. FILTER: every declared range contains the context    │
//! │                            value, every field condition is equal        │
//! │                     │                                                   │
//! │                     ├── 0 survivors ──────────────► Ok(None)            │
//! │                     ▼                                                   │
//! │                 2. RANK by specificity                                  │
//! │                     (a) constrained dimensions   more wins              │
//! │                     (b) Π (span + 1) per range   smaller wins           │
//! │                     │                                                   │
//! │                     ├── top two equal ────────────► Err(AmbiguousMatch) │
//! │                     ▼                                                   │
//! │                 Ok(Some(most specific))                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "No match" and "tied match" are deliberately different: a catalog may
//! omit a stage for some formats, but a tie is a configuration error.
//!
//! ## Example
//! ```rust
//! use printcost_core::catalog::{MatchCriteria, RangeFilter};
//! use printcost_core::matcher::{match_variant, Matchable};
//! use printcost_core::money::Currency;
//! use printcost_core::types::{Format, SelectionContext};
//! use rust_decimal::Decimal;
//!
//! struct Rule { id: &'static str, criteria: MatchCriteria }
//!
//! impl Matchable for Rule {
//!     fn variant_id(&self) -> &str { self.id }
//!     fn criteria(&self) -> &MatchCriteria { &self.criteria }
//! }
//!
//! let rules = vec![
//!     Rule { id: "any", criteria: MatchCriteria::any() },
//!     Rule {
//!         id: "short-run",
//!         criteria: MatchCriteria::any()
//!             .with_volume(RangeFilter::new(Decimal::ONE, Decimal::from(1000))),
//!     },
//! ];
//! let context = SelectionContext::new(
//!     Format::new(Decimal::from(210), Decimal::from(297)),
//!     500,
//!     Currency::new("RUB").unwrap(),
//! );
//! let chosen = match_variant(&rules, &context).unwrap().unwrap();
//! assert_eq!(chosen.variant_id(), "short-run");
//! ```

use std::cmp::Ordering;

use rust_decimal::Decimal;
use tracing::debug;

use crate::catalog::{MatchCriteria, ResourceVariant, StageVariant};
use crate::error::{CoreError, CoreResult};
use crate::types::SelectionContext;

// =============================================================================
// Matchable Trait
// =============================================================================

/// Anything selectable by range containment.
pub trait Matchable {
    fn variant_id(&self) -> &str;
    fn criteria(&self) -> &MatchCriteria;
}

impl Matchable for StageVariant {
    fn variant_id(&self) -> &str {
        &self.id
    }

    fn criteria(&self) -> &MatchCriteria {
        &self.criteria
    }
}

impl Matchable for ResourceVariant {
    fn variant_id(&self) -> &str {
        &self.id
    }

    fn criteria(&self) -> &MatchCriteria {
        &self.criteria
    }
}

// =============================================================================
// Specificity
// =============================================================================

/// Ranking key of a surviving candidate. Greater is more specific.
///
/// `extent` multiplies `span + 1` over the declared ranges. An exact range
/// such as `[210, 210]` contributes 1, so it never hides the width of the
/// candidate's other ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specificity {
    pub dimensions: usize,
    pub extent: Decimal,
}

impl Specificity {
    /// Computes the key for a set of criteria.
    pub fn of(criteria: &MatchCriteria) -> Self {
        let extent = criteria
            .ranges()
            .try_fold(Decimal::ONE, |acc, range| {
                range
                    .span()
                    .checked_add(Decimal::ONE)
                    .and_then(|width| acc.checked_mul(width))
            })
            .unwrap_or(Decimal::MAX);
        Specificity {
            dimensions: criteria.constrained_dimensions(),
            extent,
        }
    }
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dimensions
            .cmp(&other.dimensions)
            // Narrower range is more specific.
            .then_with(|| other.extent.cmp(&self.extent))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// =============================================================================
// Matching
// =============================================================================

/// Whether `criteria` admits the context.
///
/// Ranges are tested first; field conditions are only read for candidates
/// whose ranges contain the context. A condition on a code the context does
/// not carry fails with `UnknownCustomField`.
pub fn matches(criteria: &MatchCriteria, context: &SelectionContext) -> CoreResult<bool> {
    let format = &context.format;
    let in_ranges = criteria.width.map_or(true, |r| r.contains(format.width))
        && criteria.length.map_or(true, |r| r.contains(format.length))
        && criteria
            .volume
            .map_or(true, |r| r.contains(context.volume_decimal()));
    if !in_ranges {
        return Ok(false);
    }

    for condition in &criteria.fields {
        let value = context
            .field(&condition.code)
            .ok_or_else(|| CoreError::UnknownCustomField {
                code: condition.code.clone(),
            })?;
        if *value != condition.equals {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Selects the unique most specific candidate.
///
/// ## Returns
/// - `Ok(Some(v))`: exactly one most specific survivor
/// - `Ok(None)`: nothing applies
/// - `Err(AmbiguousMatch)`: two or more survivors tie for most specific
pub fn match_variant<'a, V: Matchable>(
    candidates: &'a [V],
    context: &SelectionContext,
) -> CoreResult<Option<&'a V>> {
    let mut survivors: Vec<(Specificity, &'a V)> = Vec::new();
    for candidate in candidates {
        if matches(candidate.criteria(), context)? {
            survivors.push((Specificity::of(candidate.criteria()), candidate));
        }
    }

    // Stable sort: ties keep catalog order, which keeps error output stable.
    survivors.sort_by(|a, b| b.0.cmp(&a.0));

    match survivors.as_slice() {
        [] => Ok(None),
        [(_, only)] => Ok(Some(*only)),
        [(best, winner), (second, _), ..] => {
            if best == second {
                let candidates: Vec<String> = survivors
                    .iter()
                    .filter(|(key, _)| key == best)
                    .map(|(_, v)| v.variant_id().to_string())
                    .collect();
                debug!(?candidates, "Ambiguous variant match");
                return Err(CoreError::AmbiguousMatch { candidates });
            }
            Ok(Some(*winner))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RangeFilter;
    use crate::money::Currency;
    use crate::types::{FieldValue, Format};

    struct Rule {
        id: &'static str,
        criteria: MatchCriteria,
    }

    impl Matchable for Rule {
        fn variant_id(&self) -> &str {
            self.id
        }

        fn criteria(&self) -> &MatchCriteria {
            &self.criteria
        }
    }

    fn rule(id: &'static str, criteria: MatchCriteria) -> Rule {
        Rule { id, criteria }
    }

    fn range(min: i64, max: i64) -> RangeFilter {
        RangeFilter::new(Decimal::from(min), Decimal::from(max))
    }

    fn a4(volume: u64) -> SelectionContext {
        SelectionContext::new(
            Format::new(Decimal::from(210), Decimal::from(297)),
            volume,
            Currency::new("RUB").unwrap(),
        )
    }

    #[test]
    fn test_no_candidates_is_none() {
        let rules: Vec<Rule> = vec![];
        assert!(match_variant(&rules, &a4(1)).unwrap().is_none());
    }

    #[test]
    fn test_no_survivor_is_none() {
        let rules = vec![rule("big", MatchCriteria::any().with_volume(range(1000, 5000)))];
        assert!(match_variant(&rules, &a4(10)).unwrap().is_none());
    }

    #[test]
    fn test_single_unconstrained_candidate_matches() {
        let rules = vec![rule("any", MatchCriteria::any())];
        assert_eq!(match_variant(&rules, &a4(10)).unwrap().unwrap().id, "any");
    }

    #[test]
    fn test_more_dimensions_wins() {
        let rules = vec![
            rule("volume-only", MatchCriteria::any().with_volume(range(1, 100_000))),
            rule(
                "format-and-volume",
                MatchCriteria::any()
                    .with_format(range(0, 5000), range(0, 5000))
                    .with_volume(range(1, 100_000)),
            ),
        ];
        let chosen = match_variant(&rules, &a4(500)).unwrap().unwrap();
        assert_eq!(chosen.id, "format-and-volume");
    }

    #[test]
    fn test_narrowest_range_wins() {
        let rules = vec![
            rule("wide", MatchCriteria::any().with_volume(range(1, 10_000))),
            rule("narrow", MatchCriteria::any().with_volume(range(100, 1000))),
        ];
        assert_eq!(match_variant(&rules, &a4(500)).unwrap().unwrap().id, "narrow");
        // Outside the narrow range only the wide one survives.
        assert_eq!(match_variant(&rules, &a4(5000)).unwrap().unwrap().id, "wide");
    }

    #[test]
    fn test_identical_ranges_are_ambiguous() {
        let rules = vec![
            rule("a", MatchCriteria::any().with_format(range(0, 1000), range(0, 1000))),
            rule("b", MatchCriteria::any().with_format(range(0, 1000), range(0, 1000))),
            rule("c", MatchCriteria::any()),
        ];
        match match_variant(&rules, &a4(1)) {
            Err(CoreError::AmbiguousMatch { candidates }) => {
                assert_eq!(candidates, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected AmbiguousMatch, got {:?}", other.map(|v| v.map(|r| r.id))),
        }
    }

    #[test]
    fn test_exact_format_still_ranks_by_volume() {
        let a4_exact = || MatchCriteria::any().with_format(range(210, 210), range(297, 297));
        let rules = vec![
            rule("a4-any-run", a4_exact().with_volume(range(1, 100_000))),
            rule("a4-short-run", a4_exact().with_volume(range(400, 600))),
        ];
        let chosen = match_variant(&rules, &a4(500)).unwrap().unwrap();
        assert_eq!(chosen.id, "a4-short-run");
        assert_eq!(match_variant(&rules, &a4(5000)).unwrap().unwrap().id, "a4-any-run");
    }

    #[test]
    fn test_exact_range_beats_wider_range() {
        let rules = vec![
            rule("near-a4", MatchCriteria::any().with_format(range(200, 220), range(297, 297))),
            rule("a4", MatchCriteria::any().with_format(range(210, 210), range(297, 297))),
        ];
        assert_eq!(match_variant(&rules, &a4(1)).unwrap().unwrap().id, "a4");
    }

    #[test]
    fn test_equal_span_different_position_is_ambiguous() {
        let rules = vec![
            rule("low", MatchCriteria::any().with_volume(range(0, 600))),
            rule("high", MatchCriteria::any().with_volume(range(400, 1000))),
        ];
        assert!(matches!(
            match_variant(&rules, &a4(500)),
            Err(CoreError::AmbiguousMatch { .. })
        ));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let rules = vec![rule("a4", MatchCriteria::any().with_format(range(210, 210), range(297, 297)))];
        assert!(match_variant(&rules, &a4(1)).unwrap().is_some());
    }

    #[test]
    fn test_field_condition_selects_variant() {
        let rules = vec![
            rule("glossy", MatchCriteria::any().with_field("finish", FieldValue::Text("gloss".into()))),
            rule("matte", MatchCriteria::any().with_field("finish", FieldValue::Text("matte".into()))),
        ];
        let context = a4(1).with_field("finish", FieldValue::Text("matte".into()));
        assert_eq!(match_variant(&rules, &context).unwrap().unwrap().id, "matte");
    }

    #[test]
    fn test_field_condition_on_absent_code_fails() {
        let rules = vec![rule(
            "laminated",
            MatchCriteria::any().with_field("lamination", FieldValue::Bool(true)),
        )];
        match match_variant(&rules, &a4(1)) {
            Err(CoreError::UnknownCustomField { code }) => assert_eq!(code, "lamination"),
            other => panic!("unexpected {:?}", other.map(|v| v.map(|r| r.id))),
        }
    }

    #[test]
    fn test_matching_is_deterministic() {
        let rules = vec![
            rule("wide", MatchCriteria::any().with_volume(range(1, 10_000))),
            rule("narrow", MatchCriteria::any().with_volume(range(100, 1000))),
        ];
        let first = match_variant(&rules, &a4(500)).unwrap().unwrap().id;
        for _ in 0..10 {
            assert_eq!(match_variant(&rules, &a4(500)).unwrap().unwrap().id, first);
        }
    }
}
