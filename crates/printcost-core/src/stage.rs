//! # Stage Aggregator
//!
//! Evaluates one stage of a preset into at most one [`CostLineItem`].
//!
//! ## Evaluation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stage                                                                  │
//! │    │ 1. parse FormulaSpec ────────────── bad ───► InvalidFormula        │
//! │    │ 2. match StageVariant ───────────── none ──► None (stage omitted)  │
//! │    │ 3. look up Resource ─────────────── gone ──► UnknownResource       │
//! │    │ 4. match ResourceVariant ────────── none ──► None                  │
//! │    ▼                                                                    │
//! │  unit price                                                             │
//! │    ├── Unit { price }      ──► PricingResolver (convert + round)        │
//! │    └── Components [...]    ──► Σ component unit price × component qty   │
//! │                                (recursive, skips unmatched components,  │
//! │                                 CyclicDetail on self-containment)       │
//! │    │                                                                    │
//! │    ▼ 5. quantity = formula(context, subtotal so far)                    │
//! │  line total = unit price × quantity    (full precision, checked)        │
//! │  display total = round(line total)     (display only)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use tracing::debug;

use crate::catalog::{CatalogSnapshot, Resource, ResourceRef, ResourceVariant, Stage, VariantCost};
use crate::error::{CalculationError, CalculationResult, CoreError, CoreResult};
use crate::formula::QuantityFormula;
use crate::matcher::match_variant;
use crate::money::Money;
use crate::pricing::PricingResolver;
use crate::types::{CostLineItem, SelectionContext};

/// Evaluates stages against one catalog snapshot.
///
/// Borrowed, stateless and cheap to build: one per calculation.
pub struct StageAggregator<'a> {
    snapshot: &'a CatalogSnapshot,
    pricing: &'a PricingResolver,
}

impl<'a> StageAggregator<'a> {
    pub fn new(snapshot: &'a CatalogSnapshot, pricing: &'a PricingResolver) -> Self {
        StageAggregator { snapshot, pricing }
    }

    /// Evaluates `stage`. `subtotal` is the cumulative full-precision total of
    /// the stages evaluated before it.
    ///
    /// ## Returns
    /// - `Ok(Some(line))`: the stage applies
    /// - `Ok(None)`: no stage variant or no resource variant applies
    /// - `Err(e)`: fatal for the calculation, located at this stage
    pub fn evaluate(
        &self,
        stage: &Stage,
        context: &SelectionContext,
        subtotal: &Money,
    ) -> CalculationResult<Option<CostLineItem>> {
        let at_stage = |e: CoreError| CalculationError::at_stage(e, stage.id.clone());

        // The formula belongs to the stage, so a bad one fails the calculation
        // even when no variant applies.
        let formula = QuantityFormula::parse(&stage.formula).map_err(at_stage)?;

        let stage_variant = match match_variant(&stage.variants, context).map_err(at_stage)? {
            Some(variant) => variant,
            None => {
                debug!(stage_id = %stage.id, "No stage variant applies, stage omitted");
                return Ok(None);
            }
        };
        let in_variant = |e: CoreError| at_stage(e).with_variant(stage_variant.id.clone());

        let resource = self.resource(&stage_variant.resource).map_err(in_variant)?;

        let resource_variant = match match_variant(&resource.variants, context).map_err(in_variant)? {
            Some(variant) => variant,
            None => {
                debug!(
                    stage_id = %stage.id,
                    resource = %stage_variant.resource,
                    "No resource variant applies, stage omitted"
                );
                return Ok(None);
            }
        };

        let mut path = Vec::new();
        let unit_price = self
            .unit_price(resource, resource_variant, context, &mut path)
            .map_err(|e| {
                let variant_id = match &e {
                    CoreError::UnknownCurrency { variant_id, .. } => variant_id.clone(),
                    _ => resource_variant.id.clone(),
                };
                at_stage(e).with_variant(variant_id)
            })?;
        let Some(unit_price) = unit_price else {
            debug!(stage_id = %stage.id, detail = %resource.id, "No detail component applies, stage omitted");
            return Ok(None);
        };

        let quantity = formula
            .quantity(context, subtotal.amount())
            .map_err(in_variant)?;
        if quantity < Decimal::ZERO {
            return Err(in_variant(CoreError::InvalidFormula {
                kind: stage.formula.kind.clone(),
                reason: format!("quantity {} is negative", quantity),
            }));
        }

        let line_total = unit_price.multiply(quantity).map_err(in_variant)?;
        let display_total = self.pricing.rounding().round_total(&line_total);

        debug!(
            stage_id = %stage.id,
            variant_id = %stage_variant.id,
            resource_variant_id = %resource_variant.id,
            %quantity,
            unit_price = %unit_price,
            line_total = %line_total,
            "Stage evaluated"
        );

        Ok(Some(CostLineItem {
            stage_id: stage.id.clone(),
            stage_name: stage.name.clone(),
            stage_variant_id: stage_variant.id.clone(),
            resource_id: resource.id.clone(),
            resource_variant_id: resource_variant.id.clone(),
            quantity,
            unit_price,
            line_total,
            display_total,
        }))
    }

    fn resource(&self, reference: &ResourceRef) -> CoreResult<&'a Resource> {
        self.snapshot
            .resource(reference)
            .ok_or_else(|| CoreError::UnknownResource {
                kind: reference.kind.to_string(),
                id: reference.id.clone(),
            })
    }

    /// Unit price of a resource variant in the context currency.
    ///
    /// `path` holds the details currently being expanded; meeting one of
    /// them again means the catalog has a cycle.
    fn unit_price(
        &self,
        resource: &'a Resource,
        variant: &'a ResourceVariant,
        context: &SelectionContext,
        path: &mut Vec<ResourceRef>,
    ) -> CoreResult<Option<Money>> {
        let components = match &variant.cost {
            VariantCost::Unit { price } => {
                return self
                    .pricing
                    .resolve(price, &variant.id, &context.currency)
                    .map(Some);
            }
            VariantCost::Components { components } => components,
        };

        let reference = resource.reference();
        if path.contains(&reference) {
            return Err(CoreError::CyclicDetail {
                resource_id: resource.id.clone(),
            });
        }
        path.push(reference);

        let mut total: Option<Money> = None;
        for component in components {
            let child = self.resource(&component.resource)?;
            let Some(child_variant) = match_variant(&child.variants, context)? else {
                debug!(detail = %resource.id, component = %component.resource, "Component skipped");
                continue;
            };
            let Some(child_price) = self.unit_price(child, child_variant, context, path)? else {
                continue;
            };
            let part = child_price.multiply(component.quantity)?;
            total = Some(match total {
                None => part,
                Some(sum) => sum.checked_add(&part)?,
            });
        }

        path.pop();
        Ok(total)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
