//! Shared fixtures: a tiny catalog in an in-memory database.
//!
//! ```text
//! flyer      paper (PER_AREA, 0.10/mm²) + print (PER_VOLUME, 2.50/copy)
//! ambiguous  one stage with two catch-all variants
//! empty      no stages
//! ```

use printcost_core::catalog::{
    FormulaSpec, MatchCriteria, Preset, Resource, ResourceKind, ResourceRef, ResourceVariant,
    Stage, StageVariant, VariantCost,
};
use printcost_core::{CalculationRequest, CustomFieldValues, Currency, Money};
use printcost_db::{Database, DbConfig};
use rust_decimal::Decimal;

use crate::service::CalculationService;
use crate::settings::PricingSettings;

fn unit_resource(kind: ResourceKind, id: &str, price: Decimal) -> Resource {
    Resource {
        id: id.to_string(),
        kind,
        name: id.to_string(),
        variants: vec![ResourceVariant {
            id: format!("{}-std", id),
            name: "Standard".to_string(),
            criteria: MatchCriteria::any(),
            cost: VariantCost::Unit {
                price: Money::new(price, Currency::default()),
            },
        }],
    }
}

fn uses(id: &str, kind: ResourceKind, resource: &str) -> StageVariant {
    StageVariant {
        id: id.to_string(),
        name: id.to_string(),
        criteria: MatchCriteria::any(),
        resource: ResourceRef::new(kind, resource),
    }
}

fn preset(id: &str, stages: Vec<Stage>) -> Preset {
    Preset {
        id: id.to_string(),
        name: id.to_string(),
        stages,
        custom_fields: Vec::new(),
    }
}

fn stage(id: &str, formula: &str, variants: Vec<StageVariant>) -> Stage {
    Stage {
        id: id.to_string(),
        name: id.to_string(),
        formula: FormulaSpec::of(formula),
        variants,
    }
}

pub(crate) async fn seeded_database() -> Database {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let catalog = db.catalog();

    catalog
        .insert_resource(&unit_resource(ResourceKind::Material, "paper", Decimal::new(10, 2)))
        .await
        .unwrap();
    catalog
        .insert_resource(&unit_resource(ResourceKind::Operation, "print", Decimal::new(250, 2)))
        .await
        .unwrap();

    let presets = vec![
        preset(
            "flyer",
            vec![
                stage("paper", "PER_AREA", vec![uses("paper-0", ResourceKind::Material, "paper")]),
                stage("print", "PER_VOLUME", vec![uses("print-0", ResourceKind::Operation, "print")]),
            ],
        ),
        preset(
            "ambiguous",
            vec![stage(
                "print",
                "PER_VOLUME",
                vec![
                    uses("print-0", ResourceKind::Operation, "print"),
                    uses("print-1", ResourceKind::Operation, "print"),
                ],
            )],
        ),
        preset("empty", Vec::new()),
    ];
    for preset in &presets {
        catalog.insert_preset(preset).await.unwrap();
    }

    db
}

pub(crate) async fn seeded_service() -> CalculationService {
    CalculationService::new(seeded_database().await, &PricingSettings::default()).unwrap()
}

/// A4 request for `preset_id`.
pub(crate) fn flyer_request(preset_id: &str, volume: i64) -> CalculationRequest {
    CalculationRequest {
        preset_id: preset_id.to_string(),
        format_code: "210x297".to_string(),
        volume,
        custom_fields: CustomFieldValues::new(),
        target_currency: None,
    }
}
