//! # Seed Data Generator
//!
//! Populates the database with a small demo print catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./printcost_dev.db
//! cargo run -p printcost-db --bin seed
//!
//! # Specify database path
//! cargo run -p printcost-db --bin seed -- --db ./data/printcost.db
//! ```
//!
//! ## Generated Catalog
//! ```text
//! presets    flyer, business-cards, brochure
//! materials  paper (A4 / A3 / SRA3 tiers), cardboard, ink, staple
//! operations print (short / long run), lamination, stitching
//! equipment  press
//! details    binding-kit (staple × 2 + stitching)
//! ```
//!
//! Prices are in RUB except `ink`, which is priced in USD to exercise
//! currency conversion.

use std::env;

use printcost_core::catalog::{
    CustomFieldDef, DetailComponent, FieldType, FormulaSpec, MatchCriteria, Preset, RangeFilter,
    Resource, ResourceKind, ResourceRef, ResourceVariant, Stage, StageVariant, VariantCost,
};
use printcost_core::{Currency, FieldValue, Money};
use printcost_db::{Database, DbConfig};
use rust_decimal::Decimal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./printcost_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("PrintCost Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./printcost_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 PrintCost Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let catalog = db.catalog();
    if catalog.get_preset("flyer").await?.is_some() {
        println!("⚠ Database already has the demo catalog");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let resources = demo_resources()?;
    for resource in &resources {
        catalog.insert_resource(resource).await?;
    }
    println!("✓ Inserted {} resources", resources.len());

    let presets = demo_presets();
    for preset in &presets {
        catalog.insert_preset(preset).await?;
    }
    println!("✓ Inserted {} presets", presets.len());

    println!();
    println!("Verifying snapshots...");
    for preset in &presets {
        let snapshot = catalog.load_snapshot(&preset.id).await?;
        println!(
            "  {}: {} stages, {} resources",
            preset.id,
            snapshot.preset().stages.len(),
            snapshot.resource_count()
        );
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

// =============================================================================
// Catalog Builders
// =============================================================================

fn dec(value: &str) -> Decimal {
    value.parse().unwrap_or_default()
}

fn range(min: &str, max: &str) -> RangeFilter {
    RangeFilter::new(dec(min), dec(max))
}

fn priced(id: &str, name: &str, criteria: MatchCriteria, price: Money) -> ResourceVariant {
    ResourceVariant {
        id: id.to_string(),
        name: name.to_string(),
        criteria,
        cost: VariantCost::Unit { price },
    }
}

fn unit_resource(kind: ResourceKind, id: &str, name: &str, variants: Vec<ResourceVariant>) -> Resource {
    Resource {
        id: id.to_string(),
        kind,
        name: name.to_string(),
        variants,
    }
}

fn stage(id: &str, name: &str, formula: FormulaSpec, variants: Vec<StageVariant>) -> Stage {
    Stage {
        id: id.to_string(),
        name: name.to_string(),
        formula,
        variants,
    }
}

fn uses(id: &str, criteria: MatchCriteria, kind: ResourceKind, resource: &str) -> StageVariant {
    StageVariant {
        id: id.to_string(),
        name: id.to_string(),
        criteria,
        resource: ResourceRef::new(kind, resource),
    }
}

fn demo_resources() -> Result<Vec<Resource>, Box<dyn std::error::Error>> {
    let rub = Currency::new("RUB")?;
    let usd = Currency::new("USD")?;
    let rub_price = |amount: &str| Money::new(dec(amount), rub.clone());

    Ok(vec![
        unit_resource(
            ResourceKind::Material,
            "paper",
            "Coated paper 130 g/m²",
            vec![
                priced(
                    "paper-a4",
                    "Up to A4",
                    MatchCriteria::any().with_format(range("0", "210"), range("0", "297")),
                    rub_price("0.10"),
                ),
                priced(
                    "paper-a3",
                    "Up to A3",
                    MatchCriteria::any().with_format(range("0", "297"), range("0", "420")),
                    rub_price("0.09"),
                ),
                priced("paper-any", "Any size", MatchCriteria::any(), rub_price("0.12")),
            ],
        ),
        unit_resource(
            ResourceKind::Material,
            "cardboard",
            "Cardboard 300 g/m²",
            vec![priced("cardboard-std", "Standard", MatchCriteria::any(), rub_price("0.35"))],
        ),
        unit_resource(
            ResourceKind::Material,
            "ink",
            "CMYK ink",
            vec![priced(
                "ink-cmyk",
                "CMYK",
                MatchCriteria::any(),
                Money::new(dec("0.0004"), usd),
            )],
        ),
        unit_resource(
            ResourceKind::Material,
            "staple",
            "Staple",
            vec![priced("staple-std", "Standard", MatchCriteria::any(), rub_price("0.05"))],
        ),
        unit_resource(
            ResourceKind::Operation,
            "print",
            "Digital print",
            vec![
                priced(
                    "print-short",
                    "Short run",
                    MatchCriteria::any().with_volume(range("1", "999")),
                    rub_price("3.00"),
                ),
                priced(
                    "print-long",
                    "Long run",
                    MatchCriteria::any().with_volume(range("1000", "10000000")),
                    rub_price("1.80"),
                ),
            ],
        ),
        unit_resource(
            ResourceKind::Operation,
            "lamination",
            "Gloss lamination",
            vec![priced("lamination-gloss", "Gloss", MatchCriteria::any(), rub_price("0.8"))],
        ),
        unit_resource(
            ResourceKind::Operation,
            "stitching",
            "Saddle stitching",
            vec![priced("stitching-std", "Standard", MatchCriteria::any(), rub_price("1.50"))],
        ),
        unit_resource(
            ResourceKind::Equipment,
            "press",
            "Press setup",
            vec![priced("press-setup", "Setup", MatchCriteria::any(), rub_price("500"))],
        ),
        Resource {
            id: "binding-kit".to_string(),
            kind: ResourceKind::Detail,
            name: "Binding kit".to_string(),
            variants: vec![ResourceVariant {
                id: "binding-kit-std".to_string(),
                name: "Two staples".to_string(),
                criteria: MatchCriteria::any(),
                cost: VariantCost::Components {
                    components: vec![
                        DetailComponent {
                            resource: ResourceRef::new(ResourceKind::Material, "staple"),
                            quantity: dec("2"),
                        },
                        DetailComponent {
                            resource: ResourceRef::new(ResourceKind::Operation, "stitching"),
                            quantity: dec("1"),
                        },
                    ],
                },
            }],
        },
    ])
}

fn demo_presets() -> Vec<Preset> {
    let lamination_field = CustomFieldDef {
        code: "lamination".to_string(),
        name: "Lamination".to_string(),
        field_type: FieldType::Boolean,
        required: false,
        default: Some(FieldValue::Bool(false)),
    };
    let laminated = || MatchCriteria::any().with_field("lamination", FieldValue::Bool(true));

    vec![
        Preset {
            id: "flyer".to_string(),
            name: "Flyer".to_string(),
            stages: vec![
                stage(
                    "paper",
                    "Paper",
                    FormulaSpec::of("PER_AREA_VOLUME").with_coefficient(dec("0.01")),
                    vec![uses("paper-0", MatchCriteria::any(), ResourceKind::Material, "paper")],
                ),
                stage(
                    "print",
                    "Print",
                    FormulaSpec::of("PER_VOLUME"),
                    vec![uses("print-0", MatchCriteria::any(), ResourceKind::Operation, "print")],
                ),
                stage(
                    "lamination",
                    "Lamination",
                    FormulaSpec::of("PER_VOLUME"),
                    vec![uses("lamination-0", laminated(), ResourceKind::Operation, "lamination")],
                ),
            ],
            custom_fields: vec![lamination_field.clone()],
        },
        Preset {
            id: "business-cards".to_string(),
            name: "Business cards".to_string(),
            stages: vec![
                stage(
                    "setup",
                    "Press setup",
                    FormulaSpec::of("FIXED"),
                    vec![uses("setup-0", MatchCriteria::any(), ResourceKind::Equipment, "press")],
                ),
                stage(
                    "cardboard",
                    "Cardboard",
                    FormulaSpec::of("PER_VOLUME"),
                    vec![uses("cardboard-0", MatchCriteria::any(), ResourceKind::Material, "cardboard")],
                ),
                stage(
                    "print",
                    "Print",
                    FormulaSpec::of("PER_VOLUME").with_coefficient(dec("0.5")),
                    vec![uses("print-0", MatchCriteria::any(), ResourceKind::Operation, "print")],
                ),
                stage(
                    "lamination",
                    "Lamination",
                    FormulaSpec::of("PER_VOLUME"),
                    vec![uses("lamination-0", laminated(), ResourceKind::Operation, "lamination")],
                ),
            ],
            custom_fields: vec![lamination_field],
        },
        Preset {
            id: "brochure".to_string(),
            name: "Stitched brochure".to_string(),
            stages: vec![
                stage(
                    "pages",
                    "Inner pages",
                    FormulaSpec::of("PER_FIELD").with_field("pages"),
                    vec![uses("pages-0", MatchCriteria::any(), ResourceKind::Operation, "print")],
                ),
                stage(
                    "ink",
                    "Ink coverage",
                    FormulaSpec::of("PER_AREA_VOLUME"),
                    vec![uses("ink-0", MatchCriteria::any(), ResourceKind::Material, "ink")],
                ),
                stage(
                    "binding",
                    "Binding",
                    FormulaSpec::of("PER_VOLUME"),
                    vec![uses("binding-0", MatchCriteria::any(), ResourceKind::Detail, "binding-kit")],
                ),
            ],
            custom_fields: vec![CustomFieldDef {
                code: "pages".to_string(),
                name: "Page count".to_string(),
                field_type: FieldType::Number,
                required: true,
                default: None,
            }],
        },
    ]
}
