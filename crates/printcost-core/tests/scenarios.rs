//! End-to-end calculation scenarios over small in-memory catalogs.

use printcost_core::catalog::*;
use printcost_core::money::{Currency, Money, RoundingPolicy};
use printcost_core::pricing::{ConversionTable, PricingResolver};
use printcost_core::types::{CalculationRequest, CustomFieldValues, FieldValue};
use printcost_core::{CalculationEngine, ErrorKind};
use rust_decimal::Decimal;

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn rub() -> Currency {
    Currency::new("RUB").unwrap()
}

fn material(id: &str, price: &str, currency: &Currency) -> Resource {
    Resource {
        id: id.to_string(),
        kind: ResourceKind::Material,
        name: id.to_string(),
        variants: vec![ResourceVariant {
            id: format!("{}-default", id),
            name: "Default".to_string(),
            criteria: MatchCriteria::any(),
            cost: VariantCost::Unit {
                price: Money::new(d(price), currency.clone()),
            },
        }],
    }
}

fn single_stage(formula: FormulaSpec, criteria: Vec<MatchCriteria>, resource: &str) -> Preset {
    Preset {
        id: "leaflet".to_string(),
        name: "Leaflet".to_string(),
        stages: vec![Stage {
            id: "print".to_string(),
            name: "Printing".to_string(),
            formula,
            variants: criteria
                .into_iter()
                .enumerate()
                .map(|(i, criteria)| StageVariant {
                    id: format!("print-{}", i),
                    name: format!("Printing {}", i),
                    criteria,
                    resource: ResourceRef::new(ResourceKind::Material, resource),
                })
                .collect(),
        }],
        custom_fields: vec![],
    }
}

fn request(format_code: &str, volume: i64) -> CalculationRequest {
    CalculationRequest {
        preset_id: "leaflet".to_string(),
        format_code: format_code.to_string(),
        volume,
        custom_fields: CustomFieldValues::new(),
        target_currency: None,
    }
}

#[test]
fn scenario_per_area_a4_sheet() {
    let snapshot = CatalogSnapshot::new(
        single_stage(FormulaSpec::of("PER_AREA"), vec![MatchCriteria::any()], "paper"),
        vec![material("paper", "0.10", &rub())],
    );
    let breakdown = CalculationEngine::default()
        .calculate_request(&snapshot, &request("210x297", 1), &rub())
        .unwrap();

    assert_eq!(breakdown.items.len(), 1);
    assert_eq!(breakdown.items[0].quantity, d("62370"));
    assert_eq!(breakdown.total.amount(), d("6237.00"));
    assert_eq!(breakdown.total.to_string(), "6237.00 RUB");
}

#[test]
fn scenario_per_volume_run() {
    let snapshot = CatalogSnapshot::new(
        single_stage(FormulaSpec::of("PER_VOLUME"), vec![MatchCriteria::any()], "click"),
        vec![material("click", "2.50", &rub())],
    );
    let breakdown = CalculationEngine::default()
        .calculate_request(&snapshot, &request("90x50", 500), &rub())
        .unwrap();
    assert_eq!(breakdown.total.amount(), d("1250.00"));
}

#[test]
fn scenario_identical_ranges_are_ambiguous() {
    let square = || {
        MatchCriteria::any().with_format(
            RangeFilter::new(d("0"), d("1000")),
            RangeFilter::new(d("0"), d("1000")),
        )
    };
    let snapshot = CatalogSnapshot::new(
        single_stage(FormulaSpec::of("FIXED"), vec![square(), square()], "paper"),
        vec![material("paper", "1", &rub())],
    );
    let err = CalculationEngine::default()
        .calculate_request(&snapshot, &request("210x297", 1), &rub())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AmbiguousMatch);
    assert_eq!(err.stage_id.as_deref(), Some("print"));
    let failure = err.to_failure();
    assert!(failure.message.contains("print-0"));
    assert!(failure.message.contains("print-1"));
}

#[test]
fn scenario_empty_preset_fails_before_lookups() {
    // No resources at all: any lookup would fail with UnknownResource.
    let preset = Preset {
        id: "blank".to_string(),
        name: "Blank".to_string(),
        stages: vec![],
        custom_fields: vec![],
    };
    let snapshot = CatalogSnapshot::new(preset, vec![]);
    let err = CalculationEngine::default()
        .calculate_request(&snapshot, &request("210x297", 1), &rub())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyPreset);
    assert!(err.stage_id.is_none());
}

#[test]
fn calculation_is_idempotent() {
    let snapshot = CatalogSnapshot::new(
        single_stage(FormulaSpec::of("PER_AREA_VOLUME").with_coefficient(d("0.000001")), vec![MatchCriteria::any()], "paper"),
        vec![material("paper", "3.3333", &rub())],
    );
    let engine = CalculationEngine::default();
    let first = engine
        .calculate_request(&snapshot, &request("148x210", 1000), &rub())
        .unwrap();
    for _ in 0..5 {
        let again = engine
            .calculate_request(&snapshot, &request("148x210", 1000), &rub())
            .unwrap();
        assert_eq!(again, first);
    }
}

#[test]
fn per_volume_total_is_monotonic() {
    let snapshot = CatalogSnapshot::new(
        single_stage(FormulaSpec::of("PER_VOLUME"), vec![MatchCriteria::any()], "click"),
        vec![material("click", "0.37", &rub())],
    );
    let engine = CalculationEngine::default();
    let mut previous = Decimal::ZERO;
    for volume in [1, 2, 10, 99, 100, 101, 1000, 25_000] {
        let total = engine
            .calculate_request(&snapshot, &request("210x297", volume), &rub())
            .unwrap()
            .total
            .amount();
        assert!(total >= previous, "volume {} gave {} < {}", volume, total, previous);
        previous = total;
    }
}

#[test]
fn multi_stage_brochure_with_currency_detail_and_fields() {
    let usd = Currency::new("USD").unwrap();
    let resources = vec![
        material("paper", "0.0002", &rub()),
        material("toner", "0.05", &usd),
        Resource {
            id: "lamination".to_string(),
            kind: ResourceKind::Operation,
            name: "Lamination".to_string(),
            variants: vec![ResourceVariant {
                id: "lamination-gloss".to_string(),
                name: "Gloss".to_string(),
                criteria: MatchCriteria::any(),
                cost: VariantCost::Unit {
                    price: Money::new(d("4"), rub()),
                },
            }],
        },
        material("staple", "0.30", &rub()),
        Resource {
            id: "binding".to_string(),
            kind: ResourceKind::Detail,
            name: "Saddle stitch".to_string(),
            variants: vec![ResourceVariant {
                id: "binding-2".to_string(),
                name: "Two staples".to_string(),
                criteria: MatchCriteria::any(),
                cost: VariantCost::Components {
                    components: vec![DetailComponent {
                        resource: ResourceRef::new(ResourceKind::Material, "staple"),
                        quantity: d("2"),
                    }],
                },
            }],
        },
    ];

    let stage = |id: &str, formula: FormulaSpec, criteria: MatchCriteria, resource: ResourceRef| Stage {
        id: id.to_string(),
        name: id.to_string(),
        formula,
        variants: vec![StageVariant {
            id: format!("{}-v", id),
            name: id.to_string(),
            criteria,
            resource,
        }],
    };

    let preset = Preset {
        id: "brochure".to_string(),
        name: "Brochure".to_string(),
        stages: vec![
            stage(
                "paper",
                FormulaSpec::of("PER_AREA_VOLUME").with_coefficient(d("0.001")),
                MatchCriteria::any(),
                ResourceRef::new(ResourceKind::Material, "paper"),
            ),
            stage(
                "toner",
                FormulaSpec::of("PER_FIELD").with_field("pages").with_coefficient(d("100")),
                MatchCriteria::any(),
                ResourceRef::new(ResourceKind::Material, "toner"),
            ),
            stage(
                "lamination",
                FormulaSpec::of("PER_VOLUME"),
                MatchCriteria::any().with_field("lamination", FieldValue::Bool(true)),
                ResourceRef::new(ResourceKind::Operation, "lamination"),
            ),
            stage(
                "binding",
                FormulaSpec::of("PER_VOLUME"),
                MatchCriteria::any(),
                ResourceRef::new(ResourceKind::Detail, "binding"),
            ),
        ],
        custom_fields: vec![
            CustomFieldDef {
                code: "pages".to_string(),
                name: "Pages".to_string(),
                field_type: FieldType::Number,
                required: true,
                default: None,
            },
            CustomFieldDef {
                code: "lamination".to_string(),
                name: "Lamination".to_string(),
                field_type: FieldType::Boolean,
                required: false,
                default: Some(FieldValue::Bool(false)),
            },
        ],
    };
    let snapshot = CatalogSnapshot::new(preset, resources);

    let table = ConversionTable::new()
        .with_rate(usd.clone(), rub(), d("90"))
        .unwrap();
    let engine = CalculationEngine::new(PricingResolver::new(table, RoundingPolicy::default()));

    let mut req = request("210x297", 100);
    req.preset_id = "brochure".to_string();
    req.custom_fields
        .insert("pages".to_string(), FieldValue::Number(d("8")));

    let breakdown = engine.calculate_request(&snapshot, &req, &rub()).unwrap();

    // lamination defaults to false → stage omitted
    let stages: Vec<&str> = breakdown.items.iter().map(|i| i.stage_id.as_str()).collect();
    assert_eq!(stages, vec!["paper", "toner", "binding"]);

    // paper: 62370 × 100 × 0.001 = 6237 units × 0.0002 = 1.2474
    assert_eq!(breakdown.items[0].line_total.amount(), d("1.2474"));
    // toner: 0.05 USD → 4.50 RUB, × (8 × 100) = 3600
    assert_eq!(breakdown.items[1].unit_price.amount(), d("4.5"));
    assert_eq!(breakdown.items[1].line_total.amount(), d("3600"));
    // binding: 2 × 0.30 = 0.60 per copy × 100 = 60
    assert_eq!(breakdown.items[2].line_total.amount(), d("60"));

    assert_eq!(breakdown.subtotal.amount(), d("3661.2474"));
    assert_eq!(breakdown.total.amount(), d("3661.25"));

    // With lamination: 100 × 4 = 400 more
    req.custom_fields
        .insert("lamination".to_string(), FieldValue::Bool(true));
    let laminated = engine.calculate_request(&snapshot, &req, &rub()).unwrap();
    assert_eq!(laminated.items.len(), 4);
    assert_eq!(laminated.total.amount(), d("4061.25"));
}

#[test]
fn unknown_currency_reports_stage_and_variant() {
    let eur = Currency::new("EUR").unwrap();
    let snapshot = CatalogSnapshot::new(
        single_stage(FormulaSpec::of("FIXED"), vec![MatchCriteria::any()], "paper"),
        vec![material("paper", "1", &eur)],
    );
    let err = CalculationEngine::default()
        .calculate_request(&snapshot, &request("210x297", 1), &rub())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownCurrency);
    assert_eq!(err.stage_id.as_deref(), Some("print"));
    assert_eq!(err.variant_id.as_deref(), Some("paper-default"));
}
