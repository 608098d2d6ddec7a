//! # printcost-core: Pure Calculation Engine for PrintCost
//!
//! This crate is the **heart** of PrintCost. It turns a catalog-driven chain
//! of production stages into an itemized cost, as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PrintCost Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │              Host admin view  ⇄  Embedded calculator            │    │
//! │  │                  (printcost-bridge, JSON messages)              │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │ CalculationRequest                     │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                printcost-api (CalculationService)               │    │
//! │  │          load snapshot (printcost-db) → engine → breakdown      │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │              ★ printcost-core (THIS CRATE) ★                    │    │
//! │  │                                                                 │    │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐   │    │
//! │  │   │ format  │ │ matcher │ │ pricing │ │  stage  │ │ engine  │   │    │
//! │  │   │ 210x297 │ │ ranges  │ │ FX and  │ │ one line│ │ all     │   │    │
//! │  │   │  → mm   │ │ → one   │ │ rounding│ │ per     │ │ stages  │   │    │
//! │  │   │         │ │ variant │ │         │ │ stage   │ │ → total │   │    │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘   │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`catalog`] - Presets, stages, resources and their variants
//! - [`types`] - Requests, contexts, breakdowns, offer configs
//! - [`money`] - Decimal money with explicit currency, rounding policy
//! - [`format`] - Format code parser
//! - [`matcher`] - Most-specific variant selection
//! - [`pricing`] - Currency conversion of unit prices
//! - [`formula`] - Stage quantity formulas
//! - [`stage`] - Per-stage evaluation
//! - [`engine`] - Whole-preset calculation
//! - [`error`] - Domain error types
//! - [`validation`] - Request and catalog validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same snapshot + context = same breakdown
//! 2. **No I/O**: the snapshot is loaded before the engine runs
//! 3. **Decimal Money**: exact arithmetic, rounding only where the policy says
//! 4. **Explicit Errors**: every failure is typed and located (stage, variant)
//!
//! ## Example Usage
//!
//! ```rust
//! use printcost_core::catalog::*;
//! use printcost_core::money::{Currency, Money};
//! use printcost_core::types::{Format, SelectionContext};
//! use printcost_core::CalculationEngine;
//! use rust_decimal::Decimal;
//!
//! let rub = Currency::new("RUB").unwrap();
//! let paper = Resource {
//!     id: "paper".into(),
//!     kind: ResourceKind::Material,
//!     name: "Coated 130g".into(),
//!     variants: vec![ResourceVariant {
//!         id: "paper-sheet".into(),
//!         name: "Per mm²".into(),
//!         criteria: MatchCriteria::any(),
//!         cost: VariantCost::Unit { price: Money::new(Decimal::new(10, 2), rub.clone()) },
//!     }],
//! };
//! let preset = Preset {
//!     id: "leaflet".into(),
//!     name: "Leaflet".into(),
//!     stages: vec![Stage {
//!         id: "paper".into(),
//!         name: "Paper".into(),
//!         formula: FormulaSpec::of("PER_AREA"),
//!         variants: vec![StageVariant {
//!             id: "any-format".into(),
//!             name: "Any format".into(),
//!             criteria: MatchCriteria::any(),
//!             resource: ResourceRef::new(ResourceKind::Material, "paper"),
//!         }],
//!     }],
//!     custom_fields: vec![],
//! };
//! let snapshot = CatalogSnapshot::new(preset, vec![paper]);
//! let context = SelectionContext::new(
//!     Format::new(Decimal::from(210), Decimal::from(297)),
//!     1,
//!     rub,
//! );
//!
//! let breakdown = CalculationEngine::default().calculate(&snapshot, &context).unwrap();
//! assert_eq!(breakdown.total.amount(), Decimal::new(623700, 2)); // 6237.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod engine;
pub mod error;
pub mod format;
pub mod formula;
pub mod matcher;
pub mod money;
pub mod pricing;
pub mod stage;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use printcost_core::Money` instead of
// `use printcost_core::money::Money`

pub use catalog::CatalogSnapshot;
pub use engine::{context_from_request, CalculationEngine};
pub use error::{
    CalculationError, CalculationFailure, CoreError, CoreResult, ErrorKind, ValidationError,
};
pub use money::{Currency, Money, RoundingPolicy};
pub use pricing::{ConversionTable, PricingResolver};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest print run accepted in a request.
///
/// ## Business Reason
/// Catches typos (an extra zero or two) before they reach a quote.
pub const MAX_VOLUME: u64 = 10_000_000;

/// Longest catalog identifier (preset, stage, variant, resource, field code).
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Currency used when neither the request nor the settings name one.
pub const DEFAULT_CURRENCY: &str = "RUB";
