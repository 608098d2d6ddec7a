//! # Pricing Resolver
//!
//! Converts a variant's unit price into the calculation currency.
//!
//! ## Resolution
//! ```text
//! price.currency == target ──────────────────────────► price (unchanged)
//! rate(from → to) declared ──► price × rate ──┐
//! rate(to → from) declared ──► price ÷ rate ──┴─► round(unit_price_increment)
//! neither ───────────────────────────────────────────► UnknownCurrency
//! ```
//!
//! Converted unit prices are rounded once, here. Line totals built from
//! them keep full precision until the engine rounds the grand total.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Currency, Money, RoundingPolicy};

// =============================================================================
// Conversion Table
// =============================================================================

/// One declared rate: 1 `from` = `rate` `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRate {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
}

/// Directed currency conversion rates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionTable {
    rates: HashMap<(Currency, Currency), Decimal>,
}

impl ConversionTable {
    /// An empty table: only same-currency prices resolve.
    pub fn new() -> Self {
        ConversionTable::default()
    }

    /// Builds a table from declared rates. Every rate must be positive.
    pub fn from_rates(rates: &[ConversionRate]) -> Result<Self, ValidationError> {
        let mut table = ConversionTable::new();
        for rate in rates {
            table.insert(rate.from.clone(), rate.to.clone(), rate.rate)?;
        }
        Ok(table)
    }

    /// Declares `1 from = rate to`.
    pub fn insert(
        &mut self,
        from: Currency,
        to: Currency,
        rate: Decimal,
    ) -> Result<(), ValidationError> {
        if rate <= Decimal::ZERO {
            return Err(ValidationError::MustBePositive {
                field: format!("conversion rate {}→{}", from, to),
            });
        }
        self.rates.insert((from, to), rate);
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_rate(mut self, from: Currency, to: Currency, rate: Decimal) -> Result<Self, ValidationError> {
        self.insert(from, to, rate)?;
        Ok(self)
    }

    /// Rate to multiply a `from` amount by to get `to`. Falls back to the
    /// inverse of the opposite direction.
    pub fn rate(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        if let Some(rate) = self.rates.get(&(from.clone(), to.clone())) {
            return Some(*rate);
        }
        self.rates
            .get(&(to.clone(), from.clone()))
            .and_then(|inverse| Decimal::ONE.checked_div(*inverse))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

// =============================================================================
// Pricing Resolver
// =============================================================================

/// Resolves unit prices into a target currency under a rounding policy.
#[derive(Debug, Clone, Default)]
pub struct PricingResolver {
    table: ConversionTable,
    rounding: RoundingPolicy,
}

impl PricingResolver {
    pub fn new(table: ConversionTable, rounding: RoundingPolicy) -> Self {
        PricingResolver { table, rounding }
    }

    pub fn rounding(&self) -> &RoundingPolicy {
        &self.rounding
    }

    pub fn table(&self) -> &ConversionTable {
        &self.table
    }

    /// Converts `price` into `target`.
    ///
    /// ## Errors
    /// - `UnknownCurrency { variant_id, from, to }` when neither direction has
    ///   a declared rate
    /// - `Overflow` when the converted price leaves the `Decimal` range
    pub fn resolve(&self, price: &Money, variant_id: &str, target: &Currency) -> CoreResult<Money> {
        if price.currency() == target {
            return Ok(price.clone());
        }

        let rate = self
            .table
            .rate(price.currency(), target)
            .ok_or_else(|| CoreError::UnknownCurrency {
                variant_id: variant_id.to_string(),
                from: price.currency().to_string(),
                to: target.to_string(),
            })?;

        let converted = Money::new(price.amount(), target.clone()).multiply(rate)?;
        Ok(self.rounding.round_unit_price(&converted))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cur(code: &str) -> Currency {
        Currency::new(code).unwrap()
    }

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn resolver() -> PricingResolver {
        let table = ConversionTable::new()
            .with_rate(cur("USD"), cur("RUB"), d("92.5"))
            .unwrap();
        PricingResolver::new(table, RoundingPolicy::default())
    }

    #[test]
    fn test_same_currency_is_unchanged() {
        let price = Money::new(d("0.123456"), cur("RUB"));
        let resolved = resolver().resolve(&price, "v", &cur("RUB")).unwrap();
        assert_eq!(resolved, price);
    }

    #[test]
    fn test_direct_rate() {
        let price = Money::new(d("2.00"), cur("USD"));
        let resolved = resolver().resolve(&price, "v", &cur("RUB")).unwrap();
        assert_eq!(resolved.amount(), d("185.00"));
        assert_eq!(resolved.currency(), &cur("RUB"));
    }

    #[test]
    fn test_inverse_rate_rounds_to_unit_increment() {
        let price = Money::new(d("100"), cur("RUB"));
        let resolved = resolver().resolve(&price, "v", &cur("USD")).unwrap();
        // 100 / 92.5 = 1.081081... → 1.0811
        assert_eq!(resolved.amount(), d("1.0811"));
    }

    #[test]
    fn test_missing_rate_is_unknown_currency() {
        let price = Money::new(d("1"), cur("EUR"));
        match resolver().resolve(&price, "paper-a4", &cur("RUB")) {
            Err(CoreError::UnknownCurrency { variant_id, from, to }) => {
                assert_eq!(variant_id, "paper-a4");
                assert_eq!(from, "EUR");
                assert_eq!(to, "RUB");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rates_must_be_positive() {
        let rates = vec![ConversionRate {
            from: cur("USD"),
            to: cur("RUB"),
            rate: Decimal::ZERO,
        }];
        assert!(ConversionTable::from_rates(&rates).is_err());
    }
}
