//! # Money Module
//!
//! Provides the `Money` type (decimal amount + explicit currency) and the
//! rounding policy used by the engine.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 × 62370 = 6237.000000000001  ❌ WRONG!                           │
//! │                                                                         │
//! │  Print pricing also needs SUB-CENT unit prices:                         │
//! │    paper at 0.0015 per mm² × 210×297 mm = 93.555                        │
//! │    Integer cents would price this sheet at 0 per mm².                   │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal                                             │
//! │    Exact base-10 arithmetic, full precision until the final total,     │
//! │    rounding only where the policy says so.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Currency Safety
//! Every amount carries its currency. Adding two amounts of different
//! currencies is an error (`CoreError::CurrencyMismatch`), never a silent
//! truncation.
//!
//! ## Usage
//! ```rust
//! use printcost_core::money::{Currency, Money};
//! use rust_decimal::Decimal;
//!
//! let rub = Currency::new("RUB").unwrap();
//! let unit = Money::new(Decimal::new(250, 2), rub.clone()); // 2.50 RUB
//! let line = unit.multiply(Decimal::from(500)).unwrap();
//! assert_eq!(line.amount(), Decimal::from(1250));
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Currency
// =============================================================================

/// ISO-4217 style currency code (three uppercase ASCII letters).
///
/// Lower-case input is normalized: `"rub"` becomes `"RUB"`.
///
/// Serialized as the bare code string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Creates a currency from a code, validating its shape.
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidFormat {
                field: "currency".to_string(),
                reason: format!("'{}' is not a three-letter currency code", code),
            });
        }
        Ok(Currency(code.to_ascii_uppercase()))
    }

    /// Returns the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    /// [`DEFAULT_CURRENCY`](crate::DEFAULT_CURRENCY).
    fn default() -> Self {
        Currency(crate::DEFAULT_CURRENCY.to_string())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in an explicit currency.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                                                                         │
/// │  ResourceVariant.price ──► PricingResolver ──► unit price (target cur.) │
/// │                                                     │                   │
/// │                                    × quantity       ▼                   │
/// │                                             CostLineItem.line_total     │
/// │                                                     │                   │
/// │                                    Σ, then round    ▼                   │
/// │                                             CostBreakdown.total         │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money {
    #[ts(type = "string")]
    amount: Decimal,
    #[ts(type = "string")]
    currency: Currency,
}

impl Money {
    /// Creates a Money value.
    #[inline]
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Money { amount, currency }
    }

    /// Returns zero in the given currency.
    #[inline]
    pub fn zero(currency: Currency) -> Self {
        Money::new(Decimal::ZERO, currency)
    }

    /// Returns the amount.
    #[inline]
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency.
    #[inline]
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Checks if the amount is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Adds two amounts of the same currency.
    ///
    /// ## Errors
    /// - `CoreError::CurrencyMismatch` when the currencies differ. The engine
    ///   converts every price into the target currency first, so a mismatch
    ///   here is a programming or catalog error.
    /// - `CoreError::Overflow` when the sum leaves the `Decimal` range
    pub fn checked_add(&self, other: &Money) -> CoreResult<Money> {
        if self.currency != other.currency {
            return Err(CoreError::CurrencyMismatch {
                expected: self.currency.to_string(),
                actual: other.currency.to_string(),
            });
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| CoreError::overflow(format!("{} + {}", self, other)))?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Multiplies by a (possibly fractional) quantity, keeping full precision.
    ///
    /// ## Example
    /// ```rust
    /// use printcost_core::money::{Currency, Money};
    /// use rust_decimal::Decimal;
    ///
    /// let per_mm2 = Money::new(Decimal::new(10, 2), Currency::new("EUR").unwrap());
    /// let sheet = per_mm2.multiply(Decimal::from(62370)).unwrap();
    /// assert_eq!(sheet.amount(), Decimal::from(6237));
    ///
    /// assert!(per_mm2.multiply(Decimal::MAX).is_err());
    /// ```
    pub fn multiply(&self, quantity: Decimal) -> CoreResult<Money> {
        let amount = self
            .amount
            .checked_mul(quantity)
            .ok_or_else(|| CoreError::overflow(format!("{} x {}", self, quantity)))?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Returns a copy rounded half-up to `increment`.
    pub fn round_to(&self, increment: Decimal) -> Money {
        Money::new(round_half_up(self.amount, increment), self.currency.clone())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

// =============================================================================
// Rounding
// =============================================================================

/// Rounds `value` to the nearest multiple of `increment`, ties away from zero
/// (round-half-up for the non-negative amounts the engine produces).
///
/// A non-positive increment leaves the value untouched, and so does a value
/// too large to be divided by the increment.
///
/// ## Example
/// ```rust
/// use printcost_core::money::round_half_up;
/// use rust_decimal::Decimal;
///
/// let value = Decimal::new(12345, 3); // 12.345
/// assert_eq!(round_half_up(value, Decimal::new(1, 2)), Decimal::new(1235, 2));
/// assert_eq!(round_half_up(value, Decimal::ONE), Decimal::from(12));
/// ```
pub fn round_half_up(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    // A quotient outside the Decimal range means the value has no digits
    // left below the increment.
    let Some(quotient) = value.checked_div(increment) else {
        return value;
    };
    let steps = quotient.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    steps.checked_mul(increment).unwrap_or(value)
}

/// Rounding policy applied by the engine.
///
/// ## Where Rounding Happens
/// ```text
/// converted unit price ──► round to unit_price_increment
/// line total           ──► kept at full precision
///                      └─► display_total = round to increment (display only)
/// grand total          ──► round(Σ full-precision line totals) to increment
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundingPolicy {
    /// Increment for totals and displayed line totals (0.01, 1, 0.05 ...).
    #[serde(default = "default_increment")]
    pub increment: Decimal,

    /// Increment for unit prices after currency conversion.
    #[serde(default = "default_unit_price_increment")]
    pub unit_price_increment: Decimal,
}

fn default_increment() -> Decimal {
    Decimal::new(1, 2)
}

fn default_unit_price_increment() -> Decimal {
    Decimal::new(1, 4)
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        RoundingPolicy {
            increment: default_increment(),
            unit_price_increment: default_unit_price_increment(),
        }
    }
}

impl RoundingPolicy {
    /// Creates a policy with the same increment for totals and unit prices.
    pub fn uniform(increment: Decimal) -> Self {
        RoundingPolicy {
            increment,
            unit_price_increment: increment,
        }
    }

    /// Rounds a total (or a display value).
    pub fn round_total(&self, money: &Money) -> Money {
        money.round_to(self.increment)
    }

    /// Rounds a converted unit price.
    pub fn round_unit_price(&self, money: &Money) -> Money {
        money.round_to(self.unit_price_increment)
    }

    /// Both increments must be strictly positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.increment <= Decimal::ZERO || self.unit_price_increment <= Decimal::ZERO {
            return Err(ValidationError::MustBePositive {
                field: "rounding increment".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
