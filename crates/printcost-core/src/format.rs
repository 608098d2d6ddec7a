//! # Format Parser
//!
//! Turns a catalog format code (`"210x297"`) into a [`Format`] in millimeters.
//! This is the only place format strings are interpreted.
//!
//! ## Grammar
//! ```text
//! format    := ws* dimension ws* separator ws* dimension ws*
//! dimension := digit+ ( "." digit* )?      (0 < d <= MAX_DIMENSION_MM)
//! separator := "x" | "X" | "×" | "х" | "Х"  (Latin, multiplication sign, Cyrillic)
//! ```
//!
//! No unit inference: `"21x29.7"` is 21 mm by 29.7 mm, not centimeters.

use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult};
use crate::types::Format;

/// Accepted width/length separators.
pub const SEPARATORS: [char; 5] = ['x', 'X', '×', 'х', 'Х'];

/// Largest accepted side: a 100 m roll.
pub const MAX_DIMENSION_MM: u32 = 100_000;

/// Parses `"<width><sep><length>"`.
///
/// ## Example
/// ```rust
/// use printcost_core::format::parse;
/// use rust_decimal::Decimal;
///
/// let format = parse(" 210x297 ").unwrap();
/// assert_eq!(format.width, Decimal::from(210));
/// assert_eq!(format.length, Decimal::from(297));
///
/// assert!(parse("210").is_err());
/// assert!(parse("0x297").is_err());
/// ```
pub fn parse(format_code: &str) -> CoreResult<Format> {
    let code = format_code.trim();
    if code.is_empty() {
        return Err(invalid(format_code, "format code is empty"));
    }

    let separators = code.chars().filter(|c| SEPARATORS.contains(c)).count();
    if separators != 1 {
        return Err(invalid(
            format_code,
            &format!("expected exactly one separator, found {}", separators),
        ));
    }

    let (width, length) = code
        .split_once(|c: char| SEPARATORS.contains(&c))
        .ok_or_else(|| invalid(format_code, "missing separator"))?;

    Ok(Format::new(
        parse_dimension(format_code, "width", width)?,
        parse_dimension(format_code, "length", length)?,
    ))
}

fn parse_dimension(input: &str, name: &str, raw: &str) -> CoreResult<Decimal> {
    let raw = raw.trim();
    let digits = raw.chars().filter(|c| c.is_ascii_digit()).count();
    let dots = raw.chars().filter(|c| *c == '.').count();

    if digits == 0
        || dots > 1
        || raw.starts_with('.')
        || digits + dots != raw.chars().count()
    {
        return Err(invalid(
            input,
            &format!("{} '{}' is not a plain decimal number", name, raw),
        ));
    }

    let value: Decimal = raw
        .parse()
        .map_err(|_| invalid(input, &format!("{} '{}' is out of range", name, raw)))?;

    if value <= Decimal::ZERO {
        return Err(invalid(input, &format!("{} must be positive", name)));
    }
    if value > Decimal::from(MAX_DIMENSION_MM) {
        return Err(invalid(
            input,
            &format!("{} exceeds {} mm", name, MAX_DIMENSION_MM),
        ));
    }
    Ok(value)
}

fn invalid(input: &str, reason: &str) -> CoreError {
    CoreError::InvalidFormat {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_parses_every_separator() {
        for code in ["210x297", "210X297", "210×297", "210х297", "210Х297"] {
            let format = parse(code).unwrap();
            assert_eq!(format.width, d("210"), "{}", code);
            assert_eq!(format.length, d("297"), "{}", code);
        }
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        let err = parse("1000000000000000x1000000000000000").unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat { .. }));
        assert!(parse("210x100001").is_err());

        let roll = parse("100000x100000").unwrap();
        assert_eq!(roll.area().unwrap(), d("10000000000"));
    }

    #[test]
    fn test_allows_whitespace_and_decimals() {
        let format = parse("  90.5 x 50  ").unwrap();
        assert_eq!(format.width, d("90.5"));
        assert_eq!(format.length, d("50"));
    }

    #[test]
    fn test_rejects_missing_or_repeated_separator() {
        assert!(matches!(parse("210"), Err(CoreError::InvalidFormat { .. })));
        assert!(matches!(parse("1x2x3"), Err(CoreError::InvalidFormat { .. })));
        assert!(matches!(parse(""), Err(CoreError::InvalidFormat { .. })));
        assert!(matches!(parse("   "), Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn test_rejects_non_numeric_dimensions() {
        for code in ["abcx297", "210x", "x297", "2.1.0x297", "-210x297", "210mmx297", ".5x10", "1e3x10"] {
            assert!(
                matches!(parse(code), Err(CoreError::InvalidFormat { .. })),
                "{} should be rejected",
                code
            );
        }
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(parse("0x297").is_err());
        assert!(parse("210x0.0").is_err());
    }

    #[test]
    fn test_error_keeps_original_input() {
        match parse(" 1x2x3 ") {
            Err(CoreError::InvalidFormat { input, .. }) => assert_eq!(input, " 1x2x3 "),
            other => panic!("unexpected {:?}", other),
        }
    }
}
