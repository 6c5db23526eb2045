use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Money is an exact decimal. It is persisted as integer minor units (scale 2),
/// the equivalent of a `decimal(15,2)` column, so sums never drift.
pub type Amount = Decimal;

/// Number of fractional digits kept for every stored amount.
pub const SCALE: u32 = 2;

/// Largest magnitude in minor units that fits `decimal(15,2)`.
pub const MAX_MINOR_UNITS: i64 = 999_999_999_999_999;

/// Convert an amount into minor units (cents).
/// Example: 50.00 -> 5000, -12.5 -> -1250
pub fn to_minor_units(amount: Amount) -> Result<i64, MoneyError> {
    let minor = scaled_minor_units(amount)?;
    if minor.abs() > MAX_MINOR_UNITS {
        return Err(MoneyError::OutOfRange(amount));
    }
    Ok(minor)
}

/// Convert a balance delta into minor units.
///
/// A delta may net two stored amounts (`new - old`), so it is only bounded by
/// the integer column, not by `MAX_MINOR_UNITS`.
pub fn delta_to_minor_units(delta: Amount) -> Result<i64, MoneyError> {
    scaled_minor_units(delta)
}

fn scaled_minor_units(amount: Amount) -> Result<i64, MoneyError> {
    if amount.normalize().scale() > SCALE {
        return Err(MoneyError::TooPrecise(amount));
    }

    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.trunc().to_i64())
        .ok_or(MoneyError::OutOfRange(amount))
}

/// Rebuild an amount from stored minor units.
pub fn from_minor_units(minor: i64) -> Amount {
    Decimal::new(minor, SCALE)
}

/// Format an amount with exactly two decimals.
/// Example: 50 -> "50.00", -1.5 -> "-1.50"
pub fn format_amount(amount: Amount) -> String {
    let mut rounded = amount.round_dp(SCALE);
    rounded.rescale(SCALE);
    rounded.to_string()
}

/// Parse a decimal string into an amount, keeping at most two fractional digits.
/// Example: "50.00" -> 50.00, "-12.5" -> -12.50, "100" -> 100.00
pub fn parse_amount(input: &str) -> Result<Amount, MoneyError> {
    let input = input.trim();
    let amount: Decimal = input
        .parse()
        .map_err(|_| MoneyError::InvalidFormat(input.to_string()))?;
    to_minor_units(amount)?;
    Ok(amount)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    InvalidFormat(String),
    TooPrecise(Amount),
    OutOfRange(Amount),
}

impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyError::InvalidFormat(input) => write!(f, "invalid money format: '{}'", input),
            MoneyError::TooPrecise(amount) => {
                write!(f, "amount {} has more than {} decimal places", amount, SCALE)
            }
            MoneyError::OutOfRange(amount) => write!(f, "amount {} is out of range", amount),
        }
    }
}

impl std::error::Error for MoneyError {}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(dec!(50.00)), Ok(5000));
        assert_eq!(to_minor_units(dec!(12.5)), Ok(1250));
        assert_eq!(to_minor_units(dec!(0.01)), Ok(1));
        assert_eq!(to_minor_units(dec!(-15)), Ok(-1500));
        assert_eq!(to_minor_units(dec!(1.230)), Ok(123)); // trailing zero is fine
    }

    #[test]
    fn test_to_minor_units_rejects_sub_cent() {
        assert!(matches!(
            to_minor_units(dec!(1.005)),
            Err(MoneyError::TooPrecise(_))
        ));
    }

    #[test]
    fn test_to_minor_units_rejects_overflow() {
        assert!(matches!(
            to_minor_units(dec!(10000000000000)),
            Err(MoneyError::OutOfRange(_))
        ));
        assert_eq!(
            to_minor_units(dec!(9999999999999.99)),
            Ok(MAX_MINOR_UNITS)
        );
    }

    #[test]
    fn test_delta_may_span_both_limits() {
        assert_eq!(
            delta_to_minor_units(dec!(-19999999999999.98)),
            Ok(-2 * MAX_MINOR_UNITS)
        );
        assert!(matches!(
            delta_to_minor_units(dec!(0.001)),
            Err(MoneyError::TooPrecise(_))
        ));
        assert!(matches!(
            delta_to_minor_units(dec!(100000000000000000000)),
            Err(MoneyError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_minor_units_are_exact() {
        // 0.1 added ten times stays exactly 1.00
        let total: i64 = (0..10).map(|_| to_minor_units(dec!(0.10)).unwrap()).sum();
        assert_eq!(from_minor_units(total), dec!(1.00));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(50)), "50.00");
        assert_eq!(format_amount(dec!(12.34)), "12.34");
        assert_eq!(format_amount(dec!(-1.5)), "-1.50");
        assert_eq!(format_amount(from_minor_units(1)), "0.01");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50.00"), Ok(dec!(50.00)));
        assert_eq!(parse_amount(" -12.5 "), Ok(dec!(-12.5)));
        assert_eq!(parse_amount("100"), Ok(dec!(100)));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("12.34.56").is_err());
        assert!(parse_amount("0.001").is_err());
    }
}
