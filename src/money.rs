//! Conversions between the decimal amounts accepted over HTTP and the integer
//! minor units (cents) used for storage and by the payment gateway.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Reasons a decimal amount cannot be represented in minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount cannot have more than two decimal places")]
    TooPrecise,
    #[error("amount is too large")]
    Overflow,
}

/// Converts `amount` to minor units, rejecting zero, negatives and sub-cent
/// precision.
pub fn to_minor_units(amount: Decimal) -> Result<i64, AmountError> {
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive);
    }
    if amount.normalize().scale() > 2 {
        return Err(AmountError::TooPrecise);
    }
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or(AmountError::Overflow)
}

pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn whole_and_fractional_amounts_convert() {
        assert_eq!(to_minor_units(dec("50.00")), Ok(5000));
        assert_eq!(to_minor_units(dec("25")), Ok(2500));
        assert_eq!(to_minor_units(dec("0.01")), Ok(1));
        assert_eq!(to_minor_units(dec("19.9")), Ok(1990));
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        assert_eq!(to_minor_units(dec("10.5000")), Ok(1050));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert_eq!(to_minor_units(Decimal::ZERO), Err(AmountError::NotPositive));
        assert_eq!(to_minor_units(dec("-5.00")), Err(AmountError::NotPositive));
    }

    #[test]
    fn sub_cent_amounts_are_rejected() {
        assert_eq!(to_minor_units(dec("1.005")), Err(AmountError::TooPrecise));
    }

    #[test]
    fn minor_units_render_with_two_places() {
        assert_eq!(from_minor_units(5000).to_string(), "50.00");
        assert_eq!(from_minor_units(1).to_string(), "0.01");
    }
}
