//! Short-form money parsing and formatting.
//!
//! Accepts a non-negative decimal with an optional case-insensitive suffix:
//! `k` (thousand), `M` (million), `T` (trillion). Parsing is exact: the
//! decimal is scaled in integer arithmetic, never through floating point.
//!
//! ```
//! use lixi_core::money::parse_money;
//! use lixi_core::types::Amount;
//! assert_eq!(parse_money("1.5k").unwrap(), Amount::from_major(1_500).unwrap());
//! assert_eq!(parse_money("2M").unwrap(), Amount::from_major(2_000_000).unwrap());
//! assert!(parse_money("abc").is_err());
//! ```

use crate::constants::MINOR_PER_MAJOR;
use crate::error::MoneyParseError;
use crate::types::Amount;

/// Decimal digits in one major unit (`MINOR_PER_MAJOR == 10^2`).
const MINOR_DIGITS: u32 = 2;

/// Power of ten a suffix multiplies by.
fn suffix_exponent(suffix: char) -> Option<u32> {
    match suffix.to_ascii_lowercase() {
        'k' => Some(3),
        'm' => Some(6),
        't' => Some(12),
        _ => None,
    }
}

/// Parse a money string such as `"100"`, `"0.5"`, `"1.5k"`, `"2M"` or `"5.5T"`.
///
/// Rejects empty input, negative values, malformed numbers, values finer than
/// the minor-unit granularity, and values that overflow `u64` minor units.
pub fn parse_money(input: &str) -> Result<Amount, MoneyParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(MoneyParseError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(MoneyParseError::Negative(input.to_string()));
    }

    let (number, exponent) = match trimmed.chars().last().and_then(suffix_exponent) {
        Some(exp) => (&trimmed[..trimmed.len() - 1], exp),
        None => (trimmed, 0),
    };

    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };

    let well_formed = int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit())
        && (!frac_part.is_empty() || !number.contains('.'))
        && !(int_part.is_empty() && frac_part.is_empty());
    if !well_formed {
        return Err(MoneyParseError::InvalidFormat(input.to_string()));
    }

    let scale = exponent + MINOR_DIGITS;
    let overflow = || MoneyParseError::Overflow(input.to_string());

    let mut minor: u128 = 0;
    for digit in int_part.bytes() {
        minor = minor
            .checked_mul(10)
            .and_then(|m| m.checked_add(u128::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }
    minor = minor
        .checked_mul(10u128.checked_pow(scale).ok_or_else(overflow)?)
        .ok_or_else(overflow)?;

    // Fraction digits beyond the scale must be zero, otherwise the value is
    // finer than one minor unit.
    for (position, digit) in frac_part.bytes().enumerate() {
        let digit = u128::from(digit - b'0');
        let position = position as u32 + 1;
        if position > scale {
            if digit != 0 {
                return Err(MoneyParseError::TooPrecise(input.to_string()));
            }
            continue;
        }
        let weight = 10u128.pow(scale - position);
        minor = minor.checked_add(digit * weight).ok_or_else(overflow)?;
    }

    u64::try_from(minor)
        .map(Amount::from_minor)
        .map_err(|_| overflow())
}

/// Format an amount with a short suffix and two decimals: `1.50k`, `2.00M`, `3.20T`.
///
/// Values below one thousand are printed plainly (`999.99`). Rounds half up.
pub fn format_short(amount: Amount) -> String {
    const UNITS: [(u64, &str); 3] = [
        (1_000_000_000_000, "T"),
        (1_000_000, "M"),
        (1_000, "k"),
    ];

    let minor = u128::from(amount.minor());
    let per_major = u128::from(MINOR_PER_MAJOR);

    for (unit, suffix) in UNITS {
        let unit_minor = u128::from(unit) * per_major;
        if minor >= unit_minor {
            let hundredths = (minor * 100 + unit_minor / 2) / unit_minor;
            return format!("{}.{:02}{suffix}", hundredths / 100, hundredths % 100);
        }
    }
    amount.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn major(n: u64) -> Amount {
        Amount::from_major(n).unwrap()
    }

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_money("100").unwrap(), major(100));
        assert_eq!(parse_money("0.5").unwrap(), Amount::from_minor(50));
        assert_eq!(parse_money(".5").unwrap(), Amount::from_minor(50));
        assert_eq!(parse_money("12.34").unwrap(), Amount::from_minor(1234));
    }

    #[test]
    fn suffixes() {
        assert_eq!(parse_money("1.5k").unwrap(), major(1_500));
        assert_eq!(parse_money("2M").unwrap(), major(2_000_000));
        assert_eq!(parse_money("5.5T").unwrap(), major(5_500_000_000_000));
    }

    #[test]
    fn suffixes_are_case_insensitive() {
        assert_eq!(parse_money("1.5K").unwrap(), major(1_500));
        assert_eq!(parse_money("2m").unwrap(), major(2_000_000));
        assert_eq!(parse_money("1t").unwrap(), major(1_000_000_000_000));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(parse_money("  3k ").unwrap(), major(3_000));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_money("abc"), Err(MoneyParseError::InvalidFormat(_))));
        assert!(matches!(parse_money("1.2.3"), Err(MoneyParseError::InvalidFormat(_))));
        assert!(matches!(parse_money("1."), Err(MoneyParseError::InvalidFormat(_))));
        assert!(matches!(parse_money("k"), Err(MoneyParseError::InvalidFormat(_))));
        assert!(matches!(parse_money("5x"), Err(MoneyParseError::InvalidFormat(_))));
        assert!(matches!(parse_money("+5"), Err(MoneyParseError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(parse_money(""), Err(MoneyParseError::Empty));
        assert_eq!(parse_money("   "), Err(MoneyParseError::Empty));
    }

    #[test]
    fn rejects_negative() {
        assert!(matches!(parse_money("-5"), Err(MoneyParseError::Negative(_))));
        assert!(matches!(parse_money("-1.5k"), Err(MoneyParseError::Negative(_))));
    }

    #[test]
    fn rejects_sub_minor_precision() {
        assert!(matches!(parse_money("1.234"), Err(MoneyParseError::TooPrecise(_))));
        // Trailing zeros past the granularity are harmless.
        assert_eq!(parse_money("1.2300").unwrap(), Amount::from_minor(123));
        // A suffix widens the allowed precision.
        assert_eq!(parse_money("1.2345k").unwrap(), Amount::from_minor(123_450));
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(
            parse_money("99999999999999999999T"),
            Err(MoneyParseError::Overflow(_))
        ));
    }

    #[test]
    fn format_short_suffixes() {
        assert_eq!(format_short(major(1_500)), "1.50k");
        assert_eq!(format_short(major(2_000_000)), "2.00M");
        assert_eq!(format_short(major(3_200_000_000_000)), "3.20T");
        assert_eq!(format_short(Amount::from_minor(99_999)), "999.99");
    }

    #[test]
    fn format_short_rounds_half_up() {
        // 1234.5 -> 1.2345k -> 1.23k; 1235.0 -> 1.235k -> 1.24k
        assert_eq!(format_short(Amount::from_minor(123_450)), "1.23k");
        assert_eq!(format_short(major(1_235)), "1.24k");
    }

    proptest! {
        #[test]
        fn plain_display_parses_back(minor in 0u64..=1_000_000_000_000u64) {
            let amount = Amount::from_minor(minor);
            prop_assert_eq!(parse_money(&amount.to_string()).unwrap(), amount);
        }

        #[test]
        fn thousands_suffix_scales(n in 0u64..=1_000_000u64) {
            let parsed = parse_money(&format!("{n}k")).unwrap();
            prop_assert_eq!(parsed, Amount::from_major(n * 1_000).unwrap());
        }
    }
}
