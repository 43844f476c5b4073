//! Decimal coin amounts.
//!
//! Amounts cross the user and indexer boundaries as decimal strings in whole
//! coins ("0.0004"). They are converted to and from integer smallest units
//! without going through floating point.

use crate::constants::{COIN, COIN_DECIMALS};
use crate::error::ConfigError;

/// Parse a decimal whole-coin amount into smallest units.
///
/// At most [`COIN_DECIMALS`] fractional digits are accepted; anything finer
/// cannot be represented and is rejected rather than rounded.
pub fn parse_amount(s: &str) -> Result<u64, ConfigError> {
    let invalid = |why: &str| ConfigError::InvalidAmount(format!("{s:?}: {why}"));
    let trimmed = s.trim();
    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("empty"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a decimal number"));
    }
    if frac.len() > COIN_DECIMALS as usize {
        return Err(invalid("too many decimal places"));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("too large"))?
    };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = COIN_DECIMALS as usize);
        padded.parse().map_err(|_| invalid("not a decimal number"))?
    };

    whole
        .checked_mul(COIN)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| invalid("too large"))
}

/// Format smallest units as a whole-coin decimal with all eight places.
pub fn format_amount(units: u64) -> String {
    format!(
        "{}.{:0width$}",
        units / COIN,
        units % COIN,
        width = COIN_DECIMALS as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional() {
        assert_eq!(parse_amount("1").unwrap(), 100_000_000);
        assert_eq!(parse_amount("0.0004").unwrap(), 40_000);
        assert_eq!(parse_amount(".5").unwrap(), 50_000_000);
        assert_eq!(parse_amount("2.").unwrap(), 200_000_000);
        assert_eq!(parse_amount("0.00000001").unwrap(), 1);
        assert_eq!(parse_amount(" 0.1 ").unwrap(), 10_000_000);
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", ".", "abc", "-1", "1e5", "0.000000001", "1.2.3", "+1"] {
            assert!(
                matches!(parse_amount(bad), Err(ConfigError::InvalidAmount(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn rejects_overflow() {
        assert!(parse_amount("184467440737.09551616").is_err());
        assert!(parse_amount("99999999999999999999999").is_err());
        assert_eq!(parse_amount("184467440737.09551615").unwrap(), u64::MAX);
    }

    #[test]
    fn formats_with_eight_places() {
        assert_eq!(format_amount(40_000), "0.00040000");
        assert_eq!(format_amount(123_456_789), "1.23456789");
        assert_eq!(format_amount(0), "0.00000000");
    }

    proptest::proptest! {
        #[test]
        fn formatted_amounts_parse_back(sats in proptest::prelude::any::<u64>()) {
            proptest::prop_assert_eq!(parse_amount(&format_amount(sats)).unwrap(), sats);
        }
    }
}
