//! Field normalization: display prices and identifier tokens into integers.

use crate::error::ItemError;

/// Parses a site's per-item identifier (barcode, item id digits) into an
/// integer.
///
/// Tokens longer than twelve characters lose their first character before
/// parsing, so a 13-digit EAN keeps its low twelve digits. Shorter tokens
/// parse as-is. Anything that still fails to parse is an item-level error.
pub fn normalize_identifier(raw: &str) -> Result<u64, ItemError> {
    let trimmed = raw.trim();
    let token: String = if trimmed.chars().count() > 12 {
        trimmed.chars().skip(1).collect()
    } else {
        trimmed.to_string()
    };
    token
        .parse::<u64>()
        .map_err(|_| ItemError::Identifier(raw.to_string()))
}

/// Parses a display price such as `"$ 1.350.000"` into an integer.
///
/// The string is truncated at the first decimal comma, then every non-digit
/// (currency symbol, spaces, dot thousands separators) is stripped. A string
/// with no digits left is an item-level error.
pub fn parse_price_text(raw: &str) -> Result<u64, ItemError> {
    let integral = raw.split(',').next().unwrap_or(raw);
    let digits: String = integral.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(ItemError::Price(raw.to_string()));
    }
    digits
        .parse::<u64>()
        .map_err(|_| ItemError::Price(raw.to_string()))
}

/// Normalizes a numeric price from a JSON payload. Fractions truncate toward
/// zero; negative or non-finite values are item-level errors.
pub fn truncate_price_number(value: f64) -> Result<u64, ItemError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ItemError::Price(value.to_string()));
    }
    Ok(value.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirteen_digit_barcode_drops_leading_digit() {
        assert_eq!(normalize_identifier("1234567890123").unwrap(), 234567890123);
    }

    #[test]
    fn twelve_digit_identifier_parses_unchanged() {
        assert_eq!(normalize_identifier("123456789012").unwrap(), 123456789012);
    }

    #[test]
    fn short_identifier_parses_unchanged() {
        assert_eq!(normalize_identifier(" 612345678 ").unwrap(), 612345678);
    }

    #[test]
    fn non_numeric_identifier_is_rejected() {
        assert!(matches!(
            normalize_identifier("MCO612345678"),
            Err(ItemError::Identifier(_))
        ));
    }

    #[test]
    fn colombian_display_price_parses() {
        assert_eq!(parse_price_text("$ 1.350.000").unwrap(), 1_350_000);
        assert_eq!(parse_price_text("COP 349.900").unwrap(), 349_900);
    }

    #[test]
    fn decimal_comma_truncates_fraction() {
        assert_eq!(parse_price_text("1.234,99").unwrap(), 1_234);
        assert_eq!(parse_price_text("$ 99,50").unwrap(), 99);
    }

    #[test]
    fn price_without_digits_is_rejected() {
        assert!(matches!(
            parse_price_text("Precio no disponible"),
            Err(ItemError::Price(_))
        ));
    }

    #[test]
    fn numeric_price_truncates_toward_zero() {
        assert_eq!(truncate_price_number(1_350_000.0).unwrap(), 1_350_000);
        assert_eq!(truncate_price_number(999.99).unwrap(), 999);
    }

    #[test]
    fn negative_and_nan_prices_are_rejected() {
        assert!(truncate_price_number(-1.0).is_err());
        assert!(truncate_price_number(f64::NAN).is_err());
    }
}
