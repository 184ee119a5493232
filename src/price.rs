//! Locale-aware price parsing.
//!
//! Turns strings such as `"1.234,56 €"`, `"$1,234.56"` or `"63"` into a number.
//! The separator heuristic is lossy: `"1.000"` is read as one thousand.

/// Parse a raw price string. Returns 0 for empty or unparsable input.
///
/// The currency hint does not currently change the outcome; it is accepted so
/// callers always pass what the page declared.
pub fn parse_price(raw: &str, _currency: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (None, None) => cleaned,
        (Some(dot), Some(comma)) => {
            // Whichever separator comes last is the decimal one.
            let (decimal, thousands) = if dot > comma { ('.', ',') } else { (',', '.') };
            let without_thousands: String = cleaned.chars().filter(|c| *c != thousands).collect();
            keep_last_as_decimal(&without_thousands, decimal)
        }
        (Some(_), None) => resolve_single_separator(&cleaned, '.'),
        (None, Some(_)) => resolve_single_separator(&cleaned, ','),
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// One separator with a 1-2 digit tail is decimal; anything else is grouping.
fn resolve_single_separator(s: &str, sep: char) -> String {
    let parts: Vec<&str> = s.split(sep).collect();
    match parts.as_slice() {
        [int, frac] if frac.len() <= 2 => format!("{int}.{frac}"),
        _ => parts.concat(),
    }
}

fn keep_last_as_decimal(s: &str, sep: char) -> String {
    match s.rfind(sep) {
        Some(idx) => {
            let int: String = s[..idx].chars().filter(|c| *c != sep).collect();
            format!("{int}.{}", &s[idx + sep.len_utf8()..])
        }
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn european_and_us_formats() {
        assert!(approx(parse_price("1.234,56", "EUR"), 1234.56));
        assert!(approx(parse_price("1,234.56", "USD"), 1234.56));
        assert!(approx(parse_price("€ 1.234,56", "EUR"), 1234.56));
        assert!(approx(parse_price("$1,234.56", "USD"), 1234.56));
        assert!(approx(parse_price("12.345.678,90", "EUR"), 12_345_678.90));
    }

    #[test]
    fn bare_integers() {
        assert!(approx(parse_price("63", "EUR"), 63.0));
        assert!(approx(parse_price("63 €", "EUR"), 63.0));
    }

    #[test]
    fn ambiguity_policy_is_independent_of_currency() {
        for currency in ["EUR", "USD", "GBP", ""] {
            assert!(approx(parse_price("1.000", currency), 1000.0), "1.000 as {currency}");
            assert!(approx(parse_price("63.37", currency), 63.37), "63.37 as {currency}");
        }
    }

    #[test]
    fn single_separator_rules() {
        assert!(approx(parse_price("129,9", "EUR"), 129.9));
        assert!(approx(parse_price("129,99", "EUR"), 129.99));
        assert!(approx(parse_price("1,299", "EUR"), 1299.0));
        assert!(approx(parse_price("1.299.000", "EUR"), 1_299_000.0));
        assert!(approx(parse_price("1,299,000", "USD"), 1_299_000.0));
        assert!(approx(parse_price("12.3456", "EUR"), 123_456.0));
    }

    #[test]
    fn empty_or_garbage_is_zero() {
        assert_eq!(parse_price("", "EUR"), 0.0);
        assert_eq!(parse_price("N/A", "EUR"), 0.0);
        assert_eq!(parse_price(".", "EUR"), 0.0);
        assert_eq!(parse_price(",", "EUR"), 0.0);
    }

    #[test]
    fn round_trips_canonical_amounts() {
        for (eu, us, value) in [
            ("999,00", "999.00", 999.0),
            ("1.499,99", "1,499.99", 1499.99),
            ("25.000,50", "25,000.50", 25_000.5),
        ] {
            assert!(approx(parse_price(eu, "EUR"), value), "{eu}");
            assert!(approx(parse_price(us, "USD"), value), "{us}");
        }
    }
}
