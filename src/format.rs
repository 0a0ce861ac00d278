//! Currency formatting for display tables.

use crate::coerce::parse_number;

/// Default currency symbol (Peruvian sol).
pub const DEFAULT_CURRENCY: &str = "S/";

/// `S/ 1,234.57`: two decimals, comma thousands, sign after the symbol.
///
/// ```
/// use tablero::format::format_currency;
///
/// assert_eq!(format_currency(1234.567, "S/"), "S/ 1,234.57");
/// assert_eq!(format_currency(-50.0, "S/"), "S/ -50.00");
/// ```
pub fn format_currency(value: f64, symbol: &str) -> String {
    format!("{} {}", symbol, group_thousands(value, 2))
}

/// Whole-unit amount for chart labels: `S/ 1,235`.
pub fn format_amount_short(value: f64, symbol: &str) -> String {
    format!("{} {}", symbol, group_thousands(value, 0))
}

/// Read back a value produced by `format_currency`.
pub fn parse_currency(text: &str) -> Option<f64> {
    parse_number(text)
}

fn group_thousands(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return String::new();
    }
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac) = match fixed.find('.') {
        Some(pos) => fixed.split_at(pos),
        None => (fixed.as_str(), ""),
    };

    let digits = int_part.as_bytes();
    let mut grouped = String::with_capacity(fixed.len() + digits.len() / 3 + 1);
    for (i, &b) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(b as char);
    }
    grouped.push_str(frac);

    // "-0.00" reads as zero
    let is_zero = fixed.bytes().all(|b| b == b'0' || b == b'.');
    if value.is_sign_negative() && !is_zero {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0, "S/"), "S/ 0.00");
        assert_eq!(format_currency(999.999, "S/"), "S/ 1,000.00");
        assert_eq!(format_currency(1234567.891, "S/"), "S/ 1,234,567.89");
        assert_eq!(format_currency(-1234.5, "$"), "$ -1,234.50");
        assert_eq!(format_currency(-0.001, "S/"), "S/ 0.00");
        assert_eq!(format_currency(123.0, "S/"), "S/ 123.00");
    }

    #[test]
    fn test_format_amount_short() {
        assert_eq!(format_amount_short(1234.56, "S/"), "S/ 1,235");
        assert_eq!(format_amount_short(100000.0, "S/"), "S/ 100,000");
    }

    #[test]
    fn test_parse_back() {
        for v in [0.0, 12.34, 1234.5, -98765.43, 1_000_000.0] {
            let text = format_currency(v, DEFAULT_CURRENCY);
            assert_eq!(parse_currency(&text), Some(v), "{}", text);
        }
        assert_eq!(parse_currency(""), None);
    }
}
