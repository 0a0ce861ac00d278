//! Best-effort, elementwise coercion of raw cell values.
//!
//! Spreadsheet data is messy: amounts arrive as numbers, as `"S/ 1,234.50"`,
//! or as `"N/A"`. Coercion never fails for an individual value; anything that
//! cannot be converted becomes `ColumnValue::Missing`.
//!
//! # Examples
//!
//! ```
//! use tablero::coerce::{to_number, to_date};
//! use tablero::ColumnValue;
//!
//! assert_eq!(to_number(&ColumnValue::text("S/ 1,234.50")), Some(1234.5));
//! assert_eq!(to_number(&ColumnValue::text("N/A")), None);
//! assert!(to_date(&ColumnValue::text("20/01/2026")).is_some());
//! ```

use crate::column::{ColumnType, ColumnValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Currency markers stripped before numeric parsing, longest first.
const CURRENCY_MARKERS: &[&str] = &["S/.", "S/", "s/.", "s/", "PEN", "USD", "US$", "$", "€"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Coerce a single value to a number. Non-finite results count as missing.
pub fn to_number(value: &ColumnValue) -> Option<f64> {
    match value {
        ColumnValue::Number(n) if n.is_finite() => Some(*n),
        ColumnValue::Text(s) => parse_number(s),
        _ => None,
    }
}

/// Coerce a single value to a calendar date.
///
/// Bare numbers are not interpreted as dates; spreadsheet date cells are
/// converted to `ColumnValue::Date` by the loader before they get here.
pub fn to_date(value: &ColumnValue) -> Option<NaiveDate> {
    match value {
        ColumnValue::Date(d) => Some(*d),
        ColumnValue::Text(s) => parse_date(s),
        _ => None,
    }
}

/// Coerce a value to the given semantic type. The result is either a value of
/// that type or `Missing`.
pub fn coerce_value(value: &ColumnValue, target: ColumnType) -> ColumnValue {
    match target {
        ColumnType::Number => to_number(value).map_or(ColumnValue::Missing, ColumnValue::Number),
        ColumnType::Date => to_date(value).map_or(ColumnValue::Missing, ColumnValue::Date),
        ColumnType::Text => match value {
            ColumnValue::Missing => ColumnValue::Missing,
            ColumnValue::Text(s) => ColumnValue::text(s.trim()),
            other => ColumnValue::Text(other.to_string()),
        },
        ColumnType::Bool => match value {
            ColumnValue::Bool(b) => ColumnValue::Bool(*b),
            ColumnValue::Text(s) if s.trim().eq_ignore_ascii_case("true") => ColumnValue::Bool(true),
            ColumnValue::Text(s) if s.trim().eq_ignore_ascii_case("false") => ColumnValue::Bool(false),
            _ => ColumnValue::Missing,
        },
    }
}

/// Elementwise coercion of a whole column; output has the same length.
pub fn coerce_values(values: &[ColumnValue], target: ColumnType) -> Vec<ColumnValue> {
    values.iter().map(|v| coerce_value(v, target)).collect()
}

/// Parse raw or locale-formatted numeric text.
///
/// Accepts a currency prefix, thousands separators (`1,234.50` and
/// `1.234,50`), a decimal comma (`12,5`) and accounting negatives
/// (`(1,200.00)`).
pub fn parse_number(text: &str) -> Option<f64> {
    let mut s = text.trim();
    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].trim();
    }

    let (sign, rest) = split_sign(s);
    negative ^= sign;
    s = strip_currency(rest);
    let (sign, rest) = split_sign(s);
    negative ^= sign;

    let compact: String = rest
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\'')
        .collect();
    if compact.is_empty() || !compact.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if !compact
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | 'e' | 'E' | '-' | '+'))
    {
        return None;
    }

    let normalized = normalize_separators(&compact)?;
    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Parse date text in any of the accepted layouts. Slash and dashed forms
/// with the year last are read day-first: `05/01/2026` is 5 January, where a
/// month-first reader such as pandas' `to_datetime` would give 1 May.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest.trim_start())
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest.trim_start())
    } else {
        (false, s)
    }
}

fn strip_currency(s: &str) -> &str {
    for marker in CURRENCY_MARKERS {
        if let Some(rest) = s.strip_prefix(marker) {
            return rest.trim_start();
        }
        if let Some(rest) = s.strip_suffix(marker) {
            return rest.trim_end();
        }
    }
    s
}

/// Rewrite thousands/decimal separators into plain `1234.5` form.
fn normalize_separators(s: &str) -> Option<String> {
    let commas = s.matches(',').count();
    let dots = s.matches('.').count();

    match (commas, dots) {
        (0, 0) => Some(s.to_string()),
        (0, 1) => Some(s.to_string()),
        (0, _) => {
            // 1.234.567 (European thousands)
            if is_grouped(s, '.') {
                Some(s.replace('.', ""))
            } else {
                None
            }
        }
        (_, 0) => {
            if is_grouped(s, ',') {
                Some(s.replace(',', ""))
            } else if commas == 1 {
                Some(s.replace(',', "."))
            } else {
                None
            }
        }
        _ => {
            let last_comma = s.rfind(',')?;
            let last_dot = s.rfind('.')?;
            if last_dot > last_comma {
                // 1,234.50
                let (int_part, frac) = s.split_at(last_dot);
                if dots != 1 || !is_grouped(int_part, ',') {
                    return None;
                }
                Some(format!("{}{}", int_part.replace(',', ""), frac))
            } else {
                // 1.234,50
                let (int_part, frac) = s.split_at(last_comma);
                if commas != 1 || !is_grouped(int_part, '.') {
                    return None;
                }
                Some(format!("{}.{}", int_part.replace('.', ""), &frac[1..]))
            }
        }
    }
}

/// True if `s` looks like `d{1,3}(sep d{3})+`.
fn is_grouped(s: &str, sep: char) -> bool {
    let mut groups = s.split(sep);
    let head = match groups.next() {
        Some(h) => h,
        None => return false,
    };
    if head.is_empty() || head.len() > 3 || !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let mut tail_count = 0;
    for group in groups {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        tail_count += 1;
    }
    tail_count > 0
}
