//! Column values and column storage.
//!
//! A Column is an ordered, random-access container of raw cell values read
//! from a spreadsheet. Values are loosely typed: a column may hold numbers,
//! text, dates and missing cells side by side. The semantic type a report
//! expects is declared separately (see `Schema`) and applied by coercion.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Semantic column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Text,
    Date,
    Bool,
}

/// A single cell value.
///
/// `Missing` is the sentinel for empty cells and for values that failed
/// coercion. Serializes as plain JSON (`null` for missing, ISO string for
/// dates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Text(String),
    Missing,
}

impl ColumnValue {
    /// Build a text value, mapping blank strings to `Missing`.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            ColumnValue::Missing
        } else {
            ColumnValue::Text(s)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ColumnValue::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            ColumnValue::Date(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ColumnValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The raw kind of this value, or None when missing.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            ColumnValue::Number(_) => Some(ColumnType::Number),
            ColumnValue::Bool(_) => Some(ColumnType::Bool),
            ColumnValue::Date(_) => Some(ColumnType::Date),
            ColumnValue::Text(_) => Some(ColumnType::Text),
            ColumnValue::Missing => None,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Number(v) => write!(f, "{}", v),
            ColumnValue::Bool(v) => write!(f, "{}", v),
            ColumnValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            ColumnValue::Text(v) => f.write_str(v),
            ColumnValue::Missing => Ok(()),
        }
    }
}

impl From<f64> for ColumnValue {
    fn from(v: f64) -> Self {
        ColumnValue::Number(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::text(v)
    }
}

impl From<NaiveDate> for ColumnValue {
    fn from(v: NaiveDate) -> Self {
        ColumnValue::Date(v)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ColumnValue::Missing)
    }
}

// ============================================================================
// Hashable keys
// ============================================================================

/// Wrapper around f64 with total equality, hashing and ordering so numbers
/// can take part in grouping keys. All NaN values compare equal.
#[derive(Debug, Clone, Copy)]
pub struct OrderedFloat(pub f64);

impl OrderedFloat {
    fn canonical_bits(&self) -> u64 {
        if self.0.is_nan() {
            u64::MAX
        } else if self.0 == 0.0 {
            // -0.0 and 0.0 are the same key
            0
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bits() == other.canonical_bits()
    }
}

impl Eq for OrderedFloat {}

impl Hash for OrderedFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bits().hash(state);
    }
}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            Ordering::Equal
        } else {
            self.0.total_cmp(&other.0)
        }
    }
}

/// Hashable image of a `ColumnValue`, used for grouping and distinct counts.
/// Equality is exact on the raw value: the number 1 and the text "1" are
/// different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Missing,
    Bool(bool),
    Number(OrderedFloat),
    Date(NaiveDate),
    Text(String),
}

impl KeyValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, KeyValue::Missing)
    }

    pub fn to_value(&self) -> ColumnValue {
        match self {
            KeyValue::Missing => ColumnValue::Missing,
            KeyValue::Bool(b) => ColumnValue::Bool(*b),
            KeyValue::Number(n) => ColumnValue::Number(n.0),
            KeyValue::Date(d) => ColumnValue::Date(*d),
            KeyValue::Text(s) => ColumnValue::Text(s.clone()),
        }
    }
}

impl From<&ColumnValue> for KeyValue {
    fn from(value: &ColumnValue) -> Self {
        match value {
            ColumnValue::Missing => KeyValue::Missing,
            ColumnValue::Bool(b) => KeyValue::Bool(*b),
            ColumnValue::Number(n) => KeyValue::Number(OrderedFloat(*n)),
            ColumnValue::Date(d) => KeyValue::Date(*d),
            ColumnValue::Text(s) => KeyValue::Text(s.clone()),
        }
    }
}

// ============================================================================
// Column
// ============================================================================

/// A named sequence of raw values.
#[derive(Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<ColumnValue>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn from_values(name: impl Into<String>, values: Vec<ColumnValue>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnValue> {
        self.values.get(index)
    }

    /// Numeric view of the value at `index` using best-effort coercion.
    /// Returns None when the cell is missing or not coercible.
    #[inline]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        self.values.get(index).and_then(crate::coerce::to_number)
    }

    /// Date view of the value at `index` using best-effort coercion.
    #[inline]
    pub fn get_date(&self, index: usize) -> Option<NaiveDate> {
        self.values.get(index).and_then(crate::coerce::to_date)
    }

    pub fn is_missing_at(&self, index: usize) -> bool {
        self.values.get(index).map_or(true, ColumnValue::is_missing)
    }

    pub fn push(&mut self, value: ColumnValue) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[ColumnValue] {
        &self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnValue> {
        self.values.iter()
    }

    /// New column holding only the rows at `indices`, in that order.
    pub(crate) fn take(&self, indices: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            values: indices
                .iter()
                .map(|&i| self.values.get(i).cloned().unwrap_or(ColumnValue::Missing))
                .collect(),
        }
    }

    pub(crate) fn replace_values(&mut self, values: Vec<ColumnValue>) {
        self.values = values;
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Column {{ name: '{}', len: {} }}", self.name, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_column_basic() {
        let mut col = Column::new("MONTO");
        col.push(ColumnValue::Number(10.0));
        col.push(ColumnValue::text("20.5"));
        col.push(ColumnValue::Missing);

        assert_eq!(col.len(), 3);
        assert_eq!(col.get(0).unwrap().as_f64(), Some(10.0));
        assert_eq!(col.get_f64(1), Some(20.5));
        assert_eq!(col.get_f64(2), None);
        assert!(col.is_missing_at(2));
        assert!(col.is_missing_at(99));
    }

    #[test]
    fn test_blank_text_is_missing() {
        assert!(ColumnValue::text("   ").is_missing());
        assert!(ColumnValue::from("").is_missing());
        assert_eq!(ColumnValue::text("Ana").as_str(), Some("Ana"));
    }

    #[test]
    fn test_key_value_equality() {
        let a = KeyValue::from(&ColumnValue::Number(1.0));
        let b = KeyValue::from(&ColumnValue::Number(1.0));
        let c = KeyValue::from(&ColumnValue::text("1"));
        let z1 = KeyValue::from(&ColumnValue::Number(0.0));
        let z2 = KeyValue::from(&ColumnValue::Number(-0.0));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(z1, z2);

        let set: HashSet<KeyValue> = [a, b, c, z1, z2].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_value_serialization() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        let values = vec![
            ColumnValue::Number(1.5),
            ColumnValue::text("Ana"),
            ColumnValue::Date(date),
            ColumnValue::Missing,
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[1.5,"Ana","2026-01-20",null]"#);
    }

    #[test]
    fn test_take_reorders_rows() {
        let col = Column::from_values(
            "ASESOR",
            vec![ColumnValue::text("A"), ColumnValue::text("B"), ColumnValue::text("C")],
        );
        let taken = col.take(&[2, 0]);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken.get(0).unwrap().as_str(), Some("C"));
        assert_eq!(taken.get(1).unwrap().as_str(), Some("A"));
    }
}
