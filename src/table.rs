//! Dataset: an ordered, immutable-once-loaded collection of named columns.
//!
//! # Examples
//!
//! ```
//! use tablero::{Dataset, ColumnValue};
//!
//! let dataset = Dataset::from_rows(
//!     "pagos",
//!     &["ASESOR", "MONTO"],
//!     vec![
//!         vec![ColumnValue::text("Ana"), ColumnValue::Number(100.0)],
//!         vec![ColumnValue::Missing, ColumnValue::Number(999.0)],
//!     ],
//! )
//! .unwrap();
//!
//! let filtered = dataset.filter_incomplete("ASESOR").unwrap();
//! assert_eq!(filtered.len(), 1);
//! assert_eq!(filtered.sum("MONTO").unwrap(), 100.0);
//! ```

use crate::coerce;
use crate::column::{Column, ColumnType, ColumnValue, KeyValue};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Declared semantic type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnSpec {
            name: name.into(),
            column_type,
        }
    }
}

/// Schema description consumed by the coercion step.
///
/// A schema does not constrain what a dataset may contain; it states how the
/// columns a report relies on should be read.
///
/// ```
/// use tablero::{Schema, ColumnType};
///
/// let schema = Schema::of(&[
///     ("ASESOR", ColumnType::Text),
///     ("MONTO", ColumnType::Number),
///     ("FECHA_DE_PAGO", ColumnType::Date),
/// ]);
/// assert_eq!(schema.len(), 3);
/// assert_eq!(schema.get_column_type("MONTO"), Some(ColumnType::Number));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Schema { columns }
    }

    pub fn of(columns: &[(&str, ColumnType)]) -> Self {
        Schema {
            columns: columns
                .iter()
                .map(|(name, ty)| ColumnSpec::new(*name, *ty))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn get_column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }
}

/// Tabular dataset with loosely typed cells.
#[derive(Clone, PartialEq)]
pub struct Dataset {
    name: String,
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Create an empty dataset with the given header.
    pub fn new(name: impl Into<String>, column_names: &[&str]) -> Self {
        Dataset {
            name: name.into(),
            columns: column_names.iter().map(|n| Column::new(*n)).collect(),
            row_count: 0,
        }
    }

    /// Build a dataset from equally sized columns.
    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map_or(0, Column::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != row_count) {
            return Err(EngineError::InvalidFormat(format!(
                "Column '{}' has {} values, expected {}",
                bad.name(),
                bad.len(),
                row_count
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.name().to_string())) {
            return Err(EngineError::InvalidFormat(format!(
                "Duplicate column '{}'",
                dup.name()
            )));
        }
        Ok(Dataset {
            name: name.into(),
            columns,
            row_count,
        })
    }

    /// Build a dataset from a header and row-major values.
    pub fn from_rows(
        name: impl Into<String>,
        column_names: &[&str],
        rows: Vec<Vec<ColumnValue>>,
    ) -> Result<Self> {
        let mut dataset = Dataset::new(name, column_names);
        for row in rows {
            dataset.append_row(row)?;
        }
        Ok(dataset)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name() == name)
    }

    /// Look up a column; absence is a `MissingColumn` error.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| EngineError::MissingColumn(name.to_string()))
    }

    /// Fail with the first absent column among `names`.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        for name in names {
            self.column(name)?;
        }
        Ok(())
    }

    pub fn get_value(&self, row: usize, column: &str) -> Result<&ColumnValue> {
        let col = self.column(column)?;
        col.get(row).ok_or_else(|| {
            EngineError::InvalidFormat(format!("Row {} out of range [0, {})", row, self.row_count))
        })
    }

    pub fn get_row(&self, row: usize) -> Result<HashMap<String, ColumnValue>> {
        if row >= self.row_count {
            return Err(EngineError::InvalidFormat(format!(
                "Row {} out of range [0, {})",
                row, self.row_count
            )));
        }
        Ok(self
            .columns
            .iter()
            .map(|c| {
                (
                    c.name().to_string(),
                    c.get(row).cloned().unwrap_or(ColumnValue::Missing),
                )
            })
            .collect())
    }

    pub fn iter_rows(&self) -> DatasetRowIterator<'_> {
        DatasetRowIterator {
            dataset: self,
            index: 0,
        }
    }

    /// Append one row given in header order.
    pub fn append_row(&mut self, row: Vec<ColumnValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EngineError::InvalidFormat(format!(
                "Row has {} values, header has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (col, value) in self.columns.iter_mut().zip(row) {
            col.push(value);
        }
        self.row_count += 1;
        Ok(())
    }

    // ========================================================================
    // Coercion
    // ========================================================================

    /// Elementwise coercion of one column to `target`. Same length as the
    /// dataset; unconvertible cells become `Missing`.
    pub fn coerce(&self, column: &str, target: ColumnType) -> Result<Vec<ColumnValue>> {
        Ok(coerce::coerce_values(self.column(column)?.values(), target))
    }

    /// Copy of this dataset with every declared column coerced to its
    /// declared type. Declared columns the dataset lacks are left for the
    /// views that need them to report.
    pub fn with_schema(&self, schema: &Schema) -> Dataset {
        let mut out = self.clone();
        for spec in schema.columns() {
            match out.columns.iter_mut().find(|c| c.name() == spec.name) {
                Some(col) => {
                    let coerced = coerce::coerce_values(col.values(), spec.column_type);
                    col.replace_values(coerced);
                }
                None => log::warn!(
                    "dataset '{}' has no column '{}' declared as {:?}",
                    self.name,
                    spec.name,
                    spec.column_type
                ),
            }
        }
        out
    }

    // ========================================================================
    // Row selection
    // ========================================================================

    /// Remove every row whose `key_column` is missing.
    ///
    /// Rows without a key are totals embedded in the source sheet, not
    /// transactions. Reapplying to the result is a no-op.
    pub fn filter_incomplete(&self, key_column: &str) -> Result<Dataset> {
        let key = self.column(key_column)?;
        let keep: Vec<usize> = (0..self.row_count)
            .filter(|&i| !key.is_missing_at(i))
            .collect();
        log::debug!(
            "filter_incomplete('{}'): kept {} of {} rows",
            key_column,
            keep.len(),
            self.row_count
        );
        Ok(self.take(&keep))
    }

    /// Rows whose index satisfies `predicate`, in original order.
    pub fn filter_rows<F>(&self, predicate: F) -> Dataset
    where
        F: Fn(usize) -> bool,
    {
        let keep: Vec<usize> = (0..self.row_count).filter(|&i| predicate(i)).collect();
        self.take(&keep)
    }

    /// Rows at `indices`, in the order given.
    pub fn take(&self, indices: &[usize]) -> Dataset {
        Dataset {
            name: self.name.clone(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            row_count: indices.len(),
        }
    }

    /// Column subset in the order requested.
    pub fn select(&self, columns: &[&str]) -> Result<Dataset> {
        let selected = columns
            .iter()
            .map(|name| self.column(name).cloned())
            .collect::<Result<Vec<Column>>>()?;
        Dataset::from_columns(self.name.clone(), selected)
    }

    /// Replace (or append) a column. Length must match the dataset.
    pub fn with_column(&self, column: Column) -> Result<Dataset> {
        if column.len() != self.row_count && !self.columns.is_empty() {
            return Err(EngineError::InvalidFormat(format!(
                "Column '{}' has {} values, expected {}",
                column.name(),
                column.len(),
                self.row_count
            )));
        }
        let mut out = self.clone();
        match out.columns.iter_mut().find(|c| c.name() == column.name()) {
            Some(existing) => *existing = column,
            None => {
                out.row_count = column.len();
                out.columns.push(column);
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Aggregation Methods
    // ========================================================================

    /// Sum of the numerically coercible values in a column. Missing and
    /// unparseable cells contribute zero.
    pub fn sum(&self, column: &str) -> Result<f64> {
        let col = self.column(column)?;
        Ok((0..self.row_count).filter_map(|i| col.get_f64(i)).sum())
    }

    /// Number of distinct non-missing raw values in a column.
    pub fn count_distinct(&self, column: &str) -> Result<usize> {
        let col = self.column(column)?;
        let distinct: HashSet<KeyValue> = col
            .iter()
            .filter(|v| !v.is_missing())
            .map(KeyValue::from)
            .collect();
        Ok(distinct.len())
    }

    /// Number of non-missing values in a column.
    pub fn count_non_missing(&self, column: &str) -> Result<usize> {
        let col = self.column(column)?;
        Ok(col.iter().filter(|v| !v.is_missing()).count())
    }
}

pub struct DatasetRowIterator<'a> {
    dataset: &'a Dataset,
    index: usize,
}

impl<'a> Iterator for DatasetRowIterator<'a> {
    type Item = HashMap<String, ColumnValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.dataset.row_count {
            None
        } else {
            let result = self.dataset.get_row(self.index).ok();
            self.index += 1;
            result
        }
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dataset {{ name: '{}', columns: {}, rows: {} }}",
            self.name,
            self.columns.len(),
            self.row_count
        )
    }
}

/// Serializes as a list of records, keys in column order.
impl Serialize for Dataset {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};

        struct Record<'a>(&'a Dataset, usize);

        impl Serialize for Record<'_> {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.columns.len()))?;
                for col in &self.0.columns {
                    map.serialize_entry(col.name(), col.get(self.1).unwrap_or(&ColumnValue::Missing))?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.row_count))?;
        for row in 0..self.row_count {
            seq.serialize_element(&Record(self, row))?;
        }
        seq.end()
    }
}

/// Free-function form of [`Dataset::filter_incomplete`].
pub fn filter_incomplete(dataset: &Dataset, key_column: &str) -> Result<Dataset> {
    dataset.filter_incomplete(key_column)
}
