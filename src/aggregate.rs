//! Grouped aggregation and ranking.
//!
//! An aggregation partitions a dataset by one or more key columns and
//! computes named metrics per partition. Partitions appear in the order
//! their key is first encountered; nothing is zero-filled.
//!
//! # Examples
//!
//! ```
//! use tablero::{aggregate, ColumnValue, Dataset, Metric, SortOrder};
//!
//! let dataset = Dataset::from_rows(
//!     "pagos",
//!     &["ASESOR", "MONTO"],
//!     vec![
//!         vec![ColumnValue::text("Ana"), ColumnValue::Number(100.0)],
//!         vec![ColumnValue::text("Luis"), ColumnValue::Number(300.0)],
//!         vec![ColumnValue::text("Ana"), ColumnValue::Number(50.0)],
//!     ],
//! )
//! .unwrap();
//!
//! let mut table = aggregate(&dataset, &["ASESOR"], &[Metric::sum("MONTO")]).unwrap();
//! assert_eq!(table.len(), 2);
//!
//! table.sort_by_metric("MONTO", SortOrder::Descending).unwrap();
//! assert_eq!(table.key(0, "ASESOR").unwrap().as_str(), Some("Luis"));
//! assert_eq!(table.value(1, "MONTO"), Some(150.0));
//! ```

use crate::column::{ColumnValue, KeyValue};
use crate::error::{EngineError, Result};
use crate::table::Dataset;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Aggregate operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggOp {
    /// Sum of numerically coercible values; everything else adds zero.
    Sum,
    /// Number of distinct non-missing raw values.
    CountDistinct,
    /// Number of rows in the partition.
    CountRows,
}

/// A named metric over a column.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub op: AggOp,
    /// Source column. None only for `CountRows`.
    pub column: Option<String>,
    /// Output name
    pub name: String,
}

impl Metric {
    pub fn sum(column: impl Into<String>) -> Self {
        let column = column.into();
        Metric {
            op: AggOp::Sum,
            name: column.clone(),
            column: Some(column),
        }
    }

    pub fn count_distinct(column: impl Into<String>) -> Self {
        let column = column.into();
        Metric {
            op: AggOp::CountDistinct,
            name: column.clone(),
            column: Some(column),
        }
    }

    pub fn count_rows(name: impl Into<String>) -> Self {
        Metric {
            op: AggOp::CountRows,
            column: None,
            name: name.into(),
        }
    }

    /// Rename the output of this metric.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Sort order specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending order (smallest first)
    Ascending,
    /// Descending order (largest first)
    Descending,
}

// ============================================================================
// Accumulators
// ============================================================================

/// Running state for one metric within one partition.
#[derive(Debug, Clone)]
pub(crate) enum Accumulator {
    Sum(f64),
    Distinct(HashSet<KeyValue>),
    Count(usize),
}

impl Accumulator {
    pub(crate) fn new(op: AggOp) -> Self {
        match op {
            AggOp::Sum => Accumulator::Sum(0.0),
            AggOp::CountDistinct => Accumulator::Distinct(HashSet::new()),
            AggOp::CountRows => Accumulator::Count(0),
        }
    }

    pub(crate) fn update(&mut self, value: Option<&ColumnValue>) {
        match self {
            Accumulator::Sum(total) => {
                if let Some(n) = value.and_then(crate::coerce::to_number) {
                    *total += n;
                }
            }
            Accumulator::Distinct(seen) => {
                if let Some(v) = value.filter(|v| !v.is_missing()) {
                    seen.insert(KeyValue::from(v));
                }
            }
            Accumulator::Count(n) => *n += 1,
        }
    }

    pub(crate) fn finish(&self) -> f64 {
        match self {
            Accumulator::Sum(total) => *total,
            Accumulator::Distinct(seen) => seen.len() as f64,
            Accumulator::Count(n) => *n as f64,
        }
    }
}

/// Metric columns resolved against a dataset. Fails on the first metric
/// whose source column is absent.
pub(crate) fn resolve_metrics<'a>(
    dataset: &'a Dataset,
    metrics: &[Metric],
) -> Result<Vec<Option<&'a crate::column::Column>>> {
    metrics
        .iter()
        .map(|m| match (&m.column, m.op) {
            (_, AggOp::CountRows) => Ok(None),
            (Some(col), _) => dataset.column(col).map(Some),
            (None, _) => Err(EngineError::InvalidFormat(format!(
                "Metric '{}' needs a source column",
                m.name
            ))),
        })
        .collect()
}

// ============================================================================
// AggregateTable
// ============================================================================

/// One output partition: its key values and metric values, in declaration
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub keys: Vec<ColumnValue>,
    pub values: Vec<f64>,
}

/// Result of an aggregation: a small table of key columns and metric
/// columns. Serializes as a list of records keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    group_by: Vec<String>,
    metrics: Vec<String>,
    rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn new(group_by: Vec<String>, metrics: Vec<String>, rows: Vec<AggregateRow>) -> Self {
        AggregateTable {
            group_by,
            metrics,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metrics
    }

    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    pub fn metric_index(&self, name: &str) -> Result<usize> {
        self.metrics
            .iter()
            .position(|m| m == name)
            .ok_or_else(|| EngineError::MissingColumn(name.to_string()))
    }

    fn key_index(&self, name: &str) -> Option<usize> {
        self.group_by.iter().position(|k| k == name)
    }

    /// Metric value at `row`.
    pub fn value(&self, row: usize, metric: &str) -> Option<f64> {
        let idx = self.metrics.iter().position(|m| m == metric)?;
        self.rows.get(row).and_then(|r| r.values.get(idx)).copied()
    }

    /// Key value at `row`.
    pub fn key(&self, row: usize, column: &str) -> Option<&ColumnValue> {
        let idx = self.key_index(column)?;
        self.rows.get(row).and_then(|r| r.keys.get(idx))
    }

    /// All values of one metric, in row order.
    pub fn metric_values(&self, metric: &str) -> Result<Vec<f64>> {
        let idx = self.metric_index(metric)?;
        Ok(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// Sum of one metric over all rows.
    pub fn total(&self, metric: &str) -> Result<f64> {
        Ok(self.metric_values(metric)?.iter().sum())
    }

    /// Stable sort by one metric. Ties keep their encounter order.
    pub fn sort_by_metric(&mut self, metric: &str, order: SortOrder) -> Result<()> {
        let idx = self.metric_index(metric)?;
        self.rows.sort_by(|a, b| compare_metric(a.values[idx], b.values[idx], order));
        Ok(())
    }

    /// Keep only the first `n` rows.
    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    /// Highest `n` partitions by `metric`: a descending stable sort followed
    /// by truncation.
    pub fn top_n(mut self, metric: &str, n: usize) -> Result<Self> {
        self.sort_by_metric(metric, SortOrder::Descending)?;
        self.truncate(n);
        Ok(self)
    }

    /// Sorted copy, for views that render one table in two orders.
    pub fn sorted(mut self, metric: &str, order: SortOrder) -> Result<Self> {
        self.sort_by_metric(metric, order)?;
        Ok(self)
    }

    /// Rows as JSON records keyed by column name.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = serde_json::Map::new();
                for (name, key) in self.group_by.iter().zip(&row.keys) {
                    record.insert(
                        name.clone(),
                        serde_json::to_value(key).unwrap_or(serde_json::Value::Null),
                    );
                }
                for (name, value) in self.metrics.iter().zip(&row.values) {
                    record.insert(
                        name.clone(),
                        serde_json::Number::from_f64(*value)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null),
                    );
                }
                record
            })
            .collect()
    }
}

impl Serialize for AggregateTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let records = self.to_records();
        let mut seq = serializer.serialize_seq(Some(records.len()))?;
        for record in &records {
            seq.serialize_element(record)?;
        }
        seq.end()
    }
}

fn compare_metric(a: f64, b: f64, order: SortOrder) -> Ordering {
    let base = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    match order {
        SortOrder::Ascending => base,
        SortOrder::Descending => base.reverse(),
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Declarative grouped aggregation.
#[derive(Debug, Clone)]
pub struct Aggregation {
    group_by: Vec<String>,
    metrics: Vec<Metric>,
    drop_missing_keys: bool,
}

impl Aggregation {
    pub fn new(group_by: &[&str], metrics: &[Metric]) -> Self {
        Aggregation {
            group_by: group_by.iter().map(|s| s.to_string()).collect(),
            metrics: metrics.to_vec(),
            drop_missing_keys: false,
        }
    }

    /// Omit partitions whose key contains a missing value. By default a
    /// missing key is a partition of its own.
    pub fn drop_missing_keys(mut self, drop: bool) -> Self {
        self.drop_missing_keys = drop;
        self
    }

    pub fn run(&self, dataset: &Dataset) -> Result<AggregateTable> {
        let key_columns = self
            .group_by
            .iter()
            .map(|name| dataset.column(name))
            .collect::<Result<Vec<_>>>()?;
        let metric_columns = resolve_metrics(dataset, &self.metrics)?;

        let mut order: Vec<Vec<KeyValue>> = Vec::new();
        let mut groups: HashMap<Vec<KeyValue>, Vec<Accumulator>> = HashMap::new();

        for row in 0..dataset.len() {
            let key: Vec<KeyValue> = key_columns
                .iter()
                .map(|col| col.get(row).map_or(KeyValue::Missing, KeyValue::from))
                .collect();
            if self.drop_missing_keys && key.iter().any(KeyValue::is_missing) {
                continue;
            }

            let accumulators = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                self.metrics.iter().map(|m| Accumulator::new(m.op)).collect()
            });
            for (acc, col) in accumulators.iter_mut().zip(&metric_columns) {
                acc.update(col.and_then(|c| c.get(row)));
            }
        }

        let rows = order
            .into_iter()
            .map(|key| {
                let values = groups
                    .get(&key)
                    .map(|accs| accs.iter().map(Accumulator::finish).collect())
                    .unwrap_or_default();
                AggregateRow {
                    keys: key.iter().map(KeyValue::to_value).collect(),
                    values,
                }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "aggregate {:?} over {} rows -> {} partitions",
            self.group_by,
            dataset.len(),
            rows.len()
        );

        Ok(AggregateTable::new(
            self.group_by.clone(),
            self.metrics.iter().map(|m| m.name.clone()).collect(),
            rows,
        ))
    }
}

/// Group `dataset` by `group_by` and compute `metrics` per partition.
/// Missing keys form their own partition.
pub fn aggregate(dataset: &Dataset, group_by: &[&str], metrics: &[Metric]) -> Result<AggregateTable> {
    Aggregation::new(group_by, metrics).run(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payments() -> Dataset {
        Dataset::from_rows(
            "pagos",
            &["ASESOR", "CARTERA", "PAGO PLANILLA"],
            vec![
                vec![ColumnValue::text("Ana"), ColumnValue::text("A"), ColumnValue::Number(100.0)],
                vec![ColumnValue::text("Luis"), ColumnValue::text("A"), ColumnValue::Number(300.0)],
                vec![ColumnValue::text("Ana"), ColumnValue::text("B"), ColumnValue::text("50")],
                vec![ColumnValue::Missing, ColumnValue::text("C"), ColumnValue::Number(999.0)],
                vec![ColumnValue::text("Ana"), ColumnValue::text("A"), ColumnValue::text("N/A")],
                vec![ColumnValue::text("Rosa"), ColumnValue::Missing, ColumnValue::Number(150.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_sum_count_distinct_and_rows() {
        let table = aggregate(
            &payments(),
            &["ASESOR"],
            &[
                Metric::sum("PAGO PLANILLA"),
                Metric::count_distinct("CARTERA").named("Cantidad_Cartera"),
                Metric::count_rows("Registros"),
            ],
        )
        .unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(table.key(0, "ASESOR").unwrap().as_str(), Some("Ana"));
        assert_eq!(table.value(0, "PAGO PLANILLA"), Some(150.0));
        assert_eq!(table.value(0, "Cantidad_Cartera"), Some(2.0));
        assert_eq!(table.value(0, "Registros"), Some(3.0));

        // Missing advisor is its own partition, in encounter order
        assert!(table.key(2, "ASESOR").unwrap().is_missing());
        assert_eq!(table.value(2, "PAGO PLANILLA"), Some(999.0));

        // Rosa's only portfolio is missing
        assert_eq!(table.value(3, "Cantidad_Cartera"), Some(0.0));
    }

    #[test]
    fn test_drop_missing_keys() {
        let table = Aggregation::new(&["ASESOR"], &[Metric::sum("PAGO PLANILLA")])
            .drop_missing_keys(true)
            .run(&payments())
            .unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.rows().iter().all(|r| !r.keys[0].is_missing()));
    }

    #[test]
    fn test_partition_count_bounded_by_distinct_keys() {
        let dataset = payments();
        let table = aggregate(&dataset, &["ASESOR", "CARTERA"], &[Metric::sum("PAGO PLANILLA")]).unwrap();
        let distinct: HashSet<Vec<KeyValue>> = (0..dataset.len())
            .map(|i| {
                vec![
                    KeyValue::from(dataset.get_value(i, "ASESOR").unwrap()),
                    KeyValue::from(dataset.get_value(i, "CARTERA").unwrap()),
                ]
            })
            .collect();
        assert_eq!(table.len(), distinct.len());
        // (Ana, A) gets 100 + N/A
        assert_eq!(table.value(0, "PAGO PLANILLA"), Some(100.0));
    }

    #[test]
    fn test_empty_group_by_is_grand_total() {
        let table = aggregate(&payments(), &[], &[Metric::sum("PAGO PLANILLA")]).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "PAGO PLANILLA"), Some(1599.0));

        let empty = Dataset::new("vacio", &["PAGO PLANILLA"]);
        let table = aggregate(&empty, &[], &[Metric::sum("PAGO PLANILLA")]).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_missing_columns_fail() {
        assert!(matches!(
            aggregate(&payments(), &["CAMPANA"], &[Metric::sum("PAGO PLANILLA")]),
            Err(EngineError::MissingColumn(_))
        ));
        assert!(matches!(
            aggregate(&payments(), &["ASESOR"], &[Metric::sum("IGV")]),
            Err(EngineError::MissingColumn(_))
        ));
        // count_rows needs no source column
        assert!(aggregate(&payments(), &["ASESOR"], &[Metric::count_rows("n")]).is_ok());
    }

    #[test]
    fn test_stable_sort_keeps_encounter_order_on_ties() {
        let dataset = Dataset::from_rows(
            "t",
            &["K", "V"],
            vec![
                vec![ColumnValue::text("x"), ColumnValue::Number(5.0)],
                vec![ColumnValue::text("y"), ColumnValue::Number(9.0)],
                vec![ColumnValue::text("z"), ColumnValue::Number(5.0)],
            ],
        )
        .unwrap();
        let mut table = aggregate(&dataset, &["K"], &[Metric::sum("V")]).unwrap();
        table.sort_by_metric("V", SortOrder::Descending).unwrap();
        let keys: Vec<&str> = (0..3).map(|i| table.key(i, "K").unwrap().as_str().unwrap()).collect();
        assert_eq!(keys, vec!["y", "x", "z"]);

        table.sort_by_metric("V", SortOrder::Ascending).unwrap();
        let keys: Vec<&str> = (0..3).map(|i| table.key(i, "K").unwrap().as_str().unwrap()).collect();
        assert_eq!(keys, vec!["x", "z", "y"]);

        assert!(table.sort_by_metric("W", SortOrder::Ascending).is_err());
    }

    #[test]
    fn test_top_n_is_prefix_of_descending_sort() {
        let rows: Vec<Vec<ColumnValue>> = (0..15)
            .map(|i| {
                vec![
                    ColumnValue::Text(format!("asesor-{:02}", i)),
                    ColumnValue::Number(((i * 7) % 15) as f64 * 10.0),
                ]
            })
            .collect();
        let dataset = Dataset::from_rows("t", &["ASESOR", "MONTO"], rows).unwrap();
        let full = aggregate(&dataset, &["ASESOR"], &[Metric::sum("MONTO")])
            .unwrap()
            .sorted("MONTO", SortOrder::Descending)
            .unwrap();
        let top = aggregate(&dataset, &["ASESOR"], &[Metric::sum("MONTO")])
            .unwrap()
            .top_n("MONTO", 10)
            .unwrap();

        assert_eq!(top.len(), 10);
        assert_eq!(top.rows(), &full.rows()[..10]);
        let kept_min = top.metric_values("MONTO").unwrap().into_iter().fold(f64::MAX, f64::min);
        for discarded in &full.rows()[10..] {
            assert!(kept_min >= discarded.values[0]);
        }
    }

    #[test]
    fn test_serializes_as_records() {
        let table = aggregate(&payments(), &["ASESOR"], &[Metric::sum("PAGO PLANILLA")])
            .unwrap()
            .top_n("PAGO PLANILLA", 1)
            .unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json, serde_json::json!([{"ASESOR": null, "PAGO PLANILLA": 999.0}]));
    }
}
