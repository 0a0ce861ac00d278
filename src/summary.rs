//! Scalar summary metrics and ratios derived from them.

use crate::aggregate::{resolve_metrics, Accumulator, AggOp, Metric};
use crate::error::Result;
use crate::table::Dataset;
use serde::Serialize;

/// Reduce one column of the whole dataset to a scalar.
///
/// Uses the same coercion rules as grouped aggregation: values that are
/// not numeric contribute zero to a sum, missing values are ignored by
/// distinct counts.
///
/// ```
/// use tablero::{summarize, AggOp, ColumnValue, Dataset};
///
/// let dataset = Dataset::from_rows(
///     "pagos",
///     &["MONTO"],
///     vec![
///         vec![ColumnValue::Number(100.0)],
///         vec![ColumnValue::text("N/A")],
///         vec![ColumnValue::text("200")],
///     ],
/// )
/// .unwrap();
///
/// assert_eq!(summarize(&dataset, "MONTO", AggOp::Sum).unwrap(), 300.0);
/// ```
pub fn summarize(dataset: &Dataset, column: &str, op: AggOp) -> Result<f64> {
    let metric = Metric {
        op,
        column: Some(column.to_string()),
        name: column.to_string(),
    };
    // count_rows still requires the column so a misspelt name is caught
    dataset.column(column)?;
    let resolved = resolve_metrics(dataset, std::slice::from_ref(&metric))?;

    let mut acc = Accumulator::new(op);
    let source = resolved.first().copied().flatten();
    for row in 0..dataset.len() {
        acc.update(source.and_then(|c| c.get(row)));
    }
    Ok(acc.finish())
}

/// `part / whole`, or None when the whole is zero.
pub fn proportion(part: f64, whole: f64) -> Option<f64> {
    if whole == 0.0 {
        None
    } else {
        Some(part / whole)
    }
}

/// One named component of a composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub label: String,
    pub value: f64,
    /// Fraction of the total, None when the total is zero.
    pub share: Option<f64>,
}

/// A whole broken down into labelled parts.
///
/// The total is the sum of the supplied parts, so the shares always add up
/// to one (when the total is non-zero).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub total: f64,
    pub parts: Vec<Share>,
}

impl Composition {
    pub fn new<S: Into<String>>(parts: impl IntoIterator<Item = (S, f64)>) -> Self {
        let raw: Vec<(String, f64)> = parts.into_iter().map(|(l, v)| (l.into(), v)).collect();
        let total: f64 = raw.iter().map(|(_, v)| v).sum();
        let parts = raw
            .into_iter()
            .map(|(label, value)| Share {
                label,
                value,
                share: proportion(value, total),
            })
            .collect();
        Composition { total, parts }
    }

    /// Composition of scalar sums of several columns.
    pub fn of_columns(dataset: &Dataset, columns: &[&str]) -> Result<Self> {
        let parts = columns
            .iter()
            .map(|c| summarize(dataset, c, AggOp::Sum).map(|v| (c.to_string(), v)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Composition::new(parts))
    }

    pub fn share_of(&self, label: &str) -> Option<f64> {
        self.parts.iter().find(|p| p.label == label).and_then(|p| p.share)
    }
}

/// Descriptive statistics of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    /// Number of numerically coercible values.
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1), None below two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub median: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Count, mean, sample std, min, quartiles and max over the coercible values
/// of each column. Missing values are skipped, not counted as zero.
pub fn describe(dataset: &Dataset, columns: &[&str]) -> Result<Vec<ColumnStats>> {
    columns
        .iter()
        .map(|&name| {
            let col = dataset.column(name)?;
            let values: Vec<f64> = (0..col.len()).filter_map(|i| col.get_f64(i)).collect();
            Ok(stats_of(name, &values))
        })
        .collect()
}

fn stats_of(name: &str, values: &[f64]) -> ColumnStats {
    let count = values.len();
    if count == 0 {
        return ColumnStats {
            column: name.to_string(),
            count,
            mean: None,
            std: None,
            min: None,
            q25: None,
            median: None,
            q75: None,
            max: None,
        };
    }

    let mean = values.iter().sum::<f64>() / count as f64;
    let std = if count > 1 {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        Some(var.sqrt())
    } else {
        None
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    ColumnStats {
        column: name.to_string(),
        count,
        mean: Some(mean),
        std,
        min: sorted.first().copied(),
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted.last().copied(),
    }
}

/// Quantile `q` of ascending `sorted`, interpolating linearly between the two
/// closest ranks.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q.clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}
