//! Fixed calendar-week bucketing.
//!
//! Buckets are closed date intervals supplied by configuration rather than
//! derived from the calendar, so a "week" may be short (the last days of a
//! month) or straddle a year boundary.

use crate::aggregate::{Aggregation, AggregateTable, Metric};
use crate::error::{EngineError, Result};
use crate::table::Dataset;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A labelled, inclusive date interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekBucket {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekBucket {
    pub fn new(label: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        WeekBucket {
            label: label.into(),
            start,
            end,
        }
    }

    /// True when `date` lies within `[start, end]`.
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    fn overlaps(&self, other: &WeekBucket) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

/// The five reporting weeks of January 2026.
pub fn default_weeks() -> Vec<WeekBucket> {
    vec![
        WeekBucket::new("Semana 1 (29 Dic - 4 Ene)", ymd(2025, 12, 29), ymd(2026, 1, 4)),
        WeekBucket::new("Semana 2 (5 - 11 Ene)", ymd(2026, 1, 5), ymd(2026, 1, 11)),
        WeekBucket::new("Semana 3 (12 - 18 Ene)", ymd(2026, 1, 12), ymd(2026, 1, 18)),
        WeekBucket::new("Semana 4 (19 - 25 Ene)", ymd(2026, 1, 19), ymd(2026, 1, 25)),
        WeekBucket::new("Semana 5 (26 - 31 Ene)", ymd(2026, 1, 26), ymd(2026, 1, 31)),
    ]
}

/// Reject inverted intervals. Overlapping intervals are accepted but logged,
/// since a row would then count towards more than one week.
pub fn validate_buckets(buckets: &[WeekBucket]) -> Result<()> {
    for bucket in buckets {
        if bucket.start > bucket.end {
            return Err(EngineError::Config(format!(
                "bucket '{}' starts after it ends ({} > {})",
                bucket.label, bucket.start, bucket.end
            )));
        }
    }
    for (i, a) in buckets.iter().enumerate() {
        for b in &buckets[i + 1..] {
            if a.overlaps(b) {
                log::warn!("buckets '{}' and '{}' overlap", a.label, b.label);
            }
        }
    }
    Ok(())
}

/// The bucket containing `date`, first match wins.
pub fn bucket_for<'a>(buckets: &'a [WeekBucket], date: NaiveDate) -> Option<&'a WeekBucket> {
    buckets.iter().find(|b| b.contains(date))
}

/// Aggregation of the rows falling into one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketAggregate {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: usize,
    pub table: AggregateTable,
}

/// For each bucket in order, aggregate the rows whose coerced date lies in
/// it. Rows without a date or outside every bucket are dropped from this
/// view. Buckets with no rows are omitted.
///
/// ```
/// use chrono::NaiveDate;
/// use tablero::buckets::{bucket_by_week, default_weeks};
/// use tablero::{ColumnValue, Dataset, Metric};
///
/// let dataset = Dataset::from_rows(
///     "finanzas",
///     &["FECHA_DE_PAGO", "MONTO"],
///     vec![
///         vec![ColumnValue::text("2026-01-20"), ColumnValue::Number(100.0)],
///         vec![ColumnValue::text("2026-02-05"), ColumnValue::Number(40.0)],
///     ],
/// )
/// .unwrap();
///
/// let weeks = bucket_by_week(&dataset, "FECHA_DE_PAGO", &default_weeks(), &[], &[Metric::sum("MONTO")]).unwrap();
/// assert_eq!(weeks.len(), 1);
/// assert_eq!(weeks[0].label, "Semana 4 (19 - 25 Ene)");
/// ```
pub fn bucket_by_week(
    dataset: &Dataset,
    date_column: &str,
    buckets: &[WeekBucket],
    group_by: &[&str],
    metrics: &[Metric],
) -> Result<Vec<BucketAggregate>> {
    let dates = dataset.column(date_column)?;
    let aggregation = Aggregation::new(group_by, metrics);

    let mut out = Vec::new();
    for bucket in buckets {
        let subset = dataset.filter_rows(|i| dates.get_date(i).map_or(false, |d| bucket.contains(d)));
        if subset.is_empty() {
            continue;
        }
        let table = aggregation.run(&subset)?;
        out.push(BucketAggregate {
            label: bucket.label.clone(),
            start: bucket.start,
            end: bucket.end,
            rows: subset.len(),
            table,
        });
    }

    log::debug!(
        "bucket_by_week('{}'): {} of {} buckets populated",
        date_column,
        out.len(),
        buckets.len()
    );
    Ok(out)
}
