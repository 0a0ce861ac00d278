//! Daily time series and running totals.

use crate::aggregate::{resolve_metrics, Accumulator, Metric};
use crate::error::{EngineError, Result};
use crate::table::Dataset;
use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;

/// Metric values for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub values: Vec<f64>,
}

/// Metrics grouped by date, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    date_column: String,
    metrics: Vec<String>,
    points: Vec<TimePoint>,
}

impl TimeSeries {
    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metrics
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    fn metric_index(&self, metric: &str) -> Result<usize> {
        self.metrics
            .iter()
            .position(|m| m == metric)
            .ok_or_else(|| EngineError::MissingColumn(metric.to_string()))
    }

    /// Values of one metric in date order.
    pub fn series(&self, metric: &str) -> Result<Vec<f64>> {
        let idx = self.metric_index(metric)?;
        Ok(self.points.iter().map(|p| p.values[idx]).collect())
    }

    /// Prefix sum of `metric` over the date-sorted series.
    pub fn cumulative_sum(&self, metric: &str) -> Result<Vec<f64>> {
        Ok(cumulative_sum(&self.series(metric)?))
    }

    /// Append the running total of `metric` as a new series called `name`.
    pub fn with_cumulative(mut self, metric: &str, name: impl Into<String>) -> Result<Self> {
        let running = self.cumulative_sum(metric)?;
        for (point, total) in self.points.iter_mut().zip(running) {
            point.values.push(total);
        }
        self.metrics.push(name.into());
        Ok(self)
    }
}

impl Serialize for TimeSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct Point<'a>(&'a str, &'a [String], &'a TimePoint);

        impl Serialize for Point<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.1.len() + 1))?;
                map.serialize_entry(self.0, &self.2.date)?;
                for (name, value) in self.1.iter().zip(&self.2.values) {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.points.len()))?;
        for point in &self.points {
            seq.serialize_element(&Point(&self.date_column, &self.metrics, point))?;
        }
        seq.end()
    }
}

/// Plain running total.
///
/// ```
/// assert_eq!(tablero::timeseries::cumulative_sum(&[100.0, 50.0, 200.0]), vec![100.0, 150.0, 350.0]);
/// ```
pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// Group rows by their coerced date and compute `metrics` per day. Rows
/// whose date cannot be parsed are dropped before grouping.
pub fn timeseries(dataset: &Dataset, date_column: &str, metrics: &[Metric]) -> Result<TimeSeries> {
    let dates = dataset.column(date_column)?;
    let columns = resolve_metrics(dataset, metrics)?;

    let mut days: BTreeMap<NaiveDate, Vec<Accumulator>> = BTreeMap::new();
    let mut dropped = 0usize;
    for row in 0..dataset.len() {
        let date = match dates.get_date(row) {
            Some(d) => d,
            None => {
                dropped += 1;
                continue;
            }
        };
        let accs = days
            .entry(date)
            .or_insert_with(|| metrics.iter().map(|m| Accumulator::new(m.op)).collect());
        for (acc, col) in accs.iter_mut().zip(&columns) {
            acc.update(col.and_then(|c| c.get(row)));
        }
    }

    if dropped > 0 {
        log::debug!("timeseries('{}'): dropped {} undated rows", date_column, dropped);
    }

    Ok(TimeSeries {
        date_column: date_column.to_string(),
        metrics: metrics.iter().map(|m| m.name.clone()).collect(),
        points: days
            .into_iter()
            .map(|(date, accs)| TimePoint {
                date,
                values: accs.iter().map(Accumulator::finish).collect(),
            })
            .collect(),
    })
}
