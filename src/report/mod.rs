//! Dashboard reports.
//!
//! A report is a fixed set of named views over one dataset. Each view is
//! computed independently: a view whose columns are absent fails on its own
//! and the rest of the report still renders.

pub mod finanzas;
pub mod pagos;

use crate::config::SourceConfig;
use crate::error::{EngineError, Result};
use crate::format::format_currency;
use crate::loader::{load_cached, load_xlsx_bytes, DatasetCache};
use crate::table::Dataset;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Result of computing one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ViewOutcome<T> {
    Ready { data: T },
    Failed { error: String },
}

impl<T> ViewOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ViewOutcome::Ready { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ViewOutcome::Ready { data } => Some(data),
            ViewOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ViewOutcome::Ready { .. } => None,
            ViewOutcome::Failed { error } => Some(error),
        }
    }
}

/// Compute one view, logging its duration, and turn a failure into a
/// `Failed` outcome.
pub fn run_view<T, F>(name: &str, compute: F) -> ViewOutcome<T>
where
    F: FnOnce() -> Result<T>,
{
    let started = Instant::now();
    match compute() {
        Ok(data) => {
            log::debug!("view '{}' ready in {:?}", name, started.elapsed());
            ViewOutcome::Ready { data }
        }
        Err(e) => {
            log::warn!("view '{}' failed: {}", name, e);
            ViewOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// A headline figure with its rendered text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: String,
    pub value: f64,
    pub display: String,
}

impl Kpi {
    pub fn amount(label: &str, value: f64, currency_symbol: &str) -> Self {
        Kpi {
            label: label.to_string(),
            value,
            display: format_currency(value, currency_symbol),
        }
    }

    pub fn count(label: &str, value: f64) -> Self {
        Kpi {
            label: label.to_string(),
            value,
            display: format!("{}", value as u64),
        }
    }
}

/// Load a dashboard's dataset: the workbook on disk if it can be found,
/// otherwise the last uploaded workbook, otherwise `MissingSource`.
pub fn load_source(
    cache: &mut DatasetCache,
    key: &str,
    source: &SourceConfig,
    upload: Option<&[u8]>,
) -> Result<Arc<Dataset>> {
    let locator = source.locator();
    if locator.locate().is_some() {
        return load_cached(cache, key, &locator, &source.sheet);
    }
    match upload {
        Some(bytes) => {
            log::info!("'{}' not found on disk, using uploaded workbook", key);
            cache.get_or_load(key, bytes, |b| load_xlsx_bytes(key, b, &source.sheet))
        }
        None => Err(EngineError::MissingSource(format!(
            "{} (upload the file to continue)",
            source.file_names.join(", ")
        ))),
    }
}
