//! Tablero - aggregation and reporting engine for payroll/expense sheets
//!
//! Loads a spreadsheet into a loosely typed `Dataset`, coerces cells on
//! demand, and derives grouped tables, weekly buckets, time series and
//! scalar metrics for the Pagos and Finanzas dashboards.

pub mod column;
pub mod coerce;
pub mod error;
pub mod table;
pub mod aggregate;
pub mod summary;
pub mod buckets;
pub mod timeseries;
pub mod format;
pub mod export;
pub mod loader;
pub mod config;
pub mod report;

pub use column::{Column, ColumnType, ColumnValue};
pub use error::{EngineError, Result};
pub use table::{filter_incomplete, ColumnSpec, Dataset, Schema};
pub use aggregate::{aggregate, AggOp, AggregateRow, AggregateTable, Aggregation, Metric, SortOrder};
pub use summary::{proportion, summarize, Composition};
pub use buckets::{bucket_by_week, BucketAggregate, WeekBucket};
pub use timeseries::{timeseries, TimeSeries};
pub use export::{detail_tables, DetailTables};
pub use loader::{DatasetCache, Fingerprint, SourceLocator};
pub use config::Config;

// HTTP server - only when server feature is enabled
#[cfg(feature = "server")]
pub mod server;
