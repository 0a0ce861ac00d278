//! The "Pagos" dashboard: payroll and expense payments per advisor.
//!
//! Rows are not filtered for a missing advisor here; views that group by a
//! column drop the rows whose key is missing.

use super::{run_view, Kpi, ViewOutcome};
use crate::aggregate::{AggOp, AggregateTable, Aggregation, Metric, SortOrder};
use crate::column::ColumnType;
use crate::config::Config;
use crate::error::Result;
use crate::summary::{describe, summarize, ColumnStats, Composition};
use crate::table::{Dataset, Schema};
use crate::timeseries::{timeseries, TimeSeries};
use serde::Serialize;

pub const ASESOR: &str = "ASESOR";
pub const CARTERA: &str = "CARTERA";
pub const PAGO_PLANILLA: &str = "PAGO PLANILLA";
pub const PAGO_GASTOS: &str = "PAGO GASTOS";
pub const FECHA_DE_PAGO: &str = "FECHA_DE_PAGO";
pub const CAMPANA: &str = "CAMPAÑA";
pub const RAZON_SOCIAL: &str = "RAZON SOCIAL";
pub const FECHA_PAGO_TOTAL: &str = "Fecha de Pago";
pub const SUMA_TOTAL: &str = "Suma Total";
pub const PAGO_PLANILLA_GASTOS: &str = "Pago Planilla y Gastos";

/// Output name of the distinct-portfolio count.
pub const CANTIDAD_CARTERA: &str = "Cantidad_Cartera";
/// Output name of the payments-per-day count.
pub const CANTIDAD: &str = "Cantidad";

pub fn schema() -> Schema {
    Schema::of(&[
        (ASESOR, ColumnType::Text),
        (CARTERA, ColumnType::Text),
        (PAGO_PLANILLA, ColumnType::Number),
        (PAGO_GASTOS, ColumnType::Number),
        (FECHA_DE_PAGO, ColumnType::Date),
        (CAMPANA, ColumnType::Text),
        (RAZON_SOCIAL, ColumnType::Text),
        (FECHA_PAGO_TOTAL, ColumnType::Date),
        (SUMA_TOTAL, ColumnType::Number),
        (PAGO_PLANILLA_GASTOS, ColumnType::Number),
    ])
}

/// Tab "Cierre de Pagos".
#[derive(Debug, Clone, Serialize)]
pub struct CierreTab {
    pub kpis: ViewOutcome<Vec<Kpi>>,
    pub top_planilla: ViewOutcome<AggregateTable>,
    pub planilla_vs_gastos: ViewOutcome<Composition>,
    pub top_gastos: ViewOutcome<AggregateTable>,
    pub top_carteras: ViewOutcome<AggregateTable>,
    pub timeline: ViewOutcome<TimeSeries>,
    pub payments_per_day: ViewOutcome<TimeSeries>,
    pub detail: ViewOutcome<Dataset>,
}

/// Tab "Pagos Total".
#[derive(Debug, Clone, Serialize)]
pub struct TotalTab {
    pub kpis: ViewOutcome<Vec<Kpi>>,
    pub by_campaign: ViewOutcome<AggregateTable>,
    pub comparison: ViewOutcome<Composition>,
    pub top_companies: ViewOutcome<AggregateTable>,
    pub timeline: ViewOutcome<TimeSeries>,
    pub statistics: ViewOutcome<Vec<ColumnStats>>,
    pub detail: ViewOutcome<Dataset>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagosReport {
    pub cierre: CierreTab,
    pub total: TotalTab,
}

fn grouped(key: &str, metrics: &[Metric], dataset: &Dataset) -> Result<AggregateTable> {
    Aggregation::new(&[key], metrics)
        .drop_missing_keys(true)
        .run(dataset)
}

/// Coerce the declared columns, then build both tabs.
pub fn build(dataset: &Dataset, config: &Config) -> PagosReport {
    let ds = dataset.with_schema(&schema());
    PagosReport {
        cierre: build_cierre(&ds, config),
        total: build_total(&ds, config),
    }
}

fn build_cierre(ds: &Dataset, config: &Config) -> CierreTab {
    let currency = config.currency_symbol.as_str();
    let top = config.top_advisors;

    CierreTab {
        kpis: run_view("pagos.cierre.kpis", || {
            Ok(vec![
                Kpi::amount("Total Pago Planilla", summarize(ds, PAGO_PLANILLA, AggOp::Sum)?, currency),
                Kpi::amount("Total Pago Gastos", summarize(ds, PAGO_GASTOS, AggOp::Sum)?, currency),
                Kpi::count("Total Carteras", summarize(ds, CARTERA, AggOp::CountDistinct)?),
                Kpi::count("Total Asesores", summarize(ds, ASESOR, AggOp::CountDistinct)?),
            ])
        }),
        top_planilla: run_view("pagos.cierre.top_planilla", || {
            grouped(ASESOR, &[Metric::sum(PAGO_PLANILLA)], ds)?.top_n(PAGO_PLANILLA, top)
        }),
        planilla_vs_gastos: run_view("pagos.cierre.planilla_vs_gastos", || {
            Ok(Composition::new(vec![
                ("Pago Planilla", summarize(ds, PAGO_PLANILLA, AggOp::Sum)?),
                ("Pago Gastos", summarize(ds, PAGO_GASTOS, AggOp::Sum)?),
            ]))
        }),
        top_gastos: run_view("pagos.cierre.top_gastos", || {
            grouped(ASESOR, &[Metric::sum(PAGO_GASTOS)], ds)?.top_n(PAGO_GASTOS, top)
        }),
        top_carteras: run_view("pagos.cierre.top_carteras", || {
            grouped(ASESOR, &[Metric::count_distinct(CARTERA).named(CANTIDAD_CARTERA)], ds)?
                .top_n(CANTIDAD_CARTERA, top)
        }),
        timeline: run_view("pagos.cierre.timeline", || {
            timeseries(ds, FECHA_DE_PAGO, &[Metric::sum(PAGO_PLANILLA), Metric::sum(PAGO_GASTOS)])
        }),
        payments_per_day: run_view("pagos.cierre.payments_per_day", || {
            timeseries(ds, FECHA_DE_PAGO, &[Metric::count_rows(CANTIDAD)])
        }),
        detail: run_view("pagos.cierre.detail", || Ok(ds.clone())),
    }
}

fn build_total(ds: &Dataset, config: &Config) -> TotalTab {
    let currency = config.currency_symbol.as_str();

    TotalTab {
        kpis: run_view("pagos.total.kpis", || {
            Ok(vec![
                Kpi::amount("Total Suma General", summarize(ds, SUMA_TOTAL, AggOp::Sum)?, currency),
                Kpi::amount("Total Pago P y G", summarize(ds, PAGO_PLANILLA_GASTOS, AggOp::Sum)?, currency),
                Kpi::count("Total Registros", ds.len() as f64),
            ])
        }),
        by_campaign: run_view("pagos.total.by_campaign", || {
            grouped(CAMPANA, &[Metric::sum(SUMA_TOTAL)], ds)?.sorted(SUMA_TOTAL, SortOrder::Descending)
        }),
        comparison: run_view("pagos.total.comparison", || {
            Composition::of_columns(ds, &[SUMA_TOTAL, PAGO_PLANILLA_GASTOS])
        }),
        top_companies: run_view("pagos.total.top_companies", || {
            grouped(
                RAZON_SOCIAL,
                &[Metric::sum(SUMA_TOTAL), Metric::sum(PAGO_PLANILLA_GASTOS)],
                ds,
            )?
            .top_n(SUMA_TOTAL, config.top_companies)
        }),
        timeline: run_view("pagos.total.timeline", || {
            timeseries(
                ds,
                FECHA_PAGO_TOTAL,
                &[Metric::sum(SUMA_TOTAL), Metric::sum(PAGO_PLANILLA_GASTOS)],
            )
        }),
        statistics: run_view("pagos.total.statistics", || {
            describe(ds, &[SUMA_TOTAL, PAGO_PLANILLA_GASTOS])
        }),
        detail: run_view("pagos.total.detail", || Ok(ds.clone())),
    }
}
