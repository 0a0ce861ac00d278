//! The "Finanzas" dashboard: administrative expense closing.
//!
//! Rows without an advisor are subtotal lines of the sheet and are removed
//! before any view runs.

use super::{run_view, Kpi, ViewOutcome};
use crate::aggregate::{AggOp, AggregateTable, Aggregation, Metric, SortOrder};
use crate::buckets::{bucket_by_week, BucketAggregate};
use crate::column::ColumnType;
use crate::config::Config;
use crate::error::Result;
use crate::export::{detail_tables, to_xlsx, DetailTables, EXPORT_SHEET};
use crate::format::{format_amount_short, format_currency};
use crate::summary::{summarize, Composition};
use crate::table::{Dataset, Schema};
use crate::timeseries::{timeseries, TimeSeries};
use chrono::NaiveDate;
use serde::Serialize;

pub const ASESOR: &str = "ASESOR";
pub const CAMPANA: &str = "CAMPANA";
pub const CARTERA: &str = "CARTERA";
pub const RAZON_SOCIAL: &str = "RAZON_SOCIAL";
pub const FECHA_DE_PAGO: &str = "FECHA_DE_PAGO";
pub const VALOR_VENTA: &str = "VALOR VENTA";
pub const IGV: &str = "IGV";
pub const MONTO: &str = "MONTO";
pub const ESTADO_PLANILLA: &str = "ESTADO_PLANILLA";
pub const NUMERO_FACTURA: &str = "NUMERO_FACTURA";

pub const MONTO_ACUMULADO: &str = "MONTO_ACUMULADO";

/// Columns of the detail table, in display order.
pub const DETAIL_COLUMNS: [&str; 10] = [
    ASESOR,
    CAMPANA,
    CARTERA,
    RAZON_SOCIAL,
    FECHA_DE_PAGO,
    VALOR_VENTA,
    IGV,
    MONTO,
    ESTADO_PLANILLA,
    NUMERO_FACTURA,
];

pub const AMOUNT_COLUMNS: [&str; 3] = [VALOR_VENTA, IGV, MONTO];

pub fn schema() -> Schema {
    Schema::of(&[
        (ASESOR, ColumnType::Text),
        (CAMPANA, ColumnType::Text),
        (CARTERA, ColumnType::Text),
        (RAZON_SOCIAL, ColumnType::Text),
        (FECHA_DE_PAGO, ColumnType::Date),
        (VALOR_VENTA, ColumnType::Number),
        (IGV, ColumnType::Number),
        (MONTO, ColumnType::Number),
        (ESTADO_PLANILLA, ColumnType::Text),
        (NUMERO_FACTURA, ColumnType::Text),
    ])
}

fn amount_metrics() -> Vec<Metric> {
    AMOUNT_COLUMNS.iter().map(|c| Metric::sum(*c)).collect()
}

/// One populated week with its totals, raw and formatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekTotals {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: usize,
    pub valor_venta: f64,
    pub igv: f64,
    pub monto: f64,
    pub display: WeekDisplay,
}

/// Currency-formatted copy of a week's totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekDisplay {
    pub valor_venta: String,
    pub igv: String,
    pub monto: String,
    /// Rounded `monto` for the bar label.
    pub chart_label: String,
}

impl WeekTotals {
    fn from_bucket(bucket: &BucketAggregate, currency: &str) -> Self {
        let total = |m: &str| bucket.table.value(0, m).unwrap_or(0.0);
        let (valor_venta, igv, monto) = (total(VALOR_VENTA), total(IGV), total(MONTO));
        WeekTotals {
            label: bucket.label.clone(),
            start: bucket.start,
            end: bucket.end,
            rows: bucket.rows,
            valor_venta,
            igv,
            monto,
            display: WeekDisplay {
                valor_venta: format_currency(valor_venta, currency),
                igv: format_currency(igv, currency),
                monto: format_currency(monto, currency),
                chart_label: format_amount_short(monto, currency),
            },
        }
    }
}

/// A grouped table together with each group's share of the grouped total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedTable {
    pub table: AggregateTable,
    pub shares: Composition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinanzasReport {
    /// Rows left after removing those without an advisor.
    pub rows: usize,
    pub kpis: ViewOutcome<Vec<Kpi>>,
    pub monto_by_cartera: ViewOutcome<AggregateTable>,
    pub composition: ViewOutcome<Composition>,
    pub venta_igv_by_cartera: ViewOutcome<AggregateTable>,
    pub top_advisors: ViewOutcome<AggregateTable>,
    pub timeline: ViewOutcome<TimeSeries>,
    pub weekly: ViewOutcome<Vec<WeekTotals>>,
    pub by_campaign: ViewOutcome<AggregateTable>,
    pub by_status: ViewOutcome<SharedTable>,
    pub detail: ViewOutcome<DetailTables>,
}

fn grouped(key: &str, metrics: &[Metric], dataset: &Dataset) -> Result<AggregateTable> {
    Aggregation::new(&[key], metrics)
        .drop_missing_keys(true)
        .run(dataset)
}

/// Coerce the declared columns and remove subtotal rows. Fails when the
/// sheet has no advisor column at all.
pub fn prepare(dataset: &Dataset) -> Result<Dataset> {
    dataset.with_schema(&schema()).filter_incomplete(ASESOR)
}

/// Build every view. The dataset must already be `prepare`d.
pub fn build(ds: &Dataset, config: &Config) -> FinanzasReport {
    let currency = config.currency_symbol.as_str();

    FinanzasReport {
        rows: ds.len(),
        kpis: run_view("finanzas.kpis", || {
            Ok(vec![
                Kpi::amount("Valor Venta", summarize(ds, VALOR_VENTA, AggOp::Sum)?, currency),
                Kpi::amount("IGV", summarize(ds, IGV, AggOp::Sum)?, currency),
                Kpi::amount("Monto Total", summarize(ds, MONTO, AggOp::Sum)?, currency),
            ])
        }),
        monto_by_cartera: run_view("finanzas.monto_by_cartera", || {
            grouped(CARTERA, &[Metric::sum(MONTO)], ds)?.sorted(MONTO, SortOrder::Ascending)
        }),
        composition: run_view("finanzas.composition", || {
            Composition::of_columns(ds, &[VALOR_VENTA, IGV])
        }),
        venta_igv_by_cartera: run_view("finanzas.venta_igv_by_cartera", || {
            grouped(CARTERA, &[Metric::sum(VALOR_VENTA), Metric::sum(IGV)], ds)?
                .sorted(VALOR_VENTA, SortOrder::Ascending)
        }),
        top_advisors: run_view("finanzas.top_advisors", || {
            grouped(ASESOR, &amount_metrics(), ds)?.top_n(MONTO, config.top_finanzas_advisors)
        }),
        timeline: run_view("finanzas.timeline", || {
            timeseries(ds, FECHA_DE_PAGO, &amount_metrics())?.with_cumulative(MONTO, MONTO_ACUMULADO)
        }),
        weekly: run_view("finanzas.weekly", || {
            let weeks = bucket_by_week(ds, FECHA_DE_PAGO, &config.weeks, &[], &amount_metrics())?;
            Ok(weeks
                .iter()
                .map(|w| WeekTotals::from_bucket(w, currency))
                .collect())
        }),
        by_campaign: run_view("finanzas.by_campaign", || {
            grouped(CAMPANA, &amount_metrics(), ds)?.sorted(MONTO, SortOrder::Descending)
        }),
        by_status: run_view("finanzas.by_status", || {
            let table = grouped(ESTADO_PLANILLA, &[Metric::sum(MONTO)], ds)?
                .sorted(MONTO, SortOrder::Descending)?;
            let shares = Composition::new(
                table
                    .rows()
                    .iter()
                    .map(|r| (r.keys[0].to_string(), r.values[0]))
                    .collect::<Vec<_>>(),
            );
            Ok(SharedTable { table, shares })
        }),
        detail: run_view("finanzas.detail", || {
            detail_tables(ds, &DETAIL_COLUMNS, &AMOUNT_COLUMNS, currency)
        }),
    }
}

/// The export variant of the detail table as an XLSX workbook.
pub fn export_workbook(ds: &Dataset, config: &Config) -> Result<Vec<u8>> {
    let tables = detail_tables(ds, &DETAIL_COLUMNS, &AMOUNT_COLUMNS, &config.currency_symbol)?;
    to_xlsx(&tables.export, EXPORT_SHEET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnValue;

    fn t(s: &str) -> ColumnValue {
        ColumnValue::text(s)
    }

    fn n(v: f64) -> ColumnValue {
        ColumnValue::Number(v)
    }

    fn row(asesor: ColumnValue, campana: &str, cartera: &str, fecha: &str, venta: f64, estado: &str) -> Vec<ColumnValue> {
        let igv = (venta * 0.18 * 100.0).round() / 100.0;
        vec![
            asesor,
            t(campana),
            t(cartera),
            t("Acme S.A.C."),
            t(fecha),
            n(venta),
            n(igv),
            n(venta + igv),
            t(estado),
            t("F001-1"),
        ]
    }

    fn sheet() -> Dataset {
        Dataset::from_rows(
            "finanzas",
            &DETAIL_COLUMNS,
            vec![
                row(t("Ana"), "Verano", "A", "2026-01-20", 100.0, "PAGADO"),
                row(t("Luis"), "Verano", "B", "2026-01-21", 200.0, "PENDIENTE"),
                row(t("Ana"), "Invierno", "A", "2025-12-30", 50.0, "PAGADO"),
                row(t("Rosa"), "Invierno", "B", "2026-02-05", 10.0, "PAGADO"),
                row(ColumnValue::Missing, "", "", "", 360.0, ""),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_drops_subtotals() {
        let ds = prepare(&sheet()).unwrap();
        assert_eq!(ds.len(), 4);
        assert!(prepare(&Dataset::new("x", &[MONTO])).is_err());
    }

    #[test]
    fn test_prepare_coerces_text_cells() {
        let raw = Dataset::from_rows(
            "finanzas",
            &[ASESOR, CARTERA, FECHA_DE_PAGO, VALOR_VENTA, IGV, MONTO],
            vec![
                vec![t(" Ana "), t("A"), t("20/01/2026"), t("S/ 100.00"), t("18"), t("S/ 118.00")],
                vec![t("Ana"), t("A"), ColumnValue::Date(NaiveDate::from_ymd_opt(2026, 1, 21).unwrap()), n(50.0), n(9.0), n(59.0)],
                vec![t("   "), t(""), t(""), t("N/A"), t(""), t("177")],
            ],
        )
        .unwrap();
        let ds = prepare(&raw).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get_value(0, MONTO).unwrap().as_f64(), Some(118.0));

        let report = build(&ds, &Config::default());
        let top = report.top_advisors.data().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top.key(0, ASESOR).unwrap().as_str(), Some("Ana"));
        assert_eq!(top.value(0, MONTO), Some(177.0));

        let weeks = report.weekly.data().unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].monto, 177.0);
        assert_eq!(weeks[0].rows, 2);
    }

    #[test]
    fn test_kpis_and_composition() {
        let ds = prepare(&sheet()).unwrap();
        let report = build(&ds, &Config::default());
        let kpis = report.kpis.data().unwrap();
        assert_eq!(kpis[0].value, 360.0);
        assert!((kpis[1].value - 64.8).abs() < 1e-9);
        assert!((kpis[2].value - 424.8).abs() < 1e-9);

        let comp = report.composition.data().unwrap();
        let parts: f64 = comp.parts.iter().map(|p| p.value).sum();
        assert!((parts - comp.total).abs() < 1e-9);
        assert!((comp.total - kpis[2].value).abs() < 1e-9);
    }

    #[test]
    fn test_grouped_views_ordering() {
        let ds = prepare(&sheet()).unwrap();
        let report = build(&ds, &Config::default());

        let by_cartera = report.monto_by_cartera.data().unwrap();
        let montos = by_cartera.metric_values(MONTO).unwrap();
        assert!(montos.windows(2).all(|w| w[0] <= w[1]));

        let top = report.top_advisors.data().unwrap();
        assert_eq!(top.key(0, ASESOR).unwrap().as_str(), Some("Luis"));
        assert_eq!(top.metric_names(), &[VALOR_VENTA.to_string(), IGV.to_string(), MONTO.to_string()]);

        let status = report.by_status.data().unwrap();
        assert_eq!(status.table.key(0, ESTADO_PLANILLA).unwrap().as_str(), Some("PENDIENTE"));
        let shares: f64 = status.shares.parts.iter().filter_map(|p| p.share).sum();
        assert!((shares - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_timeline_and_weeks() {
        let ds = prepare(&sheet()).unwrap();
        let report = build(&ds, &Config::default());

        let timeline = report.timeline.data().unwrap();
        let monto = timeline.series(MONTO).unwrap();
        let running = timeline.series(MONTO_ACUMULADO).unwrap();
        assert_eq!(running.len(), 4);
        assert!((running[3] - monto.iter().sum::<f64>()).abs() < 1e-9);

        let weeks = report.weekly.data().unwrap();
        let labels: Vec<&str> = weeks.iter().map(|w| w.label.as_str()).collect();
        assert_eq!(labels, vec!["Semana 1 (29 Dic - 4 Ene)", "Semana 4 (19 - 25 Ene)"]);
        assert_eq!(weeks[1].valor_venta, 300.0);
        assert_eq!(weeks[1].display.valor_venta, "S/ 300.00");
        assert_eq!(weeks[1].display.chart_label, "S/ 354");
        // the February row is outside every week
        let weekly_total: f64 = weeks.iter().map(|w| w.valor_venta).sum();
        assert_eq!(weekly_total, 350.0);
    }

    #[test]
    fn test_detail_and_export() {
        let ds = prepare(&sheet()).unwrap();
        let report = build(&ds, &Config::default());
        let detail = report.detail.data().unwrap();
        assert_eq!(detail.display.len(), 4);
        assert_eq!(detail.display.get_value(1, MONTO).unwrap().as_str(), Some("S/ 236.00"));
        assert_eq!(detail.export.get_value(1, MONTO).unwrap().as_f64(), Some(236.0));

        let bytes = export_workbook(&ds, &Config::default()).unwrap();
        let back = crate::loader::load_xlsx_bytes("export", &bytes, EXPORT_SHEET).unwrap();
        assert_eq!(back.len(), 4);
        assert_eq!(back.column_names(), DETAIL_COLUMNS.to_vec());
        assert_eq!(back.sum(MONTO).unwrap(), ds.sum(MONTO).unwrap());
    }

    #[test]
    fn test_missing_column_fails_one_view() {
        let ds = prepare(&sheet()).unwrap().select(&[ASESOR, CARTERA, FECHA_DE_PAGO, VALOR_VENTA, IGV, MONTO]).unwrap();
        let report = build(&ds, &Config::default());
        assert!(report.kpis.is_ready());
        assert!(report.weekly.is_ready());
        assert!(!report.by_campaign.is_ready());
        assert!(!report.by_status.is_ready());
        assert!(!report.detail.is_ready());
    }
}
