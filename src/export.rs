//! Detail tables for display and download.
//!
//! The same row-aligned column subset is produced twice: once with amounts
//! rendered as currency text for on-screen tables, once with raw numbers for
//! the spreadsheet download.

use crate::column::{Column, ColumnValue};
use crate::error::Result;
use crate::format::format_currency;
use crate::table::Dataset;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

/// Default sheet name of the exported workbook.
pub const EXPORT_SHEET: &str = "Datos";

/// Row-aligned display and export variants of one detail selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailTables {
    pub display: Dataset,
    pub export: Dataset,
}

/// Select `columns` (which must all exist) and build both variants.
///
/// In `export`, each of `numeric_columns` is coerced to numbers (bad values
/// become missing). In `display`, the same columns are rendered with
/// `format_currency` and missing values become empty strings. Other columns
/// are identical in both variants.
pub fn detail_tables(
    dataset: &Dataset,
    columns: &[&str],
    numeric_columns: &[&str],
    currency_symbol: &str,
) -> Result<DetailTables> {
    let selected = dataset.select(columns)?;

    let mut export = selected.clone();
    let mut display = selected;
    for &name in numeric_columns {
        if !columns.contains(&name) {
            continue;
        }
        let raw = export.coerce(name, crate::column::ColumnType::Number)?;
        let shown: Vec<ColumnValue> = raw
            .iter()
            .map(|v| match v.as_f64() {
                Some(n) => ColumnValue::Text(format_currency(n, currency_symbol)),
                None => ColumnValue::Text(String::new()),
            })
            .collect();
        export = export.with_column(Column::from_values(name, raw))?;
        display = display.with_column(Column::from_values(name, shown))?;
    }

    Ok(DetailTables { display, export })
}

/// Encode a dataset as a single-sheet XLSX workbook in memory. The header
/// row is bold; dates are written as ISO text; missing cells are left blank.
pub fn to_xlsx(dataset: &Dataset, sheet: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet)?;

    let header = Format::new().set_bold();
    for (col, name) in dataset.column_names().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (row, values) in (1u32..).zip(dataset.iter_rows()) {
        for (col, name) in dataset.column_names().iter().enumerate() {
            let col = col as u16;
            match values.get(*name) {
                Some(ColumnValue::Number(n)) => {
                    worksheet.write_number(row, col, *n)?;
                }
                Some(ColumnValue::Text(s)) => {
                    worksheet.write_string(row, col, s)?;
                }
                Some(ColumnValue::Bool(b)) => {
                    worksheet.write_boolean(row, col, *b)?;
                }
                Some(ColumnValue::Date(d)) => {
                    worksheet.write_string(row, col, d.format("%Y-%m-%d").to_string())?;
                }
                Some(ColumnValue::Missing) | None => {}
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    log::debug!(
        "to_xlsx('{}'): {} rows, {} bytes",
        dataset.name(),
        dataset.len(),
        bytes.len()
    );
    Ok(bytes)
}
