//! Reading source workbooks and caching the loaded datasets.
//!
//! A dashboard's workbook is searched for by file name in a short list of
//! directories. When it is found its bytes are fingerprinted, and the
//! parsed `Dataset` is reused for as long as the fingerprint stays the same.

use crate::column::{Column, ColumnValue};
use crate::error::{EngineError, Result};
use crate::table::Dataset;
use calamine::{open_workbook, Data, ExcelDateTime, Range, Reader, Xlsx};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// XLSX
// ============================================================================

/// Load one sheet of an XLSX file. The first row is the header.
pub fn load_xlsx(path: &Path, sheet: &str) -> Result<Dataset> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| sheet.to_string());
    let range = read_sheet(&mut workbook, sheet)?;
    let dataset = range_to_dataset(&name, &range)?;
    log::info!(
        "loaded '{}' sheet '{}': {} rows, {} columns",
        path.display(),
        sheet,
        dataset.len(),
        dataset.column_names().len()
    );
    Ok(dataset)
}

/// Load one sheet of an XLSX workbook held in memory (an upload).
pub fn load_xlsx_bytes(name: &str, bytes: &[u8], sheet: &str) -> Result<Dataset> {
    let mut workbook = Xlsx::new(Cursor::new(bytes.to_vec()))?;
    let range = read_sheet(&mut workbook, sheet)?;
    range_to_dataset(name, &range)
}

fn read_sheet<RS>(workbook: &mut Xlsx<RS>, sheet: &str) -> Result<Range<Data>>
where
    RS: std::io::Read + std::io::Seek,
{
    let names = workbook.sheet_names();
    if names.is_empty() {
        return Err(EngineError::InvalidFormat(
            "Workbook contains no sheets".to_string(),
        ));
    }
    if !names.iter().any(|n| n == sheet) {
        return Err(EngineError::SheetNotFound(format!(
            "'{}' (available: {})",
            sheet,
            names.join(", ")
        )));
    }
    Ok(workbook.worksheet_range(sheet)?)
}

fn range_to_dataset(name: &str, range: &Range<Data>) -> Result<Dataset> {
    let mut rows = range.rows();
    let header = match rows.next() {
        Some(h) => h,
        None => return Ok(Dataset::new(name, &[])),
    };
    let names = header_names(header);

    let mut body: Vec<Vec<ColumnValue>> = rows
        .map(|row| {
            (0..names.len())
                .map(|i| row.get(i).map_or(ColumnValue::Missing, cell_to_value))
                .collect()
        })
        .collect();
    while body
        .last()
        .map_or(false, |row| row.iter().all(ColumnValue::is_missing))
    {
        body.pop();
    }

    let mut columns: Vec<Column> = names.iter().map(Column::new).collect();
    for row in body {
        for (col, value) in columns.iter_mut().zip(row) {
            col.push(value);
        }
    }
    Dataset::from_columns(name, columns)
}

/// Header labels, trimmed. Blank labels become `Unnamed: i`; repeated labels
/// get a `.1`, `.2` suffix, skipping any suffixed name already taken.
fn header_names(header: &[Data]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let label = match cell {
                Data::Empty => String::new(),
                other => other.to_string().trim().to_string(),
            };
            let mut name = if label.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                label
            };
            let mut count = counts.get(&name).copied().unwrap_or(0);
            while count > 0 {
                counts.insert(name.clone(), count + 1);
                name = format!("{}.{}", name, count);
                count = counts.get(&name).copied().unwrap_or(0);
            }
            counts.insert(name.clone(), count + 1);
            name
        })
        .collect()
}

fn cell_to_value(cell: &Data) -> ColumnValue {
    match cell {
        Data::Empty | Data::Error(_) => ColumnValue::Missing,
        Data::String(s) => ColumnValue::text(s.trim()),
        Data::Float(f) => ColumnValue::Number(*f),
        Data::Int(i) => ColumnValue::Number(*i as f64),
        Data::Bool(b) => ColumnValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => ColumnValue::Number(dt.as_f64()),
        Data::DateTime(dt) => excel_date(dt).map_or(ColumnValue::Missing, ColumnValue::Date),
        Data::DateTimeIso(s) => crate::coerce::parse_date(s).map_or(ColumnValue::Missing, ColumnValue::Date),
        Data::DurationIso(s) => ColumnValue::text(s.as_str()),
    }
}

/// Largest serial a spreadsheet can hold (9999-12-31).
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Calendar date of a date-formatted cell, honouring the workbook's 1900 or
/// 1904 date system. Time of day is discarded; out-of-range serials are `None`.
pub fn excel_date(dt: &ExcelDateTime) -> Option<NaiveDate> {
    let serial = dt.as_f64();
    if !serial.is_finite() || !(0.0..=MAX_DATE_SERIAL).contains(&serial) {
        return None;
    }
    dt.as_datetime().map(|d| d.date())
}

// ============================================================================
// Source discovery
// ============================================================================

/// Finds a dashboard's workbook on disk.
#[derive(Debug, Clone)]
pub struct SourceLocator {
    file_names: Vec<String>,
    search_dirs: Vec<PathBuf>,
}

impl SourceLocator {
    pub fn new(file_names: Vec<String>, search_dirs: Vec<PathBuf>) -> Self {
        SourceLocator {
            file_names,
            search_dirs,
        }
    }

    /// Search the working directory, the executable's directory and the two
    /// directories above it.
    pub fn with_default_dirs(file_names: Vec<String>) -> Self {
        SourceLocator::new(file_names, default_search_dirs())
    }

    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    /// First existing `dir/file_name`, directories outermost.
    pub fn locate(&self) -> Option<PathBuf> {
        for dir in &self.search_dirs {
            for name in &self.file_names {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    log::debug!("found source at {}", candidate.display());
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Like `locate`, but a miss is a `MissingSource` error.
    pub fn require(&self) -> Result<PathBuf> {
        self.locate().ok_or_else(|| {
            EngineError::MissingSource(format!(
                "none of [{}] found in {} directories",
                self.file_names.join(", "),
                self.search_dirs.len()
            ))
        })
    }
}

pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        let mut dir = Some(exe_dir.as_path());
        for _ in 0..3 {
            match dir {
                Some(d) => {
                    if !dirs.iter().any(|known| known == d) {
                        dirs.push(d.to_path_buf());
                    }
                    dir = d.parent();
                }
                None => break,
            }
        }
    }
    dirs
}

// ============================================================================
// Cache
// ============================================================================

/// SHA-256 of a source's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Fingerprint(Sha256::digest(bytes).into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Loaded datasets keyed by source name, invalidated when the content
/// fingerprint of the source changes.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<String, (Fingerprint, Arc<Dataset>)>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached dataset for `key` if its fingerprint is still `fingerprint`.
    pub fn get(&self, key: &str, fingerprint: Fingerprint) -> Option<Arc<Dataset>> {
        self.entries
            .get(key)
            .filter(|(fp, _)| *fp == fingerprint)
            .map(|(_, ds)| Arc::clone(ds))
    }

    pub fn insert(&mut self, key: &str, fingerprint: Fingerprint, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        self.entries
            .insert(key.to_string(), (fingerprint, Arc::clone(&dataset)));
        dataset
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Return the cached dataset for these bytes, or parse them with `parse`
    /// and cache the result.
    pub fn get_or_load<F>(&mut self, key: &str, bytes: &[u8], parse: F) -> Result<Arc<Dataset>>
    where
        F: FnOnce(&[u8]) -> Result<Dataset>,
    {
        let fingerprint = Fingerprint::of(bytes);
        if let Some(hit) = self.get(key, fingerprint) {
            log::info!("cache hit for '{}' ({})", key, fingerprint);
            return Ok(hit);
        }
        if self.entries.contains_key(key) {
            log::info!("source '{}' changed, reloading", key);
        }
        let dataset = parse(bytes)?;
        Ok(self.insert(key, fingerprint, dataset))
    }
}

/// Locate a workbook, read it and load `sheet` through the cache.
pub fn load_cached(
    cache: &mut DatasetCache,
    key: &str,
    locator: &SourceLocator,
    sheet: &str,
) -> Result<Arc<Dataset>> {
    let path = locator.require()?;
    let bytes = std::fs::read(&path)?;
    cache.get_or_load(key, &bytes, |b| load_xlsx_bytes(key, b, sheet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::ExcelDateTimeType;
    use rust_xlsxwriter::{Format, Workbook};

    fn workbook_bytes(sheet: &str) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let ws = workbook.add_worksheet();
        ws.set_name(sheet).unwrap();
        for (c, h) in ["ASESOR", "MONTO", "FECHA_DE_PAGO", "ASESOR", ""].iter().enumerate() {
            if !h.is_empty() {
                ws.write_string(0, c as u16, *h).unwrap();
            }
        }
        ws.write_string(1, 0, "Ana").unwrap();
        ws.write_number(1, 1, 100.0).unwrap();
        ws.write_string(1, 2, "2026-01-20").unwrap();
        ws.write_string(2, 0, "  ").unwrap();
        ws.write_string(2, 1, "N/A").unwrap();
        ws.write_boolean(2, 4, true).unwrap();
        ws.write_number(3, 1, 999.0).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_load_xlsx_bytes() {
        let ds = load_xlsx_bytes("pagos", &workbook_bytes("Hoja1"), "Hoja1").unwrap();
        assert_eq!(ds.column_names(), vec!["ASESOR", "MONTO", "FECHA_DE_PAGO", "ASESOR.1", "Unnamed: 4"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get_value(0, "ASESOR").unwrap().as_str(), Some("Ana"));
        assert_eq!(ds.get_value(0, "MONTO").unwrap().as_f64(), Some(100.0));
        assert!(ds.get_value(1, "ASESOR").unwrap().is_missing());
        assert_eq!(ds.get_value(1, "Unnamed: 4").unwrap().as_bool(), Some(true));
        assert_eq!(ds.sum("MONTO").unwrap(), 1099.0);
        assert_eq!(ds.filter_incomplete("ASESOR").unwrap().len(), 1);
    }

    #[test]
    fn test_missing_sheet() {
        let err = load_xlsx_bytes("pagos", &workbook_bytes("Hoja1"), "Hoja2").unwrap_err();
        assert!(matches!(err, EngineError::SheetNotFound(_)));
    }

    #[test]
    fn test_not_a_workbook() {
        assert!(load_xlsx_bytes("x", b"not a zip", "Hoja1").is_err());
    }

    #[test]
    fn test_excel_date() {
        let jan20 = NaiveDate::from_ymd_opt(2026, 1, 20);
        assert_eq!(excel_date(&ExcelDateTime::new(46042.0, ExcelDateTimeType::DateTime, false)), jan20);
        assert_eq!(excel_date(&ExcelDateTime::new(46042.75, ExcelDateTimeType::DateTime, false)), jan20);
        // 1904 date system
        assert_eq!(excel_date(&ExcelDateTime::new(44580.0, ExcelDateTimeType::DateTime, true)), jan20);
        assert_eq!(excel_date(&ExcelDateTime::new(-1.0, ExcelDateTimeType::DateTime, false)), None);
        assert_eq!(excel_date(&ExcelDateTime::new(1e12, ExcelDateTimeType::DateTime, false)), None);
        assert_eq!(excel_date(&ExcelDateTime::new(-1e12, ExcelDateTimeType::DateTime, false)), None);
        assert_eq!(excel_date(&ExcelDateTime::new(f64::NAN, ExcelDateTimeType::DateTime, false)), None);
    }

    #[test]
    fn test_date_formatted_cells() {
        let mut workbook = Workbook::new();
        let date = Format::new().set_num_format("yyyy-mm-dd");
        let ws = workbook.add_worksheet();
        ws.set_name("Hoja1").unwrap();
        ws.write_string(0, 0, "FECHA_DE_PAGO").unwrap();
        ws.write_string(0, 1, "MONTO").unwrap();
        ws.write_number_with_format(1, 0, 46042.0, &date).unwrap();
        ws.write_number(1, 1, 100.0).unwrap();
        ws.write_number_with_format(2, 0, 1e12, &date).unwrap();
        ws.write_number(2, 1, 50.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let ds = load_xlsx_bytes("finanzas", &bytes, "Hoja1").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(
            ds.get_value(0, "FECHA_DE_PAGO").unwrap().as_date(),
            NaiveDate::from_ymd_opt(2026, 1, 20)
        );
        assert!(ds.get_value(1, "FECHA_DE_PAGO").unwrap().is_missing());
        assert_eq!(ds.get_value(1, "MONTO").unwrap().as_f64(), Some(50.0));
    }

    #[test]
    fn test_repeated_headers_stay_unique() {
        let header = vec![Data::String("A".into()), Data::String("A.1".into()), Data::String("A".into())];
        assert_eq!(header_names(&header), vec!["A", "A.1", "A.1.1"]);

        let header = vec![
            Data::String("A".into()),
            Data::String("A".into()),
            Data::String("A.1".into()),
            Data::Empty,
        ];
        assert_eq!(header_names(&header), vec!["A", "A.1", "A.1.1", "Unnamed: 3"]);
    }

    #[test]
    fn test_locator_and_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let locator = SourceLocator::new(
            vec!["PAGOS ENERO 2026.xlsx".to_string()],
            vec![dir.path().join("missing"), dir.path().to_path_buf()],
        );
        assert!(locator.locate().is_none());
        assert!(locator.require().unwrap_err().is_missing_source());

        let path = dir.path().join("PAGOS ENERO 2026.xlsx");
        std::fs::write(&path, workbook_bytes("Hoja1")).unwrap();
        assert_eq!(locator.locate(), Some(path.clone()));

        let ds = load_xlsx(&path, "Hoja1").unwrap();
        assert_eq!(ds.name(), "PAGOS ENERO 2026");
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn test_cache_reuses_until_content_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagos.xlsx");
        std::fs::write(&path, workbook_bytes("Hoja1")).unwrap();
        let locator = SourceLocator::new(vec!["pagos.xlsx".to_string()], vec![dir.path().to_path_buf()]);

        let mut cache = DatasetCache::new();
        let first = load_cached(&mut cache, "pagos", &locator, "Hoja1").unwrap();
        let second = load_cached(&mut cache, "pagos", &locator, "Hoja1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let mut calls = 0;
        let third = cache
            .get_or_load("pagos", b"different bytes", |_| {
                calls += 1;
                Ok(Dataset::new("otro", &["ASESOR"]))
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 1);
        assert!(cache.invalidate("pagos"));
        assert!(cache.is_empty());
    }
}
