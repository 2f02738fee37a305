//! In-memory statistics table.
//!
//! The structured-data query path runs against a wholesale snapshot of the
//! village statistics spreadsheet. The table is loaded (or reloaded) in one
//! shot and swapped atomically by the holder; rows are homogeneous string
//! maps keyed by the trimmed header names.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Reader};

use crate::extract::cell_to_string;

/// Header list plus row objects sharing that header set.
#[derive(Debug, Clone, Default)]
pub struct StatisticsTable {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl StatisticsTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Load the statistics file (XLSX/XLS/ODS or CSV) into memory.
///
/// Header cells are trimmed of surrounding whitespace so generated
/// predicates can reference them reliably.
pub fn load_statistics(path: &Path) -> Result<StatisticsTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" => load_csv(path),
        "xlsx" | "xls" | "xlsm" | "ods" => load_workbook(path),
        other => bail!("Unsupported statistics file format: '{}'", other),
    }
}

fn load_csv(path: &Path) -> Result<StatisticsTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open statistics file: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read statistics headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to read statistics row")?;
        let mut row = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            let value = record.get(i).unwrap_or("").trim().to_string();
            row.insert(header.clone(), value);
        }
        rows.push(row);
    }

    Ok(StatisticsTable { headers, rows })
}

fn load_workbook(path: &Path) -> Result<StatisticsTable> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open statistics file: {}", path.display()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .context("Statistics workbook has no worksheets")?;

    let range = workbook
        .worksheet_range(first)
        .context("Failed to read statistics worksheet")?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| cell_to_string(c).trim().to_string())
            .collect(),
        None => return Ok(StatisticsTable::default()),
    };

    let mut rows = Vec::new();
    for data_row in rows_iter {
        let mut row = HashMap::new();
        let mut has_value = false;
        for (i, header) in headers.iter().enumerate() {
            let value = data_row
                .get(i)
                .map(|c| cell_to_string(c).trim().to_string())
                .unwrap_or_default();
            if !value.is_empty() {
                has_value = true;
            }
            row.insert(header.clone(), value);
        }
        if has_value {
            rows.push(row);
        }
    }

    Ok(StatisticsTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_headers_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statistik.csv");
        std::fs::write(
            &path,
            " Nama , Jenis Kelamin ,Agama\nBudi,Laki - Laki,Islam\nSari,Perempuan,Hindu\n",
        )
        .unwrap();

        let table = load_statistics(&path).unwrap();
        assert_eq!(table.headers, vec!["Nama", "Jenis Kelamin", "Agama"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["Jenis Kelamin"], "Laki - Laki");
    }

    #[test]
    fn short_rows_fill_with_empty_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statistik.csv");
        std::fs::write(&path, "Nama,Agama\nBudi\n").unwrap();

        let table = load_statistics(&path).unwrap();
        assert_eq!(table.rows[0]["Agama"], "");
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(load_statistics(Path::new("statistik.pdf")).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_statistics(Path::new("/nonexistent/statistik.csv")).is_err());
    }
}
