//! Multi-format text extraction for uploaded documents.
//!
//! Dispatches on the original file name's extension and returns the
//! document's text already split into chunks. Extraction never panics;
//! failures come back as [`ExtractError`] and the pipeline marks the
//! document accordingly and moves on.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::chunk::split_text;
use crate::config::ChunkingConfig;

/// Extraction failure. `Unsupported` maps to the UNSUPPORTED document
/// status; everything else maps to ERROR_PARSING.
#[derive(Debug)]
pub enum ExtractError {
    Unsupported(String),
    Pdf(String),
    Ooxml(String),
    Tabular(String),
    Io(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Unsupported(ext) => write!(f, "unsupported file extension: {}", ext),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "DOCX extraction failed: {}", e),
            ExtractError::Tabular(e) => write!(f, "spreadsheet extraction failed: {}", e),
            ExtractError::Io(e) => write!(f, "could not read file: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Decompressed byte cap for a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract a document's text and split it into chunks.
///
/// The format is chosen by `original_name`'s extension; `path` is the
/// stored file to read.
pub fn extract_chunks(
    path: &Path,
    original_name: &str,
    chunking: &ChunkingConfig,
) -> Result<Vec<String>, ExtractError> {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let text = match ext.as_str() {
        "pdf" => extract_pdf(path)?,
        "docx" => extract_docx(path)?,
        "xlsx" | "xls" | "ods" => extract_spreadsheet(path)?,
        "csv" => extract_csv(path)?,
        other => return Err(ExtractError::Unsupported(other.to_string())),
    };

    Ok(split_text(&text, chunking.chunk_size, chunking.overlap))
}

fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Pull the run text out of `word/document.xml`, emitting a paragraph break
/// at the end of every `w:p` so the chunker has boundaries to cut on.
fn extract_docx(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| ExtractError::Ooxml("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ExtractError::Ooxml(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(doc_xml.as_slice());
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !out.ends_with("\n\n") && !out.is_empty() {
                        out.push_str("\n\n");
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Render every sheet of a workbook as labelled CSV-ish text, the shape the
/// retrieval prompts work best with for tabular sources.
fn extract_spreadsheet(path: &Path) -> Result<String, ExtractError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ExtractError::Tabular(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut out = String::new();
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::Tabular(e.to_string()))?;
        out.push_str(&format!("--- Sheet: {} ---\n", name));
        for row in range.rows() {
            let line: Vec<String> = row.iter().map(cell_to_string).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out.push('\n');
    }
    Ok(out)
}

pub(crate) fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn extract_csv(path: &Path) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ExtractError::Tabular(e.to_string()))?;

    let mut out = String::new();
    for result in reader.records() {
        let record = result.map_err(|e| ExtractError::Tabular(e.to_string()))?;
        let line: Vec<&str> = record.iter().collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunking() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 1000,
            overlap: 200,
        }
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = extract_chunks(Path::new("/nonexistent"), "photo.png", &chunking()).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[test]
    fn missing_extension_is_unsupported() {
        let err = extract_chunks(Path::new("/nonexistent"), "README", &chunking()).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[test]
    fn corrupt_pdf_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        let err = extract_chunks(&path, "broken.pdf", &chunking()).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn corrupt_docx_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = extract_chunks(&path, "broken.docx", &chunking()).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn csv_rows_become_text_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "Nama,Agama\nBudi,Islam\nSari,Hindu\n").unwrap();
        let chunks = extract_chunks(&path, "data.csv", &chunking()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("Budi,Islam"));
        assert!(chunks[0].contains("Sari,Hindu"));
    }

    #[test]
    fn empty_csv_yields_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();
        let chunks = extract_chunks(&path, "empty.csv", &chunking()).unwrap();
        assert!(chunks.is_empty());
    }
}
