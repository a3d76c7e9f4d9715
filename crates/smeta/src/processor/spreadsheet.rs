use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Map, Value};

use crate::error::ProcessError;
use crate::processor::{
    file_name_or, DocumentContent, DocumentFormat, DocumentProcessor, ParsedDocument,
};

/// Spreadsheets become `{sheet: {"headers": [...], "data": [{header: cell}, ...]}}`.
///
/// The first row of every sheet supplies the headers; blank header cells are
/// named `Column_<index>`.
pub struct SpreadsheetProcessor;

impl SpreadsheetProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadsheetProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for SpreadsheetProcessor {
    fn process(&self, path: &Path) -> Result<ParsedDocument, ProcessError> {
        let _span = tracing::info_span!("processor.spreadsheet").entered();

        if !path.exists() {
            return Err(ProcessError::ReadDocument {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }

        let mut workbook = open_workbook_auto(path).map_err(|e| {
            ProcessError::SpreadsheetProcessing(format!("Failed to open workbook: {}", e))
        })?;

        let mut sheets = Map::new();
        for sheet_name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
                ProcessError::SpreadsheetProcessing(format!(
                    "Failed to read sheet '{}': {}",
                    sheet_name, e
                ))
            })?;

            let rows: Vec<&[Data]> = range.rows().collect();
            sheets.insert(sheet_name, sheet_to_value(&rows));
        }

        Ok(ParsedDocument::new(
            file_name_or(path, "workbook.xlsx"),
            DocumentFormat::Spreadsheet,
            DocumentContent::Structured(Value::Object(sheets)),
        ))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Spreadsheet)
    }
}

fn sheet_to_value(rows: &[&[Data]]) -> Value {
    let Some((header_row, body)) = rows.split_first() else {
        return serde_json::json!({ "headers": [], "data": [] });
    };

    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell_to_value(cell) {
            Value::Null => format!("Column_{}", i),
            Value::String(s) if s.trim().is_empty() => format!("Column_{}", i),
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();

    let data: Vec<Value> = body
        .iter()
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| {
            let mut record = Map::new();
            for (i, cell) in row.iter().enumerate() {
                let key = headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("Column_{}", i));
                record.insert(key, cell_to_value(cell));
            }
            Value::Object(record)
        })
        .collect();

    serde_json::json!({ "headers": headers, "data": data })
}

pub(crate) fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        other => Value::String(other.to_string()),
    }
}
