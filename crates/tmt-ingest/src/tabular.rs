//! Spreadsheet decoding.
//!
//! Every table in a release is a single-sheet `.xls`. Only the first sheet is
//! read, and every cell is normalized to trimmed text: TMT ids come back from
//! Excel as floats (`1234567.0`) and must compare equal to the ids stored as
//! strings in other tables.

use crate::{IngestError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::Path;

/// One spreadsheet row, cells in column order.
pub type Row = Vec<String>;

/// Anything that can turn a table file into rows.
pub trait TabularSource {
    fn read_rows(&self, path: &Path) -> Result<Vec<Row>>;
}

/// Reads `.xls`/`.xlsx`/`.ods` workbooks via calamine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetReader;

impl TabularSource for SpreadsheetReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<Row>> {
        let spreadsheet_err = |message: String| IngestError::Spreadsheet {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_err(e.to_string()))?;
        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range.map_err(|e| spreadsheet_err(e.to_string()))?,
            None => {
                tracing::warn!(path = %path.display(), "workbook has no sheets");
                return Ok(Vec::new());
            }
        };

        let rows: Vec<Row> = range
            .rows()
            .map(|cells| cells.iter().map(cell_text).collect())
            .collect();
        tracing::debug!(path = %path.display(), rows = rows.len(), "read spreadsheet");
        Ok(rows)
    }
}

/// Text form of a cell; whole floats lose their `.0`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// In-memory tables keyed by file name; stands in for real workbooks when
/// the table content matters more than the file format.
#[derive(Debug, Clone, Default)]
pub struct MemoryTabularSource {
    tables: HashMap<String, Vec<Row>>,
}

impl MemoryTabularSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<R, C>(&mut self, file_name: &str, rows: R)
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect::<Row>())
            .collect();
        self.tables.insert(file_name.to_string(), rows);
    }

    pub fn with_table<R, C>(mut self, file_name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        self.insert(file_name, rows);
        self
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl TabularSource for MemoryTabularSource {
    fn read_rows(&self, path: &Path) -> Result<Vec<Row>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.tables
            .get(&name)
            .cloned()
            .ok_or_else(|| IngestError::Spreadsheet {
                path: path.to_path_buf(),
                message: "no in-memory table registered for this file".to_string(),
            })
    }
}
