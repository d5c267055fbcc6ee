//! Report assembly and JSON output.
//!
//! Each check produces one sheet of flat rows. Rendering and styling are
//! someone else's job; the report carries semantics only.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::DdrError;

/// One cell of a report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Cell {
        Cell::Text(value.into())
    }

    pub fn int(value: usize) -> Cell {
        Cell::Int(value as i64)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            Cell::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(value) => Some(*value),
            Cell::Text(_) => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Cell {
        Cell::Text(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Cell {
        Cell::Int(value as i64)
    }
}

/// One ordered result sheet.
#[derive(Debug, Serialize)]
pub struct Sheet {
    pub name: String,
    pub order: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: &str, order: usize, columns: &[&str]) -> Sheet {
        Sheet {
            name: name.to_string(),
            order,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }
}

/// The full analysis result.
#[derive(Debug, Serialize)]
pub struct Report {
    pub source: String,
    pub generated_at: String,
    pub sheets: Vec<Sheet>,
    /// Non-fatal problems hit along the way (catalog notes, failed checks).
    pub errors: Vec<String>,
}

impl Report {
    pub fn new(source: &str) -> Report {
        Report {
            source: source.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            sheets: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Serialize the report as pretty JSON.
    pub fn to_json(&self) -> Result<String, DdrError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report to a file as JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), DdrError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| DdrError::ReportWriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_serialization_is_untagged() {
        let row = vec![Cell::text("Orders"), Cell::int(3)];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["Orders",3]"#);
    }

    #[test]
    fn test_sheet_rows() {
        let mut sheet = Sheet::new("Example", 1, &["Name", "Count"]);
        sheet.push_row(vec!["A".into(), 2.into()]);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0][1].as_int(), Some(2));
    }
}
