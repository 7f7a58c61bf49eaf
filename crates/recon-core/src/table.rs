//! Raw snapshot tables as handed over by the spreadsheet loader

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A parsed snapshot table (old or new export)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Header columns, in sheet order
    pub columns: Vec<Column>,
    /// Data rows below the header
    pub rows: Vec<Row>,
    /// File the snapshot was loaded from
    pub source_path: PathBuf,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column with exactly this header name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in table order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Value of `column` in row `row_idx`, if both exist
    pub fn cell(&self, row_idx: usize, column: &str) -> Option<&CellValue> {
        let col = self.find_column(column)?;
        self.rows.get(row_idx).and_then(|r| r.get(col.index))
    }
}

/// A named header cell and its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as it appears in the header row
    pub name: String,
    /// Position in each row's cells
    pub index: usize,
}

impl Column {
    pub fn new(name: String, index: usize) -> Self {
        Self { name, index }
    }
}

/// One data row, padded to the header width
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<CellValue>,
}

impl Row {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }

    /// True if every cell is empty
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_empty)
    }
}

/// A loosely typed spreadsheet cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Integer(i64),
    /// Finite decimal number
    Float(f64),
    /// Calendar date (`YYYY-MM-DD`)
    Date(NaiveDate),
    /// Anything else, trimmed
    String(String),
    /// Blank or whitespace-only cell
    Empty,
}

impl CellValue {
    /// Classify raw cell text: integer, then finite float, then ISO date, then text
    ///
    /// A typed variant is chosen only when it displays as exactly the trimmed input, so
    /// `"007"`, `"0.10"`, `"+5"`, `"1e3"` and numbers beyond `i64`/`f64` precision stay text.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            if i.to_string() == trimmed {
                return CellValue::Integer(i);
            }
        }

        if let Ok(f) = trimmed.parse::<f64>() {
            let value = CellValue::Float(f);
            if f.is_finite() && value.to_string() == trimmed {
                return value;
            }
        }

        if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            let value = CellValue::Date(d);
            if value.to_string() == trimmed {
                return value;
            }
        }

        CellValue::String(trimmed.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text written back to CSV
    pub fn to_string_value(&self) -> String {
        self.to_string()
    }

    /// JSON form used in audit entries and exports
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Integer(i) => serde_json::Value::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::Date(_) | CellValue::String(_) => {
                serde_json::Value::String(self.to_string())
            }
            CellValue::Empty => serde_json::Value::Null,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{}", i),
            // Whole floats keep their decimal point so "1.0" and "1" stay distinct
            CellValue::Float(fl) if fl.fract() == 0.0 && fl.abs() < 1e16 => {
                write!(f, "{:.1}", fl)
            }
            CellValue::Float(fl) => write!(f, "{}", fl),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Empty => write!(f, ""),
        }
    }
}
