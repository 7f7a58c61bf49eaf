//! CSV loader for spreadsheet snapshot exports
//!
//! Two entry points:
//! - [`parse_csv_str`] reads well-formed CSV text whose first row is the header.
//! - [`parse_snapshot`] / [`parse_snapshot_str`] clean up raw spreadsheet exports: the header
//!   row is located by searching for the business key, and rows and columns without any data
//!   are dropped.

use crate::error::{Error, Result};
use crate::table::{CellValue, Column, Row, Table};
use std::fs;
use std::path::{Path, PathBuf};

/// Parse CSV text whose first row is the header (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Table> {
    let path = PathBuf::from(source_name);
    let records = read_records(content, &path)?;
    build_table(records, 0, path)
}

/// Parse a raw spreadsheet export, locating the header by the business key
pub fn parse_snapshot<P: AsRef<Path>>(path: P, business_key: &str) -> Result<Table> {
    let path = path.as_ref();
    let content = read_file(path)?;
    clean_snapshot(&content, business_key, path.to_path_buf())
}

/// Same as [`parse_snapshot`] but from an in-memory string
pub fn parse_snapshot_str(content: &str, business_key: &str, source_name: &str) -> Result<Table> {
    clean_snapshot(content, business_key, PathBuf::from(source_name))
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_records(content: &str, path: &Path) -> Result<Vec<csv::StringRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // Allow varying number of fields
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        records.push(record);
    }
    Ok(records)
}

fn build_table(records: Vec<csv::StringRecord>, header_idx: usize, path: PathBuf) -> Result<Table> {
    let header = records.get(header_idx).ok_or_else(|| Error::CsvParse {
        path: path.clone(),
        message: "no header row found in CSV".to_string(),
    })?;

    let columns: Vec<Column> = header
        .iter()
        .enumerate()
        .map(|(i, name)| Column::new(name.trim().to_string(), i))
        .collect();

    if columns.is_empty() {
        return Err(Error::CsvParse {
            path,
            message: "no columns found in CSV".to_string(),
        });
    }

    let mut rows = Vec::new();
    for (row_idx, record) in records.iter().enumerate().skip(header_idx + 1) {
        let mut cells: Vec<CellValue> = record.iter().map(CellValue::parse).collect();

        // Pad with empty cells if row is shorter than header
        while cells.len() < columns.len() {
            cells.push(CellValue::Empty);
        }

        if cells.len() > columns.len() {
            tracing::warn!(
                row = row_idx + 1,
                path = %path.display(),
                "row has more cells than columns, truncating"
            );
            cells.truncate(columns.len());
        }

        rows.push(Row::new(cells));
    }

    Ok(Table {
        columns,
        rows,
        source_path: path,
    })
}

fn clean_snapshot(content: &str, business_key: &str, path: PathBuf) -> Result<Table> {
    let records = read_records(content, &path)?;
    let needle = business_key.to_lowercase();

    let header_idx = records
        .iter()
        .position(|r| r.iter().any(|f| f.to_lowercase().contains(&needle)))
        .ok_or_else(|| Error::CsvParse {
            path: path.clone(),
            message: format!("no header row containing '{}'", business_key),
        })?;

    if header_idx > 0 {
        tracing::debug!(
            skipped = header_idx,
            path = %path.display(),
            "header row located below preamble"
        );
    }

    let table = build_table(records, header_idx, path)?;
    Ok(drop_blank_rows_and_columns(table, business_key))
}

/// Drop rows and columns without data
///
/// The business key column is kept even when empty, so a header-only snapshot still merges.
fn drop_blank_rows_and_columns(table: Table, business_key: &str) -> Table {
    let needle = business_key.to_lowercase();
    let rows: Vec<Row> = table.rows.into_iter().filter(|r| !r.is_blank()).collect();

    let keep: Vec<usize> = table
        .columns
        .iter()
        .filter(|c| {
            let has_data = rows
                .iter()
                .any(|r| r.get(c.index).is_some_and(|v| !v.is_empty()));
            has_data || c.name.to_lowercase().contains(&needle)
        })
        .map(|c| c.index)
        .collect();

    let columns = keep
        .iter()
        .enumerate()
        .map(|(i, &old_idx)| Column::new(table.columns[old_idx].name.clone(), i))
        .collect();

    let rows = rows
        .into_iter()
        .map(|r| {
            Row::new(
                keep.iter()
                    .map(|&i| r.get(i).cloned().unwrap_or(CellValue::Empty))
                    .collect(),
            )
        })
        .collect();

    Table {
        columns,
        rows,
        source_path: table.source_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_csv() {
        let csv = "ID,Name,Value\n1,foo,100\n2,bar,200\n";
        let table = parse_csv_str(csv, "test.csv").unwrap();

        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.columns[0].name, "ID");
        assert_eq!(table.columns[1].name, "Name");
        assert_eq!(table.columns[2].name, "Value");

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].cells[0], CellValue::Integer(1));
        assert_eq!(table.rows[1].cells[1], CellValue::String("bar".to_string()));
    }

    #[test]
    fn test_parse_with_empty_cells() {
        let csv = "ID,Name,Value\n1,,100\n2,bar,\n";
        let table = parse_csv_str(csv, "test.csv").unwrap();

        assert_eq!(table.rows[0].cells[1], CellValue::Empty);
        assert_eq!(table.rows[1].cells[2], CellValue::Empty);
    }

    #[test]
    fn test_parse_pads_short_rows() {
        let csv = "ID,Name,Value\n1,foo\n";
        let table = parse_csv_str(csv, "test.csv").unwrap();

        assert_eq!(table.rows[0].cells.len(), 3);
        assert_eq!(table.rows[0].cells[2], CellValue::Empty);
    }

    #[test]
    fn test_parse_empty_input_is_error() {
        assert!(parse_csv_str("", "empty.csv").is_err());
    }

    #[test]
    fn test_snapshot_locates_header_below_preamble() {
        let csv = "Provider export,,\n,,\nActivity Master Number,Name,Notes\n1,foo,\n,,\n2,bar,\n";
        let table = parse_snapshot_str(csv, "Activity Master Number", "raw.csv").unwrap();

        assert_eq!(table.column_names(), vec!["Activity Master Number", "Name"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(1, "Name"), Some(&CellValue::String("bar".to_string())));
    }

    #[test]
    fn test_snapshot_header_match_is_case_insensitive() {
        let csv = "activity master number ,Name\n1,foo\n";
        let table = parse_snapshot_str(csv, "Activity Master Number", "raw.csv").unwrap();

        assert_eq!(table.columns[0].name, "activity master number");
    }

    #[test]
    fn test_snapshot_drops_unnamed_empty_columns() {
        let csv = "Key,,Name\n1,,foo\n2,,bar\n";
        let table = parse_snapshot_str(csv, "Key", "raw.csv").unwrap();

        assert_eq!(table.column_names(), vec!["Key", "Name"]);
        assert_eq!(table.rows[1].cells, vec![CellValue::Integer(2), CellValue::String("bar".to_string())]);
    }

    #[test]
    fn test_snapshot_drops_named_empty_columns() {
        let csv = "Key,Unused,Name\n1,,foo\n2, ,bar\n";
        let table = parse_snapshot_str(csv, "Key", "raw.csv").unwrap();

        assert_eq!(table.column_names(), vec!["Key", "Name"]);
    }

    #[test]
    fn test_snapshot_keeps_empty_key_column() {
        let csv = "Key,Name\n";
        let table = parse_snapshot_str(csv, "Key", "raw.csv").unwrap();

        assert_eq!(table.column_names(), vec!["Key"]);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_snapshot_without_key_header_is_error() {
        let csv = "ID,Name\n1,foo\n";
        let err = parse_snapshot_str(csv, "Activity Master Number", "raw.csv").unwrap_err();
        assert!(matches!(err, Error::CsvParse { .. }));
    }
}
