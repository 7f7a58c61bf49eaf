//! Edit transactions on the working table
//!
//! This module provides:
//! - Pure appliers for cell edits, row deletions and column rename/delete/add. Each takes the
//!   current table by reference and returns a new table plus the events to audit.
//! - Patch file format (JSON) describing reviewer batches

use crate::error::{Error, Result};
use crate::merger::{is_reserved_column, MergedTable, RowId};
use crate::table::{CellValue, Column};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// A single edit to a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEdit {
    /// Row identity (must match a row in the table)
    pub row_id: RowId,
    /// Column name
    pub column: String,
    /// New value as a string
    pub value: String,
}

impl CellEdit {
    /// Create a new edit
    pub fn new(row_id: RowId, column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            row_id,
            column: column.into(),
            value: value.into(),
        }
    }
}

/// An accepted cell edit
#[derive(Debug, Clone, PartialEq)]
pub struct CellEditEvent {
    pub row_id: RowId,
    pub row_key: Option<String>,
    pub column: String,
    pub old_value: CellValue,
    pub new_value: CellValue,
}

/// A removed row with its full prior content
#[derive(Debug, Clone, PartialEq)]
pub struct RowDeletionEvent {
    pub row_id: RowId,
    pub row_key: Option<String>,
    pub content: serde_json::Value,
}

/// A renamed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRenameEvent {
    pub old_name: String,
    pub new_name: String,
}

/// A removed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDeletionEvent {
    pub name: String,
}

/// An appended column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAdditionEvent {
    pub name: String,
}

/// Result of applying a batch of cell edits
#[derive(Debug, Clone)]
pub struct CellEditOutcome {
    /// Table with every accepted edit applied
    pub table: MergedTable,
    /// One event per accepted edit, in request order
    pub events: Vec<CellEditEvent>,
    /// Edits whose row or column no longer exists, with the reason
    pub skipped: Vec<(CellEdit, String)>,
    /// Edits that would write the value already present
    pub unchanged: usize,
}

/// Apply cell edits, skipping stale targets
///
/// Edits addressing a missing row or column are reported in `skipped` and produce no event.
pub fn apply_cell_edits(table: &MergedTable, edits: &[CellEdit]) -> CellEditOutcome {
    let mut result = CellEditOutcome {
        table: table.clone(),
        events: Vec::new(),
        skipped: Vec::new(),
        unchanged: 0,
    };

    for edit in edits {
        let row_idx = match result.table.rows.iter().position(|r| r.id == edit.row_id) {
            Some(idx) => idx,
            None => {
                result
                    .skipped
                    .push((edit.clone(), format!("row {} not found", edit.row_id)));
                continue;
            }
        };

        let col_idx = match result.table.find_column(&edit.column) {
            Some(col) => col.index,
            None => {
                result
                    .skipped
                    .push((edit.clone(), format!("column '{}' not found", edit.column)));
                continue;
            }
        };

        let new_value = CellValue::parse(&edit.value);
        let row = &mut result.table.rows[row_idx];
        let old_value = row.cells[col_idx].clone();
        if old_value == new_value {
            result.unchanged += 1;
            continue;
        }

        row.cells[col_idx] = new_value.clone();
        result.events.push(CellEditEvent {
            row_id: row.id,
            row_key: row.key.clone(),
            column: edit.column.clone(),
            old_value,
            new_value,
        });
    }

    if !result.skipped.is_empty() {
        tracing::warn!(skipped = result.skipped.len(), "stale edit targets skipped");
    }

    result
}

/// Remove rows by identity; unknown ids are ignored
pub fn apply_row_deletions(
    table: &MergedTable,
    row_ids: &BTreeSet<RowId>,
) -> (MergedTable, Vec<RowDeletionEvent>) {
    let mut events = Vec::new();
    let mut rows = Vec::with_capacity(table.row_count());

    for row in &table.rows {
        if row_ids.contains(&row.id) {
            events.push(RowDeletionEvent {
                row_id: row.id,
                row_key: row.key.clone(),
                content: table.row_content(row),
            });
        } else {
            rows.push(row.clone());
        }
    }

    let after = MergedTable {
        business_key: table.business_key.clone(),
        columns: table.columns.clone(),
        rows,
    };
    (after, events)
}

/// Rename a column
///
/// Renaming an absent column, or to its current name, is a no-op. Renaming onto a different
/// existing column or onto a leading export column (`status`, `changed_columns`) fails with
/// [`Error::DuplicateColumnName`].
pub fn apply_column_rename(
    table: &MergedTable,
    old_name: &str,
    new_name: &str,
) -> Result<(MergedTable, Option<ColumnRenameEvent>)> {
    if old_name == new_name || table.find_column(old_name).is_none() {
        return Ok((table.clone(), None));
    }
    if is_reserved_column(new_name) || table.find_column(new_name).is_some() {
        return Err(Error::DuplicateColumnName(new_name.to_string()));
    }

    let mut after = table.clone();
    for col in after.columns.iter_mut().filter(|c| c.name == old_name) {
        col.name = new_name.to_string();
    }

    let event = ColumnRenameEvent {
        old_name: old_name.to_string(),
        new_name: new_name.to_string(),
    };
    Ok((after, Some(event)))
}

/// Remove a column and its cells; no-op if absent
pub fn apply_column_deletion(
    table: &MergedTable,
    name: &str,
) -> (MergedTable, Option<ColumnDeletionEvent>) {
    let Some(removed) = table.find_column(name).map(|c| c.index) else {
        return (table.clone(), None);
    };

    let columns = table
        .columns
        .iter()
        .filter(|c| c.index != removed)
        .enumerate()
        .map(|(i, c)| Column::new(c.name.clone(), i))
        .collect();

    let rows = table
        .rows
        .iter()
        .map(|r| {
            let mut row = r.clone();
            if removed < row.cells.len() {
                row.cells.remove(removed);
            }
            row
        })
        .collect();

    let after = MergedTable {
        business_key: table.business_key.clone(),
        columns,
        rows,
    };
    let event = ColumnDeletionEvent {
        name: name.to_string(),
    };
    (after, Some(event))
}

/// Append an empty column; no-op if a column with that name exists
///
/// The leading export columns (`status`, `changed_columns`) cannot be added.
pub fn apply_column_addition(
    table: &MergedTable,
    name: &str,
) -> Result<(MergedTable, Option<ColumnAdditionEvent>)> {
    if is_reserved_column(name) {
        return Err(Error::DuplicateColumnName(name.to_string()));
    }
    if table.find_column(name).is_some() {
        return Ok((table.clone(), None));
    }

    let mut after = table.clone();
    let index = after.columns.len();
    after.columns.push(Column::new(name.to_string(), index));
    for row in &mut after.rows {
        row.cells.resize(index, CellValue::Empty);
        row.cells.push(CellValue::Empty);
    }

    let event = ColumnAdditionEvent {
        name: name.to_string(),
    };
    Ok((after, Some(event)))
}

/// One reviewer batch; each becomes a single undo step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    EditCells { edits: Vec<CellEdit> },
    DeleteRows { row_ids: Vec<RowId> },
    RenameColumn { from: String, to: String },
    DeleteColumn { column: String },
    AddColumn { column: String },
}

/// A patch file containing reviewer batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchFile {
    /// Reviewer the batches are attributed to; falls back to the configured actor
    #[serde(default)]
    pub actor: Option<String>,
    /// Batches, applied in order
    pub operations: Vec<Operation>,
}

impl PatchFile {
    /// Create a new empty patch file
    pub fn new(actor: Option<String>) -> Self {
        Self {
            actor,
            operations: Vec::new(),
        }
    }

    /// Add a batch to the patch
    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Load a patch file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the patch file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
