//! Merge engine: outer-joins the old and new snapshot on the business key
//!
//! Every field is qualified with `old_` or `new_` so both versions of a row sit side by side,
//! and each merged row is classified as `deleted`, `new`, `changed` or `not_changed`.
//! The resulting [`MergedTable`] is also the working table the reviewer edits afterwards.

use crate::compare::{loose_key, LooseEquality, ValueComparator};
use crate::error::{Error, Result, Side};
use crate::table::{CellValue, Column, Table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

/// Prefix for fields taken from the old snapshot
pub const OLD_PREFIX: &str = "old_";
/// Prefix for fields taken from the new snapshot
pub const NEW_PREFIX: &str = "new_";
/// Name of the leading status column in exports
pub const STATUS_COLUMN: &str = "status";
/// Name of the leading changed-columns column in exports
pub const CHANGED_COLUMNS_COLUMN: &str = "changed_columns";

/// True for the names of the leading columns every exported row carries
pub fn is_reserved_column(name: &str) -> bool {
    name == STATUS_COLUMN || name == CHANGED_COLUMNS_COLUMN
}

/// Stable identity of a merged row, independent of its display position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of comparing one business key across both snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// Only in the old snapshot
    Deleted,
    /// Only in the new snapshot
    New,
    /// In both, with at least one differing common column
    Changed,
    /// In both, identical on every common column
    NotChanged,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Deleted => "deleted",
            RowStatus::New => "new",
            RowStatus::Changed => "changed",
            RowStatus::NotChanged => "not_changed",
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "deleted" => Ok(RowStatus::Deleted),
            "new" => Ok(RowStatus::New),
            "changed" => Ok(RowStatus::Changed),
            "not_changed" => Ok(RowStatus::NotChanged),
            other => Err(Error::InvalidInput(format!("unknown row status '{}'", other))),
        }
    }
}

/// Join key derived from the business key cell
///
/// Integer keys sort numerically and before text keys. Only text that is an integer in
/// canonical form becomes `Number`, so `007` and `7` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum BusinessKey {
    Number(i64),
    Text(String),
}

impl BusinessKey {
    /// Integer cells join numerically; everything else joins on its exact trimmed text
    fn from_cell(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Empty => None,
            CellValue::Integer(i) => Some(BusinessKey::Number(*i)),
            other => {
                let text = loose_key(other);
                (!text.is_empty()).then_some(BusinessKey::Text(text))
            }
        }
    }
}

impl std::fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusinessKey::Number(i) => write!(f, "{}", i),
            BusinessKey::Text(s) => f.write_str(s),
        }
    }
}

/// One business key across both snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub id: RowId,
    /// Business key value, `None` when the key cell was empty
    pub key: Option<String>,
    pub status: RowStatus,
    /// Common columns whose values differ, in table order
    pub changed_columns: Vec<String>,
    /// Cells aligned with [`MergedTable::columns`]
    pub cells: Vec<CellValue>,
}

impl MergedRow {
    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }

    /// `changed_columns` as a single comma-separated string
    pub fn changed_columns_joined(&self) -> String {
        self.changed_columns.join(", ")
    }
}

/// Result of the merge, and the reviewer's working table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedTable {
    /// Business key column the snapshots were joined on
    pub business_key: String,
    /// Qualified data columns (`old_*` then `new_*`)
    pub columns: Vec<Column>,
    /// Rows in deterministic join order
    pub rows: Vec<MergedRow>,
}

impl MergedTable {
    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find a row by identity
    pub fn find_row(&self, id: RowId) -> Option<&MergedRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Value at (`id`, `column`), if both exist
    pub fn cell(&self, id: RowId, column: &str) -> Option<&CellValue> {
        let col = self.find_column(column)?;
        self.find_row(id).and_then(|r| r.get(col.index))
    }

    /// Find the first row carrying the given business key
    pub fn find_by_key(&self, key: &str) -> Option<&MergedRow> {
        self.rows.iter().find(|r| r.key.as_deref() == Some(key))
    }

    /// Rows whose status is one of `statuses`, in table order
    pub fn filter_by_status(&self, statuses: &[RowStatus]) -> Vec<&MergedRow> {
        self.rows
            .iter()
            .filter(|r| statuses.contains(&r.status))
            .collect()
    }

    /// Number of rows per status
    pub fn status_counts(&self) -> BTreeMap<RowStatus, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.status).or_insert(0) += 1;
        }
        counts
    }

    /// Export header: status columns first, then the data columns
    pub fn header(&self) -> Vec<String> {
        let mut header = vec![STATUS_COLUMN.to_string(), CHANGED_COLUMNS_COLUMN.to_string()];
        header.extend(self.columns.iter().map(|c| c.name.clone()));
        header
    }

    /// Full content of a row as a JSON object, used when a row is deleted
    pub fn row_content(&self, row: &MergedRow) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(STATUS_COLUMN.to_string(), row.status.as_str().into());
        map.insert(
            CHANGED_COLUMNS_COLUMN.to_string(),
            row.changed_columns.clone().into(),
        );
        for col in &self.columns {
            let value = row.get(col.index).map(CellValue::to_json).unwrap_or_default();
            map.insert(col.name.clone(), value);
        }
        serde_json::Value::Object(map)
    }
}

/// Merge two snapshots with the loose equality strategy
pub fn merge_snapshots(old: &Table, new: &Table, business_key: &str) -> Result<MergedTable> {
    merge_snapshots_with(old, new, business_key, &LooseEquality)
}

/// Merge two snapshots, classifying rows with `comparator`
pub fn merge_snapshots_with<C: ValueComparator + ?Sized>(
    old: &Table,
    new: &Table,
    business_key: &str,
    comparator: &C,
) -> Result<MergedTable> {
    let old_key = key_index(old, business_key, Side::Old)?;
    let new_key = key_index(new, business_key, Side::New)?;

    let old_by_key = index_rows(old, old_key, Side::Old)?;
    let new_by_key = index_rows(new, new_key, Side::New)?;

    let columns: Vec<Column> = old
        .columns
        .iter()
        .map(|c| format!("{}{}", OLD_PREFIX, c.name))
        .chain(new.columns.iter().map(|c| format!("{}{}", NEW_PREFIX, c.name)))
        .enumerate()
        .map(|(i, name)| Column::new(name, i))
        .collect();

    // Logical columns present on both sides, in old-table order
    let common: Vec<(usize, usize, &str)> = old
        .columns
        .iter()
        .filter_map(|oc| {
            new.find_column(&oc.name)
                .map(|nc| (oc.index, nc.index, oc.name.as_str()))
        })
        .collect();

    let old_width = old.column_count();
    let new_width = new.column_count();
    let cells_of = |table: &Table, idx: Option<usize>, width: usize| -> Vec<CellValue> {
        (0..width)
            .map(|c| {
                idx.and_then(|r| table.rows[r].get(c))
                    .cloned()
                    .unwrap_or(CellValue::Empty)
            })
            .collect()
    };

    let mut rows: Vec<MergedRow> = Vec::with_capacity(old.row_count() + new.row_count());
    let mut next_id = 1u64;
    let mut push = |key: Option<&BusinessKey>,
                    status: RowStatus,
                    changed_columns: Vec<String>,
                    old_idx: Option<usize>,
                    new_idx: Option<usize>| {
        let mut cells = cells_of(old, old_idx, old_width);
        cells.extend(cells_of(new, new_idx, new_width));
        rows.push(MergedRow {
            id: RowId(next_id),
            key: key.map(BusinessKey::to_string),
            status,
            changed_columns,
            cells,
        });
        next_id += 1;
    };

    for (key, &old_idx) in &old_by_key.keyed {
        let Some(&new_idx) = new_by_key.keyed.get(key) else {
            continue;
        };
        let changed: Vec<String> = common
            .iter()
            .filter(|(oc, nc, _)| {
                let a = old.rows[old_idx].get(*oc).unwrap_or(&CellValue::Empty);
                let b = new.rows[new_idx].get(*nc).unwrap_or(&CellValue::Empty);
                !comparator.equivalent(a, b)
            })
            .map(|(_, _, name)| name.to_string())
            .collect();
        let status = if changed.is_empty() {
            RowStatus::NotChanged
        } else {
            RowStatus::Changed
        };
        push(Some(key), status, changed, Some(old_idx), Some(new_idx));
    }

    for (idx, key) in old_by_key.in_order.iter().enumerate() {
        if key.as_ref().map_or(true, |k| !new_by_key.keyed.contains_key(k)) {
            push(key.as_ref(), RowStatus::Deleted, Vec::new(), Some(idx), None);
        }
    }

    for (idx, key) in new_by_key.in_order.iter().enumerate() {
        if key.as_ref().map_or(true, |k| !old_by_key.keyed.contains_key(k)) {
            push(key.as_ref(), RowStatus::New, Vec::new(), None, Some(idx));
        }
    }

    let merged = MergedTable {
        business_key: business_key.to_string(),
        columns,
        rows,
    };

    tracing::info!(
        business_key,
        rows = merged.row_count(),
        counts = ?merged.status_counts(),
        "snapshots merged"
    );

    Ok(merged)
}

fn key_index(table: &Table, business_key: &str, side: Side) -> Result<usize> {
    table
        .find_column(business_key)
        .map(|c| c.index)
        .ok_or_else(|| Error::MissingBusinessKey {
            key: business_key.to_string(),
            side,
        })
}

struct KeyedRows {
    /// Row index per business key
    keyed: BTreeMap<BusinessKey, usize>,
    /// Business key of every row, in table order
    in_order: Vec<Option<BusinessKey>>,
}

fn index_rows(table: &Table, key_col: usize, side: Side) -> Result<KeyedRows> {
    let mut keyed = BTreeMap::new();
    let mut in_order = Vec::with_capacity(table.row_count());
    let mut seen = HashSet::new();

    for (idx, row) in table.rows.iter().enumerate() {
        let key = row.get(key_col).and_then(BusinessKey::from_cell);
        if let Some(k) = &key {
            if !seen.insert(k.clone()) {
                return Err(Error::DuplicateBusinessKey {
                    key: k.to_string(),
                    side,
                });
            }
            keyed.insert(k.clone(), idx);
        } else {
            tracing::warn!(row = idx + 1, %side, "row has an empty business key and cannot be matched");
        }
        in_order.push(key);
    }

    Ok(KeyedRows { keyed, in_order })
}
