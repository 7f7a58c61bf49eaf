//! Schema reconciliation between the old and new snapshot
//!
//! The reviewer supplies a [`ColumnMapping`] from each old column to its counterpart in the
//! new export (or to nothing). [`reconcile_schema`] turns that mapping into an ordered list of
//! [`SchemaChange`] entries, and [`apply_column_mapping`] renames the old table so both
//! snapshots share column names before rows are merged.

use crate::error::{Error, Result};
use crate::table::{Column, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// One old column and the new column it corresponds to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub old: String,
    /// `None` means the column has no counterpart in the new snapshot
    pub new: Option<String>,
}

/// Reviewer-supplied old → new column correspondence, in old-table order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub entries: Vec<MappingEntry>,
}

impl ColumnMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every old column to the same-named new column when one exists
    pub fn identity(old_columns: &[String], new_columns: &[String]) -> Self {
        let entries = old_columns
            .iter()
            .map(|old| MappingEntry {
                old: old.clone(),
                new: new_columns.iter().find(|n| *n == old).cloned(),
            })
            .collect();
        Self { entries }
    }

    /// Set the target for `old`, replacing any earlier entry
    pub fn insert(&mut self, old: impl Into<String>, new: Option<String>) {
        let old = old.into();
        match self.entries.iter_mut().find(|e| e.old == old) {
            Some(entry) => entry.new = new,
            None => self.entries.push(MappingEntry { old, new }),
        }
    }

    /// Target of `old`; absent entries count as "no correspondence"
    pub fn target(&self, old: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.old == old)
            .and_then(|e| e.new.as_deref())
    }

    /// Reject targets missing from the new snapshot and many-to-one mappings
    pub fn validate(&self, new_columns: &[String]) -> Result<()> {
        let mut claimed: HashMap<&str, &str> = HashMap::new();

        for entry in &self.entries {
            let Some(target) = entry.new.as_deref() else {
                continue;
            };

            if !new_columns.iter().any(|c| c == target) {
                return Err(Error::UnknownMappingTarget {
                    source_column: entry.old.clone(),
                    target: target.to_string(),
                });
            }

            if let Some(first) = claimed.insert(target, entry.old.as_str()) {
                return Err(Error::AmbiguousColumnMapping {
                    first: first.to_string(),
                    second: entry.old.clone(),
                    target: target.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Load a mapping file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the mapping file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Kind of column-level change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaEvent {
    Renamed,
    Added,
    Deleted,
}

impl SchemaEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaEvent::Renamed => "renamed",
            SchemaEvent::Added => "added",
            SchemaEvent::Deleted => "deleted",
        }
    }
}

/// Provider and version the new snapshot came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTag {
    pub provider: String,
    pub version: String,
}

/// A column that was renamed, added or deleted between snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub version: String,
    pub event: SchemaEvent,
    pub old_column: Option<String>,
    pub new_column: Option<String>,
}

/// Classify column changes implied by `mapping`
///
/// Old columns mapped to nothing are `deleted`, old columns mapped to a different name are
/// `renamed`, and new columns that are neither a mapping target nor an old column name are
/// `added`. Identity mappings produce no entry.
pub fn reconcile_schema(
    old_columns: &[String],
    new_columns: &[String],
    mapping: &ColumnMapping,
    tag: &SourceTag,
) -> Vec<SchemaChange> {
    let timestamp = Utc::now();
    let entry = |event, old_column: Option<&str>, new_column: Option<&str>| SchemaChange {
        timestamp,
        provider: tag.provider.clone(),
        version: tag.version.clone(),
        event,
        old_column: old_column.map(str::to_string),
        new_column: new_column.map(str::to_string),
    };

    let mut changes = Vec::new();
    let mut used: HashSet<&str> = HashSet::new();

    for old in old_columns {
        match mapping.target(old) {
            None => changes.push(entry(SchemaEvent::Deleted, Some(old), None)),
            Some(new) => {
                used.insert(new);
                if new != old {
                    changes.push(entry(SchemaEvent::Renamed, Some(old), Some(new)));
                }
            }
        }
    }

    for new in new_columns {
        if !used.contains(new.as_str()) && !old_columns.contains(new) {
            changes.push(entry(SchemaEvent::Added, None, Some(new)));
        }
    }

    tracing::debug!(
        old_columns = old_columns.len(),
        new_columns = new_columns.len(),
        changes = changes.len(),
        "schema reconciled"
    );

    changes
}

/// Rename the old table's columns to their mapped new names
///
/// Columns mapped to nothing keep their old name.
pub fn apply_column_mapping(table: &Table, mapping: &ColumnMapping) -> Result<Table> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(table.columns.len());

    for col in &table.columns {
        let name = mapping.target(&col.name).unwrap_or(&col.name).to_string();
        if !seen.insert(name.clone()) {
            return Err(Error::DuplicateColumnName(name));
        }
        columns.push(Column::new(name, col.index));
    }

    Ok(Table {
        columns,
        rows: table.rows.clone(),
        source_path: table.source_path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_csv_str;
    use proptest::prelude::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    fn tag() -> SourceTag {
        SourceTag {
            provider: "AJM".to_string(),
            version: "v2".to_string(),
        }
    }

    fn events(changes: &[SchemaChange]) -> Vec<(SchemaEvent, Option<&str>, Option<&str>)> {
        changes
            .iter()
            .map(|c| (c.event, c.old_column.as_deref(), c.new_column.as_deref()))
            .collect()
    }

    #[test]
    fn test_identity_mapping_emits_nothing() {
        let cols = names(&["Key", "Name"]);
        let mapping = ColumnMapping::identity(&cols, &cols);

        assert!(reconcile_schema(&cols, &cols, &mapping, &tag()).is_empty());
    }

    #[test]
    fn test_rename_delete_add() {
        let old = names(&["Key", "Name", "Legacy"]);
        let new = names(&["Key", "Title", "Extra"]);
        let mut mapping = ColumnMapping::new();
        mapping.insert("Key", Some("Key".to_string()));
        mapping.insert("Name", Some("Title".to_string()));
        mapping.insert("Legacy", None);

        let changes = reconcile_schema(&old, &new, &mapping, &tag());

        assert_eq!(
            events(&changes),
            vec![
                (SchemaEvent::Renamed, Some("Name"), Some("Title")),
                (SchemaEvent::Deleted, Some("Legacy"), None),
                (SchemaEvent::Added, None, Some("Extra")),
            ]
        );
        assert!(changes.iter().all(|c| c.provider == "AJM" && c.version == "v2"));
    }

    #[test]
    fn test_unmapped_old_column_counts_as_deleted() {
        let old = names(&["Key", "Name"]);
        let new = names(&["Key", "Name"]);
        let mut mapping = ColumnMapping::new();
        mapping.insert("Key", Some("Key".to_string()));

        let changes = reconcile_schema(&old, &new, &mapping, &tag());

        // "Name" still exists literally in the old schema, so it is not reported as added
        assert_eq!(events(&changes), vec![(SchemaEvent::Deleted, Some("Name"), None)]);
    }

    #[test]
    fn test_empty_old_schema_adds_everything() {
        let new = names(&["Key", "Name"]);
        let changes = reconcile_schema(&[], &new, &ColumnMapping::new(), &tag());

        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.event == SchemaEvent::Added));
    }

    #[test]
    fn test_validate_rejects_duplicate_target() {
        let mut mapping = ColumnMapping::new();
        mapping.insert("A", Some("X".to_string()));
        mapping.insert("B", Some("X".to_string()));

        let err = mapping.validate(&names(&["X"])).unwrap_err();
        assert!(matches!(err, Error::AmbiguousColumnMapping { ref target, .. } if target == "X"));
    }

    #[test]
    fn test_validate_rejects_unknown_target() {
        let mut mapping = ColumnMapping::new();
        mapping.insert("A", Some("Missing".to_string()));

        let err = mapping.validate(&names(&["X"])).unwrap_err();
        assert!(matches!(err, Error::UnknownMappingTarget { .. }));
    }

    #[test]
    fn test_insert_replaces_existing_entry() {
        let mut mapping = ColumnMapping::new();
        mapping.insert("A", Some("X".to_string()));
        mapping.insert("A", None);

        assert_eq!(mapping.entries.len(), 1);
        assert_eq!(mapping.target("A"), None);
    }

    #[test]
    fn test_apply_column_mapping_renames_old_table() {
        let table = parse_csv_str("Key,Name,Legacy\n1,foo,x\n", "old.csv").unwrap();
        let mut mapping = ColumnMapping::new();
        mapping.insert("Key", Some("Key".to_string()));
        mapping.insert("Name", Some("Title".to_string()));
        mapping.insert("Legacy", None);

        let renamed = apply_column_mapping(&table, &mapping).unwrap();

        assert_eq!(renamed.column_names(), names(&["Key", "Title", "Legacy"]));
        assert_eq!(renamed.rows, table.rows);
    }

    #[test]
    fn test_apply_column_mapping_detects_collision() {
        let table = parse_csv_str("A,B\n1,2\n", "old.csv").unwrap();
        let mut mapping = ColumnMapping::new();
        mapping.insert("A", Some("B".to_string()));
        mapping.insert("B", None);

        let err = apply_column_mapping(&table, &mapping).unwrap_err();
        assert!(matches!(err, Error::DuplicateColumnName(ref n) if n == "B"));
    }

    #[test]
    fn test_mapping_json_shape() {
        let mut mapping = ColumnMapping::new();
        mapping.insert("A", Some("B".to_string()));
        mapping.insert("C", None);

        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"entries": [{"old": "A", "new": "B"}, {"old": "C", "new": null}]})
        );
    }

    proptest! {
        /// Every old column yields at most one entry and only non-identity mappings yield one.
        #[test]
        fn prop_one_entry_per_non_identity_mapping(
            choices in proptest::collection::vec(0usize..4, 1..6),
        ) {
            let old: Vec<String> = (0..choices.len()).map(|i| format!("c{i}")).collect();
            let new: Vec<String> = old.iter().map(|c| format!("{c}_new")).chain(old.iter().cloned()).collect();

            let mut mapping = ColumnMapping::new();
            let mut expected = 0;
            for (col, choice) in old.iter().zip(&choices) {
                match choice {
                    0 => mapping.insert(col.clone(), Some(col.clone())),
                    1 => {
                        mapping.insert(col.clone(), Some(format!("{col}_new")));
                        expected += 1;
                    }
                    _ => {
                        mapping.insert(col.clone(), None);
                        expected += 1;
                    }
                }
            }

            let changes = reconcile_schema(&old, &new, &mapping, &SourceTag::default());
            let per_old = changes.iter().filter(|c| c.old_column.is_some()).count();
            prop_assert_eq!(per_old, expected);

            for (col, choice) in old.iter().zip(&choices) {
                let mine: Vec<_> = changes.iter().filter(|c| c.old_column.as_ref() == Some(col)).collect();
                match choice {
                    0 => prop_assert!(mine.is_empty()),
                    1 => {
                        prop_assert_eq!(mine.len(), 1);
                        prop_assert_eq!(mine[0].event, SchemaEvent::Renamed);
                    }
                    _ => {
                        prop_assert_eq!(mine.len(), 1);
                        prop_assert_eq!(mine[0].event, SchemaEvent::Deleted);
                    }
                }
            }
        }
    }
}
