//! A single reviewer's session: working table, audit log and undo history
//!
//! Every mutation goes through [`ReviewSession`], which runs the pure appliers from
//! [`crate::patch`], pushes a history snapshot and records audit entries as one step. Batches
//! that change nothing leave the session untouched and push no snapshot.

use crate::audit::{AuditEntry, AuditLog};
use crate::config::ReconcileConfig;
use crate::error::{Error, Result};
use crate::history::{HistoryOutcome, UndoRedoStack};
use crate::merger::{merge_snapshots, MergedTable, RowId};
use crate::patch::{
    apply_cell_edits, apply_column_addition, apply_column_deletion, apply_column_rename,
    apply_row_deletions, CellEdit, Operation, PatchFile,
};
use crate::schema::{apply_column_mapping, reconcile_schema, ColumnMapping, SchemaChange};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Counts reported back to the reviewer after a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Mutations accepted and logged
    pub applied: usize,
    /// Edits dropped because their row or column is gone, with the reason
    pub skipped: Vec<(CellEdit, String)>,
    /// Edits that matched the current value
    pub unchanged: usize,
}

impl BatchReport {
    fn applied(applied: usize) -> Self {
        Self {
            applied,
            ..Self::default()
        }
    }

    /// True when the batch changed nothing
    pub fn is_noop(&self) -> bool {
        self.applied == 0
    }
}

/// Session state owned by one reviewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSession {
    config: ReconcileConfig,
    schema_changes: Vec<SchemaChange>,
    /// Merge result as first produced, restored on reset
    baseline: MergedTable,
    table: MergedTable,
    log: AuditLog,
    history: UndoRedoStack,
}

impl ReviewSession {
    /// Reconcile two snapshots and open a session on the result
    ///
    /// Fails before any working table exists if the mapping is invalid or the business key
    /// is missing or duplicated.
    pub fn start(
        old: &Table,
        new: &Table,
        mapping: &ColumnMapping,
        config: ReconcileConfig,
    ) -> Result<Self> {
        let new_columns = new.column_names();
        mapping.validate(&new_columns)?;

        let schema_changes = reconcile_schema(
            &old.column_names(),
            &new_columns,
            mapping,
            &config.source_tag(),
        );
        let renamed = apply_column_mapping(old, mapping)?;
        let merged = merge_snapshots(&renamed, new, &config.business_key)?;

        let mut session = Self::from_merged(merged, config);
        session.schema_changes = schema_changes;
        Ok(session)
    }

    /// Open a session on an already merged table
    pub fn from_merged(table: MergedTable, config: ReconcileConfig) -> Self {
        let history = UndoRedoStack::with_max_depth(config.max_history);
        Self {
            config,
            schema_changes: Vec::new(),
            baseline: table.clone(),
            table,
            log: AuditLog::new(),
            history,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn schema_changes(&self) -> &[SchemaChange] {
        &self.schema_changes
    }

    /// Current working table
    pub fn table(&self) -> &MergedTable {
        &self.table
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.log
    }

    pub fn history(&self) -> &UndoRedoStack {
        &self.history
    }

    /// Audit entries recorded since the most recent undo snapshot was taken
    ///
    /// After a batch these describe exactly the step the next undo reverses.
    pub fn entries_since_last_snapshot(&self) -> &[AuditEntry] {
        let start = self
            .history
            .last_snapshot()
            .map_or(self.log.len(), |s| s.audit_len);
        self.log.entries().get(start..).unwrap_or_default()
    }

    /// Apply a batch of cell edits as one undo step
    pub fn edit_cells(&mut self, actor: &str, edits: &[CellEdit]) -> BatchReport {
        let outcome = apply_cell_edits(&self.table, edits);
        let report = BatchReport {
            applied: outcome.events.len(),
            skipped: outcome.skipped,
            unchanged: outcome.unchanged,
        };

        if !outcome.events.is_empty() {
            self.commit(outcome.table, |log| {
                for event in &outcome.events {
                    log.record_cell_edit(actor, event);
                }
            });
        }

        tracing::info!(
            actor,
            applied = report.applied,
            skipped = report.skipped.len(),
            unchanged = report.unchanged,
            "cell edits applied"
        );
        report
    }

    /// Delete rows by identity as one undo step
    pub fn delete_rows(&mut self, actor: &str, row_ids: &BTreeSet<RowId>) -> BatchReport {
        let (after, events) = apply_row_deletions(&self.table, row_ids);
        if !events.is_empty() {
            self.commit(after, |log| {
                for event in &events {
                    log.record_row_deletion(actor, event);
                }
            });
        }

        tracing::info!(actor, requested = row_ids.len(), deleted = events.len(), "rows deleted");
        BatchReport::applied(events.len())
    }

    /// Rename a column as one undo step
    pub fn rename_column(&mut self, actor: &str, from: &str, to: &str) -> Result<BatchReport> {
        let (after, event) = apply_column_rename(&self.table, from, to)?;
        let Some(event) = event else {
            return Ok(BatchReport::default());
        };

        self.commit(after, |log| log.record_column_rename(actor, &event));
        tracing::info!(actor, from, to, "column renamed");
        Ok(BatchReport::applied(1))
    }

    /// Delete a column as one undo step
    pub fn delete_column(&mut self, actor: &str, name: &str) -> BatchReport {
        let (after, event) = apply_column_deletion(&self.table, name);
        let Some(event) = event else {
            return BatchReport::default();
        };

        self.commit(after, |log| log.record_column_deletion(actor, &event));
        tracing::info!(actor, column = name, "column deleted");
        BatchReport::applied(1)
    }

    /// Append an empty column as one undo step
    pub fn add_column(&mut self, actor: &str, name: &str) -> Result<BatchReport> {
        let (after, event) = apply_column_addition(&self.table, name)?;
        let Some(event) = event else {
            return Ok(BatchReport::default());
        };

        self.commit(after, |log| log.record_column_addition(actor, &event));
        tracing::info!(actor, column = name, "column added");
        Ok(BatchReport::applied(1))
    }

    /// Apply one patch-file operation
    pub fn apply_operation(&mut self, actor: &str, operation: &Operation) -> Result<BatchReport> {
        match operation {
            Operation::EditCells { edits } => Ok(self.edit_cells(actor, edits)),
            Operation::DeleteRows { row_ids } => {
                let ids: BTreeSet<RowId> = row_ids.iter().copied().collect();
                Ok(self.delete_rows(actor, &ids))
            }
            Operation::RenameColumn { from, to } => self.rename_column(actor, from, to),
            Operation::DeleteColumn { column } => Ok(self.delete_column(actor, column)),
            Operation::AddColumn { column } => self.add_column(actor, column),
        }
    }

    /// Apply every operation of a patch file in order, all or nothing
    ///
    /// Operations run against a staged copy that replaces the session only when all of them
    /// succeed; each still becomes its own undo step. On failure the session is unchanged.
    pub fn apply_patch(&mut self, patch: &PatchFile) -> Result<Vec<BatchReport>> {
        let actor = patch
            .actor
            .clone()
            .unwrap_or_else(|| self.config.actor.clone());

        let mut staged = self.clone();
        let mut reports = Vec::with_capacity(patch.operations.len());
        for (idx, op) in patch.operations.iter().enumerate() {
            match staged.apply_operation(&actor, op) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!(
                        actor = %actor,
                        operation = idx + 1,
                        error = %e,
                        "patch rejected, no operations applied"
                    );
                    return Err(e);
                }
            }
        }

        *self = staged;
        Ok(reports)
    }

    /// Restore the table from before the last batch
    pub fn undo(&mut self, actor: &str) -> HistoryOutcome {
        let reversed = self.entries_since_last_snapshot().len();
        match self.history.undo(&self.table, &self.log) {
            Some(table) => {
                self.table = table;
                self.log.record_undo(actor);
                tracing::info!(actor, reversed, "undo applied");
                HistoryOutcome::Applied
            }
            None => {
                tracing::debug!(actor, "nothing to undo");
                HistoryOutcome::NothingToUndo
            }
        }
    }

    /// Re-apply the last undone batch
    pub fn redo(&mut self, actor: &str) -> HistoryOutcome {
        match self.history.redo(&self.table, &self.log) {
            Some(table) => {
                self.table = table;
                self.log.record_redo(actor);
                tracing::info!(actor, "redo applied");
                HistoryOutcome::Applied
            }
            None => {
                tracing::debug!(actor, "nothing to redo");
                HistoryOutcome::NothingToRedo
            }
        }
    }

    /// Discard all edits, history and audit entries
    pub fn reset(&mut self) {
        self.table = self.baseline.clone();
        self.history.clear();
        self.log.clear();
        tracing::info!("session reset");
    }

    /// Load a saved session from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the session to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Snapshot, adopt `after`, then record its audit entries
    fn commit(&mut self, after: MergedTable, record: impl FnOnce(&mut AuditLog)) {
        self.history.push_snapshot(&self.table, &self.log);
        self.table = after;
        record(&mut self.log);
    }
}
