//! Undo/redo history for reviewer batches
//!
//! A snapshot of the working table is pushed before every batch, so one undo reverses a whole
//! batch. Snapshots are full copies: memory grows with history depth times table size.

use crate::audit::AuditLog;
use crate::merger::MergedTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Saved state taken before a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Working table as it was
    pub table: MergedTable,
    /// Number of audit entries at that point; the log itself is never rolled back
    pub audit_len: usize,
}

impl Snapshot {
    fn capture(table: &MergedTable, log: &AuditLog) -> Self {
        Self {
            timestamp: Utc::now(),
            table: table.clone(),
            audit_len: log.len(),
        }
    }
}

/// Result of an undo or redo request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOutcome {
    Applied,
    NothingToUndo,
    NothingToRedo,
}

impl HistoryOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, HistoryOutcome::Applied)
    }
}

/// Undo and redo stacks of snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UndoRedoStack {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    /// Oldest snapshots are dropped beyond this depth; unbounded when `None`
    #[serde(default)]
    max_depth: Option<usize>,
}

impl UndoRedoStack {
    /// Create an unbounded history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history that keeps at most `max_depth` undo steps
    pub fn with_max_depth(max_depth: Option<usize>) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    /// Save the current state before a batch; invalidates redo history
    pub fn push_snapshot(&mut self, table: &MergedTable, log: &AuditLog) {
        self.undo_stack.push(Snapshot::capture(table, log));
        self.redo_stack.clear();

        if let Some(max) = self.max_depth {
            while self.undo_stack.len() > max {
                self.undo_stack.remove(0);
            }
        }
    }

    /// Pop the last snapshot, parking `current` on the redo stack
    ///
    /// Returns the table to adopt, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: &MergedTable, log: &AuditLog) -> Option<MergedTable> {
        let snapshot = self.undo_stack.pop()?;
        self.redo_stack.push(Snapshot::capture(current, log));
        Some(snapshot.table)
    }

    /// Pop the last undone snapshot, parking `current` on the undo stack
    ///
    /// Returns the table to adopt, or `None` when there is nothing to redo.
    pub fn redo(&mut self, current: &MergedTable, log: &AuditLog) -> Option<MergedTable> {
        let snapshot = self.redo_stack.pop()?;
        self.undo_stack.push(Snapshot::capture(current, log));
        Some(snapshot.table)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Most recent undo snapshot
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.undo_stack.last()
    }

    /// Forget all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
