//! Append-only audit trail of reviewer mutations

use crate::merger::RowId;
use crate::patch::{
    CellEditEvent, ColumnAdditionEvent, ColumnDeletionEvent, ColumnRenameEvent, RowDeletionEvent,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of recorded mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    EditCell,
    DeleteRow,
    RenameColumn,
    DeleteColumn,
    AddColumn,
    UndoAction,
    RedoAction,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::EditCell => "edit_cell",
            AuditAction::DeleteRow => "delete_row",
            AuditAction::RenameColumn => "rename_column",
            AuditAction::DeleteColumn => "delete_column",
            AuditAction::AddColumn => "add_column",
            AuditAction::UndoAction => "undo_action",
            AuditAction::RedoAction => "redo_action",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    pub row_id: Option<RowId>,
    /// Business key of the affected row
    pub row_key: Option<String>,
    pub column_name: Option<String>,
    pub old_value: Value,
    pub new_value: Value,
}

impl AuditEntry {
    fn new(actor: &str, action: AuditAction) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            action,
            row_id: None,
            row_key: None,
            column_name: None,
            old_value: Value::Null,
            new_value: Value::Null,
        }
    }
}

/// Ordered, append-only list of audit entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&mut self, entry: AuditEntry) {
        tracing::debug!(
            action = %entry.action,
            actor = %entry.actor,
            row_id = ?entry.row_id,
            column = ?entry.column_name,
            "audit entry recorded"
        );
        self.entries.push(entry);
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry; only used when a session is reset
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn record_cell_edit(&mut self, actor: &str, event: &CellEditEvent) {
        self.record(AuditEntry {
            row_id: Some(event.row_id),
            row_key: event.row_key.clone(),
            column_name: Some(event.column.clone()),
            old_value: event.old_value.to_json(),
            new_value: event.new_value.to_json(),
            ..AuditEntry::new(actor, AuditAction::EditCell)
        });
    }

    pub fn record_row_deletion(&mut self, actor: &str, event: &RowDeletionEvent) {
        self.record(AuditEntry {
            row_id: Some(event.row_id),
            row_key: event.row_key.clone(),
            old_value: event.content.clone(),
            ..AuditEntry::new(actor, AuditAction::DeleteRow)
        });
    }

    pub fn record_column_rename(&mut self, actor: &str, event: &ColumnRenameEvent) {
        self.record(AuditEntry {
            column_name: Some(event.old_name.clone()),
            old_value: Value::String(event.old_name.clone()),
            new_value: Value::String(event.new_name.clone()),
            ..AuditEntry::new(actor, AuditAction::RenameColumn)
        });
    }

    pub fn record_column_deletion(&mut self, actor: &str, event: &ColumnDeletionEvent) {
        self.record(AuditEntry {
            column_name: Some(event.name.clone()),
            old_value: Value::String(event.name.clone()),
            ..AuditEntry::new(actor, AuditAction::DeleteColumn)
        });
    }

    pub fn record_column_addition(&mut self, actor: &str, event: &ColumnAdditionEvent) {
        self.record(AuditEntry {
            column_name: Some(event.name.clone()),
            new_value: Value::String(event.name.clone()),
            ..AuditEntry::new(actor, AuditAction::AddColumn)
        });
    }

    pub fn record_undo(&mut self, actor: &str) {
        self.record(AuditEntry::new(actor, AuditAction::UndoAction));
    }

    pub fn record_redo(&mut self, actor: &str) {
        self.record(AuditEntry::new(actor, AuditAction::RedoAction));
    }
}
