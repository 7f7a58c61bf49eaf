//! recon-core: reconcile two spreadsheet snapshots and audit the review that follows
//!
//! This library provides functionality to:
//! - Load old and new snapshot exports from CSV
//! - Classify column renames, additions and deletions from a reviewer mapping
//! - Outer-join rows on a business key and flag each row's change status
//! - Apply reviewer edits as batches with an append-only audit log and undo/redo
//! - Export the working table and logs to CSV

pub mod audit;
pub mod compare;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod logging;
pub mod merger;
pub mod parser;
pub mod patch;
pub mod schema;
pub mod session;
pub mod table;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use compare::{LooseEquality, ValueComparator};
pub use config::ReconcileConfig;
pub use error::{Error, Result, Side};
pub use export::{write_audit_csv, write_schema_csv, write_table_csv};
pub use history::{HistoryOutcome, Snapshot, UndoRedoStack};
pub use merger::{merge_snapshots, merge_snapshots_with, MergedRow, MergedTable, RowId, RowStatus};
pub use parser::{parse_csv_str, parse_snapshot, parse_snapshot_str};
pub use patch::{
    apply_cell_edits, apply_column_addition, apply_column_deletion, apply_column_rename,
    apply_row_deletions, CellEdit, Operation, PatchFile,
};
pub use schema::{apply_column_mapping, reconcile_schema, ColumnMapping, SchemaChange, SchemaEvent};
pub use session::{BatchReport, ReviewSession};
pub use table::{CellValue, Column, Row, Table};
