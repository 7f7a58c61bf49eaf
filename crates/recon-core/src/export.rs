//! CSV export of the working table, the audit log and the schema log

use crate::audit::AuditLog;
use crate::error::Result;
use crate::merger::{MergedTable, RowStatus};
use crate::schema::SchemaChange;
use serde_json::Value;
use std::io::Write;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write the working table with `status` and `changed_columns` leading
///
/// When `statuses` is given only rows with one of those statuses are written.
pub fn write_table_csv<W: Write>(
    table: &MergedTable,
    statuses: Option<&[RowStatus]>,
    writer: W,
) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.header())?;

    let mut written = 0;
    for row in table
        .rows
        .iter()
        .filter(|r| statuses.map_or(true, |s| s.contains(&r.status)))
    {
        let mut record = vec![row.status.as_str().to_string(), row.changed_columns_joined()];
        record.extend(table.columns.iter().map(|c| {
            row.get(c.index)
                .map(|v| v.to_string_value())
                .unwrap_or_default()
        }));
        csv_writer.write_record(&record)?;
        written += 1;
    }

    csv_writer.flush()?;
    Ok(written)
}

/// Write every audit entry as one CSV row
pub fn write_audit_csv<W: Write>(log: &AuditLog, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "date",
        "actor",
        "action",
        "row_id",
        "row_key",
        "column_name",
        "old_value",
        "new_value",
    ])?;

    for entry in log.entries() {
        csv_writer.write_record([
            entry.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            entry.actor.clone(),
            entry.action.as_str().to_string(),
            entry.row_id.map(|id| id.to_string()).unwrap_or_default(),
            entry.row_key.clone().unwrap_or_default(),
            entry.column_name.clone().unwrap_or_default(),
            value_text(&entry.old_value),
            value_text(&entry.new_value),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write schema change entries as CSV
pub fn write_schema_csv<W: Write>(changes: &[SchemaChange], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "date",
        "provider",
        "last_version",
        "event",
        "old_column",
        "new_column",
    ])?;

    for change in changes {
        csv_writer.write_record([
            change.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            change.provider.clone(),
            change.version.clone(),
            change.event.as_str().to_string(),
            change.old_column.clone().unwrap_or_default(),
            change.new_column.clone().unwrap_or_default(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Plain text for scalars, compact JSON for rows and lists
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
