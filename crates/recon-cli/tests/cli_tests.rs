//! CLI integration tests
//!
//! These tests drive the built `recon` binary through a full review: start a session from two
//! snapshots, apply a patch, undo/redo and export.

use recon_core::{AuditAction, ReviewSession, RowId, RowStatus};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn write_snapshots(temp_dir: &TempDir) -> (PathBuf, PathBuf) {
    let old_path = temp_dir.path().join("old.csv");
    let new_path = temp_dir.path().join("new.csv");

    // Preamble rows above the header, as spreadsheet exports carry them
    fs::write(&old_path, "Provider export,,\n,,\nkey,name,\n1,A,\n2,B,\n,,\n").unwrap();
    fs::write(&new_path, "key,name\n1,A\n2,B2\n3,C\n").unwrap();

    (old_path, new_path)
}

fn recon(temp_dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_recon"))
        .current_dir(temp_dir.path())
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn assert_success(output: &Output) -> String {
    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn start_session(temp_dir: &TempDir) -> PathBuf {
    let (old, new) = write_snapshots(temp_dir);
    let session = temp_dir.path().join("session.json");

    let output = recon(
        temp_dir,
        &[
            "start",
            "--old",
            path_str(&old),
            "--new",
            path_str(&new),
            "--key",
            "key",
            "--session",
            path_str(&session),
        ],
    );
    assert_success(&output);
    session
}

#[test]
fn test_cli_compare_reports_statuses() {
    let temp_dir = TempDir::new().unwrap();
    let (old, new) = write_snapshots(&temp_dir);

    let output = recon(
        &temp_dir,
        &["compare", "--old", path_str(&old), "--new", path_str(&new), "--key", "key"],
    );
    let stdout = assert_success(&output);

    assert!(stdout.contains("not_changed  1"), "stdout: {}", stdout);
    assert!(stdout.contains("changed      1"), "stdout: {}", stdout);
    assert!(stdout.contains("new          1"), "stdout: {}", stdout);
    assert!(stdout.contains("deleted      0"), "stdout: {}", stdout);
}

#[test]
fn test_cli_start_apply_undo_redo() {
    let temp_dir = TempDir::new().unwrap();
    let session_path = start_session(&temp_dir);

    let patch_path = temp_dir.path().join("patch.json");
    fs::write(
        &patch_path,
        r#"{
            "actor": "m1",
            "operations": [
                { "op": "edit_cells", "edits": [
                    { "row_id": 3, "column": "new_name", "value": "C2" },
                    { "row_id": 99, "column": "new_name", "value": "x" }
                ] },
                { "op": "delete_rows", "row_ids": [2] }
            ]
        }"#,
    )
    .unwrap();

    let stdout = assert_success(&recon(
        &temp_dir,
        &["apply", "--session", path_str(&session_path), "--patch", path_str(&patch_path)],
    ));
    assert!(stdout.contains("Applied: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("Skipped: 1"), "stdout: {}", stdout);

    let session = ReviewSession::load(&session_path).unwrap();
    assert!(session.table().find_row(RowId(2)).is_none());
    assert_eq!(session.history().undo_depth(), 2);

    let stdout = assert_success(&recon(&temp_dir, &["undo", "--session", path_str(&session_path)]));
    assert!(stdout.contains("Undo applied"));

    let session = ReviewSession::load(&session_path).unwrap();
    let restored = session.table().find_row(RowId(2)).unwrap();
    assert_eq!(restored.status, RowStatus::Changed);

    let actions: Vec<AuditAction> = session.audit_log().entries().iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::EditCell, AuditAction::DeleteRow, AuditAction::UndoAction]
    );
    assert_eq!(session.audit_log().entries()[2].actor, "reviewer");

    assert_success(&recon(&temp_dir, &["redo", "--session", path_str(&session_path)]));
    let stdout = assert_success(&recon(&temp_dir, &["redo", "--session", path_str(&session_path)]));
    assert!(stdout.contains("Nothing to redo"));
}

#[test]
fn test_cli_export_filters_by_status() {
    let temp_dir = TempDir::new().unwrap();
    let session_path = start_session(&temp_dir);
    let csv_path = temp_dir.path().join("changed.csv");
    let json_path = temp_dir.path().join("all.json");

    assert_success(&recon(
        &temp_dir,
        &[
            "export",
            "--session",
            path_str(&session_path),
            "--status",
            "changed",
            "--output",
            path_str(&csv_path),
        ],
    ));
    let csv = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "status,changed_columns,old_key,old_name,new_key,new_name");
    assert_eq!(lines[1], "changed,name,2,B,2,B2");

    assert_success(&recon(
        &temp_dir,
        &[
            "export",
            "--session",
            path_str(&session_path),
            "--format",
            "json",
            "--output",
            path_str(&json_path),
        ],
    ));
    let rows: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 3);
    assert_eq!(rows[2]["status"], "new");
    assert_eq!(rows[2]["new_name"], "C");
}

#[test]
fn test_cli_schema_with_mapping() {
    let temp_dir = TempDir::new().unwrap();
    let old = temp_dir.path().join("old.csv");
    let new = temp_dir.path().join("new.csv");
    let mapping = temp_dir.path().join("mapping.json");
    let schema = temp_dir.path().join("schema.csv");
    fs::write(&old, "key,Activity Name\n1,Swim\n").unwrap();
    fs::write(&new, "key,Official Name\n1,Swim\n").unwrap();

    assert_success(&recon(
        &temp_dir,
        &[
            "create-mapping",
            "--old",
            path_str(&old),
            "--new",
            path_str(&new),
            "--key",
            "key",
            "--output",
            path_str(&mapping),
        ],
    ));
    let template = fs::read_to_string(&mapping).unwrap();
    fs::write(
        &mapping,
        template.replacen("\"new\": null", "\"new\": \"Official Name\"", 1),
    )
    .unwrap();

    assert_success(&recon(
        &temp_dir,
        &[
            "schema",
            "--old",
            path_str(&old),
            "--new",
            path_str(&new),
            "--key",
            "key",
            "--provider",
            "AJM",
            "--version-tag",
            "7",
            "--mapping",
            path_str(&mapping),
            "--output",
            path_str(&schema),
        ],
    ));

    let csv = fs::read_to_string(&schema).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(
        lines[1].ends_with(",AJM,7,renamed,Activity Name,Official Name"),
        "schema log: {}",
        csv
    );
}

#[test]
fn test_cli_missing_business_key_fails() {
    let temp_dir = TempDir::new().unwrap();
    let (old, new) = write_snapshots(&temp_dir);

    let output = recon(
        &temp_dir,
        &["compare", "--old", path_str(&old), "--new", path_str(&new), "--key", "Activity ID"],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));
}

#[test]
fn test_cli_create_patch_template() {
    let temp_dir = TempDir::new().unwrap();
    let patch_path = temp_dir.path().join("patch.json");

    assert_success(&recon(
        &temp_dir,
        &[
            "create-patch",
            "--output",
            path_str(&patch_path),
            "--actor",
            "m3",
            "--example",
            "2:new_name:Fixed",
        ],
    ));

    let patch = recon_core::PatchFile::load(&patch_path).unwrap();
    assert_eq!(patch.actor.as_deref(), Some("m3"));
    assert_eq!(
        patch.operations,
        vec![recon_core::Operation::EditCells {
            edits: vec![recon_core::CellEdit::new(RowId(2), "new_name", "Fixed")],
        }]
    );
}

#[test]
fn test_cli_failing_patch_leaves_session_file_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let session_path = start_session(&temp_dir);
    let before = fs::read_to_string(&session_path).unwrap();

    let patch_path = temp_dir.path().join("patch.json");
    fs::write(
        &patch_path,
        r#"{ "operations": [
            { "op": "add_column", "column": "note" },
            { "op": "rename_column", "from": "new_name", "to": "status" }
        ] }"#,
    )
    .unwrap();

    let output = recon(
        &temp_dir,
        &["apply", "--session", path_str(&session_path), "--patch", path_str(&patch_path)],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("'status' already exists"));
    assert_eq!(fs::read_to_string(&session_path).unwrap(), before);
}

#[test]
fn test_cli_status_shows_next_undo() {
    let temp_dir = TempDir::new().unwrap();
    let session_path = start_session(&temp_dir);
    let patch_path = temp_dir.path().join("patch.json");
    fs::write(
        &patch_path,
        r#"{ "operations": [ { "op": "delete_rows", "row_ids": [1, 2] } ] }"#,
    )
    .unwrap();
    assert_success(&recon(
        &temp_dir,
        &["apply", "--session", path_str(&session_path), "--patch", path_str(&patch_path)],
    ));

    let stdout = assert_success(&recon(&temp_dir, &["status", "--session", path_str(&session_path)]));

    assert!(stdout.contains("Undo depth: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("(after audit entry 0)"), "stdout: {}", stdout);
    assert!(stdout.contains("Next undo reverses: delete_row, delete_row"), "stdout: {}", stdout);
}

#[test]
fn test_cli_create_config_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("recon.json");

    assert_success(&recon(
        &temp_dir,
        &[
            "create-config",
            "--key",
            "key",
            "--provider",
            "AJM",
            "--max-history",
            "5",
            "--output",
            path_str(&config_path),
        ],
    ));

    let config = recon_core::ReconcileConfig::load(&config_path).unwrap();
    assert_eq!(config.business_key, "key");
    assert_eq!(config.provider, "AJM");
    assert_eq!(config.actor, "reviewer");
    assert_eq!(config.max_history, Some(5));

    // the file drives a session on its own
    let (old, new) = write_snapshots(&temp_dir);
    let session_path = temp_dir.path().join("session.json");
    assert_success(&recon(
        &temp_dir,
        &[
            "start",
            "--config",
            path_str(&config_path),
            "--old",
            path_str(&old),
            "--new",
            path_str(&new),
            "--session",
            path_str(&session_path),
        ],
    ));
    let session = ReviewSession::load(&session_path).unwrap();
    assert_eq!(session.config(), &config);
}

#[test]
fn test_cli_export_keeps_source_text() {
    let temp_dir = TempDir::new().unwrap();
    let old = temp_dir.path().join("old.csv");
    let new = temp_dir.path().join("new.csv");
    let session_path = temp_dir.path().join("session.json");
    let csv_path = temp_dir.path().join("out.csv");
    fs::write(&old, "key,qty,big\n1,0.10,12345678901234567890\n").unwrap();
    fs::write(&new, "key,qty,big\n1,0.1,12345678901234567890\n").unwrap();

    assert_success(&recon(
        &temp_dir,
        &[
            "start",
            "--old",
            path_str(&old),
            "--new",
            path_str(&new),
            "--key",
            "key",
            "--session",
            path_str(&session_path),
        ],
    ));
    assert_success(&recon(
        &temp_dir,
        &["export", "--session", path_str(&session_path), "--output", path_str(&csv_path)],
    ));

    let csv = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(
        csv.lines().nth(1).unwrap(),
        "changed,qty,1,0.10,12345678901234567890,1,0.1,12345678901234567890"
    );
}
