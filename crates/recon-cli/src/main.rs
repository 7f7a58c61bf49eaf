//! Snapshot reconciliation CLI
//!
//! Command-line tool for comparing two spreadsheet snapshots and reviewing the merged result.

use clap::{Args, Parser, Subcommand};
use recon_core::logging::{self, Profile};
use recon_core::{
    parse_snapshot, write_audit_csv, write_schema_csv, write_table_csv, CellEdit, ColumnMapping,
    MergedTable, Operation, PatchFile, ReconcileConfig, ReviewSession, RowId, RowStatus, Table,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "recon")]
#[command(about = "Spreadsheet snapshot reconciliation and review", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log JSON lines to stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every command that reconciles two snapshots
#[derive(Args)]
struct SnapshotArgs {
    /// Previous snapshot (CSV)
    #[arg(long)]
    old: PathBuf,

    /// Incoming snapshot (CSV)
    #[arg(long)]
    new: PathBuf,

    /// Column mapping file (JSON); columns map to themselves when omitted
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

/// Config file plus per-field overrides
#[derive(Args)]
struct ConfigArgs {
    /// Config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Business key column
    #[arg(short, long)]
    key: Option<String>,

    /// Provider of the incoming snapshot
    #[arg(long)]
    provider: Option<String>,

    /// Version label of the incoming snapshot
    #[arg(long)]
    version_tag: Option<String>,

    /// Actor recorded in the audit log
    #[arg(long)]
    actor: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show column renames, additions and deletions between two snapshots
    Schema {
        #[command(flatten)]
        snapshots: SnapshotArgs,

        /// Write the schema log as CSV instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge two snapshots and show the rows with their change status
    Compare {
        #[command(flatten)]
        snapshots: SnapshotArgs,

        /// Only show rows with these statuses
        #[arg(short, long)]
        status: Vec<String>,

        /// Maximum number of rows to display
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Write a mapping file that maps every old column to its same-named new column
    CreateMapping {
        #[command(flatten)]
        snapshots: SnapshotArgs,

        /// Output path for the mapping file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Reconcile two snapshots and save a review session
    Start {
        #[command(flatten)]
        snapshots: SnapshotArgs,

        /// Output path for the session file
        #[arg(short = 'S', long)]
        session: PathBuf,
    },

    /// Summarize a saved review session
    Status {
        /// Session file
        #[arg(short = 'S', long)]
        session: PathBuf,
    },

    /// Apply a patch file to a saved review session; nothing is saved if any operation fails
    Apply {
        /// Session file
        #[arg(short = 'S', long)]
        session: PathBuf,

        /// Path to patch file (JSON)
        #[arg(short, long)]
        patch: PathBuf,
    },

    /// Undo the last batch of a saved review session
    Undo {
        /// Session file
        #[arg(short = 'S', long)]
        session: PathBuf,

        /// Actor recorded in the audit log
        #[arg(long)]
        actor: Option<String>,
    },

    /// Redo the last undone batch of a saved review session
    Redo {
        /// Session file
        #[arg(short = 'S', long)]
        session: PathBuf,

        /// Actor recorded in the audit log
        #[arg(long)]
        actor: Option<String>,
    },

    /// Discard every edit of a saved review session
    Reset {
        /// Session file
        #[arg(short = 'S', long)]
        session: PathBuf,
    },

    /// Export the audit log of a saved review session
    Log {
        /// Session file
        #[arg(short = 'S', long)]
        session: PathBuf,

        /// Output file path; printed when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the working table of a saved review session
    Export {
        /// Session file
        #[arg(short = 'S', long)]
        session: PathBuf,

        /// Output format (csv or json)
        #[arg(long, default_value = "csv")]
        format: String,

        /// Only export rows with these statuses
        #[arg(short, long)]
        status: Vec<String>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a config file from defaults and the given overrides
    CreateConfig {
        #[command(flatten)]
        config: ConfigArgs,

        /// Undo depth limit
        #[arg(long)]
        max_history: Option<usize>,

        /// Output path for the config file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create a patch file template
    CreatePatch {
        /// Output path for the patch file
        #[arg(short, long)]
        output: PathBuf,

        /// Actor recorded for the patch
        #[arg(long)]
        actor: Option<String>,

        /// Example edits to include (row_id:column:value)
        #[arg(short, long)]
        example: Vec<String>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> recon_core::Result<()> {
    let cli = Cli::parse();

    if cli.log_json {
        logging::init(Profile::Production);
    } else if cli.verbose {
        logging::init(Profile::Development);
    }

    match cli.command {
        Commands::Schema { snapshots, output } => cmd_schema(&snapshots, output.as_deref()),
        Commands::Compare {
            snapshots,
            status,
            limit,
        } => cmd_compare(&snapshots, &status, limit),
        Commands::CreateMapping { snapshots, output } => cmd_create_mapping(&snapshots, &output),
        Commands::Start { snapshots, session } => cmd_start(&snapshots, &session),
        Commands::Status { session } => cmd_status(&session),
        Commands::Apply { session, patch } => cmd_apply(&session, &patch),
        Commands::Undo { session, actor } => cmd_undo(&session, actor, false),
        Commands::Redo { session, actor } => cmd_undo(&session, actor, true),
        Commands::Reset { session } => cmd_reset(&session),
        Commands::Log { session, output } => cmd_log(&session, output.as_deref()),
        Commands::Export {
            session,
            format,
            status,
            output,
        } => cmd_export(&session, &format, &status, &output),
        Commands::CreateConfig {
            config,
            max_history,
            output,
        } => cmd_create_config(&config, max_history, &output),
        Commands::CreatePatch {
            output,
            actor,
            example,
        } => cmd_create_patch(&output, actor, &example),
    }
}

fn cmd_schema(args: &SnapshotArgs, output: Option<&Path>) -> recon_core::Result<()> {
    let session = start_session(args)?;
    let changes = session.schema_changes();

    if let Some(path) = output {
        write_schema_csv(changes, BufWriter::new(File::create(path)?))?;
        println!("Exported {} schema changes to {}", changes.len(), path.display());
        return Ok(());
    }

    if changes.is_empty() {
        println!("No schema changes.");
        return Ok(());
    }

    println!("Schema changes ({}):", changes.len());
    for change in changes {
        println!(
            "  {:<8} {} -> {}",
            change.event.as_str(),
            change.old_column.as_deref().unwrap_or("-"),
            change.new_column.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

fn cmd_compare(args: &SnapshotArgs, status: &[String], limit: Option<usize>) -> recon_core::Result<()> {
    let session = start_session(args)?;
    let table = session.table();
    let filter = parse_statuses(status)?;

    print_counts(table);
    println!();

    let rows = match &filter {
        Some(statuses) => table.filter_by_status(statuses),
        None => table.rows.iter().collect(),
    };

    println!("id\t{}", table.header().join("\t"));
    println!("{}", "-".repeat(table.column_count() * 12));

    let row_limit = limit.unwrap_or(rows.len());
    for row in rows.iter().take(row_limit) {
        let values: Vec<String> = table
            .columns
            .iter()
            .map(|col| row.get(col.index).map(|v| v.to_string_value()).unwrap_or_default())
            .collect();
        println!(
            "{}\t{}\t{}\t{}",
            row.id,
            row.status,
            row.changed_columns_joined(),
            values.join("\t")
        );
    }

    if rows.len() > row_limit {
        println!("... ({} more rows)", rows.len() - row_limit);
    }

    Ok(())
}

fn cmd_create_mapping(args: &SnapshotArgs, output: &Path) -> recon_core::Result<()> {
    let config = load_config(&args.config)?;
    let (old, new) = load_snapshots(args, &config)?;
    let mapping = ColumnMapping::identity(&old.column_names(), &new.column_names());

    mapping.save(output)?;
    let unmapped = mapping.entries.iter().filter(|e| e.new.is_none()).count();
    println!("Created mapping file: {}", output.display());
    println!("Columns: {} ({} without a same-named target)", mapping.entries.len(), unmapped);
    println!();
    println!("Fill in renamed columns, then run:");
    println!(
        "  recon start --old {} --new {} --mapping {} --session <file>",
        args.old.display(),
        args.new.display(),
        output.display()
    );

    Ok(())
}

fn cmd_start(args: &SnapshotArgs, session_path: &Path) -> recon_core::Result<()> {
    let session = start_session(args)?;
    session.save(session_path)?;

    println!("Created session: {}", session_path.display());
    println!("Business key: {}", session.config().business_key);
    println!("Schema changes: {}", session.schema_changes().len());
    print_counts(session.table());

    Ok(())
}

fn cmd_status(session_path: &Path) -> recon_core::Result<()> {
    let session = ReviewSession::load(session_path)?;
    let history = session.history();

    println!("Session: {}", session_path.display());
    println!("Business key: {}", session.config().business_key);
    println!("Columns: {}", session.table().column_count());
    print_counts(session.table());
    println!();
    println!("Audit entries: {}", session.audit_log().len());
    println!("Undo depth: {}", history.undo_depth());
    println!("Redo depth: {}", history.redo_depth());

    if let Some(snapshot) = history.last_snapshot() {
        println!();
        println!(
            "Last snapshot: {} (after audit entry {})",
            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
            snapshot.audit_len
        );
        let actions: Vec<&str> = session
            .entries_since_last_snapshot()
            .iter()
            .map(|e| e.action.as_str())
            .collect();
        println!("Next undo reverses: {}", actions.join(", "));
    }

    Ok(())
}

fn cmd_apply(session_path: &Path, patch_path: &Path) -> recon_core::Result<()> {
    let mut session = ReviewSession::load(session_path)?;
    let patch = PatchFile::load(patch_path)?;
    println!("Loaded patch with {} operations", patch.operations.len());

    let reports = session.apply_patch(&patch)?;

    let applied: usize = reports.iter().map(|r| r.applied).sum();
    let unchanged: usize = reports.iter().map(|r| r.unchanged).sum();
    let skipped: Vec<&(CellEdit, String)> = reports.iter().flat_map(|r| &r.skipped).collect();

    if !skipped.is_empty() {
        println!("\nWarning: {} edits could not be applied:", skipped.len());
        for (edit, reason) in &skipped {
            println!("  - Row {}, Column '{}': {}", edit.row_id, edit.column, reason);
        }
    }

    session.save(session_path)?;

    println!("\nApplied: {}", applied);
    println!("Unchanged: {}", unchanged);
    println!("Skipped: {}", skipped.len());

    Ok(())
}

fn cmd_undo(session_path: &Path, actor: Option<String>, redo: bool) -> recon_core::Result<()> {
    let mut session = ReviewSession::load(session_path)?;
    let actor = actor.unwrap_or_else(|| session.config().actor.clone());

    let outcome = if redo {
        session.redo(&actor)
    } else {
        session.undo(&actor)
    };

    if outcome.is_applied() {
        session.save(session_path)?;
        println!("{} applied", if redo { "Redo" } else { "Undo" });
    } else {
        println!("Nothing to {}", if redo { "redo" } else { "undo" });
    }

    Ok(())
}

fn cmd_reset(session_path: &Path) -> recon_core::Result<()> {
    let mut session = ReviewSession::load(session_path)?;
    session.reset();
    session.save(session_path)?;
    println!("Session reset to the merge result");
    Ok(())
}

fn cmd_log(session_path: &Path, output: Option<&Path>) -> recon_core::Result<()> {
    let session = ReviewSession::load(session_path)?;
    let log = session.audit_log();

    match output {
        Some(path) => {
            write_audit_csv(log, BufWriter::new(File::create(path)?))?;
            println!("Exported {} audit entries to {}", log.len(), path.display());
        }
        None => write_audit_csv(log, io::stdout().lock())?,
    }

    Ok(())
}

fn cmd_export(
    session_path: &Path,
    format: &str,
    status: &[String],
    output: &Path,
) -> recon_core::Result<()> {
    let session = ReviewSession::load(session_path)?;
    let table = session.table();
    let filter = parse_statuses(status)?;

    let written = match format.to_lowercase().as_str() {
        "csv" => {
            let writer = BufWriter::new(File::create(output)?);
            write_table_csv(table, filter.as_deref(), writer)?
        }
        "json" => {
            let rows: Vec<serde_json::Value> = table
                .rows
                .iter()
                .filter(|r| filter.as_ref().map_or(true, |s| s.contains(&r.status)))
                .map(|r| table.row_content(r))
                .collect();
            let mut writer = BufWriter::new(File::create(output)?);
            serde_json::to_writer_pretty(&mut writer, &rows)?;
            writeln!(writer)?;
            rows.len()
        }
        _ => {
            return Err(recon_core::Error::InvalidInput(format!(
                "unknown format '{}'; supported formats: csv, json",
                format
            )))
        }
    };

    println!("Exported {} rows to {}", written, output.display());

    Ok(())
}

fn cmd_create_config(
    args: &ConfigArgs,
    max_history: Option<usize>,
    output: &Path,
) -> recon_core::Result<()> {
    let mut config = load_config(args)?;
    if max_history.is_some() {
        config.max_history = max_history;
    }

    config.save(output)?;
    println!("Created config file: {}", output.display());
    println!("Business key: {}", config.business_key);
    println!();
    println!("Use it with:");
    println!("  recon start --config {} --old <csv> --new <csv> --session <file>", output.display());

    Ok(())
}

fn cmd_create_patch(output: &Path, actor: Option<String>, examples: &[String]) -> recon_core::Result<()> {
    let mut patch = PatchFile::new(actor);
    let mut edits = Vec::new();

    // Parse example edits: "row_id:column:value"
    for example in examples {
        let parts: Vec<&str> = example.splitn(3, ':').collect();
        if parts.len() != 3 {
            eprintln!("Warning: Invalid example format '{}', expected 'row_id:column:value'", example);
            continue;
        }

        let row_id: u64 = match parts[0].parse() {
            Ok(id) => id,
            Err(_) => {
                eprintln!("Warning: Invalid row_id '{}' in example", parts[0]);
                continue;
            }
        };

        edits.push(CellEdit::new(RowId(row_id), parts[1], parts[2]));
    }

    // If no examples provided, add a placeholder
    if edits.is_empty() {
        edits.push(CellEdit::new(RowId(1), "new_ColumnName", "NewValue"));
    }

    let edit_count = edits.len();
    patch.add_operation(Operation::EditCells { edits });
    patch.save(output)?;

    println!("Created patch file: {}", output.display());
    println!("Edits: {}", edit_count);
    println!();
    println!("Edit the file to add your changes, then run:");
    println!("  recon apply --session <file> --patch {}", output.display());

    Ok(())
}

/// Config file values with command-line overrides applied
fn load_config(args: &ConfigArgs) -> recon_core::Result<ReconcileConfig> {
    let mut config = match &args.config {
        Some(path) => ReconcileConfig::load(path)?,
        None => ReconcileConfig::default(),
    };

    if let Some(key) = &args.key {
        config.business_key = key.clone();
    }
    if let Some(provider) = &args.provider {
        config.provider = provider.clone();
    }
    if let Some(version) = &args.version_tag {
        config.version = version.clone();
    }
    if let Some(actor) = &args.actor {
        config.actor = actor.clone();
    }

    Ok(config)
}

fn load_snapshots(args: &SnapshotArgs, config: &ReconcileConfig) -> recon_core::Result<(Table, Table)> {
    let old = parse_snapshot(&args.old, &config.business_key)?;
    let new = parse_snapshot(&args.new, &config.business_key)?;
    Ok((old, new))
}

fn start_session(args: &SnapshotArgs) -> recon_core::Result<ReviewSession> {
    let config = load_config(&args.config)?;
    let (old, new) = load_snapshots(args, &config)?;
    tracing::debug!(
        old = %args.old.display(),
        new = %args.new.display(),
        key = %config.business_key,
        "snapshots loaded"
    );

    let mapping = match &args.mapping {
        Some(path) => ColumnMapping::load(path)?,
        None => ColumnMapping::identity(&old.column_names(), &new.column_names()),
    };

    ReviewSession::start(&old, &new, &mapping, config)
}

fn parse_statuses(values: &[String]) -> recon_core::Result<Option<Vec<RowStatus>>> {
    if values.is_empty() {
        return Ok(None);
    }
    values
        .iter()
        .map(|s| s.parse::<RowStatus>())
        .collect::<recon_core::Result<Vec<_>>>()
        .map(Some)
}

fn print_counts(table: &MergedTable) {
    let counts = table.status_counts();
    println!("Rows: {}", table.row_count());
    for status in [
        RowStatus::NotChanged,
        RowStatus::Changed,
        RowStatus::New,
        RowStatus::Deleted,
    ] {
        println!("  {:<12} {}", status.as_str(), counts.get(&status).copied().unwrap_or(0));
    }
}
