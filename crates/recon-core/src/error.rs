//! Error types for recon-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which snapshot an input problem was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Old,
    New,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Old => write!(f, "old"),
            Side::New => write!(f, "new"),
        }
    }
}

/// Errors that can occur in recon-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse CSV
    #[error("failed to parse CSV '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// CSV writer error while exporting
    #[error("CSV export error: {0}")]
    CsvWrite(#[from] csv::Error),

    /// The business key column is absent from one of the snapshots
    #[error("business key column '{key}' is missing from the {side} table")]
    MissingBusinessKey { key: String, side: Side },

    /// The same business key value appears more than once in one snapshot
    #[error("duplicate business key '{key}' in the {side} table")]
    DuplicateBusinessKey { key: String, side: Side },

    /// Two old columns were mapped onto the same new column
    #[error("columns '{first}' and '{second}' are both mapped to '{target}'")]
    AmbiguousColumnMapping {
        first: String,
        second: String,
        target: String,
    },

    /// A mapping points at a column the new snapshot does not have
    #[error("column '{source_column}' is mapped to unknown column '{target}'")]
    UnknownMappingTarget {
        source_column: String,
        target: String,
    },

    /// A rename would collide with a different existing column
    #[error("column '{0}' already exists")]
    DuplicateColumnName(String),

    /// Malformed reviewer input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
