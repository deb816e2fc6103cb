// src/sheets/error.rs

use thiserror::Error;

/// Failures raised by a backing store. These are never retried or recovered
/// by the core; they travel to the caller unchanged.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File system operation error: {0}")]
    FsExtra(String),
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    #[error("Table '{table}' not found in document {document}")]
    TableNotFound { document: String, table: String },
    #[error("Table '{table}' already exists in document {document}")]
    TableExists { document: String, table: String },
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    #[error("{0}")]
    Other(String),
}

impl From<fs_extra::error::Error> for StoreError {
    fn from(err: fs_extra::error::Error) -> Self {
        StoreError::FsExtra(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by row stores, documents and the distribution router.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid row index {row_index} for table '{table}': data rows start at 2")]
    InvalidRowIndex { table: String, row_index: usize },
    #[error("Key '{0}' is already present in the key index")]
    DuplicateKey(String),
    #[error("Invalid key '{0}'")]
    InvalidKey(String),
    #[error("No table is registered for key '{0}'")]
    UnknownKey(String),
    #[error("System table '{table}' missing from index document {document}")]
    MissingSystemTable { document: String, table: String },
    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("Document {0} already has a transaction in progress")]
    TransactionInProgress(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type SheetResult<T> = Result<T, SheetError>;
