//! # Syncstore - file-sync client metadata store
//!
//! Transactional, address-routed store for the metadata a file-sync client
//! keeps on the device.
//!
//! Syncstore provides:
//! - A versioned SQLite schema with an incremental migrator (v1 to current)
//! - Resource addresses (`content://<authority>/<kind>[/<id>]`) routed to tables
//! - Insert / query / update / delete with duplicate-safe file inserts,
//!   recursive folder deletion and share-flag propagation
//! - Atomic batches, bounded retention of succeeded uploads
//! - Change notification for observers of addresses

pub mod address;
pub mod config;
pub mod model;
pub mod notify;
pub mod registry;
pub mod resync;
pub mod row;
pub mod storage;
pub mod ui;

// Re-exports for convenient access
pub use address::{ResourceAddress, Resource, Router};
pub use notify::{ChangeBus, ChangeEvent};
pub use row::{Row, RowSet, RowValues, Selection, QueryRequest, Value};
pub use storage::{FileStore, Operation, OperationResult, StoreOptions, StoreTx};

/// Result type alias for syncstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for syncstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown resource address: {0}")]
    UnknownResource(String),

    #[error("Address requires a row id: {0}")]
    MissingResourceId(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Selection not allowed, use parameterized queries: {0}")]
    UnsafeSelection(String),

    #[error("Unknown column '{column}' for table {table}")]
    InvalidColumn { table: &'static str, column: String },

    #[error("Invalid sort order: {0}")]
    InvalidSortOrder(String),

    #[error("Batch operation {index} failed: {source}")]
    BatchFailure {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Migration to version {version} failed: {message}")]
    Migration { version: u32, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a failure raised while applying operation `index` of a batch.
    pub fn in_batch(index: usize, source: Error) -> Self {
        Error::BatchFailure {
            index,
            source: Box::new(source),
        }
    }
}
