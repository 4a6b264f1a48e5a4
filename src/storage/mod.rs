//! Storage Layer - SQLite-backed persistence
//!
//! System of record is one SQLite file per installation with tables:
//! - filelist(_id, filename, path, parent, content_type, file_owner, ...)
//! - shares(_id, share_type, path, owner_share, ...)
//! - capabilities(_id, account, version_*, sharing_*, files_*)
//! - list_of_uploads(_id, local_path, remote_path, status, ...)
//! - camera_uploads_sync, user_quotas, user_avatars
//!
//! Every mutation runs inside a `StoreTx`; notifications queued by a
//! transaction are delivered only after it commits.

pub mod batch;
pub mod crud;
pub mod migrate;
pub mod schema;
pub mod sqlite;
pub mod trim;

pub use batch::{Operation, OperationKind, OperationResult};
pub use migrate::{AccountRename, MigrationContext};
pub use sqlite::{DbStats, FileStore, StoreTx};

/// Authority used when none is configured
pub const DEFAULT_AUTHORITY: &str = "org.syncstore";

/// Succeeded uploads kept by the retention trimmer
pub const DEFAULT_MAX_SUCCEEDED_UPLOADS: usize = 30;

/// In-process configuration of a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Authority token every address must carry
    pub authority: String,
    /// Retention cap for succeeded upload records
    pub max_succeeded_uploads: usize,
    pub migration: MigrationContext,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            max_succeeded_uploads: DEFAULT_MAX_SUCCEEDED_UPLOADS,
            migration: MigrationContext::default(),
        }
    }
}

impl StoreOptions {
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    pub fn with_max_succeeded_uploads(mut self, cap: usize) -> Self {
        self.max_succeeded_uploads = cap;
        self
    }

    pub fn with_migration(mut self, migration: MigrationContext) -> Self {
        self.migration = migration;
        self
    }
}
