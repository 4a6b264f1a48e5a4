//! SQLite storage implementation

use super::batch::{Operation, OperationResult};
use super::schema::{self, capability, file, quota, share, upload};
use super::{migrate, StoreOptions};
use crate::address::{Resource, ResourceAddress, Router};
use crate::model::{
    CameraUploadCursor, CapabilitySet, FileRecord, QuotaRecord, ShareRecord, UploadRecord,
    UploadStatus, UserAvatar,
};
use crate::notify::{ChangeBus, ChangeEvent};
use crate::resync::{ResyncHandle, ResyncTask};
use crate::row::{QueryRequest, RowSet, RowValues, Selection};
use crate::{Error, Result};
use crossbeam::channel::Receiver;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a connection waits for another one holding the write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite-backed metadata store.
///
/// One connection guarded by a mutex; writers take `BEGIN IMMEDIATE` so
/// separate processes opening the same file serialize on SQLite's lock.
#[derive(Debug)]
pub struct FileStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    router: Router,
    bus: ChangeBus,
    options: StoreOptions,
    resync: Mutex<Option<ResyncHandle>>,
}

/// An open transaction on a [`FileStore`].
///
/// Handed to the closure of [`FileStore::transaction`]; every CRUD call made
/// through it is part of the same transaction.
pub struct StoreTx<'a> {
    pub(crate) conn: &'a Connection,
    pub(crate) router: &'a Router,
    pub(crate) options: &'a StoreOptions,
    pub(crate) pending: Vec<ResourceAddress>,
    pub(crate) depth: usize,
}

impl<'a> StoreTx<'a> {
    fn new(conn: &'a Connection, router: &'a Router, options: &'a StoreOptions) -> Self {
        Self {
            conn,
            router,
            options,
            pending: Vec::new(),
            depth: 0,
        }
    }

    /// Queue a change signal, delivered once the outermost transaction commits
    pub(crate) fn signal(&mut self, address: ResourceAddress) {
        if !self.pending.contains(&address) {
            self.pending.push(address);
        }
    }

    /// Addresses changed so far in this transaction
    pub fn pending_changes(&self) -> &[ResourceAddress] {
        &self.pending
    }

    pub fn router(&self) -> &Router {
        self.router
    }

    /// Run `f` under a named savepoint. On error only the work done by `f`
    /// is undone, including the change signals it queued.
    pub(crate) fn savepoint<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.conn.execute_batch(&format!("SAVEPOINT {}", name))?;
        let mark = self.pending.len();
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {}", name))?;
                Ok(value)
            }
            Err(e) => {
                self.pending.truncate(mark);
                let undo = format!("ROLLBACK TO {name}; RELEASE {name}", name = name);
                if let Err(rollback) = self.conn.execute_batch(&undo) {
                    warn!("Rollback to savepoint {} failed: {}", name, rollback);
                }
                Err(e)
            }
        }
    }
}

/// Row counts per table
#[derive(Debug, Clone, Default)]
pub struct DbStats {
    pub schema_version: u32,
    pub files: usize,
    pub folders: usize,
    pub shares: usize,
    pub capabilities: usize,
    pub uploads: usize,
    pub succeeded_uploads: usize,
    pub camera_uploads_sync: usize,
    pub quotas: usize,
    pub avatars: usize,
}

impl FileStore {
    /// Open a database file (creates if doesn't exist) and migrate it
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!("Opening store at {}", path.display());
        Self::from_connection(conn, Some(path.to_path_buf()), options)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(options: StoreOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None, options)
    }

    fn from_connection(
        mut conn: Connection,
        path: Option<PathBuf>,
        options: StoreOptions,
    ) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA case_sensitive_like = true")?;
        let found = migrate::prepare(&mut conn, &options.migration)?;
        debug!("Schema found at version {}, now {}", found, schema::CURRENT_VERSION);

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            router: Router::new(options.authority.clone()),
            bus: ChangeBus::new(),
            options,
            resync: Mutex::new(None),
        })
    }

    /// A poisoned lock only means another caller panicked mid-call; the
    /// connection itself is still usable and open transactions are rolled
    /// back before the next one begins.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Address of `resource` under this store's authority
    pub fn address(&self, resource: Resource) -> ResourceAddress {
        self.router.address(resource)
    }

    pub fn schema_version(&self) -> Result<u32> {
        migrate::stored_version(&self.lock())
    }

    /// Watch an address; with `descendants`, rows under a collection count too
    pub fn subscribe(&self, address: &str, descendants: bool) -> Result<Receiver<ChangeEvent>> {
        let address = self.router.route(address)?;
        Ok(self.bus.subscribe(address, descendants))
    }

    /// Submit a re-sync task to `handle` whenever a folder is listed
    pub fn attach_resync(&self, handle: ResyncHandle) {
        *self.resync.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    pub fn detach_resync(&self) {
        *self.resync.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    // ========== Transactions ==========

    /// Run `f` inside one immediate transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise. Change signals
    /// queued inside are delivered after the commit and dropped on rollback.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut StoreTx<'_>) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        if !conn.is_autocommit() {
            warn!("Rolling back a transaction left open by a panicked caller");
            conn.execute_batch("ROLLBACK")?;
        }

        conn.execute_batch("BEGIN IMMEDIATE")?;
        let mut tx = StoreTx::new(&conn, &self.router, &self.options);
        match f(&mut tx) {
            Ok(value) => {
                let pending = std::mem::take(&mut tx.pending);
                if let Err(e) = conn.execute_batch("COMMIT") {
                    if !conn.is_autocommit() {
                        if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                            warn!("Rollback after failed commit failed: {}", rollback);
                        }
                    }
                    return Err(e.into());
                }
                drop(conn);
                for address in &pending {
                    self.bus.notify(address);
                }
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    // ========== Resource Operations ==========

    /// Insert a row; returns the address of the new (or already present) row
    pub fn insert(&self, address: &str, values: &RowValues) -> Result<ResourceAddress> {
        let address = self.router.route(address)?;
        self.transaction(|tx| tx.insert(&address, values))
    }

    /// Query a resource. Listing a folder also submits a re-sync task when a
    /// queue is attached; the result does not wait for it.
    pub fn query(&self, address: &str, request: &QueryRequest) -> Result<RowSet> {
        let address = self.router.route(address)?;
        let (rows, owner) = {
            let conn = self.lock();
            let tx = StoreTx::new(&conn, &self.router, &self.options);
            let rows = tx.query(&address, request)?;
            let owner = match address.resource {
                Resource::Directory(Some(id)) => tx.file_owner(id)?,
                _ => None,
            };
            (rows, owner)
        };

        if let (Resource::Directory(Some(id)), Some(account)) = (address.resource, owner) {
            let resync = self.resync.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(handle) = resync.as_ref() {
                handle.submit(ResyncTask::new(address.clone(), account, id));
            }
        }
        Ok(rows)
    }

    /// Update rows; returns the affected count (0 is not an error)
    pub fn update(
        &self,
        address: &str,
        values: &RowValues,
        selection: Option<&Selection>,
    ) -> Result<usize> {
        let address = self.router.route(address)?;
        self.transaction(|tx| tx.update(&address, values, selection))
    }

    /// Delete rows; folders are removed with their whole subtree
    pub fn delete(&self, address: &str, selection: Option<&Selection>) -> Result<usize> {
        let address = self.router.route(address)?;
        self.transaction(|tx| tx.delete(&address, selection))
    }

    /// Apply `operations` atomically, one result per operation
    pub fn apply_batch(&self, operations: &[Operation]) -> Result<Vec<OperationResult>> {
        self.transaction(|tx| tx.apply_batch(operations))
    }

    // ========== File Operations ==========

    pub fn insert_file(&self, record: &FileRecord) -> Result<ResourceAddress> {
        self.insert(&self.collection(Resource::Root), &record.to_values())
    }

    pub fn file(&self, id: i64) -> Result<Option<FileRecord>> {
        let rows = self.query(
            &self.address(Resource::File(Some(id))).to_address_string(),
            &QueryRequest::new(),
        )?;
        Ok(rows.first().map(FileRecord::from_row))
    }

    pub fn file_by_path(&self, account: &str, path: &str) -> Result<Option<FileRecord>> {
        let request = QueryRequest::new().selection(
            Selection::new(format!("{} = ? AND {} = ?", file::PATH, file::ACCOUNT_OWNER))
                .arg(path)
                .arg(account),
        );
        let rows = self.query(&self.collection(Resource::Root), &request)?;
        Ok(rows.first().map(FileRecord::from_row))
    }

    /// Direct children of a folder, folders first
    pub fn children(&self, folder_id: i64) -> Result<Vec<FileRecord>> {
        let rows = self.query(
            &self.address(Resource::Directory(Some(folder_id))).to_address_string(),
            &QueryRequest::new(),
        )?;
        Ok(rows.iter().map(FileRecord::from_row).collect())
    }

    // ========== Share Operations ==========

    pub fn insert_share(&self, record: &ShareRecord) -> Result<ResourceAddress> {
        self.insert(&self.collection(Resource::Shares(None)), &record.to_values())
    }

    pub fn shares_for(&self, account: &str, path: &str) -> Result<Vec<ShareRecord>> {
        let request = QueryRequest::new().selection(
            Selection::new(format!("{} = ? AND {} = ?", share::PATH, share::ACCOUNT_OWNER))
                .arg(path)
                .arg(account),
        );
        self.query(&self.collection(Resource::Shares(None)), &request)?
            .iter()
            .map(ShareRecord::from_row)
            .collect()
    }

    // ========== Capability Operations ==========

    /// Replace the capabilities of the record's account, inserting if absent
    pub fn upsert_capabilities(&self, record: &CapabilitySet) -> Result<ResourceAddress> {
        let address = self.router.address(Resource::Capabilities(None));
        let mut values = record.to_values();
        values.remove(schema::ID);
        let selection = Selection::eq(capability::ACCOUNT_NAME, &record.account_name);
        self.transaction(|tx| {
            let existing = tx.find_id(schema::CAPABILITIES_TABLE, &selection)?;
            match existing {
                Some(id) => {
                    let row = address.with_id(id);
                    tx.update(&row, &values, None)?;
                    Ok(row)
                }
                None => tx.insert(&address, &values),
            }
        })
    }

    pub fn capabilities_for(&self, account: &str) -> Result<Option<CapabilitySet>> {
        let request = QueryRequest::new()
            .selection(Selection::eq(capability::ACCOUNT_NAME, account));
        let rows = self.query(&self.collection(Resource::Capabilities(None)), &request)?;
        Ok(rows.first().map(CapabilitySet::from_row))
    }

    // ========== Upload Operations ==========

    pub fn insert_upload(&self, record: &UploadRecord) -> Result<ResourceAddress> {
        self.insert(&self.collection(Resource::Uploads(None)), &record.to_values())
    }

    /// Uploads in `status`, newest first
    pub fn uploads_with_status(&self, status: UploadStatus) -> Result<Vec<UploadRecord>> {
        let request =
            QueryRequest::new().selection(Selection::eq(upload::STATUS, status.code()));
        self.query(&self.collection(Resource::Uploads(None)), &request)?
            .iter()
            .map(UploadRecord::from_row)
            .collect()
    }

    // ========== Camera Upload & Quota Operations ==========

    pub fn camera_upload_cursor(&self) -> Result<Option<CameraUploadCursor>> {
        let rows = self.query(
            &self.collection(Resource::CameraUploadsSync(None)),
            &QueryRequest::new(),
        )?;
        Ok(rows.first().map(CameraUploadCursor::from_row))
    }

    /// Store the cursor in the single cursor row, creating it if needed
    pub fn save_camera_upload_cursor(&self, cursor: &CameraUploadCursor) -> Result<ResourceAddress> {
        let address = self.router.address(Resource::CameraUploadsSync(None));
        let mut values = cursor.to_values();
        values.remove(schema::ID);
        self.transaction(|tx| {
            let all = Selection::new("1 = 1").no_args();
            match tx.find_id(schema::CAMERA_UPLOADS_SYNC_TABLE, &all)? {
                Some(id) => {
                    let row = address.with_id(id);
                    tx.update(&row, &values, None)?;
                    Ok(row)
                }
                None => tx.insert(&address, &values),
            }
        })
    }

    /// Replace the quota of the record's account, inserting if absent
    pub fn upsert_quota(&self, record: &QuotaRecord) -> Result<ResourceAddress> {
        let address = self.router.address(Resource::Quotas(None));
        let mut values = record.to_values();
        values.remove(schema::ID);
        let selection = Selection::eq(quota::ACCOUNT_NAME, &record.account_name);
        self.transaction(|tx| match tx.find_id(schema::QUOTAS_TABLE, &selection)? {
            Some(id) => {
                let row = address.with_id(id);
                tx.update(&row, &values, None)?;
                Ok(row)
            }
            None => tx.insert(&address, &values),
        })
    }

    pub fn quota_for(&self, account: &str) -> Result<Option<QuotaRecord>> {
        let request = QueryRequest::new().selection(Selection::eq(quota::ACCOUNT_NAME, account));
        let rows = self.query(&self.collection(Resource::Quotas(None)), &request)?;
        Ok(rows.first().map(QuotaRecord::from_row))
    }

    // ========== Avatar Operations ==========
    // Avatars have no address; they are reached only through these calls.

    /// Insert or replace the avatar of an account
    pub fn save_avatar(&self, avatar: &UserAvatar) -> Result<()> {
        self.transaction(|tx| {
            tx.conn.execute(
                "DELETE FROM user_avatars WHERE account_name = ?1",
                [&avatar.account_name],
            )?;
            tx.conn.execute(
                r#"
                INSERT INTO user_avatars (account_name, cache_key, mime_type, etag)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![avatar.account_name, avatar.cache_key, avatar.mime_type, avatar.etag],
            )?;
            Ok(())
        })
    }

    pub fn avatar_for(&self, account: &str) -> Result<Option<UserAvatar>> {
        self.lock()
            .query_row(
                "SELECT _id, account_name, cache_key, mime_type, etag FROM user_avatars WHERE account_name = ?1",
                [account],
                |row| {
                    Ok(UserAvatar {
                        id: row.get(0)?,
                        account_name: row.get(1)?,
                        cache_key: row.get(2)?,
                        mime_type: row.get(3)?,
                        etag: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn delete_avatar(&self, account: &str) -> Result<usize> {
        Ok(self
            .lock()
            .execute("DELETE FROM user_avatars WHERE account_name = ?1", [account])?)
    }

    // ========== Statistics ==========

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.lock();
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(DbStats {
            schema_version: migrate::stored_version(&conn)?,
            files: count("SELECT COUNT(*) FROM filelist WHERE content_type IS NOT 'DIR'")?,
            folders: count("SELECT COUNT(*) FROM filelist WHERE content_type = 'DIR'")?,
            shares: count("SELECT COUNT(*) FROM shares")?,
            capabilities: count("SELECT COUNT(*) FROM capabilities")?,
            uploads: count("SELECT COUNT(*) FROM list_of_uploads")?,
            succeeded_uploads: count("SELECT COUNT(*) FROM list_of_uploads WHERE status = 2")?,
            camera_uploads_sync: count("SELECT COUNT(*) FROM camera_uploads_sync")?,
            quotas: count("SELECT COUNT(*) FROM user_quotas")?,
            avatars: count("SELECT COUNT(*) FROM user_avatars")?,
        })
    }

    fn collection(&self, resource: Resource) -> String {
        self.router.address(resource).to_address_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ShareType, UploadStatus};

    fn store() -> FileStore {
        FileStore::open_in_memory(StoreOptions::default()).unwrap()
    }

    #[test]
    fn test_file_crud() {
        let store = store();

        let record = FileRecord::file("alice@host", "/notes.txt", 0, "text/plain");
        let address = store.insert_file(&record).unwrap();
        let id = address.resource.id().unwrap();

        let retrieved = store.file(id).unwrap().unwrap();
        assert_eq!(retrieved.name, "notes.txt");
        assert_eq!(retrieved.account_owner, "alice@host");

        let by_path = store.file_by_path("alice@host", "/notes.txt").unwrap().unwrap();
        assert_eq!(by_path.id, Some(id));
        assert!(store.file_by_path("bob@host", "/notes.txt").unwrap().is_none());
    }

    #[test]
    fn test_children_listing_folders_first() {
        let store = store();
        let root = store
            .insert_file(&FileRecord::folder("alice@host", "/", 0))
            .unwrap()
            .resource
            .id()
            .unwrap();
        store
            .insert_file(&FileRecord::file("alice@host", "/b.txt", root, "text/plain"))
            .unwrap();
        store
            .insert_file(&FileRecord::file("alice@host", "/a.txt", root, "text/plain"))
            .unwrap();
        store
            .insert_file(&FileRecord::folder("alice@host", "/zeta/", root))
            .unwrap();

        let names: Vec<String> = store
            .children(root)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["zeta", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_capabilities_upsert_by_account() {
        let store = store();
        let mut caps = CapabilitySet::new("alice@host");
        caps.version_major = 10;
        let first = store.upsert_capabilities(&caps).unwrap();

        caps.version_major = 11;
        let second = store.upsert_capabilities(&caps).unwrap();
        assert_eq!(first, second);

        let stored = store.capabilities_for("alice@host").unwrap().unwrap();
        assert_eq!(stored.version_major, 11);
        assert_eq!(stored.sharing_public_multiple, -1);
        assert_eq!(store.stats().unwrap().capabilities, 1);
    }

    #[test]
    fn test_quota_and_camera_cursor() {
        let store = store();
        store
            .upsert_quota(&QuotaRecord::new("alice@host", 600, 400, 1000))
            .unwrap();
        store
            .upsert_quota(&QuotaRecord::new("alice@host", 500, 500, 1000))
            .unwrap();
        let quota = store.quota_for("alice@host").unwrap().unwrap();
        assert_eq!(quota.relative, 50);
        assert_eq!(store.stats().unwrap().quotas, 1);

        assert!(store.camera_upload_cursor().unwrap().is_none());
        let cursor = CameraUploadCursor {
            id: None,
            pictures_last_sync: 100,
            videos_last_sync: 200,
        };
        store.save_camera_upload_cursor(&cursor).unwrap();
        store
            .save_camera_upload_cursor(&CameraUploadCursor {
                pictures_last_sync: 300,
                ..cursor
            })
            .unwrap();
        let saved = store.camera_upload_cursor().unwrap().unwrap();
        assert_eq!(saved.pictures_last_sync, 300);
        assert_eq!(saved.videos_last_sync, 200);
        assert_eq!(store.stats().unwrap().camera_uploads_sync, 1);
    }

    #[test]
    fn test_avatar_replace() {
        let store = store();
        let mut avatar = UserAvatar {
            account_name: "alice@host".to_string(),
            cache_key: "k1".to_string(),
            mime_type: "image/png".to_string(),
            ..Default::default()
        };
        store.save_avatar(&avatar).unwrap();
        avatar.cache_key = "k2".to_string();
        store.save_avatar(&avatar).unwrap();

        assert_eq!(store.avatar_for("alice@host").unwrap().unwrap().cache_key, "k2");
        assert_eq!(store.delete_avatar("alice@host").unwrap(), 1);
        assert!(store.avatar_for("alice@host").unwrap().is_none());
    }

    #[test]
    fn test_typed_share_and_upload_reads() {
        let store = store();
        store
            .insert_file(&FileRecord::file("alice@host", "/a.txt", 0, "text/plain"))
            .unwrap();
        store
            .insert_share(&ShareRecord::new(ShareType::Group, "alice@host", "/a.txt", 7))
            .unwrap();
        let shares = store.shares_for("alice@host", "/a.txt").unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].share_type, ShareType::Group);

        let mut upload = UploadRecord::new("alice@host", "/sd/a.txt", "/a.txt");
        upload.status = UploadStatus::Failed;
        store.insert_upload(&upload).unwrap();
        assert_eq!(store.uploads_with_status(UploadStatus::Failed).unwrap().len(), 1);
        assert!(store.uploads_with_status(UploadStatus::Succeeded).unwrap().is_empty());
    }

    #[test]
    fn test_rollback_discards_notifications() {
        let store = store();
        let rx = store.subscribe("content://org.syncstore/", true).unwrap();
        let root = store.address(Resource::Root);

        let result: Result<()> = store.transaction(|tx| {
            tx.insert(&root, &FileRecord::file("a", "/x", 0, "text/plain").to_values())?;
            Err(Error::ConstraintViolation("forced".to_string()))
        });
        assert!(result.is_err());
        assert!(rx.try_recv().is_err());
        assert!(store.file_by_path("a", "/x").unwrap().is_none());
    }
}
