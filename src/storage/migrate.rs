//! Schema migrator
//!
//! The stored schema version lives in `PRAGMA user_version`:
//! - `0`: fresh database, every table is created at [`CURRENT_VERSION`]
//! - `1..CURRENT_VERSION`: each pending step runs in its own immediate
//!   transaction and bumps the version when it commits
//! - above `CURRENT_VERSION`: written by a newer build, refused
//!
//! A failing step aborts the open; the store is never handed out with a
//! partially migrated schema.

use super::schema::{
    self, CURRENT_VERSION, FILES_TABLE, LEGACY_INSTANT_UPLOAD_TABLE, LEGACY_SHARES_TABLE,
};
use crate::{Error, Result};
use rusqlite::{Connection, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// An account whose name changed format; step 10 moves its rows and files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRename {
    pub old_name: String,
    pub new_name: String,
}

impl AccountRename {
    pub fn new(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }
}

/// Inputs that migration steps need from outside the database.
#[derive(Debug, Clone, Default)]
pub struct MigrationContext {
    /// Root of the local file storage; one sub-directory per account
    pub storage_root: Option<PathBuf>,
    pub account_renames: Vec<AccountRename>,
}

/// Directory name of an account under the storage root.
///
/// Everything except ASCII alphanumerics, `@` and the unreserved marks
/// `_-!.~'()*` is percent-encoded.
pub fn account_dir_name(account: &str) -> String {
    let mut out = String::with_capacity(account.len());
    for byte in account.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'@'
            | b'_'
            | b'-'
            | b'!'
            | b'.'
            | b'~'
            | b'\''
            | b'('
            | b')'
            | b'*' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[derive(Debug)]
enum JournalEntry {
    Renamed { from: PathBuf, to: PathBuf },
}

/// Filesystem side effects of one migration step, undone in reverse order
/// when the step does not commit.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Rename a directory and record it
    pub fn rename_dir(&mut self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to)?;
        self.entries.push(JournalEntry::Renamed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Undo every recorded effect, newest first
    pub fn revert(&mut self) {
        while let Some(entry) = self.entries.pop() {
            match entry {
                JournalEntry::Renamed { from, to } => {
                    if let Err(e) = std::fs::rename(&to, &from) {
                        error!(
                            "Failed to restore {} to {}: {}",
                            to.display(),
                            from.display(),
                            e
                        );
                    }
                }
            }
        }
    }
}

type StepFn = fn(&Connection, &MigrationContext, &mut Journal) -> Result<()>;

/// One incremental upgrade, producing schema `version` from `version - 1`.
pub struct MigrationStep {
    pub version: u32,
    pub description: &'static str,
    apply: StepFn,
}

/// Read the stored schema version
pub fn stored_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version as u32)
}

/// Bring the database to [`CURRENT_VERSION`], creating it when fresh.
///
/// Returns the version found before any work was done. Every decision is
/// re-checked under the write lock, so connections racing to open the same
/// file run each piece of work once.
pub fn prepare(conn: &mut Connection, ctx: &MigrationContext) -> Result<u32> {
    let found = stored_version(conn)?;
    check_supported(found)?;
    if found == 0 && create_fresh(conn)? {
        info!("Created schema at version {}", CURRENT_VERSION);
    }
    upgrade_to(conn, ctx, CURRENT_VERSION)?;
    ensure_indexes(conn)?;
    Ok(found)
}

/// Apply every pending step up to `target`.
pub fn upgrade_to(conn: &mut Connection, ctx: &MigrationContext, target: u32) -> Result<u32> {
    let current = stored_version(conn)?;
    check_supported(current)?;
    if current == 0 {
        return Err(Error::Migration {
            version: 1,
            message: "no schema to upgrade".to_string(),
        });
    }
    if current >= target {
        return Ok(current);
    }

    info!("Upgrading schema from version {} to {}", current, target);
    for step in steps()
        .into_iter()
        .filter(|s| s.version > current && s.version <= target)
    {
        run_step(conn, ctx, &step)?;
    }
    stored_version(conn)
}

fn check_supported(version: u32) -> Result<()> {
    if version > CURRENT_VERSION {
        return Err(Error::Migration {
            version,
            message: format!(
                "database version {} is newer than supported version {}",
                version, CURRENT_VERSION
            ),
        });
    }
    Ok(())
}

fn run_step(conn: &mut Connection, ctx: &MigrationContext, step: &MigrationStep) -> Result<()> {
    let mut journal = Journal::default();
    if let Err(e) = apply_step(conn, ctx, step, &mut journal) {
        if !journal.is_empty() {
            warn!("Reverting filesystem changes of step {}", step.version);
        }
        journal.revert();
        error!("Migration to version {} failed: {}", step.version, e);
        return Err(match e {
            Error::Migration { .. } => e,
            e => Error::Migration {
                version: step.version,
                message: e.to_string(),
            },
        });
    }
    Ok(())
}

fn apply_step(
    conn: &mut Connection,
    ctx: &MigrationContext,
    step: &MigrationStep,
    journal: &mut Journal,
) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let version = stored_version(&tx)?;
    if version >= step.version {
        debug!("Schema already at version {}, skipping step {}", version, step.version);
        return Ok(());
    }
    if version + 1 != step.version {
        return Err(Error::Migration {
            version: step.version,
            message: format!("expected version {}, found {}", step.version - 1, version),
        });
    }

    info!("Migrating schema to version {}: {}", step.version, step.description);
    (step.apply)(&tx, ctx, journal)?;
    tx.pragma_update(None, "user_version", step.version)?;
    tx.commit()?;
    Ok(())
}

/// Create every table at the current version; false when another
/// connection got there first
fn create_fresh(conn: &mut Connection) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if stored_version(&tx)? != 0 {
        return Ok(false);
    }
    for stmt in schema::current_schema_statements() {
        tx.execute(stmt, [])?;
    }
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
    tx.commit()?;
    Ok(true)
}

fn ensure_indexes(conn: &Connection) -> Result<()> {
    for stmt in schema::CREATE_INDEXES {
        conn.execute(stmt, [])?;
    }
    Ok(())
}

/// Create the version 1 schema, the oldest one still upgradable.
pub fn create_baseline(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(CREATE_FILES_TABLE_V1, [])?;
    tx.execute(CREATE_INSTANT_UPLOAD_TABLE_V1, [])?;
    tx.pragma_update(None, "user_version", 1)?;
    tx.commit()?;
    Ok(())
}

const CREATE_FILES_TABLE_V1: &str = r#"
CREATE TABLE filelist (
    _id INTEGER PRIMARY KEY,
    filename TEXT,
    path TEXT,
    parent INTEGER,
    created INTEGER,
    modified INTEGER,
    content_type TEXT,
    content_length INTEGER,
    media_path TEXT,
    file_owner TEXT,
    last_sync_date INTEGER
)
"#;

const CREATE_INSTANT_UPLOAD_TABLE_V1: &str = r#"
CREATE TABLE instant_upload (
    _id INTEGER PRIMARY KEY,
    path TEXT,
    account TEXT,
    attempt INTEGER,
    message TEXT
)
"#;

const CREATE_LEGACY_SHARES_TABLE_V6: &str = r#"
CREATE TABLE ocshares (
    _id INTEGER PRIMARY KEY,
    file_source INTEGER,
    item_source INTEGER,
    share_type INTEGER,
    shate_with TEXT,
    path TEXT,
    permissions INTEGER,
    shared_date INTEGER,
    expiration_date INTEGER,
    token TEXT,
    shared_with_display_name TEXT,
    is_directory INTEGER,
    user_id INTEGER,
    id_remote_shared INTEGER,
    owner_share TEXT
)
"#;

const CREATE_CAPABILITIES_TABLE_V13: &str = r#"
CREATE TABLE capabilities (
    _id INTEGER PRIMARY KEY,
    account TEXT,
    version_mayor INTEGER,
    version_minor INTEGER,
    version_micro INTEGER,
    version_string TEXT,
    version_edition TEXT,
    core_pollinterval INTEGER,
    sharing_api_enabled INTEGER,
    sharing_public_enabled INTEGER,
    sharing_public_password_enforced INTEGER,
    sharing_public_expire_date_enabled INTEGER,
    sharing_public_expire_date_days INTEGER,
    sharing_public_expire_date_enforced INTEGER,
    sharing_public_send_mail INTEGER,
    sharing_public_upload INTEGER,
    sharing_user_send_mail INTEGER,
    sharing_resharing INTEGER,
    sharing_federation_outgoing INTEGER,
    sharing_federation_incoming INTEGER,
    files_bigfilechunking INTEGER,
    files_undelete INTEGER,
    files_versioning INTEGER
)
"#;

const CREATE_UPLOADS_TABLE_V14: &str = r#"
CREATE TABLE list_of_uploads (
    _id INTEGER PRIMARY KEY,
    local_path TEXT,
    remote_path TEXT,
    account_name TEXT,
    file_size LONG,
    status INTEGER,
    local_behaviour INTEGER,
    upload_time INTEGER,
    force_overwrite INTEGER,
    is_create_remote_folder INTEGER,
    upload_end_timestamp INTEGER,
    last_result INTEGER,
    created_by INTEGER
)
"#;

/// Columns carried from the legacy shares table into the new one
const SHARE_COPY_COLUMNS: &str = "_id, file_source, item_source, share_type, shate_with, path, \
     permissions, shared_date, expiration_date, token, shared_with_display_name, \
     share_with_additional_info, is_directory, user_id, id_remote_shared, owner_share, name, url";

fn add_column(conn: &Connection, table: &str, column: &str, declaration: &str) -> Result<()> {
    conn.execute(
        &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, declaration),
        [],
    )?;
    Ok(())
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Every step, in version order
pub fn steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep { version: 2, description: "keep-in-sync flag", apply: step_2 },
        MigrationStep { version: 3, description: "data sync date", apply: step_3 },
        MigrationStep { version: 4, description: "modification date at last data sync", apply: step_4 },
        MigrationStep { version: 5, description: "etag", apply: step_5 },
        MigrationStep { version: 6, description: "share flags and shares table", apply: step_6 },
        MigrationStep { version: 7, description: "permissions and remote id", apply: step_7 },
        MigrationStep { version: 8, description: "update-thumbnail flag", apply: step_8 },
        MigrationStep { version: 9, description: "is-downloading flag", apply: step_9 },
        MigrationStep { version: 10, description: "account name format", apply: step_10 },
        MigrationStep { version: 11, description: "etag in conflict", apply: step_11 },
        MigrationStep { version: 12, description: "shared-with-sharee flag", apply: step_12 },
        MigrationStep { version: 13, description: "capabilities table", apply: step_13 },
        MigrationStep { version: 14, description: "uploads table replaces instant uploads", apply: step_14 },
        MigrationStep { version: 15, description: "user avatars table", apply: step_15 },
        MigrationStep { version: 16, description: "tree etag", apply: step_16 },
        MigrationStep { version: 17, description: "share name", apply: step_17 },
        MigrationStep { version: 18, description: "share url", apply: step_18 },
        MigrationStep { version: 19, description: "multiple public links capability", apply: step_19 },
        MigrationStep { version: 20, description: "upload-only links capability", apply: step_20 },
        MigrationStep { version: 21, description: "private link", apply: step_21 },
        MigrationStep { version: 22, description: "camera uploads sync table", apply: step_22 },
        MigrationStep { version: 23, description: "user quotas table", apply: step_23 },
        MigrationStep { version: 24, description: "upload transfer id", apply: step_24 },
        MigrationStep { version: 25, description: "password enforcement variants and sharee info", apply: step_25 },
        MigrationStep { version: 26, description: "shares table replaces legacy shares", apply: step_26 },
    ]
}

fn step_2(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::KEEP_IN_SYNC, "INTEGER DEFAULT 0")
}

fn step_3(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::LAST_SYNC_DATE_FOR_DATA, "INTEGER DEFAULT 0")?;
    // cached files count as synced now
    conn.execute(
        "UPDATE filelist SET last_sync_date_for_data = ?1 WHERE media_path IS NOT NULL",
        [now_millis()],
    )?;
    Ok(())
}

fn step_4(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(
        conn,
        FILES_TABLE,
        schema::file::MODIFIED_AT_LAST_SYNC_FOR_DATA,
        "INTEGER DEFAULT 0",
    )?;
    conn.execute(
        "UPDATE filelist SET modified_at_last_sync_for_data = modified WHERE media_path IS NOT NULL",
        [],
    )?;
    Ok(())
}

fn step_5(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::ETAG, "TEXT DEFAULT NULL")
}

fn step_6(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::SHARED_VIA_LINK, "INTEGER DEFAULT 0")?;
    add_column(conn, FILES_TABLE, schema::file::PUBLIC_LINK, "TEXT DEFAULT NULL")?;
    conn.execute(CREATE_LEGACY_SHARES_TABLE_V6, [])?;
    Ok(())
}

fn step_7(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::PERMISSIONS, "TEXT DEFAULT NULL")?;
    add_column(conn, FILES_TABLE, schema::file::REMOTE_ID, "TEXT DEFAULT NULL")
}

fn step_8(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::UPDATE_THUMBNAIL, "INTEGER DEFAULT 0")
}

fn step_9(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::IS_DOWNLOADING, "INTEGER DEFAULT 0")
}

/// Rewrite the owner of every file row of a renamed account, move its
/// storage directory and rewrite the cached file paths under it.
fn step_10(conn: &Connection, ctx: &MigrationContext, journal: &mut Journal) -> Result<()> {
    for rename in &ctx.account_renames {
        let updated = conn.execute(
            "UPDATE filelist SET file_owner = ?1 WHERE file_owner = ?2",
            params![rename.new_name, rename.old_name],
        )?;
        info!(
            "Renamed account {} to {} on {} file rows",
            rename.old_name, rename.new_name, updated
        );

        let Some(root) = &ctx.storage_root else {
            continue;
        };
        let old_dir = root.join(account_dir_name(&rename.old_name));
        let new_dir = root.join(account_dir_name(&rename.new_name));
        if !old_dir.exists() {
            continue;
        }
        if new_dir.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("storage directory {} already exists", new_dir.display()),
            )));
        }

        let old_prefix = format!("{}{}", old_dir.display(), std::path::MAIN_SEPARATOR);
        let new_prefix = format!("{}{}", new_dir.display(), std::path::MAIN_SEPARATOR);
        conn.execute(
            r#"
            UPDATE filelist
            SET media_path = ?1 || substr(media_path, length(?2) + 1)
            WHERE file_owner = ?3 AND substr(media_path, 1, length(?2)) = ?2
            "#,
            params![new_prefix, old_prefix, rename.new_name],
        )?;
        journal.rename_dir(&old_dir, &new_dir)?;
    }
    Ok(())
}

fn step_11(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::ETAG_IN_CONFLICT, "TEXT DEFAULT NULL")
}

fn step_12(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::SHARED_WITH_SHAREE, "INTEGER DEFAULT 0")
}

fn step_13(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    conn.execute(CREATE_CAPABILITIES_TABLE_V13, [])?;
    Ok(())
}

fn step_14(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    conn.execute(&format!("DROP TABLE IF EXISTS {}", LEGACY_INSTANT_UPLOAD_TABLE), [])?;
    conn.execute(CREATE_UPLOADS_TABLE_V14, [])?;
    Ok(())
}

fn step_15(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    conn.execute(schema::CREATE_AVATARS_TABLE, [])?;
    Ok(())
}

fn step_16(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::TREE_ETAG, "TEXT DEFAULT NULL")
}

fn step_17(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, LEGACY_SHARES_TABLE, schema::share::NAME, "TEXT")
}

fn step_18(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, LEGACY_SHARES_TABLE, schema::share::URL, "TEXT")
}

fn step_19(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(
        conn,
        schema::CAPABILITIES_TABLE,
        schema::capability::SHARING_PUBLIC_MULTIPLE,
        "INTEGER DEFAULT -1",
    )
}

fn step_20(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(
        conn,
        schema::CAPABILITIES_TABLE,
        schema::capability::SHARING_PUBLIC_SUPPORTS_UPLOAD_ONLY,
        "INTEGER DEFAULT -1",
    )
}

fn step_21(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, FILES_TABLE, schema::file::PRIVATE_LINK, "TEXT DEFAULT NULL")
}

fn step_22(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    conn.execute(schema::CREATE_CAMERA_UPLOADS_SYNC_TABLE, [])?;
    Ok(())
}

fn step_23(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    conn.execute(schema::CREATE_QUOTAS_TABLE, [])?;
    Ok(())
}

fn step_24(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    add_column(conn, schema::UPLOADS_TABLE, schema::upload::TRANSFER_ID, "TEXT DEFAULT NULL")
}

fn step_25(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    use schema::capability::{
        SHARING_PUBLIC_PASSWORD_ENFORCED_READ_ONLY, SHARING_PUBLIC_PASSWORD_ENFORCED_READ_WRITE,
        SHARING_PUBLIC_PASSWORD_ENFORCED_UPLOAD_ONLY,
    };
    for column in [
        SHARING_PUBLIC_PASSWORD_ENFORCED_READ_ONLY,
        SHARING_PUBLIC_PASSWORD_ENFORCED_READ_WRITE,
        SHARING_PUBLIC_PASSWORD_ENFORCED_UPLOAD_ONLY,
    ] {
        add_column(conn, schema::CAPABILITIES_TABLE, column, "INTEGER DEFAULT NULL")?;
    }
    add_column(
        conn,
        LEGACY_SHARES_TABLE,
        schema::share::SHARE_WITH_ADDITIONAL_INFO,
        "TEXT",
    )
}

/// Copy every legacy share into the new table, then drop the legacy one.
fn step_26(conn: &Connection, _: &MigrationContext, _: &mut Journal) -> Result<()> {
    conn.execute(schema::CREATE_SHARES_TABLE, [])?;

    let legacy: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", LEGACY_SHARES_TABLE),
        [],
        |row| row.get(0),
    )?;
    let copied = conn.execute(
        &format!(
            "INSERT INTO {} ({cols}) SELECT {cols} FROM {}",
            schema::SHARES_TABLE,
            LEGACY_SHARES_TABLE,
            cols = SHARE_COPY_COLUMNS
        ),
        [],
    )?;
    if copied as i64 != legacy {
        return Err(Error::Migration {
            version: 26,
            message: format!("copied {} of {} legacy shares", copied, legacy),
        });
    }

    conn.execute(&format!("DROP TABLE {}", LEGACY_SHARES_TABLE), [])?;
    info!("Moved {} shares out of the legacy table", copied);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        create_baseline(&mut conn).unwrap();
        conn
    }

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_steps_are_contiguous() {
        let versions: Vec<u32> = steps().iter().map(|s| s.version).collect();
        let expected: Vec<u32> = (2..=CURRENT_VERSION).collect();
        assert_eq!(versions, expected);
    }

    #[test]
    fn test_fresh_database_created_at_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        let found = prepare(&mut conn, &MigrationContext::default()).unwrap();
        assert_eq!(found, 0);
        assert_eq!(stored_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(table_exists(&conn, schema::SHARES_TABLE));
        assert!(!table_exists(&conn, LEGACY_SHARES_TABLE));
        assert!(!table_exists(&conn, LEGACY_INSTANT_UPLOAD_TABLE));
    }

    #[test]
    fn test_partial_upgrade_stops_at_target() {
        let mut conn = baseline();
        let version = upgrade_to(&mut conn, &MigrationContext::default(), 13).unwrap();
        assert_eq!(version, 13);
        assert!(table_exists(&conn, schema::CAPABILITIES_TABLE));
        assert!(table_exists(&conn, LEGACY_INSTANT_UPLOAD_TABLE));
        assert!(!table_exists(&conn, schema::UPLOADS_TABLE));
    }

    #[test]
    fn test_step_3_marks_cached_files_synced() {
        let mut conn = baseline();
        conn.execute(
            "INSERT INTO filelist (filename, path, media_path, modified) VALUES ('a', '/a', '/sd/a', 7)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO filelist (filename, path, modified) VALUES ('b', '/b', 8)", [])
            .unwrap();
        upgrade_to(&mut conn, &MigrationContext::default(), 4).unwrap();

        let (sync_a, modified_a): (i64, i64) = conn
            .query_row(
                "SELECT last_sync_date_for_data, modified_at_last_sync_for_data FROM filelist WHERE path = '/a'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(sync_a > 0);
        assert_eq!(modified_a, 7);

        let modified_b: i64 = conn
            .query_row(
                "SELECT modified_at_last_sync_for_data FROM filelist WHERE path = '/b'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(modified_b, 0);
    }

    #[test]
    fn test_failed_step_is_fatal_and_keeps_version() {
        let mut conn = baseline();
        upgrade_to(&mut conn, &MigrationContext::default(), 12).unwrap();
        // a stray table makes step 13 fail
        conn.execute("CREATE TABLE capabilities (_id INTEGER PRIMARY KEY)", [])
            .unwrap();

        let err = upgrade_to(&mut conn, &MigrationContext::default(), CURRENT_VERSION).unwrap_err();
        assert!(matches!(err, Error::Migration { version: 13, .. }));
        assert_eq!(stored_version(&conn).unwrap(), 12);
    }

    #[test]
    fn test_newer_database_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 1).unwrap();
        assert!(matches!(
            prepare(&mut conn, &MigrationContext::default()),
            Err(Error::Migration { .. })
        ));
    }

    #[test]
    fn test_account_dir_name_encoding() {
        assert_eq!(account_dir_name("alice@cloud.example.com"), "alice@cloud.example.com");
        assert_eq!(account_dir_name("bob@host:8080/oc"), "bob@host%3A8080%2Foc");
        assert_eq!(account_dir_name("o'neil(x)!~*@host"), "o'neil(x)!~*@host");
        assert_eq!(account_dir_name("a b+c"), "a%20b%2Bc");
    }

    #[test]
    fn test_journal_revert_restores_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let from = temp.path().join("old");
        let to = temp.path().join("new");
        std::fs::create_dir(&from).unwrap();

        let mut journal = Journal::default();
        journal.rename_dir(&from, &to).unwrap();
        assert!(to.exists());

        journal.revert();
        assert!(from.exists());
        assert!(!to.exists());
        assert!(journal.is_empty());
    }
}
