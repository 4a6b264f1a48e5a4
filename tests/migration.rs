use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use syncstore::storage::migrate::{self, AccountRename, MigrationContext};
use syncstore::storage::schema::{self, CURRENT_VERSION};
use syncstore::{Error, FileStore, StoreOptions};
use tempfile::TempDir;

const TABLES: &[&str] = &[
    "filelist",
    "shares",
    "capabilities",
    "list_of_uploads",
    "user_avatars",
    "user_quotas",
    "camera_uploads_sync",
];

fn columns(conn: &Connection, table: &str) -> BTreeSet<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .map(|name| name.unwrap())
        .collect()
}

fn tables(conn: &Connection) -> BTreeSet<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .map(|name| name.unwrap())
        .collect()
}

/// A database at `version`, built from the oldest schema
fn legacy_db(path: &Path, version: u32) -> Connection {
    let mut conn = Connection::open(path).unwrap();
    migrate::create_baseline(&mut conn).unwrap();
    migrate::upgrade_to(&mut conn, &MigrationContext::default(), version).unwrap();
    conn
}

#[test]
fn upgraded_schema_matches_fresh_schema() {
    let temp = TempDir::new().unwrap();
    let fresh_path = temp.path().join("fresh.db");
    let old_path = temp.path().join("old.db");

    drop(FileStore::open(&fresh_path, StoreOptions::default()).unwrap());
    drop(legacy_db(&old_path, 1));
    let upgraded = FileStore::open(&old_path, StoreOptions::default()).unwrap();
    assert_eq!(upgraded.schema_version().unwrap(), CURRENT_VERSION);
    drop(upgraded);

    let fresh = Connection::open(&fresh_path).unwrap();
    let old = Connection::open(&old_path).unwrap();
    assert_eq!(tables(&fresh), tables(&old));
    for table in TABLES {
        assert_eq!(columns(&fresh, table), columns(&old, table), "columns of {}", table);
    }
}

#[test]
fn legacy_shares_survive_the_move() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("shares.db");

    let conn = legacy_db(&path, 25);
    conn.execute(
        r#"
        INSERT INTO ocshares (_id, share_type, path, token, owner_share, name, url)
        VALUES (7, 3, '/photos', 'tok', 'alice@host', 'holiday', 'https://host/s/tok')
        "#,
        [],
    )
    .unwrap();
    drop(conn);

    let store = FileStore::open(&path, StoreOptions::default()).unwrap();
    let shares = store.shares_for("alice@host", "/photos").unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].id, Some(7));
    assert_eq!(shares[0].token.as_deref(), Some("tok"));
    assert_eq!(shares[0].name.as_deref(), Some("holiday"));
    drop(store);

    let conn = Connection::open(&path).unwrap();
    assert!(!tables(&conn).contains(schema::LEGACY_SHARES_TABLE));
}

#[test]
fn account_rename_moves_rows_and_files() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("accounts.db");
    let storage_root = temp.path().join("storage");
    let old_dir = storage_root.join("alice");
    std::fs::create_dir_all(&old_dir).unwrap();
    std::fs::write(old_dir.join("photo.jpg"), b"jpeg").unwrap();

    let conn = legacy_db(&path, 9);
    conn.execute(
        "INSERT INTO filelist (filename, path, parent, content_type, media_path, file_owner) \
         VALUES ('photo.jpg', '/photo.jpg', 0, 'image/jpeg', ?1, 'alice')",
        [old_dir.join("photo.jpg").display().to_string()],
    )
    .unwrap();
    drop(conn);

    let options = StoreOptions::default().with_migration(MigrationContext {
        storage_root: Some(storage_root.clone()),
        account_renames: vec![AccountRename::new("alice", "alice@host")],
    });
    let store = FileStore::open(&path, options).unwrap();

    let new_dir = storage_root.join(migrate::account_dir_name("alice@host"));
    assert!(!old_dir.exists());
    assert!(new_dir.join("photo.jpg").exists());

    let file = store.file_by_path("alice@host", "/photo.jpg").unwrap().unwrap();
    assert_eq!(
        file.storage_path,
        Some(new_dir.join("photo.jpg").display().to_string())
    );
}

fn open_concurrently(path: &Path, threads: usize) {
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let barrier = barrier.clone();
            let path: PathBuf = path.to_path_buf();
            thread::spawn(move || {
                barrier.wait();
                FileStore::open(&path, StoreOptions::default())
                    .map(|store| store.schema_version().unwrap())
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), CURRENT_VERSION);
    }
}

#[test]
fn concurrent_opens_of_a_fresh_file_all_succeed() {
    let temp = TempDir::new().unwrap();
    for round in 0..10 {
        let path = temp.path().join(format!("fresh-{}.db", round));
        open_concurrently(&path, 4);
    }
}

#[test]
fn concurrent_opens_of_an_old_file_migrate_once() {
    let temp = TempDir::new().unwrap();
    for round in 0..10 {
        let path = temp.path().join(format!("old-{}.db", round));
        drop(legacy_db(&path, 1));
        open_concurrently(&path, 4);

        let conn = Connection::open(&path).unwrap();
        assert!(columns(&conn, "filelist").contains("etag"));
    }
}

#[test]
fn failed_account_rename_restores_rows_and_directories() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("accounts.db");
    let storage_root = temp.path().join("storage");
    for dir in ["alice", "bob", "bob@host"] {
        std::fs::create_dir_all(storage_root.join(dir)).unwrap();
    }

    let conn = legacy_db(&path, 9);
    conn.execute(
        "INSERT INTO filelist (filename, path, parent, content_type, file_owner) \
         VALUES ('a.txt', '/a.txt', 0, 'text/plain', 'alice')",
        [],
    )
    .unwrap();
    drop(conn);

    let options = StoreOptions::default().with_migration(MigrationContext {
        storage_root: Some(storage_root.clone()),
        account_renames: vec![
            AccountRename::new("alice", "alice@host"),
            AccountRename::new("bob", "bob@host"),
        ],
    });
    let err = FileStore::open(&path, options).unwrap_err();
    assert!(matches!(err, Error::Migration { version: 10, .. }));
    assert_eq!(err.to_string().matches("Migration to version").count(), 1);

    assert!(storage_root.join("alice").exists());
    assert!(!storage_root.join("alice@host").exists());
    assert!(storage_root.join("bob").exists());

    let conn = Connection::open(&path).unwrap();
    assert_eq!(migrate::stored_version(&conn).unwrap(), 9);
    let owner: String = conn
        .query_row("SELECT file_owner FROM filelist WHERE path = '/a.txt'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(owner, "alice");
}
