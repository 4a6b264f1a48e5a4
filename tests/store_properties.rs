use std::sync::Arc;
use std::thread;
use std::time::Duration;
use syncstore::model::{FileRecord, ShareRecord, ShareType, UploadRecord, UploadStatus};
use syncstore::storage::DEFAULT_MAX_SUCCEEDED_UPLOADS;
use syncstore::{Error, FileStore, Operation, QueryRequest, RowValues, Selection, StoreOptions};

const ROOT: &str = "content://org.syncstore/";
const ACCOUNT: &str = "alice@cloud.example.com";

fn store() -> FileStore {
    FileStore::open_in_memory(StoreOptions::default()).unwrap()
}

fn insert(store: &FileStore, record: FileRecord) -> i64 {
    store.insert_file(&record).unwrap().resource.id().unwrap()
}

#[test]
fn concurrent_inserts_of_one_file_create_one_row() {
    let store = Arc::new(store());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                store
                    .insert_file(&FileRecord::file(ACCOUNT, "/report.pdf", 0, "application/pdf"))
                    .unwrap()
            })
        })
        .collect();
    let addresses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    let rows = store
        .query(
            ROOT,
            &QueryRequest::new().selection(Selection::eq("path", "/report.pdf")),
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn deleting_a_folder_removes_its_subtree() {
    let store = store();
    let docs = insert(&store, FileRecord::folder(ACCOUNT, "/docs/", 0));
    let drafts = insert(&store, FileRecord::folder(ACCOUNT, "/docs/drafts/", docs));
    insert(&store, FileRecord::file(ACCOUNT, "/docs/drafts/a.txt", drafts, "text/plain"));
    insert(&store, FileRecord::file(ACCOUNT, "/docs/b.txt", docs, "text/plain"));
    let other = insert(&store, FileRecord::file(ACCOUNT, "/c.txt", 0, "text/plain"));

    let removed = store
        .delete(&format!("{}dir/{}", ROOT, docs), None)
        .unwrap();
    assert_eq!(removed, 4);
    assert!(store.file(docs).unwrap().is_none());
    assert!(store.file(drafts).unwrap().is_none());
    assert!(store.file(other).unwrap().is_some());
}

#[test]
fn failed_batch_leaves_no_trace() {
    let store = store();
    let ops = vec![
        Operation::insert(ROOT, FileRecord::file(ACCOUNT, "/a.txt", 0, "text/plain").to_values()),
        Operation::update(ROOT, RowValues::new().with("no_such_column", 1i64)),
    ];

    let err = store.apply_batch(&ops).unwrap_err();
    assert!(matches!(err, Error::BatchFailure { index: 1, .. }));
    assert!(store.file_by_path(ACCOUNT, "/a.txt").unwrap().is_none());
}

#[test]
fn succeeded_uploads_are_bounded() {
    let store = store();
    for finished in 1..=40i64 {
        let mut record = UploadRecord::new(ACCOUNT, format!("/sd/{}", finished), "/up");
        record.status = UploadStatus::Succeeded;
        record.upload_end_timestamp = finished;
        store.insert_upload(&record).unwrap();
    }
    let mut failed = UploadRecord::new(ACCOUNT, "/sd/failed", "/up");
    failed.status = UploadStatus::Failed;
    store.insert_upload(&failed).unwrap();

    let succeeded = store.uploads_with_status(UploadStatus::Succeeded).unwrap();
    assert_eq!(succeeded.len(), DEFAULT_MAX_SUCCEEDED_UPLOADS);
    assert!(succeeded.iter().all(|u| u.upload_end_timestamp > 10));
    assert_eq!(store.uploads_with_status(UploadStatus::Failed).unwrap().len(), 1);
}

#[test]
fn share_flags_are_tracked_per_kind() {
    let store = store();
    let folder = insert(&store, FileRecord::folder(ACCOUNT, "/photos/", 0));

    store
        .insert_share(&ShareRecord::new(ShareType::PublicLink, ACCOUNT, "/photos", 11))
        .unwrap();
    let flagged = store.file(folder).unwrap().unwrap();
    assert!(flagged.shared_via_link);
    assert!(!flagged.shared_with_sharee);

    store
        .insert_share(&ShareRecord::new(ShareType::User, ACCOUNT, "/photos", 12))
        .unwrap();
    store
        .delete(
            &format!("{}shares", ROOT),
            Some(&Selection::eq("share_type", ShareType::PublicLink.code())),
        )
        .unwrap();

    let flagged = store.file(folder).unwrap().unwrap();
    assert!(!flagged.shared_via_link);
    assert!(flagged.shared_with_sharee);
}

#[test]
fn observers_hear_changes_only_after_commit() {
    let store = store();
    let rx = store.subscribe(ROOT, true).unwrap();

    let address = store
        .transaction(|tx| {
            let root = tx.router().route(ROOT)?;
            let address = tx.insert(
                &root,
                &FileRecord::file(ACCOUNT, "/late.txt", 0, "text/plain").to_values(),
            )?;
            assert!(rx.try_recv().is_err());
            Ok(address)
        })
        .unwrap();

    let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(event.address, address);
}

#[test]
fn requery_sees_new_rows() {
    let store = store();
    insert(&store, FileRecord::file(ACCOUNT, "/one.txt", 0, "text/plain"));
    let rows = store
        .query(ROOT, &QueryRequest::new().columns(["name", "path"]))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.columns(), ["name".to_string(), "path".to_string()]);

    insert(&store, FileRecord::file(ACCOUNT, "/two.txt", 0, "text/plain"));
    let again = rows.requery(&store).unwrap();
    assert_eq!(again.len(), 2);
    assert_eq!(again.columns(), rows.columns());
}
