//! Upload retention
//!
//! Only the most recently completed succeeded uploads are kept; older
//! succeeded rows beyond the cap are deleted after every upload insert or
//! update. Rows in any other status are never touched.

use super::sqlite::StoreTx;
use crate::model::UploadStatus;
use crate::Result;
use rusqlite::{params, Connection};
use tracing::{debug, error};

/// Delete succeeded uploads beyond the `cap` most recently completed ones.
pub fn trim_succeeded_uploads(conn: &Connection, cap: usize) -> Result<usize> {
    let removed = conn.execute(
        r#"
        DELETE FROM list_of_uploads
        WHERE status = ?1
          AND _id NOT IN (
              SELECT _id FROM list_of_uploads
              WHERE status = ?1
              ORDER BY upload_end_timestamp DESC, _id DESC
              LIMIT ?2
          )
        "#,
        params![UploadStatus::Succeeded.code(), cap as i64],
    )?;
    Ok(removed)
}

impl StoreTx<'_> {
    /// Best effort: a failure is logged and undone, never returned
    pub(crate) fn trim_succeeded_uploads(&mut self) -> usize {
        let cap = self.options.max_succeeded_uploads;
        match self.savepoint("trim_uploads", |tx| trim_succeeded_uploads(tx.conn, cap)) {
            Ok(removed) => {
                if removed > 0 {
                    debug!("Trimmed {} succeeded uploads (cap {})", removed, cap);
                }
                removed
            }
            Err(e) => {
                error!("Failed to trim succeeded uploads: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{UploadRecord, UploadStatus};
    use crate::storage::{FileStore, StoreOptions};

    fn upload(status: UploadStatus, finished: i64) -> UploadRecord {
        let mut record = UploadRecord::new("alice@host", "/sd/f", "/f");
        record.status = status;
        record.upload_end_timestamp = finished;
        record
    }

    #[test]
    fn test_keeps_most_recent_succeeded() {
        let store =
            FileStore::open_in_memory(StoreOptions::default().with_max_succeeded_uploads(3))
                .unwrap();
        // completion order differs from insertion order
        for finished in [50, 10, 40, 20, 30] {
            store
                .insert_upload(&upload(UploadStatus::Succeeded, finished))
                .unwrap();
        }
        store.insert_upload(&upload(UploadStatus::Failed, 1)).unwrap();
        store.insert_upload(&upload(UploadStatus::InProgress, 0)).unwrap();

        let mut kept: Vec<i64> = store
            .uploads_with_status(UploadStatus::Succeeded)
            .unwrap()
            .into_iter()
            .map(|u| u.upload_end_timestamp)
            .collect();
        kept.sort();
        assert_eq!(kept, vec![30, 40, 50]);
        assert_eq!(store.uploads_with_status(UploadStatus::Failed).unwrap().len(), 1);
        assert_eq!(store.uploads_with_status(UploadStatus::InProgress).unwrap().len(), 1);
    }

    #[test]
    fn test_update_to_succeeded_trims() {
        let store =
            FileStore::open_in_memory(StoreOptions::default().with_max_succeeded_uploads(1))
                .unwrap();
        store.insert_upload(&upload(UploadStatus::Succeeded, 10)).unwrap();
        let pending = store
            .insert_upload(&upload(UploadStatus::InProgress, 0))
            .unwrap();

        let values = crate::row::RowValues::new()
            .with("status", UploadStatus::Succeeded.code())
            .with("upload_end_timestamp", 20i64);
        store.update(&pending.to_address_string(), &values, None).unwrap();

        let succeeded = store.uploads_with_status(UploadStatus::Succeeded).unwrap();
        assert_eq!(succeeded.len(), 1);
        assert_eq!(succeeded[0].upload_end_timestamp, 20);
    }
}
