//! Store and account registry
//!
//! An explicit, caller-owned replacement for a process-wide store cache:
//! - each database path is opened at most once, under one lock, so two call
//!   sites can never run migrations on the same file at the same time
//! - root folder ids map to the account that owns them, for routing
//!   per-account requests

use crate::storage::{FileStore, StoreOptions};
use crate::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

pub struct StoreRegistry {
    options: StoreOptions,
    stores: Mutex<HashMap<PathBuf, Arc<FileStore>>>,
    roots: RwLock<HashMap<i64, String>>,
}

impl StoreRegistry {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            stores: Mutex::new(HashMap::new()),
            roots: RwLock::new(HashMap::new()),
        }
    }

    /// Shared store for `path`, opening (and migrating) it on first use
    pub fn open(&self, path: &Path) -> Result<Arc<FileStore>> {
        let key = std::path::absolute(path)?;
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(store) = stores.get(&key) {
            return Ok(store.clone());
        }

        debug!("Registering store {}", key.display());
        let store = Arc::new(FileStore::open(&key, self.options.clone())?);
        stores.insert(key, store.clone());
        Ok(store)
    }

    /// Forget a store; it closes once the last caller drops it
    pub fn close(&self, path: &Path) -> Result<bool> {
        let key = std::path::absolute(path)?;
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        Ok(stores.remove(&key).is_some())
    }

    pub fn open_count(&self) -> usize {
        self.stores.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Record that the root folder `root_id` belongs to `account`
    pub fn register_root(&self, root_id: i64, account: impl Into<String>) {
        self.roots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(root_id, account.into());
    }

    pub fn account_for_root(&self, root_id: i64) -> Option<String> {
        self.roots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&root_id)
            .cloned()
    }

    pub fn unregister_root(&self, root_id: i64) -> Option<String> {
        self.roots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&root_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_path_opened_once() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("store.db");
        let registry = StoreRegistry::new(StoreOptions::default());

        let first = registry.open(&db).unwrap();
        let second = registry.open(&db).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.open_count(), 1);

        assert!(registry.close(&db).unwrap());
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_root_accounts() {
        let registry = StoreRegistry::new(StoreOptions::default());
        registry.register_root(1, "alice@host");
        registry.register_root(7, "bob@host");
        assert_eq!(registry.account_for_root(7).as_deref(), Some("bob@host"));
        assert_eq!(registry.unregister_root(1).as_deref(), Some("alice@host"));
        assert!(registry.account_for_root(1).is_none());
    }

    #[test]
    fn test_concurrent_opens_share_one_store() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("store.db");
        let registry = Arc::new(StoreRegistry::new(StoreOptions::default()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                let db = db.clone();
                std::thread::spawn(move || registry.open(&db).unwrap())
            })
            .collect();
        let stores: Vec<Arc<FileStore>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(stores.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(stores[0].schema_version().unwrap(), crate::storage::schema::CURRENT_VERSION);
    }
}
