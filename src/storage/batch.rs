//! Batch operations
//!
//! A batch is an ordered list of inserts, updates and deletes applied as
//! one unit. Run through [`FileStore::apply_batch`](super::FileStore::apply_batch)
//! it is its own transaction; run through [`StoreTx::apply_batch`] inside an
//! open transaction it becomes a savepoint, so a failing nested batch undoes
//! only its own work before the error reaches the caller.

use super::sqlite::StoreTx;
use crate::address::ResourceAddress;
use crate::row::{RowValues, Selection, Value};
use crate::{Error, Result};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

/// One member of a batch.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub address: String,
    pub values: RowValues,
    pub selection: Option<Selection>,
    /// (column, index): set `column` from the result of an earlier
    /// operation of the same batch
    pub back_references: Vec<(String, usize)>,
}

impl Operation {
    fn new(kind: OperationKind, address: impl Into<String>, values: RowValues) -> Self {
        Self {
            kind,
            address: address.into(),
            values,
            selection: None,
            back_references: Vec::new(),
        }
    }

    pub fn insert(address: impl Into<String>, values: RowValues) -> Self {
        Self::new(OperationKind::Insert, address, values)
    }

    pub fn update(address: impl Into<String>, values: RowValues) -> Self {
        Self::new(OperationKind::Update, address, values)
    }

    pub fn delete(address: impl Into<String>) -> Self {
        Self::new(OperationKind::Delete, address, RowValues::new())
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Take `column` from the result of operation `index`: the row id for an
    /// insert, the affected count otherwise
    pub fn with_back_reference(mut self, column: impl Into<String>, index: usize) -> Self {
        self.back_references.push((column.into(), index));
        self
    }
}

/// Result of one batch member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationResult {
    Inserted(ResourceAddress),
    Affected(usize),
}

impl OperationResult {
    pub fn address(&self) -> Option<&ResourceAddress> {
        match self {
            OperationResult::Inserted(address) => Some(address),
            OperationResult::Affected(_) => None,
        }
    }

    pub fn count(&self) -> Option<usize> {
        match self {
            OperationResult::Inserted(_) => None,
            OperationResult::Affected(count) => Some(*count),
        }
    }

    /// Value a back reference to this result resolves to
    fn reference_value(&self) -> Option<i64> {
        match self {
            OperationResult::Inserted(address) => address.resource.id(),
            OperationResult::Affected(count) => Some(*count as i64),
        }
    }
}

impl StoreTx<'_> {
    /// Apply `operations` in order under a savepoint.
    ///
    /// On the first failure everything done by the batch is undone and the
    /// error is returned as [`Error::BatchFailure`] carrying the index.
    pub fn apply_batch(&mut self, operations: &[Operation]) -> Result<Vec<OperationResult>> {
        self.depth += 1;
        let name = format!("batch_{}", self.depth);
        debug!("Applying batch of {} operations (depth {})", operations.len(), self.depth);
        let outcome = self.savepoint(&name, |tx| tx.run_operations(operations));
        self.depth -= 1;
        outcome
    }

    fn run_operations(&mut self, operations: &[Operation]) -> Result<Vec<OperationResult>> {
        let mut results: Vec<OperationResult> = Vec::with_capacity(operations.len());
        for (index, operation) in operations.iter().enumerate() {
            let result = self
                .run_operation(operation, &results)
                .map_err(|e| Error::in_batch(index, e))?;
            results.push(result);
        }
        Ok(results)
    }

    fn run_operation(
        &mut self,
        operation: &Operation,
        previous: &[OperationResult],
    ) -> Result<OperationResult> {
        let address = self.router.route(&operation.address)?;

        let mut values = operation.values.clone();
        for (column, index) in &operation.back_references {
            let value = previous
                .get(*index)
                .and_then(OperationResult::reference_value)
                .ok_or_else(|| {
                    Error::ConstraintViolation(format!(
                        "back reference to operation {} is not available",
                        index
                    ))
                })?;
            values.put(column.clone(), Value::Integer(value));
        }

        let selection = operation.selection.as_ref();
        match operation.kind {
            OperationKind::Insert => self.insert(&address, &values).map(OperationResult::Inserted),
            OperationKind::Update => self
                .update(&address, &values, selection)
                .map(OperationResult::Affected),
            OperationKind::Delete => self.delete(&address, selection).map(OperationResult::Affected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileRecord;
    use crate::storage::{FileStore, StoreOptions};

    const ROOT: &str = "content://org.syncstore/";

    fn store() -> FileStore {
        FileStore::open_in_memory(StoreOptions::default()).unwrap()
    }

    #[test]
    fn test_batch_results_in_order() {
        let store = store();
        let ops = vec![
            Operation::insert(ROOT, FileRecord::folder("alice@host", "/docs/", 0).to_values()),
            Operation::insert(
                ROOT,
                FileRecord::file("alice@host", "/docs/a.txt", 0, "text/plain").to_values(),
            )
            .with_back_reference("parent", 0),
            Operation::update(ROOT, RowValues::new().with("etag", "x"))
                .with_selection(Selection::eq("file_owner", "alice@host")),
        ];

        let results = store.apply_batch(&ops).unwrap();
        assert_eq!(results.len(), 3);
        let folder = results[0].address().unwrap().resource.id().unwrap();
        let child = results[1].address().unwrap().resource.id().unwrap();
        assert_eq!(results[2], OperationResult::Affected(2));
        assert_eq!(store.file(child).unwrap().unwrap().parent_id, folder);
    }

    #[test]
    fn test_forward_back_reference_fails() {
        let store = store();
        let ops = vec![
            Operation::insert(ROOT, FileRecord::folder("alice@host", "/a/", 0).to_values())
                .with_back_reference("parent", 1),
        ];
        let err = store.apply_batch(&ops).unwrap_err();
        assert!(matches!(err, Error::BatchFailure { index: 0, .. }));
        assert!(store.file_by_path("alice@host", "/a/").unwrap().is_none());
    }

    #[test]
    fn test_nested_batch_failure_is_contained() {
        let store = store();
        let inserted = store
            .transaction(|tx| {
                let outer = vec![Operation::insert(
                    ROOT,
                    FileRecord::file("alice@host", "/kept.txt", 0, "text/plain").to_values(),
                )];
                tx.apply_batch(&outer)?;

                let inner = vec![
                    Operation::insert(
                        ROOT,
                        FileRecord::file("alice@host", "/dropped.txt", 0, "text/plain")
                            .to_values(),
                    ),
                    Operation::delete("content://org.syncstore/nowhere"),
                ];
                let failed = tx.apply_batch(&inner);
                assert!(matches!(failed, Err(Error::BatchFailure { index: 1, .. })));
                Ok(tx.pending_changes().len())
            })
            .unwrap();

        assert_eq!(inserted, 1);
        assert!(store.file_by_path("alice@host", "/kept.txt").unwrap().is_some());
        assert!(store.file_by_path("alice@host", "/dropped.txt").unwrap().is_none());
    }
}
