//! Insert / query / update / delete against routed tables
//!
//! Selections are always parameterized: a clause must come with its
//! argument list and the number of `?` placeholders must match it. Clause
//! text uses storage column names; projections and sort orders accept the
//! external names of the table's projection map as well.

use super::schema::{self, file, share, TableDef, FILES, ID};
use super::sqlite::StoreTx;
use crate::address::{Resource, ResourceAddress};
use crate::model::ShareType;
use crate::row::{QueryRequest, Row, RowSet, RowValues, Selection, Value};
use crate::{Error, Result};
use regex::Regex;
use rusqlite::{params, params_from_iter, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// One `ORDER BY` term: column, optional collation, optional direction
const SORT_TERM: &str =
    r"(?i)^\s*([A-Za-z_][A-Za-z0-9_]*)(\s+COLLATE\s+(?:NOCASE|BINARY|RTRIM))?(\s+(?:ASC|DESC))?\s*$";

fn sort_term_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let compiled = Regex::new(SORT_TERM).map_err(|e| Error::InvalidSortOrder(e.to_string()))?;
    Ok(PATTERN.get_or_init(|| compiled))
}

/// Validate a caller sort order and rewrite it with storage column names
fn sort_clause(table: &TableDef, order: &str) -> Result<String> {
    let pattern = sort_term_pattern()?;
    let invalid = || Error::InvalidSortOrder(order.to_string());

    let mut terms = Vec::new();
    for term in order.split(',') {
        let caps = pattern.captures(term).ok_or_else(invalid)?;
        let column = table.resolve(&caps[1]).map_err(|_| invalid())?;
        terms.push(format!(
            "{}{}{}",
            column,
            caps.get(2).map_or("", |m| m.as_str()),
            caps.get(3).map_or("", |m| m.as_str())
        ));
    }
    Ok(terms.join(", "))
}

/// Count positional placeholders in a selection clause.
///
/// Quoted literals are skipped. Numbered or named parameters, statement
/// separators and comments are rejected.
fn count_placeholders(clause: &str) -> Result<usize> {
    let unsafe_clause = || Error::UnsafeSelection(clause.to_string());
    let mut count = 0;
    let mut quote: Option<char> = None;
    let mut chars = clause.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '?' => {
                if chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                    return Err(unsafe_clause());
                }
                count += 1;
            }
            ':' | '@' | '$' => {
                if chars.peek().is_some_and(|n| n.is_alphabetic() || *n == '_') {
                    return Err(unsafe_clause());
                }
            }
            ';' => return Err(unsafe_clause()),
            '-' if chars.peek() == Some(&'-') => return Err(unsafe_clause()),
            '/' if chars.peek() == Some(&'*') => return Err(unsafe_clause()),
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(unsafe_clause());
    }
    Ok(count)
}

/// WHERE clause assembled from an address id and a caller selection
#[derive(Debug, Default)]
struct Filter {
    clauses: Vec<String>,
    args: Vec<Value>,
}

impl Filter {
    fn new() -> Self {
        Self::default()
    }

    fn with_id(mut self, column: &str, id: Option<i64>) -> Self {
        if let Some(id) = id {
            self.clauses.push(format!("{} = ?", column));
            self.args.push(Value::Integer(id));
        }
        self
    }

    fn with_selection(mut self, selection: Option<&Selection>) -> Result<Self> {
        let Some(selection) = selection else {
            return Ok(self);
        };
        let clause = selection.clause.trim();
        let args = selection.args.as_deref();

        if clause.is_empty() {
            if args.is_some_and(|a| !a.is_empty()) {
                return Err(Error::UnsafeSelection(
                    "arguments given without a selection".to_string(),
                ));
            }
            return Ok(self);
        }

        let Some(args) = args else {
            return Err(Error::UnsafeSelection(clause.to_string()));
        };
        let expected = count_placeholders(clause)?;
        if expected != args.len() {
            return Err(Error::UnsafeSelection(format!(
                "{} expects {} arguments, got {}",
                clause,
                expected,
                args.len()
            )));
        }

        self.clauses.push(format!("({})", clause));
        self.args.extend(args.iter().cloned());
        Ok(self)
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Map a write map's external names to storage columns; later entries for
/// the same storage column win.
fn storage_columns<'v>(
    table: &TableDef,
    values: &'v RowValues,
) -> Result<Vec<(&'static str, &'v Value)>> {
    let mut columns: Vec<(&'static str, &'v Value)> = Vec::with_capacity(values.len());
    for (name, value) in values.iter() {
        let column = table.resolve(name)?;
        match columns.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => columns.push((column, value)),
        }
    }
    Ok(columns)
}

fn column_value<'v>(columns: &[(&'static str, &'v Value)], name: &str) -> Option<&'v Value> {
    columns.iter().find(|(c, _)| *c == name).map(|(_, v)| *v)
}

fn constraint_error(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(err, message)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::ConstraintViolation(message.clone().unwrap_or_else(|| err.to_string()))
        }
        _ => e.into(),
    }
}

impl StoreTx<'_> {
    fn check(&self, address: &ResourceAddress) -> Result<()> {
        if address.authority != self.router.authority() {
            return Err(Error::UnknownResource(address.to_string()));
        }
        Ok(())
    }

    // ========== Insert ==========

    /// Insert a row and return its address.
    ///
    /// Files are looked up by (path, owner) first; an existing row wins and
    /// its address is returned without writing anything.
    pub fn insert(&mut self, address: &ResourceAddress, values: &RowValues) -> Result<ResourceAddress> {
        self.check(address)?;
        let table = schema::table_for(&address.resource);
        let columns = storage_columns(table, values)?;

        match address.resource {
            Resource::Root | Resource::File(_) => self.insert_file(address, &columns),
            Resource::Directory(_) => Err(Error::UnknownResource(format!(
                "{} does not accept inserts",
                address
            ))),
            Resource::Shares(_) => {
                let inserted = self.insert_row(table, address, &columns)?;
                self.flag_shared_file(&columns)?;
                Ok(inserted)
            }
            Resource::Uploads(_) => {
                let inserted = self.insert_row(table, address, &columns)?;
                self.trim_succeeded_uploads();
                Ok(inserted)
            }
            Resource::Capabilities(_) | Resource::CameraUploadsSync(_) | Resource::Quotas(_) => {
                self.insert_row(table, address, &columns)
            }
        }
    }

    fn insert_file(
        &mut self,
        address: &ResourceAddress,
        columns: &[(&'static str, &Value)],
    ) -> Result<ResourceAddress> {
        let path = column_value(columns, file::PATH).cloned().unwrap_or(Value::Null);
        let owner = column_value(columns, file::ACCOUNT_OWNER)
            .cloned()
            .unwrap_or(Value::Null);

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT _id FROM filelist WHERE path IS ?1 AND file_owner IS ?2 ORDER BY _id LIMIT 1",
                params![path, owner],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            debug!("File {:?} already stored as row {}", path, id);
            return Ok(self.router.address(Resource::File(Some(id))));
        }

        self.insert_row(&FILES, address, columns)
    }

    fn insert_row(
        &mut self,
        table: &TableDef,
        address: &ResourceAddress,
        columns: &[(&'static str, &Value)],
    ) -> Result<ResourceAddress> {
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table.name)
        } else {
            let names: Vec<&str> = columns.iter().map(|(c, _)| *c).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.name,
                names.join(", "),
                placeholders
            )
        };
        self.conn
            .execute(&sql, params_from_iter(columns.iter().map(|(_, v)| *v)))
            .map_err(constraint_error)?;

        let inserted = address.with_id(self.conn.last_insert_rowid());
        self.signal(inserted.clone());
        Ok(inserted)
    }

    /// Set the file flag matching a newly inserted share's type
    fn flag_shared_file(&mut self, columns: &[(&'static str, &Value)]) -> Result<()> {
        let share_type = column_value(columns, share::SHARE_TYPE)
            .and_then(Value::as_i64)
            .and_then(ShareType::from_code);
        let (Some(share_type), Some(path), Some(owner)) = (
            share_type,
            column_value(columns, share::PATH),
            column_value(columns, share::ACCOUNT_OWNER),
        ) else {
            return Ok(());
        };

        let flag = if share_type.is_sharee() {
            file::SHARED_WITH_SHAREE
        } else {
            file::SHARED_VIA_LINK
        };
        let updated = self.conn.execute(
            &format!(
                "UPDATE filelist SET {} = 1 WHERE (path = ?1 OR path = ?1 || '/') AND file_owner = ?2",
                flag
            ),
            params![path, owner],
        )?;
        if updated > 0 {
            self.signal(self.router.address(Resource::Root));
        }
        Ok(())
    }

    // ========== Query ==========

    /// Query a resource into a snapshot.
    ///
    /// `file/{id}` selects one row, `dir/{id}` lists the folder's children.
    pub fn query(&self, address: &ResourceAddress, request: &QueryRequest) -> Result<RowSet> {
        self.check(address)?;
        let table = schema::table_for(&address.resource);

        let external = match &request.projection {
            Some(columns) if !columns.is_empty() => columns.clone(),
            _ => table.default_projection(),
        };
        let mut select = Vec::with_capacity(external.len());
        for name in &external {
            let column = table.resolve(name)?;
            if column == name.as_str() {
                select.push(column.to_string());
            } else {
                select.push(format!("{} AS {}", column, name));
            }
        }

        let id_column = match address.resource {
            Resource::Directory(None) => {
                return Err(Error::MissingResourceId(address.to_string()));
            }
            Resource::Directory(_) => file::PARENT,
            _ => ID,
        };
        let filter = Filter::new()
            .with_id(id_column, address.resource.id())
            .with_selection(request.selection.as_ref())?;

        let order = match request.sort_order.as_deref() {
            Some(order) if !order.trim().is_empty() => sort_clause(table, order)?,
            _ => table.default_sort.to_string(),
        };

        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            select.join(", "),
            table.name,
            filter.where_sql(),
            order
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let width = external.len();
        let columns: Arc<[String]> = external.into();

        let mut rows = stmt.query(params_from_iter(filter.args.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(Value::from_sql_ref(row.get_ref(i)?));
            }
            out.push(Row::new(columns.clone(), values));
        }

        Ok(RowSet::new(address.clone(), request.clone(), columns, out))
    }

    /// Owner of a file row, if the row exists
    pub(crate) fn file_owner(&self, id: i64) -> Result<Option<String>> {
        let owner: Option<Option<String>> = self
            .conn
            .query_row("SELECT file_owner FROM filelist WHERE _id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(owner.flatten())
    }

    /// Lowest id in `table` matching `selection`
    pub(crate) fn find_id(&self, table: &str, selection: &Selection) -> Result<Option<i64>> {
        let filter = Filter::new().with_selection(Some(selection))?;
        let sql = format!(
            "SELECT _id FROM {}{} ORDER BY _id LIMIT 1",
            table,
            filter.where_sql()
        );
        Ok(self
            .conn
            .query_row(&sql, params_from_iter(filter.args.iter()), |row| row.get(0))
            .optional()?)
    }

    // ========== Update ==========

    /// Update rows and return how many changed.
    ///
    /// Folder updates are accepted and ignored; aggregate folder sizes are
    /// not recomputed here.
    pub fn update(
        &mut self,
        address: &ResourceAddress,
        values: &RowValues,
        selection: Option<&Selection>,
    ) -> Result<usize> {
        self.check(address)?;
        if let Resource::Directory(_) = address.resource {
            debug!("Ignoring update of folder {}", address);
            return Ok(0);
        }

        let table = schema::table_for(&address.resource);
        let columns = storage_columns(table, values)?;
        let filter = Filter::new()
            .with_id(ID, address.resource.id())
            .with_selection(selection)?;

        let count = if columns.is_empty() {
            0
        } else {
            let sets: Vec<String> = columns.iter().map(|(c, _)| format!("{} = ?", c)).collect();
            let sql = format!(
                "UPDATE {} SET {}{}",
                table.name,
                sets.join(", "),
                filter.where_sql()
            );
            let params = columns.iter().map(|(_, v)| *v).chain(filter.args.iter());
            self.conn
                .execute(&sql, params_from_iter(params))
                .map_err(constraint_error)?
        };

        if let Resource::Uploads(_) = address.resource {
            self.trim_succeeded_uploads();
        }
        if count > 0 {
            self.signal(address.clone());
        }
        Ok(count)
    }

    // ========== Delete ==========

    /// Delete rows and return how many were removed.
    ///
    /// `dir/{id}` removes the folder and its whole subtree; the count covers
    /// every removed row at every depth.
    pub fn delete(&mut self, address: &ResourceAddress, selection: Option<&Selection>) -> Result<usize> {
        self.check(address)?;
        let count = match address.resource {
            Resource::File(None) | Resource::Directory(None) => {
                return Err(Error::MissingResourceId(address.to_string()));
            }
            Resource::File(Some(id)) => self.delete_rows(&FILES, Some(id), selection)?,
            Resource::Directory(Some(id)) => self.delete_directory(id, selection)?,
            Resource::Shares(id) => self.delete_shares(id, selection)?,
            resource => self.delete_rows(schema::table_for(&resource), resource.id(), selection)?,
        };

        debug!("Deleted {} rows at {}", count, address);
        if count > 0 {
            self.signal(address.clone());
        }
        Ok(count)
    }

    fn delete_rows(&self, table: &TableDef, id: Option<i64>, selection: Option<&Selection>) -> Result<usize> {
        let filter = Filter::new().with_id(ID, id).with_selection(selection)?;
        let sql = format!("DELETE FROM {}{}", table.name, filter.where_sql());
        Ok(self.conn.execute(&sql, params_from_iter(filter.args.iter()))?)
    }

    fn delete_directory(&self, id: i64, selection: Option<&Selection>) -> Result<usize> {
        let filter = Filter::new().with_id(ID, Some(id)).with_selection(selection)?;
        let matching: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM filelist{}", filter.where_sql()),
            params_from_iter(filter.args.iter()),
            |row| row.get(0),
        )?;
        if matching == 0 {
            return Ok(0);
        }

        let mut visited = HashSet::new();
        self.delete_subtree(id, &mut visited)
    }

    /// Depth-first: children first, then the folder's own row
    fn delete_subtree(&self, id: i64, visited: &mut HashSet<i64>) -> Result<usize> {
        if !visited.insert(id) {
            return Ok(0);
        }

        let children: Vec<(i64, bool)> = {
            let mut stmt = self.conn.prepare(
                "SELECT _id, content_type = 'DIR' FROM filelist WHERE parent = ?1 AND _id != ?1",
            )?;
            let rows = stmt.query_map([id], |row| {
                Ok((row.get(0)?, row.get::<_, Option<bool>>(1)?.unwrap_or(false)))
            })?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut count = 0;
        for (child, is_folder) in children {
            count += if is_folder {
                self.delete_subtree(child, visited)?
            } else {
                self.conn.execute("DELETE FROM filelist WHERE _id = ?1", [child])?
            };
        }
        count += self.conn.execute("DELETE FROM filelist WHERE _id = ?1", [id])?;
        Ok(count)
    }

    /// Delete shares, then recompute the flags of the files they covered
    fn delete_shares(&mut self, id: Option<i64>, selection: Option<&Selection>) -> Result<usize> {
        let filter = Filter::new().with_id(ID, id).with_selection(selection)?;
        let targets: Vec<(Option<String>, Option<String>)> = {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT DISTINCT path, owner_share FROM shares{}",
                filter.where_sql()
            ))?;
            let rows = stmt.query_map(params_from_iter(filter.args.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let count = self.conn.execute(
            &format!("DELETE FROM shares{}", filter.where_sql()),
            params_from_iter(filter.args.iter()),
        )?;

        let mut flagged = 0;
        for (path, owner) in targets {
            flagged += self.recompute_share_flags(path.as_deref(), owner.as_deref())?;
        }
        if flagged > 0 {
            self.signal(self.router.address(Resource::Root));
        }
        Ok(count)
    }

    fn recompute_share_flags(&self, path: Option<&str>, owner: Option<&str>) -> Result<usize> {
        let sql = format!(
            r#"
            UPDATE filelist SET
                share_by_link = EXISTS (
                    SELECT 1 FROM shares s
                    WHERE s.owner_share = filelist.file_owner
                      AND (s.path = filelist.path OR s.path || '/' = filelist.path)
                      AND s.share_type = {link}
                ),
                shared_via_users = EXISTS (
                    SELECT 1 FROM shares s
                    WHERE s.owner_share = filelist.file_owner
                      AND (s.path = filelist.path OR s.path || '/' = filelist.path)
                      AND s.share_type IN ({user}, {group}, {federated})
                )
            WHERE (path = ?1 OR path = ?1 || '/') AND file_owner = ?2
            "#,
            link = ShareType::PublicLink.code(),
            user = ShareType::User.code(),
            group = ShareType::Group.code(),
            federated = ShareType::Federated.code(),
        );
        Ok(self.conn.execute(&sql, params![path, owner])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileRecord, ShareRecord};
    use crate::storage::{FileStore, StoreOptions};

    const ROOT: &str = "content://org.syncstore/";

    fn store() -> FileStore {
        FileStore::open_in_memory(StoreOptions::default()).unwrap()
    }

    fn insert(store: &FileStore, record: FileRecord) -> i64 {
        store.insert_file(&record).unwrap().resource.id().unwrap()
    }

    #[test]
    fn test_count_placeholders() {
        assert_eq!(count_placeholders("path = ? AND file_owner = ?").unwrap(), 2);
        assert_eq!(count_placeholders("filename = '?' AND _id = ?").unwrap(), 1);
        assert!(count_placeholders("_id = ?1").is_err());
        assert!(count_placeholders("_id = :id").is_err());
        assert!(count_placeholders("1 = 1; DROP TABLE filelist").is_err());
        assert!(count_placeholders("1 = 1 -- comment").is_err());
        assert!(count_placeholders("filename = 'open").is_err());
    }

    #[test]
    fn test_sort_clause() {
        assert_eq!(
            sort_clause(&FILES, "name COLLATE NOCASE DESC, _id").unwrap(),
            "filename COLLATE NOCASE DESC, _id"
        );
        assert!(matches!(
            sort_clause(&FILES, "filename; DROP TABLE filelist"),
            Err(Error::InvalidSortOrder(_))
        ));
        assert!(sort_clause(&FILES, "unknown_column").is_err());
    }

    #[test]
    fn test_duplicate_insert_returns_existing_address() {
        let store = store();
        let values = FileRecord::file("alice@host", "/a.txt", 0, "text/plain").to_values();
        let first = store.insert(ROOT, &values).unwrap();
        let second = store.insert("content://org.syncstore/file", &values).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.stats().unwrap().files, 1);

        // same path, other account
        let other = FileRecord::file("bob@host", "/a.txt", 0, "text/plain").to_values();
        assert_ne!(store.insert(ROOT, &other).unwrap(), first);
    }

    #[test]
    fn test_query_projection_selection_and_id() {
        let store = store();
        let id = insert(&store, FileRecord::file("alice@host", "/a.txt", 0, "text/plain"));
        insert(&store, FileRecord::file("alice@host", "/b.txt", 0, "text/plain"));

        let request = QueryRequest::new()
            .columns(["_id", "storage_path", "account_owner"])
            .selection(Selection::eq("path", "/a.txt"));
        let rows = store.query(ROOT, &request).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.columns(), ["_id", "storage_path", "account_owner"]);
        assert_eq!(rows.first().unwrap().get_str("account_owner"), Some("alice@host"));

        let single = store
            .query(&format!("content://org.syncstore/file/{}", id), &QueryRequest::new())
            .unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.first().unwrap().get_str("filename"), Some("a.txt"));
    }

    #[test]
    fn test_query_rejects_unsafe_input() {
        let store = store();
        let no_args = QueryRequest::new().selection(Selection::new("path = '/a.txt'"));
        assert!(matches!(store.query(ROOT, &no_args), Err(Error::UnsafeSelection(_))));

        let mismatch =
            QueryRequest::new().selection(Selection::new("path = ? AND _id = ?").arg("/a"));
        assert!(matches!(store.query(ROOT, &mismatch), Err(Error::UnsafeSelection(_))));

        let bad_column = QueryRequest::new().columns(["nope"]);
        assert!(matches!(
            store.query(ROOT, &bad_column),
            Err(Error::InvalidColumn { .. })
        ));

        let bad_sort = QueryRequest::new().sort_order("filename DESC LIMIT 1");
        assert!(matches!(store.query(ROOT, &bad_sort), Err(Error::InvalidSortOrder(_))));

        assert!(matches!(
            store.query("content://org.syncstore/bogus", &QueryRequest::new()),
            Err(Error::UnknownResource(_))
        ));
    }

    #[test]
    fn test_update_by_id_and_directory_noop() {
        let store = store();
        let dir = insert(&store, FileRecord::folder("alice@host", "/docs/", 0));
        let id = insert(&store, FileRecord::file("alice@host", "/docs/a.txt", dir, "text/plain"));

        let values = RowValues::new().with("etag", "e1");
        let count = store
            .update(&format!("content://org.syncstore/file/{}", id), &values, None)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.file(id).unwrap().unwrap().etag.as_deref(), Some("e1"));

        let count = store
            .update(&format!("content://org.syncstore/dir/{}", dir), &values, None)
            .unwrap();
        assert_eq!(count, 0);
        assert!(store.file(dir).unwrap().unwrap().etag.is_none());

        // nothing matched is a zero count, not an error
        let count = store
            .update("content://org.syncstore/file/999", &values, None)
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_delete_single_file_with_extra_predicate() {
        let store = store();
        let id = insert(&store, FileRecord::file("alice@host", "/a.txt", 0, "text/plain"));
        let address = format!("content://org.syncstore/file/{}", id);

        let wrong_owner = Selection::eq("file_owner", "bob@host");
        assert_eq!(store.delete(&address, Some(&wrong_owner)).unwrap(), 0);
        assert_eq!(store.delete(&address, None).unwrap(), 1);
        assert!(store.file(id).unwrap().is_none());

        assert!(matches!(
            store.delete("content://org.syncstore/file", None),
            Err(Error::MissingResourceId(_))
        ));
    }

    #[test]
    fn test_share_delete_recomputes_flags() {
        let store = store();
        let id = insert(&store, FileRecord::folder("alice@host", "/docs/", 0));
        let link = store
            .insert_share(&ShareRecord::new(ShareType::PublicLink, "alice@host", "/docs", 1))
            .unwrap();
        store
            .insert_share(&ShareRecord::new(ShareType::User, "alice@host", "/docs", 2))
            .unwrap();

        let folder = store.file(id).unwrap().unwrap();
        assert!(folder.shared_via_link);
        assert!(folder.shared_with_sharee);

        assert_eq!(store.delete(&link.to_address_string(), None).unwrap(), 1);
        let folder = store.file(id).unwrap().unwrap();
        assert!(!folder.shared_via_link);
        assert!(folder.shared_with_sharee);
    }

    #[test]
    fn test_directory_insert_rejected() {
        let store = store();
        let values = FileRecord::folder("alice@host", "/x/", 0).to_values();
        assert!(matches!(
            store.insert("content://org.syncstore/dir", &values),
            Err(Error::UnknownResource(_))
        ));
    }

    #[test]
    fn test_directory_query_requires_id() {
        let store = store();
        insert(&store, FileRecord::file("alice@host", "/a.txt", 0, "text/plain"));
        assert!(matches!(
            store.query("content://org.syncstore/dir", &QueryRequest::new()),
            Err(Error::MissingResourceId(_))
        ));
        assert!(matches!(
            store.delete("content://org.syncstore/dir", None),
            Err(Error::MissingResourceId(_))
        ));
    }
}
