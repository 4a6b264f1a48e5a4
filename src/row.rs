//! Row abstractions shared by every resource kind
//!
//! - `RowValues`: ordered column -> value map used for inserts and updates
//! - `Row`: one snapshot row returned by a query
//! - `RowSet`: a finite snapshot that can be iterated any number of times
//!   and re-queried against the store

use crate::address::ResourceAddress;
use crate::storage::FileStore;
use crate::Result;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::sync::Arc;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Real(v) => Some(*v as i64),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Booleans are stored as integers; anything non-zero is true
    pub fn as_bool(&self) -> Option<bool> {
        self.as_i64().map(|v| v != 0)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn from_sql_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Ordered column -> value map for writes. Later `put`s of the same column
/// replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValues {
    entries: Vec<(String, Value)>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RowValues::put`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(column, value);
        self
    }

    pub fn put(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(c, _)| c == column)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }
}

/// One row of a query result. A copy; it never reflects later writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_string(&self, column: &str) -> Option<String> {
        self.get_str(column).map(str::to_string)
    }

    pub fn get_bool(&self, column: &str) -> bool {
        self.get(column).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Column/value pairs, for JSON output
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.clone(), serde_json::to_value(v).unwrap_or(serde_json::Value::Null)))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Predicate text plus its positional arguments.
///
/// A clause without an argument list is rejected by the store; use
/// [`Selection::no_args`] for clauses that need no placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub clause: String,
    pub args: Option<Vec<Value>>,
}

impl Selection {
    pub fn new(clause: impl Into<String>) -> Self {
        Self {
            clause: clause.into(),
            args: None,
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.get_or_insert_with(Vec::new).push(value.into());
        self
    }

    /// Mark the clause as complete without placeholders
    pub fn no_args(mut self) -> Self {
        self.args.get_or_insert_with(Vec::new);
        self
    }

    /// Shorthand for `column = ?`
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(format!("{} = ?", column)).arg(value)
    }
}

/// Parameters of a query: projection, selection and sort order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    /// External column names; `None` selects every projected column
    pub projection: Option<Vec<String>>,
    pub selection: Option<Selection>,
    /// `None` uses the resource's default order
    pub sort_order: Option<String>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn sort_order(mut self, order: impl Into<String>) -> Self {
        self.sort_order = Some(order.into());
        self
    }
}

/// Finite, restartable result of a query.
#[derive(Debug, Clone)]
pub struct RowSet {
    address: ResourceAddress,
    request: QueryRequest,
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl RowSet {
    pub(crate) fn new(
        address: ResourceAddress,
        request: QueryRequest,
        columns: Arc<[String]>,
        rows: Vec<Row>,
    ) -> Self {
        Self {
            address,
            request,
            columns,
            rows,
        }
    }

    /// Address this row set was produced from
    pub fn address(&self) -> &ResourceAddress {
        &self.address
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Iterate from the start; may be called any number of times
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Run the originating query again and return the fresh snapshot
    pub fn requery(&self, store: &FileStore) -> Result<RowSet> {
        store.query(&self.address.to_address_string(), &self.request)
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_values_replace() {
        let mut values = RowValues::new().with("filename", "a.txt").with("parent", 1i64);
        values.put("filename", "b.txt");
        assert_eq!(values.len(), 2);
        assert_eq!(values.get_str("filename"), Some("b.txt"));
        assert_eq!(values.get_i64("parent"), Some(1));
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<String> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Integer(3));
        assert_eq!(Value::from(true), Value::Integer(1));
    }

    #[test]
    fn test_selection_args() {
        assert_eq!(Selection::new("x = 1").args, None);
        assert_eq!(Selection::new("x = 1").no_args().args, Some(vec![]));
        let sel = Selection::eq("path", "/a");
        assert_eq!(sel.clause, "path = ?");
        assert_eq!(sel.args, Some(vec![Value::Text("/a".to_string())]));
    }
}
