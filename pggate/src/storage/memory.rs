//! In-process storage.
//!
//! Keeps rows in memory, keyed by primary key. Good enough to run
//! the gateway end to end without a cluster, e.g. in tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fnv::FnvHashMap as HashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use super::{Storage, StorageError, StorageErrorKind};
use crate::gate::{Expr, ObjectId, Row, TableDesc, Value, WriteOp, WriteOutcome, WriteRequest};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Bytes(Bytes),
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => KeyPart::Null,
            Value::Bool(b) => KeyPart::Bool(*b),
            Value::Int(i) => KeyPart::Int(*i),
            Value::Float(f) => KeyPart::Float(f.to_bits()),
            Value::Text(s) => KeyPart::Text(s.clone()),
            Value::Bytes(b) => KeyPart::Bytes(b.clone()),
        }
    }
}

type Key = Vec<KeyPart>;

#[derive(Debug)]
struct Table {
    desc: TableDesc,
    rows: IndexMap<Key, Row>,
}

impl Table {
    fn key(&self, request: &WriteRequest) -> Result<Key, StorageError> {
        if request.key.len() != self.desc.key_columns().len() {
            return Err(StorageError::new(
                StorageErrorKind::Internal,
                format!(
                    "expected {} key values for \"{}\", got {}",
                    self.desc.key_columns().len(),
                    self.desc.id(),
                    request.key.len()
                ),
            ));
        }

        Ok(request.key.iter().map(KeyPart::from).collect())
    }

    fn insert(&mut self, request: &WriteRequest) -> Result<WriteOutcome, StorageError> {
        let key = self.key(request)?;
        if self.rows.contains_key(&key) {
            return Err(StorageError::conflict(format!(
                "duplicate key value violates unique constraint on \"{}\"",
                self.desc.id()
            )));
        }

        let mut row = Row::new();
        let mut key_values = request.key.iter();
        for column in self.desc.columns() {
            let value = if column.key {
                key_values.next().cloned().unwrap_or_default()
            } else {
                request
                    .columns
                    .get(column.id.as_str())
                    .map(|expr| eval(expr, &row))
                    .unwrap_or_default()
            };
            row.insert(column.id.clone(), value);
        }

        let returned = returning(request, &row);
        self.rows.insert(key, row);

        Ok(WriteOutcome::with_rows(1, returned))
    }

    fn update(&mut self, request: &WriteRequest) -> Result<WriteOutcome, StorageError> {
        let key = self.key(request)?;
        let Some(row) = self.rows.get_mut(&key) else {
            return Ok(WriteOutcome::new(0));
        };

        let before = row.clone();
        for (column, expr) in &request.columns {
            row.insert(column.clone(), eval(expr, &before));
        }

        Ok(WriteOutcome::with_rows(1, returning(request, row)))
    }

    fn delete(&mut self, request: &WriteRequest) -> Result<WriteOutcome, StorageError> {
        let key = self.key(request)?;
        let Some(row) = self.rows.get(&key) else {
            return Ok(WriteOutcome::new(0));
        };

        // Non-key bindings on a delete are equality filters.
        let matches = request.columns.iter().all(|(column, expr)| {
            let expected = eval(expr, row);
            match row.get(column.as_str()) {
                Some(actual) if !actual.is_null() && !expected.is_null() => *actual == expected,
                _ => false,
            }
        });

        if !matches {
            return Ok(WriteOutcome::new(0));
        }

        let returned = returning(request, row);
        self.rows.shift_remove(&key);

        Ok(WriteOutcome::with_rows(1, returned))
    }
}

fn eval(expr: &Expr, row: &Row) -> Value {
    match expr {
        Expr::Const(value) => value.clone(),
        Expr::Column(column) => row.get(column.as_str()).cloned().unwrap_or_default(),
    }
}

fn returning(request: &WriteRequest, row: &Row) -> Vec<Row> {
    if request.has_returning() {
        vec![row.project(&request.returning)]
    } else {
        vec![]
    }
}

/// Storage that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<HashMap<ObjectId, Table>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create an empty table. Replaces existing table with the same id.
    pub fn create_table(&self, desc: &TableDesc) {
        self.tables.lock().insert(
            desc.id().clone(),
            Table {
                desc: desc.clone(),
                rows: IndexMap::new(),
            },
        );
    }

    /// Fetch a row by primary key.
    pub fn get(&self, table: &ObjectId, key: &[Value]) -> Option<Row> {
        let key: Key = key.iter().map(KeyPart::from).collect();
        self.tables
            .lock()
            .get(table)
            .and_then(|t| t.rows.get(&key).cloned())
    }

    /// Number of rows in a table.
    pub fn len(&self, table: &ObjectId) -> usize {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn write(&self, request: &WriteRequest) -> Result<WriteOutcome, StorageError> {
        let mut tables = self.tables.lock();
        let table = tables
            .get_mut(&request.table_id)
            .ok_or_else(|| StorageError::not_found(format!("table \"{}\"", request.table_id)))?;

        let outcome = match request.op {
            WriteOp::Insert => table.insert(request),
            WriteOp::Update => table.update(request),
            WriteOp::Delete => table.delete(request),
        }?;

        debug!(
            "memory storage {} on \"{}\" [rows: {}]",
            request.op, request.table_id, outcome.rows_affected
        );

        Ok(outcome)
    }
}
