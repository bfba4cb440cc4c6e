//! Storage write request.

use std::fmt::Display;

use indexmap::IndexMap;

use super::{ColumnId, Expr, ObjectId, Row, StmtOp, TableDesc, Value};

/// Kind of write. Each kind allocates its own request
/// and adds its own checks on top of the shared DML lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
}

impl WriteOp {
    /// All write kinds.
    pub fn all() -> [WriteOp; 3] {
        [WriteOp::Insert, WriteOp::Update, WriteOp::Delete]
    }
}

impl From<WriteOp> for StmtOp {
    fn from(op: WriteOp) -> Self {
        match op {
            WriteOp::Insert => StmtOp::Insert,
            WriteOp::Update => StmtOp::Update,
            WriteOp::Delete => StmtOp::Delete,
        }
    }
}

impl Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        StmtOp::from(*self).fmt(f)
    }
}

/// Write request handed to the session for dispatch.
///
/// Owned by exactly one statement, filled in by bind calls,
/// consumed by execute.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Target table, copied when the request was allocated.
    pub table_id: ObjectId,
    /// Write kind.
    pub op: WriteOp,
    /// Statement that built this request.
    pub stmt_id: u64,
    /// Primary key values, in key order. Set by prepare.
    pub key: Vec<Value>,
    /// Non-key bindings, in binding order.
    ///
    /// For INSERT and UPDATE, these are the column values.
    /// For DELETE, they are equality filters on the row.
    pub columns: IndexMap<ColumnId, Expr>,
    /// Columns the storage should send back.
    pub returning: Vec<ColumnId>,
    /// Position in the session's dispatch order.
    pub sequence: Option<u64>,
    /// Transaction this write belongs to, if any.
    pub txn: Option<u64>,
}

impl WriteRequest {
    pub(crate) fn new(table: &TableDesc, op: WriteOp, stmt_id: u64, capacity: usize) -> Self {
        Self {
            table_id: table.id().clone(),
            op,
            stmt_id,
            key: Vec::with_capacity(table.key_columns().len()),
            columns: IndexMap::with_capacity(capacity),
            returning: vec![],
            sequence: None,
            txn: None,
        }
    }

    /// Statement is a RETURNING statement.
    pub fn has_returning(&self) -> bool {
        !self.returning.is_empty()
    }
}

/// Result of a write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteOutcome {
    /// Rows inserted, updated or deleted.
    pub rows_affected: u64,
    /// Rows requested with RETURNING.
    pub rows: Vec<Row>,
}

impl WriteOutcome {
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            rows: vec![],
        }
    }

    pub fn with_rows(rows_affected: u64, rows: Vec<Row>) -> Self {
        Self {
            rows_affected,
            rows,
        }
    }
}
