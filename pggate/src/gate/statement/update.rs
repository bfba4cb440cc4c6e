//! UPDATE.

use std::ops::{Deref, DerefMut};

use super::{DmlWrite, StmtOp};
use crate::gate::{ColumnId, Error, Expr, ObjectId, Session, TableDesc, WriteOp, WriteRequest};

/// UPDATE statement. Changes one row, found by primary key.
#[derive(Debug)]
pub struct Update {
    write: DmlWrite,
}

impl Update {
    /// Create new UPDATE on the table.
    pub fn new(session: Session, table_id: ObjectId) -> Result<Self, Error> {
        Ok(Self {
            write: DmlWrite::new(session, table_id, WriteOp::Update)?,
        })
    }

    pub fn stmt_op(&self) -> StmtOp {
        StmtOp::Update
    }
}

impl Deref for Update {
    type Target = DmlWrite;

    fn deref(&self) -> &Self::Target {
        &self.write
    }
}

impl DerefMut for Update {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.write
    }
}

pub(super) fn alloc_write_request(table: &TableDesc, stmt_id: u64) -> WriteRequest {
    WriteRequest::new(table, WriteOp::Update, stmt_id, 0)
}

pub(super) fn check_binding(
    _session: &Session,
    table: &TableDesc,
    column: &ColumnId,
    value: &Expr,
) -> Result<(), Error> {
    if let Expr::Column(reference) = value {
        if !table.has_column(reference.as_str()) {
            return Err(Error::UnknownColumn {
                table: table.id().clone(),
                column: reference.clone(),
            });
        }
    }

    if let Some(desc) = table.column_desc(column.as_str()) {
        if !desc.nullable && !desc.key && value.as_const().is_some_and(|v| v.is_null()) {
            return Err(Error::InvalidArgument(format!(
                "column \"{}\" is not nullable",
                column
            )));
        }
    }

    Ok(())
}

pub(super) fn check_prepared(table: &TableDesc, request: &WriteRequest) -> Result<(), Error> {
    let assignments = request
        .columns
        .keys()
        .filter(|column| !table.is_key(column.as_str()))
        .count();

    if assignments == 0 {
        return Err(Error::NoAssignments);
    }

    Ok(())
}
