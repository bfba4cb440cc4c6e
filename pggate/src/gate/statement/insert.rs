//! INSERT.

use std::ops::{Deref, DerefMut};

use super::{DmlWrite, StmtOp};
use crate::gate::{ColumnId, Error, Expr, ObjectId, Session, TableDesc, WriteOp, WriteRequest};

/// INSERT statement. Writes one row.
#[derive(Debug)]
pub struct Insert {
    write: DmlWrite,
}

impl Insert {
    /// Create new INSERT into the table.
    pub fn new(session: Session, table_id: ObjectId) -> Result<Self, Error> {
        Ok(Self {
            write: DmlWrite::new(session, table_id, WriteOp::Insert)?,
        })
    }

    pub fn stmt_op(&self) -> StmtOp {
        StmtOp::Insert
    }
}

impl Deref for Insert {
    type Target = DmlWrite;

    fn deref(&self) -> &Self::Target {
        &self.write
    }
}

impl DerefMut for Insert {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.write
    }
}

pub(super) fn alloc_write_request(table: &TableDesc, stmt_id: u64) -> WriteRequest {
    let payload = table.columns().len() - table.key_columns().len();
    WriteRequest::new(table, WriteOp::Insert, stmt_id, payload)
}

pub(super) fn check_binding(
    _session: &Session,
    _table: &TableDesc,
    column: &ColumnId,
    value: &Expr,
) -> Result<(), Error> {
    // There is no existing row to reference.
    if value.as_const().is_none() {
        return Err(Error::InvalidArgument(format!(
            "INSERT value for column \"{}\" must be a constant",
            column
        )));
    }

    Ok(())
}

pub(super) fn check_prepared(table: &TableDesc, request: &WriteRequest) -> Result<(), Error> {
    for column in table.columns() {
        if column.key || column.nullable {
            continue;
        }

        match request.columns.get(column.id.as_str()) {
            Some(Expr::Const(value)) if !value.is_null() => (),
            _ => return Err(Error::MissingColumnBinding(column.id.clone())),
        }
    }

    Ok(())
}
