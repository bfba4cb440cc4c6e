//! DELETE.
//!
//! Removes the row matching the bound primary key. Nothing but the key
//! is needed; non-key bindings become equality filters on the row, if
//! the session allows conditional deletes.
//!
//! A delete without the full key is rejected at prepare. Deleting every
//! row of a table is not something this statement will do by accident.

use std::ops::{Deref, DerefMut};

use super::{DmlWrite, StmtOp};
use crate::gate::{ColumnId, Error, Expr, ObjectId, Session, TableDesc, WriteOp, WriteRequest};

/// DELETE statement.
#[derive(Debug)]
pub struct Delete {
    write: DmlWrite,
}

impl Delete {
    /// Create new DELETE on the table.
    pub fn new(session: Session, table_id: ObjectId) -> Result<Self, Error> {
        Ok(Self {
            write: DmlWrite::new(session, table_id, WriteOp::Delete)?,
        })
    }

    pub fn stmt_op(&self) -> StmtOp {
        StmtOp::Delete
    }
}

impl Deref for Delete {
    type Target = DmlWrite;

    fn deref(&self) -> &Self::Target {
        &self.write
    }
}

impl DerefMut for Delete {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.write
    }
}

pub(super) fn alloc_write_request(table: &TableDesc, stmt_id: u64) -> WriteRequest {
    // No row payload, key only.
    WriteRequest::new(table, WriteOp::Delete, stmt_id, 0)
}

pub(super) fn check_binding(
    session: &Session,
    table: &TableDesc,
    column: &ColumnId,
    value: &Expr,
) -> Result<(), Error> {
    if !table.is_key(column.as_str()) && !session.conditional_delete() {
        return Err(Error::ConditionalDeleteDisabled(column.clone()));
    }

    if let Expr::Column(reference) = value {
        if !table.has_column(reference.as_str()) {
            return Err(Error::UnknownColumn {
                table: table.id().clone(),
                column: reference.clone(),
            });
        }
    }

    Ok(())
}

pub(super) fn check_prepared(_table: &TableDesc, _request: &WriteRequest) -> Result<(), Error> {
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gate::test::{session, users, ScriptedStorage};
    use crate::gate::{StatementState, Value, WriteOutcome};
    use crate::storage::StorageError;

    fn users_delete(session: &Session) -> Delete {
        Delete::new(session.clone(), ObjectId::new("app", "users")).unwrap()
    }

    #[tokio::test]
    async fn test_prepare_without_bindings() {
        let (session, storage) = session();
        let mut delete = users_delete(&session);

        assert_eq!(
            delete.prepare(),
            Err(Error::MissingKeyBinding(ColumnId::from("id")))
        );
        assert_eq!(delete.state(), StatementState::Bound);
        assert!(storage.requests().is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_explicit_allocation() {
        let (session, storage) = session();
        let mut delete = users_delete(&session);

        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();
        assert_eq!(delete.state(), StatementState::Prepared);

        storage.respond(Ok(WriteOutcome::new(0)));
        assert_eq!(delete.execute().await.unwrap().rows_affected, 0);
        assert_eq!(delete.state(), StatementState::Completed);
        assert!(delete.returning_rows().is_empty());

        let requests = storage.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].op, WriteOp::Delete);
        assert_eq!(requests[0].key, vec![Value::Int(42)]);
    }

    #[tokio::test]
    async fn test_allocate_defaults() {
        let (session, _) = session();
        let mut delete = users_delete(&session);
        assert_eq!(delete.stmt_op(), StmtOp::Delete);
        assert_eq!(delete.write_op(), WriteOp::Delete);

        delete.allocate_write_request().unwrap();
        let request = delete.request().unwrap();
        assert_eq!(request.op, WriteOp::Delete);
        assert_eq!(request.table_id, ObjectId::new("app", "users"));
        assert!(request.columns.is_empty());
        assert!(request.returning.is_empty());
        assert!(request.key.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_key() {
        let (session, storage) = session();
        let mut delete = users_delete(&session);
        delete.allocate_write_request().unwrap();
        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();
        assert_eq!(delete.state(), StatementState::Prepared);

        storage.respond(Ok(WriteOutcome::new(0)));
        let outcome = delete.execute().await.unwrap();
        assert_eq!(outcome.rows_affected, 0);

        assert_eq!(delete.state(), StatementState::Completed);
        assert!(delete.returning_rows().is_empty());
        assert_eq!(delete.rows_affected(), Some(0));

        let requests = storage.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].op, WriteOp::Delete);
        assert_eq!(requests[0].key, vec![Value::Int(42)]);
    }

    #[tokio::test]
    async fn test_storage_error() {
        let (session, storage) = session();
        let conflict = StorageError::conflict("conflicts with higher priority transaction");
        storage.respond(Err(conflict.clone()));

        let mut delete = users_delete(&session);
        delete.allocate_write_request().unwrap();
        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();

        assert_eq!(
            delete.execute().await,
            Err(Error::Storage(conflict.clone()))
        );
        assert_eq!(delete.state(), StatementState::Failed);
        assert_eq!(delete.error(), Some(&Error::Storage(conflict)));
        assert!(delete.outcome().is_none());
        assert!(delete.request().is_none());
        assert!(delete.returning_rows().is_empty());
    }

    #[tokio::test]
    async fn test_execute_twice() {
        let (session, storage) = session();
        storage.respond(Ok(WriteOutcome::new(1)));

        let mut delete = users_delete(&session);
        delete.allocate_write_request().unwrap();
        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();
        delete.execute().await.unwrap();

        assert_eq!(
            delete.execute().await,
            Err(Error::InvalidState {
                action: "execute",
                state: StatementState::Completed,
            })
        );
        assert_eq!(delete.rows_affected(), Some(1));
        assert_eq!(delete.state(), StatementState::Completed);
        assert_eq!(storage.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_binding() {
        let (session, _) = session();
        let mut delete = users_delete(&session);
        delete.allocate_write_request().unwrap();
        delete.bind_column("id", 42).unwrap();

        // Same value or not, it's a duplicate.
        assert_eq!(
            delete.bind_column("id", 42),
            Err(Error::DuplicateBinding(ColumnId::from("id")))
        );
        assert_eq!(
            delete.bind_column("id", 7),
            Err(Error::DuplicateBinding(ColumnId::from("id")))
        );
    }

    #[tokio::test]
    async fn test_conditional_delete_disabled() {
        let (session, _) = session();
        let mut delete = users_delete(&session);
        delete.allocate_write_request().unwrap();

        assert_eq!(
            delete.bind_column("name", "alice"),
            Err(Error::ConditionalDeleteDisabled(ColumnId::from("name")))
        );
    }

    #[tokio::test]
    async fn test_conditional_delete() {
        let storage = ScriptedStorage::new();
        let session = Session::builder(storage.clone())
            .conditional_delete(true)
            .build();
        session.register_table(users()).unwrap();

        let mut delete = users_delete(&session);
        delete.allocate_write_request().unwrap();
        delete.bind_column("name", "alice").unwrap();
        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();

        let request = delete.request().unwrap();
        assert_eq!(request.key, vec![Value::Int(42)]);
        assert_eq!(request.columns.len(), 1);
        assert_eq!(request.columns.get("name"), Some(&Expr::from("alice")));

        // Filter referencing a column the table doesn't have.
        let mut delete = users_delete(&session);
        assert_eq!(
            delete.bind_column("name", Expr::column("nope")),
            Err(Error::UnknownColumn {
                table: users().id().clone(),
                column: ColumnId::from("nope"),
            })
        );
        delete.bind_column("name", Expr::column("email")).unwrap();

        // Filters alone don't make a key.
        let mut delete = users_delete(&session);
        delete.allocate_write_request().unwrap();
        delete.bind_column("name", "alice").unwrap();
        assert_eq!(
            delete.prepare(),
            Err(Error::MissingKeyBinding(ColumnId::from("id")))
        );
    }
}
