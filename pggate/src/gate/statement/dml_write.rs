//! INSERT, UPDATE and DELETE.
//!
//! The three write kinds share one protocol:
//!
//! 1. `allocate_write_request` resolves the table descriptor on the session
//!    and creates an empty request for the statement's kind,
//! 2. `bind_column` adds column bindings (key columns and, depending
//!    on the kind, values or filters),
//! 3. `prepare` checks the primary key is fully bound and encodes it
//!    in key order,
//! 4. `execute` hands the request to the session and records the outcome.
//!
//! Only allocation and the kind-specific checks differ; they live in
//! the [`insert`](super::insert), [`update`](super::update) and
//! [`delete`](super::delete) modules.

use std::sync::Arc;

use tracing::debug;

use super::{delete, insert, update, Statement, StatementState, StmtOp};
use crate::gate::{
    ColumnId, Error, Expr, ObjectId, Row, Session, TableDesc, Value, WriteOp, WriteOutcome,
    WriteRequest,
};

/// Write statement.
#[derive(Debug)]
pub struct DmlWrite {
    stmt: Statement,
    op: WriteOp,
    /// Table descriptor, snapshotted at allocation.
    table: Option<Arc<TableDesc>>,
    request: Option<WriteRequest>,
    returning: Option<Vec<ColumnId>>,
    outcome: Option<WriteOutcome>,
    error: Option<Error>,
}

impl DmlWrite {
    pub(crate) fn new(session: Session, table_id: ObjectId, op: WriteOp) -> Result<Self, Error> {
        Ok(Self {
            stmt: Statement::new(session, table_id, op.into())?,
            op,
            table: None,
            request: None,
            returning: None,
            outcome: None,
            error: None,
        })
    }

    /// Statement kind.
    pub fn stmt_op(&self) -> StmtOp {
        self.stmt.stmt_op()
    }

    /// Write kind.
    pub fn write_op(&self) -> WriteOp {
        self.op
    }

    pub fn statement(&self) -> &Statement {
        &self.stmt
    }

    pub fn session(&self) -> &Session {
        self.stmt.session()
    }

    pub fn table_id(&self) -> &ObjectId {
        self.stmt.table_id()
    }

    pub fn state(&self) -> StatementState {
        self.stmt.state()
    }

    /// Request being built. Gone once the statement executes.
    pub fn request(&self) -> Option<&WriteRequest> {
        self.request.as_ref()
    }

    /// Create the write request. Can be called once, first.
    ///
    /// Optional: binding or preparing a statement that has no
    /// request yet allocates one.
    pub fn allocate_write_request(&mut self) -> Result<(), Error> {
        if self.table.is_some() {
            return Err(Error::Allocation("write request already allocated"));
        }

        if self.stmt.state() != StatementState::Created {
            return Err(Error::Allocation("statement is past allocation"));
        }

        if !self.stmt.table_id().is_valid() {
            return Err(Error::Allocation("no valid target table"));
        }

        let table = self
            .session()
            .table(self.stmt.table_id())
            .ok_or_else(|| Error::UnknownTable(self.stmt.table_id().clone()))?;

        let stmt_id = self.stmt.id();
        let mut request = match self.op {
            WriteOp::Insert => insert::alloc_write_request(&table, stmt_id),
            WriteOp::Update => update::alloc_write_request(&table, stmt_id),
            WriteOp::Delete => delete::alloc_write_request(&table, stmt_id),
        };

        if let Some(ref returning) = self.returning {
            request.returning = returning.clone();
        }

        self.request = Some(request);
        self.table = Some(table);
        self.stmt
            .transition(StatementState::Created, StatementState::Bound, "allocate")
    }

    /// Bind a value or expression to a column.
    pub fn bind_column(
        &mut self,
        column: impl Into<ColumnId>,
        value: impl Into<Expr>,
    ) -> Result<(), Error> {
        self.allocate_on_demand()?;
        self.stmt.expect(StatementState::Bound, "bind")?;

        let column = column.into();
        let value = value.into();
        let (Some(table), Some(request)) = (self.table.as_ref(), self.request.as_mut()) else {
            return Err(Error::Allocation("write request not allocated"));
        };

        if !table.has_column(column.as_str()) {
            return Err(Error::UnknownColumn {
                table: table.id().clone(),
                column,
            });
        }

        if request.columns.contains_key(column.as_str()) {
            return Err(Error::DuplicateBinding(column));
        }

        let session = self.stmt.session();
        match self.op {
            WriteOp::Insert => insert::check_binding(session, table, &column, &value)?,
            WriteOp::Update => update::check_binding(session, table, &column, &value)?,
            WriteOp::Delete => delete::check_binding(session, table, &column, &value)?,
        }

        debug!(
            "{} statement {}: bind \"{}\" = {}",
            self.op,
            self.stmt.id(),
            column,
            value
        );
        request.columns.insert(column, value);

        Ok(())
    }

    /// Columns to return once the write is done (`RETURNING`).
    ///
    /// Can be set once, before the statement is prepared.
    pub fn set_returning_columns<I, C>(&mut self, columns: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnId>,
    {
        if self.returning.is_some()
            || !matches!(
                self.stmt.state(),
                StatementState::Created | StatementState::Bound
            )
        {
            return Err(Error::InvalidState {
                action: "set returning columns of",
                state: self.stmt.state(),
            });
        }

        let columns = columns.into_iter().map(Into::into).collect::<Vec<_>>();
        if let Some(ref mut request) = self.request {
            request.returning = columns.clone();
        }
        self.returning = Some(columns);

        Ok(())
    }

    /// Check the request is complete and encode the primary key.
    pub fn prepare(&mut self) -> Result<(), Error> {
        self.allocate_on_demand()?;
        self.stmt.expect(StatementState::Bound, "prepare")?;

        let (Some(table), Some(request)) = (self.table.as_ref(), self.request.as_mut()) else {
            return Err(Error::Allocation("write request not allocated"));
        };

        // A write must target exactly one row: the full key has to be bound.
        for column in table.key_columns() {
            match request.columns.get(column.as_str()) {
                None => return Err(Error::MissingKeyBinding(column.clone())),
                Some(Expr::Const(value)) if !value.is_null() => (),
                Some(_) => return Err(Error::InvalidKeyBinding(column.clone())),
            }
        }

        for column in &request.returning {
            if !table.has_column(column.as_str()) {
                return Err(Error::UnknownColumn {
                    table: table.id().clone(),
                    column: column.clone(),
                });
            }
        }

        match self.op {
            WriteOp::Insert => insert::check_prepared(table, request)?,
            WriteOp::Update => update::check_prepared(table, request)?,
            WriteOp::Delete => delete::check_prepared(table, request)?,
        }

        let key = table
            .key_columns()
            .iter()
            .map(|column| match request.columns.shift_remove(column.as_str()) {
                Some(Expr::Const(value)) => value,
                _ => Value::Null,
            })
            .collect();
        request.key = key;

        self.stmt
            .transition(StatementState::Bound, StatementState::Prepared, "prepare")
    }

    /// Send the request to the storage tier and wait for the result.
    ///
    /// Can only be called once. The outcome (or error) stays on the
    /// statement for later inspection.
    pub async fn execute(&mut self) -> Result<&WriteOutcome, Error> {
        self.stmt.expect(StatementState::Prepared, "execute")?;
        let request = self
            .request
            .take()
            .ok_or(Error::Allocation("write request not allocated"))?;
        let session = self.stmt.session().clone();

        self.stmt.advance(StatementState::Executing);
        let guard = Executing { write: &mut *self };
        let result = session.dispatch(request).await;
        guard.write.finish(result);
        drop(guard);

        match (&self.outcome, &self.error) {
            (Some(outcome), _) => Ok(outcome),
            (None, Some(error)) => Err(error.clone()),
            (None, None) => Err(Error::Cancelled),
        }
    }

    fn allocate_on_demand(&mut self) -> Result<(), Error> {
        if self.stmt.state() == StatementState::Created && self.request.is_none() {
            self.allocate_write_request()?;
        }
        Ok(())
    }

    /// Outcome of a completed statement.
    pub fn outcome(&self) -> Option<&WriteOutcome> {
        self.outcome.as_ref()
    }

    /// Rows returned by a completed `RETURNING` statement.
    pub fn returning_rows(&self) -> &[Row] {
        self.outcome
            .as_ref()
            .map(|outcome| outcome.rows.as_slice())
            .unwrap_or(&[])
    }

    pub fn rows_affected(&self) -> Option<u64> {
        self.outcome.as_ref().map(|outcome| outcome.rows_affected)
    }

    /// Error of a failed statement, exactly as it was returned.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn finish(&mut self, result: Result<WriteOutcome, Error>) {
        match result {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                self.stmt.advance(StatementState::Completed);
            }

            Err(err) => {
                self.error = Some(err);
                self.stmt.advance(StatementState::Failed);
            }
        }
    }
}

// Fails the statement if execute is abandoned
// before the session returns.
struct Executing<'a> {
    write: &'a mut DmlWrite,
}

impl Drop for Executing<'_> {
    fn drop(&mut self) {
        if self.write.stmt.state() == StatementState::Executing {
            self.write.finish(Err(Error::Cancelled));
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::gate::test::{orders, session, users, ScriptedStorage};
    use crate::gate::Delete;

    #[tokio::test]
    async fn test_allocate_twice() {
        let (session, _) = session();
        let mut delete = Delete::new(session, users().id().clone()).unwrap();

        delete.allocate_write_request().unwrap();
        assert_eq!(delete.state(), StatementState::Bound);
        assert!(matches!(
            delete.allocate_write_request(),
            Err(Error::Allocation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let (session, _) = session();
        let mut delete = Delete::new(session, ObjectId::new("app", "missing")).unwrap();

        assert_eq!(
            delete.allocate_write_request(),
            Err(Error::UnknownTable(ObjectId::new("app", "missing")))
        );
        assert_eq!(delete.state(), StatementState::Created);
    }

    #[tokio::test]
    async fn test_bind_allocates_request() {
        let (session, _) = session();
        let mut delete = Delete::new(session, users().id().clone()).unwrap();

        delete.bind_column("id", 42).unwrap();
        assert_eq!(delete.state(), StatementState::Bound);
        assert_eq!(delete.request().unwrap().columns.len(), 1);

        // Already allocated.
        assert!(matches!(
            delete.allocate_write_request(),
            Err(Error::Allocation(_))
        ));
    }

    #[tokio::test]
    async fn test_bind_unregistered_table() {
        let (session, _) = session();
        let mut delete = Delete::new(session, ObjectId::new("app", "missing")).unwrap();

        assert_eq!(
            delete.bind_column("id", 42),
            Err(Error::UnknownTable(ObjectId::new("app", "missing")))
        );
        assert_eq!(
            delete.prepare(),
            Err(Error::UnknownTable(ObjectId::new("app", "missing")))
        );
        assert_eq!(delete.state(), StatementState::Created);
    }

    #[tokio::test]
    async fn test_bind_unknown_column() {
        let (session, _) = session();
        let mut delete = Delete::new(session, users().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();

        assert!(matches!(
            delete.bind_column("nope", 1),
            Err(Error::UnknownColumn { .. })
        ));
    }

    #[tokio::test]
    async fn test_bind_after_prepare() {
        let (session, _) = session();
        let mut delete = Delete::new(session, users().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();
        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();

        assert_eq!(
            delete.bind_column("id", 43),
            Err(Error::InvalidState {
                action: "bind",
                state: StatementState::Prepared
            })
        );
        assert!(matches!(
            delete.set_returning_columns(["id"]),
            Err(Error::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_key_order_and_binding_order() {
        let (session, _) = session();
        session.register_table(orders()).unwrap();
        let mut delete = Delete::new(session, orders().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();

        // Bound out of key order.
        delete.bind_column("r", 2).unwrap();
        delete.bind_column("h", 1).unwrap();
        delete.prepare().unwrap();

        let request = delete.request().unwrap();
        assert_eq!(request.key, vec![Value::Int(1), Value::Int(2)]);
        assert!(request.columns.is_empty());
    }

    #[tokio::test]
    async fn test_partial_key() {
        let (session, _) = session();
        session.register_table(orders()).unwrap();
        let mut delete = Delete::new(session, orders().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();
        delete.bind_column("h", 1).unwrap();

        assert_eq!(
            delete.prepare(),
            Err(Error::MissingKeyBinding(ColumnId::from("r")))
        );
        assert_eq!(delete.state(), StatementState::Bound);

        // Still bindable after a failed prepare.
        delete.bind_column("r", 1).unwrap();
        delete.prepare().unwrap();
    }

    #[tokio::test]
    async fn test_null_and_expression_key() {
        let (session, _) = session();
        session.register_table(orders()).unwrap();

        let mut delete = Delete::new(session.clone(), orders().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();
        delete.bind_column("h", Expr::null()).unwrap();
        delete.bind_column("r", 1).unwrap();
        assert_eq!(
            delete.prepare(),
            Err(Error::InvalidKeyBinding(ColumnId::from("h")))
        );

        let mut delete = Delete::new(session, orders().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();
        delete.bind_column("h", 1).unwrap();
        delete.bind_column("r", Expr::column("h")).unwrap();
        assert_eq!(
            delete.prepare(),
            Err(Error::InvalidKeyBinding(ColumnId::from("r")))
        );
    }

    #[tokio::test]
    async fn test_returning_columns() {
        let (session, storage) = session();
        let mut delete = Delete::new(session, users().id().clone()).unwrap();

        // Before allocation is fine, it's copied into the request.
        delete.set_returning_columns(["id", "name"]).unwrap();
        assert!(matches!(
            delete.set_returning_columns(["email"]),
            Err(Error::InvalidState { .. })
        ));

        delete.allocate_write_request().unwrap();
        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();

        let mut row = Row::new();
        row.insert("id", 42);
        row.insert("name", "alice");
        storage.respond(Ok(WriteOutcome::with_rows(1, vec![row.clone()])));

        delete.execute().await.unwrap();
        assert_eq!(delete.returning_rows(), &[row]);
        assert_eq!(
            storage.requests()[0].returning,
            vec![ColumnId::from("id"), ColumnId::from("name")]
        );
    }

    #[tokio::test]
    async fn test_returning_unknown_column() {
        let (session, _) = session();
        let mut delete = Delete::new(session, users().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();
        delete.set_returning_columns(["nope"]).unwrap();
        delete.bind_column("id", 42).unwrap();

        assert!(matches!(
            delete.prepare(),
            Err(Error::UnknownColumn { .. })
        ));
    }

    #[tokio::test]
    async fn test_descriptor_snapshot() {
        let (session, _) = session();
        let mut delete = Delete::new(session.clone(), users().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();

        // Catalog changes the key after allocation.
        session
            .register_table(
                TableDesc::new(users().id().clone())
                    .key_column("email")
                    .column("id", false),
            )
            .unwrap();

        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();
        assert_eq!(delete.request().unwrap().key, vec![Value::Int(42)]);
    }

    #[tokio::test]
    async fn test_abandoned_execute() {
        let storage = ScriptedStorage::stalled();
        let session = Session::new(storage.clone());
        session.register_table(users()).unwrap();

        let mut delete = Delete::new(session.clone(), users().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();
        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();

        let result = tokio::time::timeout(Duration::from_millis(10), delete.execute()).await;
        assert!(result.is_err());

        assert_eq!(delete.state(), StatementState::Failed);
        assert_eq!(delete.error(), Some(&Error::Cancelled));
        assert!(delete.request().is_none());
        assert_eq!(session.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_session_closed_during_execute() {
        let storage = ScriptedStorage::stalled();
        let session = Session::new(storage.clone());
        session.register_table(users()).unwrap();

        let mut delete = Delete::new(session.clone(), users().id().clone()).unwrap();
        delete.allocate_write_request().unwrap();
        delete.bind_column("id", 42).unwrap();
        delete.prepare().unwrap();

        let closer = {
            let storage = storage.clone();
            let session = session.clone();
            tokio::spawn(async move {
                storage.wait_for_requests(1).await;
                session.close();
            })
        };

        assert_eq!(delete.execute().await, Err(Error::Cancelled));
        assert_eq!(delete.state(), StatementState::Failed);
        closer.await.unwrap();
    }
}
