//! Statements.
//!
//! Every statement goes through the same lifecycle:
//!
//! ```text
//! Created -> Bound -> Prepared -> Executing -> Completed
//!                                           \-> Failed
//! ```
//!
//! Transitions only move forward. A statement is driven by exactly one
//! caller and does no locking of its own; the [`Session`] it holds is
//! the only thing shared with other statements.

pub mod delete;
pub mod dml_write;
pub mod insert;
pub mod update;

pub use delete::Delete;
pub use dml_write::DmlWrite;
pub use insert::Insert;
pub use update::Update;

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::{Error, ObjectId, Session};

static STATEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Statement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StmtOp {
    Select,
    Insert,
    Update,
    Delete,
}

impl Display for StmtOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(op)
    }
}

/// Statement lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatementState {
    Created,
    Bound,
    Prepared,
    Executing,
    Completed,
    Failed,
}

impl StatementState {
    /// Statement reached a final state.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Display for StatementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Created => "created",
            Self::Bound => "bound",
            Self::Prepared => "prepared",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(state)
    }
}

/// State shared by all statements: the session, the target table,
/// the kind and where the statement is in its lifecycle.
#[derive(Debug)]
pub struct Statement {
    session: Session,
    table_id: ObjectId,
    op: StmtOp,
    id: u64,
    state: StatementState,
}

impl Statement {
    /// Create new statement on a session.
    ///
    /// Fails if the session is closed or the table identifier is malformed.
    pub fn new(session: Session, table_id: ObjectId, op: StmtOp) -> Result<Self, Error> {
        if !session.is_usable() {
            return Err(Error::InvalidArgument(format!(
                "session {} is closed",
                session.id()
            )));
        }

        if !table_id.is_valid() {
            return Err(Error::InvalidArgument(format!(
                "malformed table identifier \"{}\"",
                table_id
            )));
        }

        let id = STATEMENT_ID.fetch_add(1, Ordering::Relaxed);
        debug!("{} statement {} created on \"{}\"", op, id, table_id);

        Ok(Self {
            session,
            table_id,
            op,
            id,
            state: StatementState::Created,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn table_id(&self) -> &ObjectId {
        &self.table_id
    }

    /// Statement kind. Fixed at construction.
    pub fn stmt_op(&self) -> StmtOp {
        self.op
    }

    /// Process-unique statement id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Fail unless the statement is in `state`.
    pub(crate) fn expect(&self, state: StatementState, action: &'static str) -> Result<(), Error> {
        if self.state != state {
            return Err(Error::InvalidState {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Move from `from` to `to`.
    pub(crate) fn transition(
        &mut self,
        from: StatementState,
        to: StatementState,
        action: &'static str,
    ) -> Result<(), Error> {
        self.expect(from, action)?;
        self.advance(to);
        Ok(())
    }

    /// Move forward, no matter where the statement is now.
    pub(crate) fn advance(&mut self, to: StatementState) {
        debug_assert!(to > self.state, "{} -> {}", self.state, to);
        debug!(
            "{} statement {}: {} -> {}",
            self.op, self.id, self.state, to
        );
        self.state = to;
    }
}
