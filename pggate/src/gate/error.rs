//! Gateway errors.

use std::time::Duration;

use thiserror::Error;

use super::{ColumnId, ObjectId, StatementState};
use crate::storage::StorageError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("can't {action} statement in state {state}")]
    InvalidState {
        action: &'static str,
        state: StatementState,
    },

    #[error("column \"{0}\" is already bound")]
    DuplicateBinding(ColumnId),

    #[error("primary key column \"{0}\" is not bound")]
    MissingKeyBinding(ColumnId),

    #[error("primary key column \"{0}\" must be bound to a non-null constant")]
    InvalidKeyBinding(ColumnId),

    #[error("column \"{0}\" is not nullable and must be bound")]
    MissingColumnBinding(ColumnId),

    #[error("update doesn't set any columns")]
    NoAssignments,

    #[error("conditional delete is disabled, can't filter on column \"{0}\"")]
    ConditionalDeleteDisabled(ColumnId),

    #[error("write request allocation failed: {0}")]
    Allocation(&'static str),

    #[error("table \"{0}\" is not registered with the session")]
    UnknownTable(ObjectId),

    #[error("column \"{column}\" does not exist in table \"{table}\"")]
    UnknownColumn { table: ObjectId, column: ColumnId },

    #[error("cancelled")]
    Cancelled,

    #[error("storage didn't respond within {0:?}")]
    DispatchTimeout(Duration),

    #[error("transaction already in progress")]
    TransactionInProgress,

    #[error("no transaction in progress")]
    NoTransaction,

    #[error("{0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// The error came from the storage tier.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}
