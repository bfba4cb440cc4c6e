//! Storage tier interface.
//!
//! The session hands finished write requests to a [`Storage`]
//! implementation. How they reach the storage nodes (and in what
//! byte format) is up to the implementation.

pub mod memory;

use std::fmt::Display;

use async_trait::async_trait;
use thiserror::Error;

use crate::gate::{WriteOutcome, WriteRequest};

pub use memory::MemoryStorage;

/// Storage backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Execute a write request.
    async fn write(&self, request: &WriteRequest) -> Result<WriteOutcome, StorageError>;

    /// Finish a transaction started by the session.
    async fn finish(&self, _txn: u64, _commit: bool) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Storage failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Write conflicts with another write or an existing row.
    Conflict,
    /// Table or tablet doesn't exist.
    NotFound,
    /// Storage node can't serve the request right now.
    Unavailable,
    /// Anything else.
    Internal,
}

impl Display for StorageErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Conflict => "conflict",
            Self::NotFound => "not found",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        };
        f.write_str(kind)
    }
}

/// Error returned by the storage tier.
///
/// Passed through to the SQL layer without reinterpretation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("storage error ({kind}): {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl ToString) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }

    pub fn conflict(message: impl ToString) -> Self {
        Self::new(StorageErrorKind::Conflict, message)
    }

    pub fn not_found(message: impl ToString) -> Self {
        Self::new(StorageErrorKind::NotFound, message)
    }
}
