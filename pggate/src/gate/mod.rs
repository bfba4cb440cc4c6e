//! Write gateway.
//!
//! Turns bound SQL write statements into storage write requests,
//! dispatches them through a shared [`Session`] and reports the
//! outcome back in terms the SQL layer understands.
//!
//! ```text
//! SQL layer --> Delete/Insert/Update --> DmlWrite --> WriteRequest --> Session --> Storage
//! ```

pub mod error;
pub mod object_id;
pub mod request;
pub mod session;
pub mod statement;
pub mod table;
pub mod value;

#[cfg(test)]
pub(crate) mod test;

pub use error::Error;
pub use object_id::ObjectId;
pub use request::{WriteOp, WriteOutcome, WriteRequest};
pub use session::{MetricsHook, Session};
pub use statement::{Delete, DmlWrite, Insert, Statement, StatementState, StmtOp, Update};
pub use table::{ColumnDesc, ColumnId, TableDesc};
pub use value::{Expr, Row, Value};
