//! Table descriptors.
//!
//! Registered on the session by the catalog. The gateway
//! only reads them to find out which columns exist and which
//! ones make up the primary key.

use std::borrow::Borrow;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::ObjectId;

/// Column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColumnId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ColumnId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&ColumnId> for ColumnId {
    fn from(value: &ColumnId) -> Self {
        value.clone()
    }
}

impl Borrow<str> for ColumnId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column in a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDesc {
    pub id: ColumnId,
    pub nullable: bool,
    pub key: bool,
}

/// Table schema, as much as the gateway needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDesc {
    id: ObjectId,
    columns: Vec<ColumnDesc>,
    key: Vec<ColumnId>,
}

impl TableDesc {
    /// Table without columns. Add them with [`TableDesc::key_column`]
    /// and [`TableDesc::column`].
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            columns: vec![],
            key: vec![],
        }
    }

    /// Add a primary key column. Key order follows call order.
    pub fn key_column(mut self, name: impl Into<ColumnId>) -> Self {
        let id = name.into();
        self.key.push(id.clone());
        self.columns.push(ColumnDesc {
            id,
            nullable: false,
            key: true,
        });
        self
    }

    /// Add a regular column.
    pub fn column(mut self, name: impl Into<ColumnId>, nullable: bool) -> Self {
        self.columns.push(ColumnDesc {
            id: name.into(),
            nullable,
            key: false,
        });
        self
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    /// Primary key columns, in key order.
    pub fn key_columns(&self) -> &[ColumnId] {
        &self.key
    }

    pub fn column_desc(&self, column: &str) -> Option<&ColumnDesc> {
        self.columns.iter().find(|c| c.id.as_str() == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_desc(column).is_some()
    }

    pub fn is_key(&self, column: &str) -> bool {
        self.key.iter().any(|k| k.as_str() == column)
    }
}
