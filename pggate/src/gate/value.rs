//! Bound values and returned rows.

use std::fmt::Display;

use bytes::Bytes;
use indexmap::IndexMap;

use super::ColumnId;

/// Value bound by the SQL layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Bytes),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

macro_rules! value_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value.into())
            }
        }

        impl From<$ty> for Expr {
            fn from(value: $ty) -> Self {
                Expr::Const(Value::from(value))
            }
        }
    };
}

value_from!(bool, Bool);
value_from!(i64, Int);
value_from!(i32, Int);
value_from!(i16, Int);
value_from!(f64, Float);
value_from!(String, Text);
value_from!(&str, Text);
value_from!(Bytes, Bytes);

/// Value or expression bound to a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant.
    Const(Value),
    /// Another column of the same row, e.g. `SET a = b`.
    Column(ColumnId),
}

impl Expr {
    pub fn null() -> Self {
        Expr::Const(Value::Null)
    }

    pub fn column(name: impl Into<ColumnId>) -> Self {
        Expr::Column(name.into())
    }

    /// Constant value, if this is one.
    pub fn as_const(&self) -> Option<&Value> {
        match self {
            Expr::Const(value) => Some(value),
            Expr::Column(_) => None,
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Const(value)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Const(value) => value.fmt(f),
            Expr::Column(column) => write!(f, "\"{}\"", column),
        }
    }
}

/// Row returned by the storage tier, e.g. for `RETURNING`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: IndexMap<ColumnId, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<ColumnId>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ColumnId, &Value)> {
        self.values.iter()
    }

    /// Keep only the requested columns, in the requested order.
    pub fn project(&self, columns: &[ColumnId]) -> Row {
        let mut row = Row::new();
        for column in columns {
            row.insert(
                column.clone(),
                self.get(column.as_str()).cloned().unwrap_or_default(),
            );
        }
        row
    }
}

impl<C: Into<ColumnId>, V: Into<Value>> FromIterator<(C, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (C, V)>>(iter: T) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}
