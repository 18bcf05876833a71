//! # Cell types
//! The closed set of column types, and the values that can be stored in, or
//! compared against, their cells.

use std::fmt;

use crate::table::Table;

/// The declared type of a column. Every typed accessor checks the addressed
/// column against this before touching storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Bool,
    Float,
    Double,
    String,
    Binary,
    DateTime,
    Table,
    Mixed,
    Link,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "int",
            DataType::Bool => "bool",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::String => "string",
            DataType::Binary => "binary",
            DataType::DateTime => "datetime",
            DataType::Table => "table",
            DataType::Mixed => "mixed",
            DataType::Link => "link",
        };
        f.write_str(name)
    }
}

/// Seconds since the unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(i64);

impl DateTime {
    pub fn new(seconds: i64) -> Self {
        DateTime(seconds)
    }

    pub fn seconds(self) -> i64 {
        self.0
    }
}

impl From<i64> for DateTime {
    fn from(seconds: i64) -> Self {
        DateTime(seconds)
    }
}

/// A dynamically typed cell, stored in [`DataType::Mixed`] columns.
#[derive(Clone, Debug, PartialEq)]
pub enum Mixed {
    Int(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    DateTime(DateTime),
    Table(Box<Table>),
}

impl Mixed {
    pub fn data_type(&self) -> DataType {
        match self {
            Mixed::Int(_) => DataType::Int,
            Mixed::Bool(_) => DataType::Bool,
            Mixed::Float(_) => DataType::Float,
            Mixed::Double(_) => DataType::Double,
            Mixed::String(_) => DataType::String,
            Mixed::Binary(_) => DataType::Binary,
            Mixed::DateTime(_) => DataType::DateTime,
            Mixed::Table(_) => DataType::Table,
        }
    }
}

impl Default for Mixed {
    fn default() -> Self {
        Mixed::Int(0)
    }
}

/// A value for any column type.
/// - Used as the operand of query conditions (scalar variants only).
/// - Used to append whole rows with [`Table::append_row`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    DateTime(DateTime),
    Table(Table),
    Mixed(Mixed),
    Link(Option<usize>),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Bool(_) => DataType::Bool,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::Binary(_) => DataType::Binary,
            Value::DateTime(_) => DataType::DateTime,
            Value::Table(_) => DataType::Table,
            Value::Mixed(_) => DataType::Mixed,
            Value::Link(_) => DataType::Link,
        }
    }
}

macro_rules! value_from {
    ($($from:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$from> for Value {
                fn from(v: $from) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    i64 => Int,
    i32 => Int,
    bool => Bool,
    f32 => Float,
    f64 => Double,
    String => String,
    &str => String,
    Vec<u8> => Binary,
    &[u8] => Binary,
    DateTime => DateTime,
    Table => Table,
    Mixed => Mixed,
}
