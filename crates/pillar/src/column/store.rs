//! # Type-erased column storage
//! One variant per [`DataType`], used by tables for the structural operations
//! that do not care about the cell type.

use std::cmp::Ordering;

use super::{BasicColumn, Column};
use crate::{
    error::Result,
    group::TableKey,
    table::Table,
    types::{DataType, DateTime, Mixed},
};

#[derive(Clone, Debug, PartialEq)]
pub enum ColumnStore {
    Int(BasicColumn<i64>),
    Bool(BasicColumn<bool>),
    Float(BasicColumn<f32>),
    Double(BasicColumn<f64>),
    String(BasicColumn<String>),
    Binary(BasicColumn<Vec<u8>>),
    DateTime(BasicColumn<DateTime>),
    Table(BasicColumn<Table>),
    Mixed(BasicColumn<Mixed>),
    Link {
        target: TableKey,
        cells: BasicColumn<Option<usize>>,
    },
}

/// Apply the same expression to whichever [`BasicColumn`] is inside.
macro_rules! each_column {
    ($store:expr, $col:ident => $body:expr) => {
        match $store {
            ColumnStore::Int($col) => $body,
            ColumnStore::Bool($col) => $body,
            ColumnStore::Float($col) => $body,
            ColumnStore::Double($col) => $body,
            ColumnStore::String($col) => $body,
            ColumnStore::Binary($col) => $body,
            ColumnStore::DateTime($col) => $body,
            ColumnStore::Table($col) => $body,
            ColumnStore::Mixed($col) => $body,
            ColumnStore::Link { cells: $col, .. } => $body,
        }
    };
}

impl ColumnStore {
    /// An empty column of the given type with room for `size_hint` rows.
    /// - `INV`: `data_type` is not [`DataType::Link`], links are created with
    ///   [`ColumnStore::new_link`].
    pub fn new(data_type: DataType, size_hint: usize) -> Self {
        match data_type {
            DataType::Int => ColumnStore::Int(BasicColumn::new(size_hint)),
            DataType::Bool => ColumnStore::Bool(BasicColumn::new(size_hint)),
            DataType::Float => ColumnStore::Float(BasicColumn::new(size_hint)),
            DataType::Double => ColumnStore::Double(BasicColumn::new(size_hint)),
            DataType::String => ColumnStore::String(BasicColumn::new(size_hint)),
            DataType::Binary => ColumnStore::Binary(BasicColumn::new(size_hint)),
            DataType::DateTime => ColumnStore::DateTime(BasicColumn::new(size_hint)),
            DataType::Table => ColumnStore::Table(BasicColumn::new(size_hint)),
            DataType::Mixed => ColumnStore::Mixed(BasicColumn::new(size_hint)),
            DataType::Link => panic!("link columns need a target table"),
        }
    }

    pub fn new_link(target: TableKey, size_hint: usize) -> Self {
        ColumnStore::Link {
            target,
            cells: BasicColumn::new(size_hint),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnStore::Int(_) => DataType::Int,
            ColumnStore::Bool(_) => DataType::Bool,
            ColumnStore::Float(_) => DataType::Float,
            ColumnStore::Double(_) => DataType::Double,
            ColumnStore::String(_) => DataType::String,
            ColumnStore::Binary(_) => DataType::Binary,
            ColumnStore::DateTime(_) => DataType::DateTime,
            ColumnStore::Table(_) => DataType::Table,
            ColumnStore::Mixed(_) => DataType::Mixed,
            ColumnStore::Link { .. } => DataType::Link,
        }
    }

    pub fn link_target(&self) -> Option<TableKey> {
        match self {
            ColumnStore::Link { target, .. } => Some(*target),
            _ => None,
        }
    }

    pub fn size(&self) -> usize {
        each_column!(self, c => c.size())
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        each_column!(self, c => c.reserve(additional))
    }

    /// Insert `count` default cells (zero, empty, null link, empty subtable)
    /// before `ndx`.
    pub fn insert_defaults(&mut self, ndx: usize, count: usize) -> Result<()> {
        each_column!(self, c => c.insert_defaults(ndx, count))
    }

    pub fn erase(&mut self, ndx: usize, is_last: bool) {
        each_column!(self, c => c.erase(ndx, is_last))
    }

    pub fn clear(&mut self) {
        each_column!(self, c => c.clear())
    }

    pub fn destroy(&mut self) {
        each_column!(self, c => c.destroy())
    }

    /// Order two rows of this column by their cell values.
    /// - Floats use a total order, so sorting never sees incomparable cells.
    /// - Null links order before any row.
    #[track_caller]
    pub fn compare_rows(&self, a: usize, b: usize) -> Ordering {
        match self {
            ColumnStore::Int(c) => c.get(a).cmp(c.get(b)),
            ColumnStore::Bool(c) => c.get(a).cmp(c.get(b)),
            ColumnStore::Float(c) => c.get(a).total_cmp(c.get(b)),
            ColumnStore::Double(c) => c.get(a).total_cmp(c.get(b)),
            ColumnStore::String(c) => c.get(a).cmp(c.get(b)),
            ColumnStore::Binary(c) => c.get(a).cmp(c.get(b)),
            ColumnStore::DateTime(c) => c.get(a).cmp(c.get(b)),
            ColumnStore::Link { cells, .. } => cells.get(a).cmp(cells.get(b)),
            ColumnStore::Table(_) | ColumnStore::Mixed(_) => {
                panic!("cannot order rows by a {} column", self.data_type())
            }
        }
    }
}
