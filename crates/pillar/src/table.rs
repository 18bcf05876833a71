//! # Tables
//! A schema of named, typed columns sharing one row count.
//!
//! ## Versions
//! Every mutation increments [`Table::version`] exactly once, after the change
//! is fully applied. Views compare this against the version they last saw to
//! decide whether to re-run their query.
//!
//! ## Links
//! A table referenced by link columns cannot shift or remove its own rows,
//! those operations must go through the owning [`Group`](crate::Group) so the
//! referencing cells can be fixed up.

use std::fmt;

use itertools::Itertools;
use rustc_hash::FxHashSet;

use crate::{
    aggregate,
    column::{BasicColumn, Column, ColumnStore},
    error::Result,
    group::{TableKey, ViewHandle},
    types::{DataType, DateTime, Mixed, Value},
};

/// Rows rendered by [`Table`]'s [`fmt::Display`] before eliding the rest.
pub(crate) const DISPLAY_ROW_LIMIT: usize = 500;

#[derive(Debug)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<ColumnStore>,
    size: usize,
    size_hint: usize,
    version: u64,
    views: FxHashSet<ViewHandle>,
    backlinks: usize,
}

#[cold]
#[track_caller]
fn type_mismatch(col: usize, expected: DataType, found: DataType) -> ! {
    panic!("column {col} is a {found} column, not {expected}")
}

/// Borrow the typed storage of a column, after checking its declared type.
macro_rules! typed_columns {
    ($($variant:ident : $ty:ty => $get:ident, $get_mut:ident;)*) => {
        $(
            #[track_caller]
            pub(crate) fn $get(&self, col: usize) -> &BasicColumn<$ty> {
                match self.column(col) {
                    ColumnStore::$variant(c) => c,
                    other => type_mismatch(col, DataType::$variant, other.data_type()),
                }
            }

            #[track_caller]
            fn $get_mut(&mut self, col: usize) -> &mut BasicColumn<$ty> {
                match self.column_mut(col) {
                    ColumnStore::$variant(c) => c,
                    other => type_mismatch(col, DataType::$variant, other.data_type()),
                }
            }
        )*
    };
}

/// Getters and setters for cells of [`Copy`] types.
macro_rules! copy_cells {
    ($($ty:ty => $column:ident, $column_mut:ident, $get:ident, $set:ident;)*) => {
        $(
            #[track_caller]
            pub fn $get(&self, col: usize, row: usize) -> $ty {
                self.check_row(row);
                *self.$column(col).get(row)
            }

            #[track_caller]
            pub fn $set(&mut self, col: usize, row: usize, value: $ty) {
                self.check_row(row);
                self.$column_mut(col).set(row, value);
                self.bump_version();
            }
        )*
    };
}

impl Table {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// A table whose columns are allocated with room for `size_hint` rows.
    pub fn with_capacity(size_hint: usize) -> Self {
        Table {
            names: Vec::new(),
            columns: Vec::new(),
            size: 0,
            size_hint,
            version: 0,
            views: FxHashSet::default(),
            backlinks: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Mark the table as changed.
    /// - Called after every mutation made through this table.
    /// - Also the hook for external writers (replication, transactions) that
    ///   change the table's contents by other means.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    // Schema

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[track_caller]
    pub fn column_name(&self, col: usize) -> &str {
        self.column(col);
        &self.names[col]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    #[track_caller]
    pub fn column_type(&self, col: usize) -> DataType {
        self.column(col).data_type()
    }

    /// Add a column, filled with default cells for existing rows.
    /// - Link columns need a target, see [`crate::Group::add_link_column`].
    #[track_caller]
    pub fn add_column(&mut self, data_type: DataType, name: &str) -> Result<usize> {
        assert!(
            data_type != DataType::Link,
            "link columns are added through Group::add_link_column"
        );
        let store = ColumnStore::new(data_type, self.size_hint.max(self.size));
        self.push_column(store, name)
    }

    #[track_caller]
    pub(crate) fn push_column(&mut self, mut store: ColumnStore, name: &str) -> Result<usize> {
        assert!(
            self.column_index(name).is_none(),
            "a column named `{name}` already exists"
        );
        store.insert_defaults(0, self.size)?;
        self.columns.push(store);
        self.names.push(name.to_owned());
        self.bump_version();
        Ok(self.columns.len() - 1)
    }

    #[track_caller]
    pub fn remove_column(&mut self, col: usize) {
        assert!(
            self.column_type(col) != DataType::Link,
            "link columns are removed through Group::remove_column"
        );
        self.take_column(col).destroy();
    }

    #[track_caller]
    pub(crate) fn take_column(&mut self, col: usize) -> ColumnStore {
        self.column(col);
        self.names.remove(col);
        let store = self.columns.remove(col);
        self.bump_version();
        store
    }

    #[track_caller]
    pub fn rename_column(&mut self, col: usize, name: &str) {
        self.column(col);
        assert!(
            self.column_index(name).map_or(true, |existing| existing == col),
            "a column named `{name}` already exists"
        );
        self.names[col] = name.to_owned();
        self.bump_version();
    }

    // Rows

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Append a row of default cells, returning its index.
    pub fn add_empty_row(&mut self) -> Result<usize> {
        self.add_empty_rows(1)
    }

    /// Append `count` rows of default cells, returning the index of the first.
    pub fn add_empty_rows(&mut self, count: usize) -> Result<usize> {
        let first = self.size;
        self.grow(first, count)?;
        Ok(first)
    }

    #[track_caller]
    pub fn insert_empty_row(&mut self, at: usize) -> Result<()> {
        if at != self.size {
            self.assert_not_link_target("insert_empty_row");
        }
        self.grow(at, 1)
    }

    /// Insert `count` default rows before `at`. Storage is reserved in every
    /// column before any is changed, so a failed allocation leaves the table
    /// untouched.
    #[track_caller]
    pub(crate) fn grow(&mut self, at: usize, count: usize) -> Result<()> {
        assert!(at <= self.size, "cannot insert at row {at} of {}", self.size);
        for store in &mut self.columns {
            store.reserve(count)?;
        }
        for store in &mut self.columns {
            store.insert_defaults(at, count)?;
        }
        self.size += count;
        self.bump_version();
        Ok(())
    }

    /// Append a row holding `values`, one per column.
    /// - Link cells must be null here, links to other rows are set through
    ///   [`crate::Group::set_link`] or [`crate::Group::append_row`].
    #[track_caller]
    pub fn append_row(&mut self, values: Vec<Value>) -> Result<usize> {
        assert!(
            values
                .iter()
                .all(|v| !matches!(v, Value::Link(Some(_)))),
            "links are set through the Group, which can check the target row"
        );
        self.push_row(values)
    }

    #[track_caller]
    pub(crate) fn push_row(&mut self, values: Vec<Value>) -> Result<usize> {
        assert_eq!(
            values.len(),
            self.columns.len(),
            "a row needs one value per column"
        );
        for (col, (store, value)) in self.columns.iter().zip(&values).enumerate() {
            if store.data_type() != value.data_type() {
                type_mismatch(col, store.data_type(), value.data_type());
            }
        }
        for store in &mut self.columns {
            store.reserve(1)?;
        }

        for (store, value) in self.columns.iter_mut().zip(values) {
            match (store, value) {
                (ColumnStore::Int(c), Value::Int(v)) => c.add(v)?,
                (ColumnStore::Bool(c), Value::Bool(v)) => c.add(v)?,
                (ColumnStore::Float(c), Value::Float(v)) => c.add(v)?,
                (ColumnStore::Double(c), Value::Double(v)) => c.add(v)?,
                (ColumnStore::String(c), Value::String(v)) => c.add(v)?,
                (ColumnStore::Binary(c), Value::Binary(v)) => c.add(v)?,
                (ColumnStore::DateTime(c), Value::DateTime(v)) => c.add(v)?,
                (ColumnStore::Table(c), Value::Table(v)) => c.add(v)?,
                (ColumnStore::Mixed(c), Value::Mixed(v)) => c.add(v)?,
                (ColumnStore::Link { cells, .. }, Value::Link(v)) => cells.add(v)?,
                _ => unreachable!("types checked above"),
            }
        }
        self.size += 1;
        self.bump_version();
        Ok(self.size - 1)
    }

    #[track_caller]
    pub fn remove_row(&mut self, row: usize) {
        self.assert_not_link_target("remove_row");
        self.erase_row(row);
    }

    #[track_caller]
    pub fn remove_last_row(&mut self) {
        assert!(self.size > 0, "no rows to remove");
        self.remove_row(self.size - 1);
    }

    #[track_caller]
    pub(crate) fn erase_row(&mut self, row: usize) {
        self.check_row(row);
        let is_last = row + 1 == self.size;
        for store in &mut self.columns {
            store.erase(row, is_last);
        }
        self.size -= 1;
        self.bump_version();
    }

    #[track_caller]
    pub fn clear(&mut self) {
        self.assert_not_link_target("clear");
        self.truncate();
    }

    pub(crate) fn truncate(&mut self) {
        for store in &mut self.columns {
            store.clear();
        }
        self.size = 0;
        self.bump_version();
    }

    pub fn row(&self, row: usize) -> RowRef<'_> {
        self.check_row(row);
        RowRef { table: self, row }
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> + '_ {
        (0..self.size).map(move |row| RowRef { table: self, row })
    }

    // Cells

    typed_columns! {
        Int: i64 => int_column, int_column_mut;
        Bool: bool => bool_column, bool_column_mut;
        Float: f32 => float_column, float_column_mut;
        Double: f64 => double_column, double_column_mut;
        String: String => string_column, string_column_mut;
        Binary: Vec<u8> => binary_column, binary_column_mut;
        DateTime: DateTime => datetime_column, datetime_column_mut;
        Mixed: Mixed => mixed_column, mixed_column_mut;
    }

    copy_cells! {
        i64 => int_column, int_column_mut, get_int, set_int;
        bool => bool_column, bool_column_mut, get_bool, set_bool;
        f32 => float_column, float_column_mut, get_float, set_float;
        f64 => double_column, double_column_mut, get_double, set_double;
        DateTime => datetime_column, datetime_column_mut, get_datetime, set_datetime;
    }

    /// Add `delta` to every cell of an int column (wrapping on overflow).
    #[track_caller]
    pub fn add_int(&mut self, col: usize, delta: i64) {
        self.add_int_rows(col, 0..self.size, delta);
    }

    #[track_caller]
    pub(crate) fn add_int_rows(&mut self, col: usize, rows: impl IntoIterator<Item = usize>, delta: i64) {
        let column = self.int_column_mut(col);
        for row in rows {
            let cell = column.get_mut(row);
            *cell = cell.wrapping_add(delta);
        }
        self.bump_version();
    }

    #[track_caller]
    pub fn get_string(&self, col: usize, row: usize) -> &str {
        self.check_row(row);
        self.string_column(col).get(row)
    }

    #[track_caller]
    pub fn set_string(&mut self, col: usize, row: usize, value: &str) {
        self.check_row(row);
        self.string_column_mut(col).set(row, value.to_owned());
        self.bump_version();
    }

    #[track_caller]
    pub fn get_binary(&self, col: usize, row: usize) -> &[u8] {
        self.check_row(row);
        self.binary_column(col).get(row)
    }

    #[track_caller]
    pub fn set_binary(&mut self, col: usize, row: usize, value: &[u8]) {
        self.check_row(row);
        self.binary_column_mut(col).set(row, value.to_vec());
        self.bump_version();
    }

    #[track_caller]
    pub fn get_mixed(&self, col: usize, row: usize) -> &Mixed {
        self.check_row(row);
        self.mixed_column(col).get(row)
    }

    #[track_caller]
    pub fn get_mixed_type(&self, col: usize, row: usize) -> DataType {
        self.get_mixed(col, row).data_type()
    }

    #[track_caller]
    pub fn set_mixed(&mut self, col: usize, row: usize, value: Mixed) {
        self.check_row(row);
        self.mixed_column_mut(col).set(row, value);
        self.bump_version();
    }

    // Subtables, held by table columns or by mixed cells holding a table.

    #[track_caller]
    pub fn get_subtable(&self, col: usize, row: usize) -> &Table {
        self.check_row(row);
        match self.column(col) {
            ColumnStore::Table(c) => c.get(row),
            ColumnStore::Mixed(c) => match c.get(row) {
                Mixed::Table(t) => &**t,
                other => panic!("mixed cell ({col}, {row}) holds a {}", other.data_type()),
            },
            other => type_mismatch(col, DataType::Table, other.data_type()),
        }
    }

    /// Mutable access to a subtable. The parent counts as changed once the
    /// subtable is handed out.
    #[track_caller]
    pub fn subtable_mut(&mut self, col: usize, row: usize) -> &mut Table {
        self.check_row(row);
        self.bump_version();
        match self.column_mut(col) {
            ColumnStore::Table(c) => c.get_mut(row),
            ColumnStore::Mixed(c) => match c.get_mut(row) {
                Mixed::Table(t) => &mut **t,
                other => panic!("mixed cell ({col}, {row}) holds a {}", other.data_type()),
            },
            other => type_mismatch(col, DataType::Table, other.data_type()),
        }
    }

    #[track_caller]
    pub fn get_subtable_size(&self, col: usize, row: usize) -> usize {
        self.get_subtable(col, row).size()
    }

    /// Replace a subtable with a copy of `table`. On a mixed column the cell
    /// becomes a table.
    #[track_caller]
    pub fn set_subtable(&mut self, col: usize, row: usize, table: &Table) {
        self.check_row(row);
        match self.column_mut(col) {
            ColumnStore::Table(c) => c.set(row, table.clone()),
            ColumnStore::Mixed(c) => c.set(row, Mixed::Table(Box::new(table.clone()))),
            other => type_mismatch(col, DataType::Table, other.data_type()),
        }
        self.bump_version();
    }

    #[track_caller]
    pub fn clear_subtable(&mut self, col: usize, row: usize) {
        self.set_subtable(col, row, &Table::new());
    }

    // Links

    #[track_caller]
    pub fn get_link_target(&self, col: usize) -> TableKey {
        let store = self.column(col);
        store
            .link_target()
            .unwrap_or_else(|| type_mismatch(col, DataType::Link, store.data_type()))
    }

    /// The target row of a link, [`None`] for a null link.
    #[track_caller]
    pub fn get_link(&self, col: usize, row: usize) -> Option<usize> {
        self.check_row(row);
        *self.link_cells(col).get(row)
    }

    #[track_caller]
    pub fn is_null_link(&self, col: usize, row: usize) -> bool {
        self.get_link(col, row).is_none()
    }

    #[track_caller]
    pub fn nullify_link(&mut self, col: usize, row: usize) {
        self.check_row(row);
        self.link_cells_mut(col).set(row, None);
        self.bump_version();
    }

    /// - `INV`: `target_row` is a row of the link column's target table.
    #[track_caller]
    pub(crate) fn set_link_unchecked(&mut self, col: usize, row: usize, target_row: usize) {
        self.check_row(row);
        self.link_cells_mut(col).set(row, Some(target_row));
        self.bump_version();
    }

    #[track_caller]
    pub(crate) fn link_cells(&self, col: usize) -> &BasicColumn<Option<usize>> {
        match self.column(col) {
            ColumnStore::Link { cells, .. } => cells,
            other => type_mismatch(col, DataType::Link, other.data_type()),
        }
    }

    /// Link cells, without counting as a change.
    #[track_caller]
    pub(crate) fn link_cells_mut(&mut self, col: usize) -> &mut BasicColumn<Option<usize>> {
        match self.column_mut(col) {
            ColumnStore::Link { cells, .. } => cells,
            other => type_mismatch(col, DataType::Link, other.data_type()),
        }
    }

    /// `(column, target)` for every link column.
    pub(crate) fn link_columns(&self) -> impl Iterator<Item = (usize, TableKey)> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(col, store)| store.link_target().map(|target| (col, target)))
    }

    pub(crate) fn add_backlink(&mut self) {
        self.backlinks += 1;
    }

    pub(crate) fn remove_backlink(&mut self) {
        self.backlinks -= 1;
    }

    /// Number of link columns (in any table of the group) targeting this table.
    pub fn backlink_count(&self) -> usize {
        self.backlinks
    }

    #[track_caller]
    fn assert_not_link_target(&self, operation: &str) {
        assert!(
            self.backlinks == 0,
            "`{operation}` on a link target table must go through the Group"
        );
    }

    // Search

    #[track_caller]
    pub fn find_first_int(&self, col: usize, value: i64) -> Option<usize> {
        aggregate::find_first(self.int_column(col), 0..self.size, &value)
    }

    #[track_caller]
    pub fn find_first_bool(&self, col: usize, value: bool) -> Option<usize> {
        aggregate::find_first(self.bool_column(col), 0..self.size, &value)
    }

    #[track_caller]
    pub fn find_first_float(&self, col: usize, value: f32) -> Option<usize> {
        aggregate::find_first(self.float_column(col), 0..self.size, &value)
    }

    #[track_caller]
    pub fn find_first_double(&self, col: usize, value: f64) -> Option<usize> {
        aggregate::find_first(self.double_column(col), 0..self.size, &value)
    }

    #[track_caller]
    pub fn find_first_string(&self, col: usize, value: &str) -> Option<usize> {
        aggregate::find_first(self.string_column(col), 0..self.size, value)
    }

    #[track_caller]
    pub fn find_first_binary(&self, col: usize, value: &[u8]) -> Option<usize> {
        aggregate::find_first(self.binary_column(col), 0..self.size, value)
    }

    #[track_caller]
    pub fn find_first_datetime(&self, col: usize, value: DateTime) -> Option<usize> {
        aggregate::find_first(self.datetime_column(col), 0..self.size, &value)
    }

    // Aggregates
    // Counting without a target is `size`.

    #[track_caller]
    pub fn count_int(&self, col: usize, target: i64) -> usize {
        aggregate::count(self.int_column(col), 0..self.size, &target)
    }

    #[track_caller]
    pub fn count_float(&self, col: usize, target: f32) -> usize {
        aggregate::count(self.float_column(col), 0..self.size, &target)
    }

    #[track_caller]
    pub fn count_double(&self, col: usize, target: f64) -> usize {
        aggregate::count(self.double_column(col), 0..self.size, &target)
    }

    #[track_caller]
    pub fn count_string(&self, col: usize, target: &str) -> usize {
        aggregate::count(self.string_column(col), 0..self.size, target)
    }

    #[track_caller]
    pub fn sum_int(&self, col: usize) -> i64 {
        aggregate::sum(self.int_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn sum_float(&self, col: usize) -> f64 {
        aggregate::sum(self.float_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn sum_double(&self, col: usize) -> f64 {
        aggregate::sum(self.double_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn minimum_int(&self, col: usize) -> Option<i64> {
        aggregate::minimum(self.int_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn maximum_int(&self, col: usize) -> Option<i64> {
        aggregate::maximum(self.int_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn minimum_float(&self, col: usize) -> Option<f32> {
        aggregate::minimum(self.float_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn maximum_float(&self, col: usize) -> Option<f32> {
        aggregate::maximum(self.float_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn minimum_double(&self, col: usize) -> Option<f64> {
        aggregate::minimum(self.double_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn maximum_double(&self, col: usize) -> Option<f64> {
        aggregate::maximum(self.double_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn minimum_datetime(&self, col: usize) -> Option<DateTime> {
        aggregate::minimum(self.datetime_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn maximum_datetime(&self, col: usize) -> Option<DateTime> {
        aggregate::maximum(self.datetime_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn average_int(&self, col: usize) -> Option<f64> {
        aggregate::average(self.int_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn average_float(&self, col: usize) -> Option<f64> {
        aggregate::average(self.float_column(col), 0..self.size)
    }

    #[track_caller]
    pub fn average_double(&self, col: usize) -> Option<f64> {
        aggregate::average(self.double_column(col), 0..self.size)
    }

    // View registry

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub(crate) fn register_view(&mut self, handle: ViewHandle) {
        self.views.insert(handle);
    }

    pub(crate) fn unregister_view(&mut self, handle: ViewHandle) -> bool {
        self.views.remove(&handle)
    }

    pub(crate) fn take_views(&mut self) -> FxHashSet<ViewHandle> {
        std::mem::take(&mut self.views)
    }

    // Internals

    #[track_caller]
    pub(crate) fn column(&self, col: usize) -> &ColumnStore {
        match self.columns.get(col) {
            Some(store) => store,
            None => panic!("column {col} out of range ({} columns)", self.columns.len()),
        }
    }

    #[track_caller]
    fn column_mut(&mut self, col: usize) -> &mut ColumnStore {
        let count = self.columns.len();
        match self.columns.get_mut(col) {
            Some(store) => store,
            None => panic!("column {col} out of range ({count} columns)"),
        }
    }

    #[track_caller]
    pub(crate) fn check_row(&self, row: usize) {
        assert!(row < self.size, "row {row} out of range ({} rows)", self.size);
    }

    /// The cells of one row, separated by `|`.
    #[track_caller]
    pub fn row_to_string(&self, row: usize) -> String {
        self.check_row(row);
        (0..self.columns.len())
            .map(|col| self.render_cell(col, row))
            .join(" | ")
    }

    /// A header, then `rows` labelled by their position, stopping after `limit`.
    pub(crate) fn fmt_rows(
        &self,
        f: &mut fmt::Formatter<'_>,
        rows: impl ExactSizeIterator<Item = usize>,
        limit: usize,
    ) -> fmt::Result {
        let total = rows.len();
        writeln!(f, "    {}", self.names.iter().join(" | "))?;
        for (pos, row) in rows.take(limit).enumerate() {
            let cells = (0..self.columns.len()).map(|col| self.render_cell(col, row));
            writeln!(f, "{pos:>3}: {}", cells.format(" | "))?;
        }
        if total > limit {
            writeln!(f, "... and {} more rows", total - limit)?;
        }
        Ok(())
    }

    fn render_cell(&self, col: usize, row: usize) -> String {
        match &self.columns[col] {
            ColumnStore::Int(c) => c.get(row).to_string(),
            ColumnStore::Bool(c) => c.get(row).to_string(),
            ColumnStore::Float(c) => c.get(row).to_string(),
            ColumnStore::Double(c) => c.get(row).to_string(),
            ColumnStore::String(c) => c.get(row).clone(),
            ColumnStore::Binary(c) => format!("{} bytes", c.get(row).len()),
            ColumnStore::DateTime(c) => c.get(row).seconds().to_string(),
            ColumnStore::Table(c) => format!("[{}]", c.get(row).size()),
            ColumnStore::Mixed(c) => format!("{:?}", c.get(row)),
            ColumnStore::Link { cells, .. } => match cells.get(row) {
                Some(target) => format!("->{target}"),
                None => "null".to_owned(),
            },
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

/// Copies the schema and cells. The copy starts at version `0` with no views.
impl Clone for Table {
    fn clone(&self) -> Self {
        Table {
            names: self.names.clone(),
            columns: self.columns.clone(),
            size: self.size,
            size_hint: self.size_hint,
            version: 0,
            views: FxHashSet::default(),
            backlinks: 0,
        }
    }
}

/// Tables are equal when their schemas and cells are, regardless of version
/// or registered views.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.names == other.names && self.columns == other.columns
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_rows(f, 0..self.size, DISPLAY_ROW_LIMIT)
    }
}

/// A cursor over one row of a table.
#[derive(Clone, Copy)]
pub struct RowRef<'t> {
    table: &'t Table,
    row: usize,
}

impl<'t> RowRef<'t> {
    pub fn index(&self) -> usize {
        self.row
    }

    pub fn get_int(&self, col: usize) -> i64 {
        self.table.get_int(col, self.row)
    }

    pub fn get_bool(&self, col: usize) -> bool {
        self.table.get_bool(col, self.row)
    }

    pub fn get_float(&self, col: usize) -> f32 {
        self.table.get_float(col, self.row)
    }

    pub fn get_double(&self, col: usize) -> f64 {
        self.table.get_double(col, self.row)
    }

    pub fn get_string(&self, col: usize) -> &'t str {
        self.table.get_string(col, self.row)
    }

    pub fn get_binary(&self, col: usize) -> &'t [u8] {
        self.table.get_binary(col, self.row)
    }

    pub fn get_datetime(&self, col: usize) -> DateTime {
        self.table.get_datetime(col, self.row)
    }

    pub fn get_mixed(&self, col: usize) -> &'t Mixed {
        self.table.get_mixed(col, self.row)
    }

    pub fn get_link(&self, col: usize) -> Option<usize> {
        self.table.get_link(col, self.row)
    }

    pub fn get_subtable(&self, col: usize) -> &'t Table {
        self.table.get_subtable(col, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> Table {
        let mut t = Table::new();
        t.add_column(DataType::String, "name").unwrap();
        t.add_column(DataType::Int, "score").unwrap();
        for (name, score) in [("a", 3), ("b", 1), ("c", 2)] {
            t.append_row(vec![name.into(), score.into()]).unwrap();
        }
        t
    }

    #[test]
    fn schema_lookup() {
        let t = scores();
        assert_eq!(t.column_count(), 2);
        assert_eq!(t.column_index("score"), Some(1));
        assert_eq!(t.column_index("missing"), None);
        assert_eq!(t.column_name(0), "name");
        assert_eq!(t.column_type(1), DataType::Int);
    }

    #[test]
    fn every_mutation_bumps_version_once() {
        let mut t = scores();
        let mutations: Vec<Box<dyn Fn(&mut Table)>> = vec![
            Box::new(|t: &mut Table| t.set_int(1, 0, 9)),
            Box::new(|t: &mut Table| t.set_string(0, 1, "z")),
            Box::new(|t: &mut Table| {
                t.add_empty_rows(3).unwrap();
            }),
            Box::new(|t: &mut Table| t.insert_empty_row(0).unwrap()),
            Box::new(|t: &mut Table| t.remove_row(2)),
            Box::new(|t: &mut Table| {
                t.add_column(DataType::Bool, "flag").unwrap();
            }),
            Box::new(|t: &mut Table| t.remove_column(2)),
            Box::new(|t: &mut Table| t.bump_version()),
            Box::new(|t: &mut Table| t.clear()),
        ];
        for mutate in mutations {
            let before = t.version();
            mutate(&mut t);
            assert_eq!(t.version(), before + 1);
        }
    }

    #[test]
    fn reads_do_not_bump_version() {
        let t = scores();
        let before = t.version();
        t.get_int(1, 0);
        t.sum_int(1);
        t.find_first_string(0, "c");
        assert_eq!(t.version(), before);
    }

    #[test]
    fn insert_then_remove_restores_rows() {
        let mut t = scores();
        let before = t.clone();
        t.insert_empty_row(1).unwrap();
        assert_eq!(t.size(), 4);
        assert_eq!(t.get_string(0, 2), "b");
        t.remove_row(1);
        assert_eq!(t, before);
    }

    #[test]
    fn new_columns_fill_existing_rows() {
        let mut t = scores();
        let when = t.add_column(DataType::DateTime, "when").unwrap();
        let sub = t.add_column(DataType::Table, "sub").unwrap();
        assert_eq!(t.get_datetime(when, 2), DateTime::default());
        assert!(t.get_subtable(sub, 2).is_empty());
    }

    #[test]
    #[should_panic(expected = "column 0 is a string column, not int")]
    fn type_mismatch_fails_fast() {
        scores().get_int(0, 0);
    }

    #[test]
    #[should_panic(expected = "row 3 out of range (3 rows)")]
    fn row_out_of_range_fails_fast() {
        scores().get_int(1, 3);
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn column_names_are_unique() {
        scores().add_column(DataType::Int, "score").unwrap();
    }

    #[test]
    #[should_panic(expected = "Group::add_link_column")]
    fn plain_tables_cannot_add_links() {
        scores().add_column(DataType::Link, "friend").unwrap();
    }

    #[test]
    fn search_and_aggregate() {
        let t = scores();
        assert_eq!(t.find_first_int(1, 2), Some(2));
        assert_eq!(t.find_first_int(1, 7), None);
        assert_eq!(t.find_first_string(0, "b"), Some(1));
        assert_eq!(t.sum_int(1), 6);
        assert_eq!(t.average_int(1), Some(2.0));
        assert_eq!(t.count_int(1, 2), 1);
        assert_eq!(t.minimum_int(1), Some(1));
        assert_eq!(t.maximum_int(1), Some(3));
        assert_eq!(t.count_string(0, "a"), 1);
    }

    #[test]
    fn add_int_updates_whole_column_once() {
        let mut t = scores();
        let before = t.version();
        t.add_int(1, 10);
        assert_eq!(t.version(), before + 1);
        assert_eq!(t.sum_int(1), 36);
        t.add_int(1, i64::MAX);
        assert_eq!(t.get_int(1, 1), 11i64.wrapping_add(i64::MAX));
    }

    #[test]
    fn overflowing_sums_wrap() {
        let mut t = Table::new();
        t.add_column(DataType::Int, "n").unwrap();
        t.append_row(vec![Value::Int(i64::MAX)]).unwrap();
        t.append_row(vec![Value::Int(1)]).unwrap();
        assert_eq!(t.sum_int(0), i64::MIN);
        assert_eq!(t.maximum_int(0), Some(i64::MAX));
    }

    #[test]
    fn empty_aggregates() {
        let mut t = Table::new();
        t.add_column(DataType::Double, "x").unwrap();
        assert_eq!(t.sum_double(0), 0.0);
        assert_eq!(t.maximum_double(0), None);
        assert_eq!(t.average_double(0), None);
        assert_eq!(t.count_double(0, 1.0), 0);
    }

    #[test]
    fn subtables_and_mixed() {
        let mut t = Table::new();
        let sub = t.add_column(DataType::Table, "sub").unwrap();
        let mix = t.add_column(DataType::Mixed, "mix").unwrap();
        t.add_empty_rows(2).unwrap();

        let inner = t.subtable_mut(sub, 1);
        inner.add_column(DataType::Int, "n").unwrap();
        inner.add_empty_rows(4).unwrap();
        assert_eq!(t.get_subtable_size(sub, 1), 4);
        assert_eq!(t.get_subtable_size(sub, 0), 0);

        assert_eq!(t.get_mixed_type(mix, 0), DataType::Int);
        t.set_mixed(mix, 0, Mixed::String("hi".to_owned()));
        assert_eq!(t.get_mixed(mix, 0), &Mixed::String("hi".to_owned()));

        let copy = t.get_subtable(sub, 1).clone();
        t.set_subtable(mix, 1, &copy);
        assert_eq!(t.get_mixed_type(mix, 1), DataType::Table);
        assert_eq!(t.get_subtable_size(mix, 1), 4);

        t.clear_subtable(sub, 1);
        assert!(t.get_subtable(sub, 1).is_empty());
    }

    #[test]
    fn subtable_access_changes_parent_version() {
        let mut t = Table::new();
        t.add_column(DataType::Table, "sub").unwrap();
        t.add_empty_row().unwrap();
        let before = t.version();
        t.subtable_mut(0, 0).add_column(DataType::Int, "n").unwrap();
        assert_eq!(t.version(), before + 1);
    }

    #[test]
    fn row_cursors() {
        let t = scores();
        let names: Vec<_> = t.rows().map(|r| r.get_string(0)).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(t.row(2).get_int(1), 2);
    }

    #[test]
    fn display_lists_rows() {
        let rendered = scores().to_string();
        assert!(rendered.starts_with("    name | score\n"));
        assert!(rendered.contains("  1: b | 1\n"));
        assert_eq!(scores().row_to_string(2), "c | 2");
    }

    #[test]
    #[should_panic(expected = "one value per column")]
    fn append_row_needs_every_column() {
        scores().append_row(vec![Value::Int(1)]).unwrap();
    }
}
