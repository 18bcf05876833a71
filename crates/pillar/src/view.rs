//! # Table views
//! An ordered list of row indices (*refs*) into one table.
//!
//! ## Synchronisation
//! A view records the table version it last saw. Every access first calls
//! [`ViewBase::sync_if_needed`]: on a version mismatch a view produced by a
//! query re-runs it over its original [`SearchRange`], re-applies its last
//! sort, and records the new version. Nothing is pushed to views when a table
//! changes, staleness is only discovered on access.
//!
//! Listing views (identity enumerations, `find_all_*` results, hand picked
//! rows) have no query to re-run. They keep their refs and stay
//! [`ViewState::Stale`], so their positions can go out of date when other code
//! shifts rows.
//!
//! ## Positions
//! Accessors take a *view row* (position within the view), which is mapped
//! through the refs to the *source row* in the table, see
//! [`ViewBase::get_source_ndx`].
//!
//! ## Attachment
//! Views name their table with a [`TableKey`] and a registration handle in the
//! [`Group`]. Once the table is removed, or the view released or moved from,
//! the view is detached and every accessor panics.

use std::{
    fmt,
    ops::{Deref, DerefMut},
};

use rustc_hash::FxHashMap;

use crate::{
    aggregate,
    column::{BasicColumn, Column},
    group::{Group, TableKey, ViewHandle},
    query::{Query, SearchRange},
    table::{RowRef, Table, DISPLAY_ROW_LIMIT},
    types::{DataType, DateTime, Mixed},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    /// A placeholder view, never attached to a table.
    Unattached,
    Fresh,
    /// The table changed since the view last synced.
    Stale,
    /// The table was removed, or the view released or moved from.
    Detached,
}

/// The sort last applied to a view, re-applied after every re-sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortOrder {
    pub column: usize,
    pub ascending: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Binding {
    Null,
    Bound { table: TableKey, handle: ViewHandle },
    Released,
}

/// State and read operations shared by [`TableView`] and [`ConstTableView`].
#[derive(Debug)]
pub struct ViewBase {
    binding: Binding,
    refs: BasicColumn<usize>,
    last_seen_version: u64,
    query: Option<Query>,
    range: SearchRange,
    sort: Option<SortOrder>,
}

macro_rules! view_getters {
    ($lt:lifetime; $($get:ident -> $ty:ty;)*) => {
        $(
            #[track_caller]
            pub fn $get<$lt>(&mut self, group: &$lt Group, col: usize, row: usize) -> $ty {
                let table = self.synced(group);
                table.$get(col, self.source(row))
            }
        )*
    };
}

macro_rules! view_searches {
    ($($find:ident, $count:ident => $column:ident, $ty:ty;)*) => {
        $(
            /// Position in the view of the first row holding `value`.
            #[track_caller]
            pub fn $find(&mut self, group: &Group, col: usize, value: $ty) -> Option<usize> {
                let table = self.synced(group);
                aggregate::find_first(table.$column(col), self.refs.iter().copied(), &value)
            }

            #[track_caller]
            pub fn $count(&mut self, group: &Group, col: usize, value: $ty) -> usize {
                let table = self.synced(group);
                aggregate::count(table.$column(col), self.refs.iter().copied(), &value)
            }
        )*
    };
}

macro_rules! view_reducers {
    ($($name:ident => $reduce:ident($column:ident) -> $ret:ty;)*) => {
        $(
            #[track_caller]
            pub fn $name(&mut self, group: &Group, col: usize) -> $ret {
                let table = self.synced(group);
                aggregate::$reduce(table.$column(col), self.refs.iter().copied())
            }
        )*
    };
}

impl Default for ViewBase {
    fn default() -> Self {
        ViewBase::null()
    }
}

impl ViewBase {
    /// An unattached view with no rows.
    pub fn null() -> Self {
        ViewBase {
            binding: Binding::Null,
            refs: BasicColumn::default(),
            last_seen_version: 0,
            query: None,
            range: SearchRange::default(),
            sort: None,
        }
    }

    /// A view of fixed `rows`, fresh at the table's current version.
    #[track_caller]
    pub(crate) fn listing(group: &mut Group, table: TableKey, rows: Vec<usize>) -> Self {
        let handle = group.register_view(table);
        ViewBase {
            binding: Binding::Bound { table, handle },
            refs: rows.into(),
            last_seen_version: group.table(table).version(),
            query: None,
            range: SearchRange::default(),
            sort: None,
        }
    }

    /// A view of the `rows` matched by `query` over `range`.
    #[track_caller]
    pub(crate) fn queried(
        group: &mut Group,
        query: Query,
        range: SearchRange,
        rows: Vec<usize>,
    ) -> Self {
        let mut view = ViewBase::listing(group, query.table_key(), rows);
        view.query = Some(query);
        view.range = range;
        view
    }

    // State

    pub fn state(&self, group: &Group) -> ViewState {
        match self.binding {
            Binding::Null => ViewState::Unattached,
            Binding::Released => ViewState::Detached,
            Binding::Bound { table, handle } => {
                if group.view_table(handle) != Some(table) {
                    ViewState::Detached
                } else if group.table(table).version() == self.last_seen_version {
                    ViewState::Fresh
                } else {
                    ViewState::Stale
                }
            }
        }
    }

    pub fn is_attached(&self, group: &Group) -> bool {
        matches!(self.state(group), ViewState::Fresh | ViewState::Stale)
    }

    pub fn last_seen_version(&self) -> u64 {
        self.last_seen_version
    }

    /// The query this view re-runs, [`None`] for listing views.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn range(&self) -> SearchRange {
        self.range
    }

    pub fn sort_order(&self) -> Option<SortOrder> {
        self.sort
    }

    /// Bring the refs up to date with the table, returning true if the query
    /// was re-run. Listing views never re-run.
    #[track_caller]
    pub fn sync_if_needed(&mut self, group: &Group) -> bool {
        let (key, table) = self.attached_table(group);
        let version = table.version();
        if version == self.last_seen_version {
            return false;
        }
        let Some(query) = &self.query else {
            return false;
        };

        let mut rows = query.find_all_rows(table, self.range);
        if let Some(SortOrder { column, ascending }) = self.sort {
            aggregate::sort_rows(table.column(column), &mut rows, ascending);
        }
        let before = self.refs.size();
        self.refs = rows.into();
        tracing::trace!(
            table = ?key,
            from = self.last_seen_version,
            to = version,
            before,
            after = self.refs.size(),
            "re-ran view query"
        );
        self.last_seen_version = version;
        true
    }

    #[track_caller]
    fn attached_table<'g>(&self, group: &'g Group) -> (TableKey, &'g Table) {
        match self.binding {
            Binding::Bound { table, handle } if group.view_table(handle) == Some(table) => {
                (table, group.table(table))
            }
            Binding::Null => panic!("view is not attached to a table"),
            _ => panic!("view is detached from its table"),
        }
    }

    /// The table, after syncing.
    #[track_caller]
    fn synced<'g>(&mut self, group: &'g Group) -> &'g Table {
        self.sync_if_needed(group);
        self.attached_table(group).1
    }

    #[track_caller]
    fn source(&self, row: usize) -> usize {
        let size = self.refs.size();
        assert!(row < size, "view row {row} out of range ({size} rows)");
        *self.refs.get(row)
    }

    // Reads

    #[track_caller]
    pub fn size(&mut self, group: &Group) -> usize {
        self.sync_if_needed(group);
        self.refs.size()
    }

    #[track_caller]
    pub fn is_empty(&mut self, group: &Group) -> bool {
        self.size(group) == 0
    }

    /// The table row behind view row `row`.
    #[track_caller]
    pub fn get_source_ndx(&mut self, group: &Group, row: usize) -> usize {
        self.sync_if_needed(group);
        self.source(row)
    }

    /// The source rows, in view order.
    #[track_caller]
    pub fn rows(&mut self, group: &Group) -> &[usize] {
        self.sync_if_needed(group);
        self.refs.as_slice()
    }

    /// A copy of the current source rows.
    #[track_caller]
    pub fn to_listing(&mut self, group: &Group) -> Vec<usize> {
        self.rows(group).to_vec()
    }

    #[track_caller]
    pub fn column_count(&self, group: &Group) -> usize {
        self.attached_table(group).1.column_count()
    }

    #[track_caller]
    pub fn column_name<'g>(&self, group: &'g Group, col: usize) -> &'g str {
        self.attached_table(group).1.column_name(col)
    }

    #[track_caller]
    pub fn column_index(&self, group: &Group, name: &str) -> Option<usize> {
        self.attached_table(group).1.column_index(name)
    }

    #[track_caller]
    pub fn column_type(&self, group: &Group, col: usize) -> DataType {
        self.attached_table(group).1.column_type(col)
    }

    view_getters! {
        'g;
        get_int -> i64;
        get_bool -> bool;
        get_float -> f32;
        get_double -> f64;
        get_datetime -> DateTime;
        get_string -> &'g str;
        get_binary -> &'g [u8];
        get_mixed -> &'g Mixed;
        get_mixed_type -> DataType;
        get_link -> Option<usize>;
        is_null_link -> bool;
        get_subtable -> &'g Table;
        get_subtable_size -> usize;
    }

    // Search and aggregates over the synced rows

    view_searches! {
        find_first_int, count_int => int_column, i64;
        find_first_bool, count_bool => bool_column, bool;
        find_first_float, count_float => float_column, f32;
        find_first_double, count_double => double_column, f64;
        find_first_datetime, count_datetime => datetime_column, DateTime;
    }

    #[track_caller]
    pub fn find_first_string(&mut self, group: &Group, col: usize, value: &str) -> Option<usize> {
        let table = self.synced(group);
        aggregate::find_first(table.string_column(col), self.refs.iter().copied(), value)
    }

    #[track_caller]
    pub fn count_string(&mut self, group: &Group, col: usize, value: &str) -> usize {
        let table = self.synced(group);
        aggregate::count(table.string_column(col), self.refs.iter().copied(), value)
    }

    #[track_caller]
    pub fn find_first_binary(&mut self, group: &Group, col: usize, value: &[u8]) -> Option<usize> {
        let table = self.synced(group);
        aggregate::find_first(table.binary_column(col), self.refs.iter().copied(), value)
    }

    view_reducers! {
        sum_int => sum(int_column) -> i64;
        sum_float => sum(float_column) -> f64;
        sum_double => sum(double_column) -> f64;
        minimum_int => minimum(int_column) -> Option<i64>;
        maximum_int => maximum(int_column) -> Option<i64>;
        minimum_float => minimum(float_column) -> Option<f32>;
        maximum_float => maximum(float_column) -> Option<f32>;
        minimum_double => minimum(double_column) -> Option<f64>;
        maximum_double => maximum(double_column) -> Option<f64>;
        minimum_datetime => minimum(datetime_column) -> Option<DateTime>;
        maximum_datetime => maximum(datetime_column) -> Option<DateTime>;
        average_int => average(int_column) -> Option<f64>;
        average_float => average(float_column) -> Option<f64>;
        average_double => average(double_column) -> Option<f64>;
    }

    /// Stable sort of the view's rows by one column. The order is remembered
    /// and re-applied whenever the query is re-run.
    #[track_caller]
    pub fn sort(&mut self, group: &Group, column: usize, ascending: bool) {
        let table = self.synced(group);
        aggregate::sort_rows(table.column(column), self.refs.as_mut_slice(), ascending);
        self.sort = Some(SortOrder { column, ascending });
    }

    /// Reorder the rows to follow `order`, a view of the same table. Rows
    /// missing from `order` keep their relative order after the rest. The sort
    /// remembered by `order` is adopted for later re-runs.
    #[track_caller]
    pub fn apply_same_order(&mut self, group: &Group, order: &mut ViewBase) {
        let (key, _) = self.attached_table(group);
        let (order_key, _) = order.attached_table(group);
        assert!(
            key == order_key,
            "views of {key:?} and {order_key:?} cannot share an order"
        );
        self.sync_if_needed(group);
        order.sync_if_needed(group);

        let mut rank = FxHashMap::default();
        for (pos, row) in order.refs.iter().enumerate() {
            rank.entry(*row).or_insert(pos);
        }
        self.refs
            .as_mut_slice()
            .sort_by_key(|row| rank.get(row).copied().unwrap_or(usize::MAX));
        self.sort = order.sort;
    }

    // Cursors and rendering

    #[track_caller]
    pub fn front<'g>(&mut self, group: &'g Group) -> Option<RowRef<'g>> {
        let table = self.synced(group);
        self.refs.as_slice().first().map(|row| table.row(*row))
    }

    #[track_caller]
    pub fn back<'g>(&mut self, group: &'g Group) -> Option<RowRef<'g>> {
        let table = self.synced(group);
        self.refs.as_slice().last().map(|row| table.row(*row))
    }

    /// Cursors over the source rows, in view order.
    #[track_caller]
    pub fn iter_rows<'v>(&'v mut self, group: &'v Group) -> impl Iterator<Item = RowRef<'v>> + 'v {
        let table = self.synced(group);
        self.refs.iter().map(move |row| table.row(*row))
    }

    /// The view's rows as a grid, labelled by view position.
    #[track_caller]
    pub fn display<'v>(&'v mut self, group: &'v Group) -> ViewDisplay<'v> {
        let table = self.synced(group);
        ViewDisplay {
            table,
            rows: self.refs.as_slice(),
            limit: DISPLAY_ROW_LIMIT,
        }
    }

    #[track_caller]
    pub fn row_to_string(&mut self, group: &Group, row: usize) -> String {
        let table = self.synced(group);
        table.row_to_string(self.source(row))
    }

    /// A listing view of the synced rows picked by `search`.
    #[track_caller]
    fn derive(
        &mut self,
        group: &mut Group,
        search: impl FnOnce(&Table, &[usize]) -> Vec<usize>,
    ) -> ViewBase {
        self.sync_if_needed(group);
        let (key, table) = self.attached_table(group);
        let rows = search(table, self.refs.as_slice());
        ViewBase::listing(group, key, rows)
    }

    // Lifecycle

    /// An independent copy with its own registration and its own query.
    #[track_caller]
    fn copy_base(&self, group: &mut Group) -> ViewBase {
        let binding = match self.binding {
            Binding::Null => Binding::Null,
            _ => {
                let (table, _) = self.attached_table(group);
                Binding::Bound {
                    table,
                    handle: group.register_view(table),
                }
            }
        };
        ViewBase {
            binding,
            refs: self.refs.clone(),
            last_seen_version: self.last_seen_version,
            query: self.query.clone(),
            range: self.range,
            sort: self.sort,
        }
    }

    /// Move the refs and query into a new registration, detaching `self`.
    fn take_base(&mut self, group: &mut Group) -> ViewBase {
        let binding = match self.binding {
            Binding::Bound { table, handle } => {
                let live = group.view_table(handle) == Some(table);
                group.unregister_view(handle);
                self.binding = Binding::Released;
                if live {
                    Binding::Bound {
                        table,
                        handle: group.register_view(table),
                    }
                } else {
                    Binding::Released
                }
            }
            other => other,
        };
        ViewBase {
            binding,
            refs: std::mem::take(&mut self.refs),
            last_seen_version: self.last_seen_version,
            query: self.query.take(),
            range: self.range,
            sort: self.sort.take(),
        }
    }

    /// Unregister from the table and drop the rows. The view ends detached.
    pub fn release(&mut self, group: &mut Group) {
        if let Binding::Bound { handle, .. } = self.binding {
            group.unregister_view(handle);
            self.binding = Binding::Released;
        }
        self.refs.destroy();
        self.query = None;
    }
}

/// Renders at most `limit` rows (500 unless changed), then a count of the rest.
pub struct ViewDisplay<'v> {
    table: &'v Table,
    rows: &'v [usize],
    limit: usize,
}

impl ViewDisplay<'_> {
    pub fn limit(self, limit: usize) -> Self {
        ViewDisplay { limit, ..self }
    }
}

impl fmt::Display for ViewDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.table.fmt_rows(f, self.rows.iter().copied(), self.limit)
    }
}

/// Generated for both view kinds: construction, lifecycle and the
/// `find_all_*` searches producing a listing of the same kind.
macro_rules! view_kind {
    ($kind:ident) => {
        impl $kind {
            /// An unattached view.
            pub fn new() -> Self {
                $kind(ViewBase::null())
            }

            #[track_caller]
            pub fn copy(&self, group: &mut Group) -> Self {
                $kind(self.0.copy_base(group))
            }

            /// Move out of this view, which is left detached.
            pub fn take(&mut self, group: &mut Group) -> Self {
                $kind(self.0.take_base(group))
            }

            #[track_caller]
            pub fn find_all_int(&mut self, group: &mut Group, col: usize, value: i64) -> Self {
                $kind(self.0.derive(group, |t, rows| {
                    aggregate::find_all(t.int_column(col), rows.iter().copied(), &value)
                }))
            }

            #[track_caller]
            pub fn find_all_bool(&mut self, group: &mut Group, col: usize, value: bool) -> Self {
                $kind(self.0.derive(group, |t, rows| {
                    aggregate::find_all(t.bool_column(col), rows.iter().copied(), &value)
                }))
            }

            #[track_caller]
            pub fn find_all_float(&mut self, group: &mut Group, col: usize, value: f32) -> Self {
                $kind(self.0.derive(group, |t, rows| {
                    aggregate::find_all(t.float_column(col), rows.iter().copied(), &value)
                }))
            }

            #[track_caller]
            pub fn find_all_double(&mut self, group: &mut Group, col: usize, value: f64) -> Self {
                $kind(self.0.derive(group, |t, rows| {
                    aggregate::find_all(t.double_column(col), rows.iter().copied(), &value)
                }))
            }

            #[track_caller]
            pub fn find_all_datetime(
                &mut self,
                group: &mut Group,
                col: usize,
                value: DateTime,
            ) -> Self {
                $kind(self.0.derive(group, |t, rows| {
                    aggregate::find_all(t.datetime_column(col), rows.iter().copied(), &value)
                }))
            }

            #[track_caller]
            pub fn find_all_string(&mut self, group: &mut Group, col: usize, value: &str) -> Self {
                $kind(self.0.derive(group, |t, rows| {
                    aggregate::find_all(t.string_column(col), rows.iter().copied(), value)
                }))
            }

            #[track_caller]
            pub fn find_all_binary(&mut self, group: &mut Group, col: usize, value: &[u8]) -> Self {
                $kind(self.0.derive(group, |t, rows| {
                    aggregate::find_all(t.binary_column(col), rows.iter().copied(), value)
                }))
            }
        }

        impl Default for $kind {
            fn default() -> Self {
                $kind::new()
            }
        }

        impl Deref for $kind {
            type Target = ViewBase;

            fn deref(&self) -> &ViewBase {
                &self.0
            }
        }

        impl DerefMut for $kind {
            fn deref_mut(&mut self) -> &mut ViewBase {
                &mut self.0
            }
        }
    };
}

/// A view that can write through to its table.
#[derive(Debug)]
pub struct TableView(ViewBase);

/// A view that can read, sort and filter, but never change its table.
#[derive(Debug)]
pub struct ConstTableView(ViewBase);

view_kind!(TableView);
view_kind!(ConstTableView);

impl From<TableView> for ConstTableView {
    fn from(view: TableView) -> Self {
        ConstTableView(view.0)
    }
}

macro_rules! view_setters {
    ($($set:ident: $ty:ty;)*) => {
        $(
            #[track_caller]
            pub fn $set(&mut self, group: &mut Group, col: usize, row: usize, value: $ty) {
                let (key, source) = self.target(group, row);
                group.table_entry_mut(key).$set(col, source, value);
            }
        )*
    };
}

impl TableView {
    pub(crate) fn from_base(base: ViewBase) -> Self {
        TableView(base)
    }

    /// Sync, then resolve a view row to its table and source row.
    #[track_caller]
    fn target(&mut self, group: &Group, row: usize) -> (TableKey, usize) {
        self.0.sync_if_needed(group);
        let (key, _) = self.0.attached_table(group);
        (key, self.0.source(row))
    }

    view_setters! {
        set_int: i64;
        set_bool: bool;
        set_float: f32;
        set_double: f64;
        set_datetime: DateTime;
        set_string: &str;
        set_binary: &[u8];
        set_mixed: Mixed;
    }

    /// Add `delta` to the cell of every row in the view.
    #[track_caller]
    pub fn add_int(&mut self, group: &mut Group, col: usize, delta: i64) {
        self.0.sync_if_needed(group);
        let (key, _) = self.0.attached_table(group);
        group
            .table_entry_mut(key)
            .add_int_rows(col, self.0.refs.iter().copied(), delta);
    }

    #[track_caller]
    pub fn set_link(&mut self, group: &mut Group, col: usize, row: usize, target_row: usize) {
        let (key, source) = self.target(group, row);
        group.set_link(key, col, source, target_row);
    }

    #[track_caller]
    pub fn nullify_link(&mut self, group: &mut Group, col: usize, row: usize) {
        let (key, source) = self.target(group, row);
        group.nullify_link(key, col, source);
    }

    #[track_caller]
    pub fn set_subtable(&mut self, group: &mut Group, col: usize, row: usize, table: &Table) {
        let (key, source) = self.target(group, row);
        group.table_entry_mut(key).set_subtable(col, source, table);
    }

    #[track_caller]
    pub fn clear_subtable(&mut self, group: &mut Group, col: usize, row: usize) {
        let (key, source) = self.target(group, row);
        group.table_entry_mut(key).clear_subtable(col, source);
    }

    #[track_caller]
    pub fn subtable_mut<'g>(
        &mut self,
        group: &'g mut Group,
        col: usize,
        row: usize,
    ) -> &'g mut Table {
        let (key, source) = self.target(group, row);
        group.table_entry_mut(key).subtable_mut(col, source)
    }

    /// Remove the source row of view row `row` from the table. Later refs
    /// are shifted down so the view stays valid for its own removals.
    #[track_caller]
    pub fn remove(&mut self, group: &mut Group, row: usize) {
        let (key, source) = self.target(group, row);
        group.remove_row(key, source);

        let refs = &mut self.0.refs;
        let is_last = row + 1 == refs.size();
        refs.erase(row, is_last);
        for r in refs.as_mut_slice() {
            if *r > source {
                *r -= 1;
            }
        }
    }

    #[track_caller]
    pub fn remove_last(&mut self, group: &mut Group) {
        let size = self.0.size(group);
        if size > 0 {
            self.remove(group, size - 1);
        }
    }

    /// Remove every source row of the view from the table.
    #[track_caller]
    pub fn clear(&mut self, group: &mut Group) {
        self.0.sync_if_needed(group);
        let (key, _) = self.0.attached_table(group);
        let mut rows = self.0.refs.as_slice().to_vec();
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();
        for row in rows {
            group.remove_row(key, row);
        }
        self.0.refs.clear();
    }
}
