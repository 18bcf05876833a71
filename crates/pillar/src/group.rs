//! # Groups of tables
//! The owner of every table that can be linked to, or viewed.
//!
//! ## Back-references without ownership
//! - Tables live in a generational arena, a [`TableKey`] for a removed table
//!   never resolves again (even if the slot is reused).
//! - Each view is registered in the group's view arena, and its handle is
//!   recorded in the table's registry. Removing a table deletes all of its
//!   registrations, which is how its views learn they are detached.
//!
//! ## Links
//! Row insertion, removal and clearing on a table that others link to shift or
//! nullify the linking cells. The tables holding those cells count as changed.

use std::{fmt, ops::Deref};

use rustc_hash::FxHashMap;
use thunderdome::{Arena as ThunderArena, Index as ThunderIndex};
use typed_generational_arena::{StandardArena as GenArena, StandardIndex};

use crate::{
    aggregate,
    column::ColumnStore,
    error::Result,
    query::Query,
    table::Table,
    types::{DataType, DateTime, Mixed, Value},
    view::{TableView, ViewBase},
};

/// Identifies a table within its [`Group`].
#[derive(Clone, Copy)]
pub struct TableKey(StandardIndex<Table>);

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for TableKey {}

impl fmt::Debug for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableKey({})", self.0.to_idx())
    }
}

/// A table borrowed for writing from its [`Group`].
///
/// Reads go through [`Deref`] to the [`Table`]. Every write is one of the
/// table's own mutations, so the version only moves forward and the view
/// registry and link counts stay with the table. The table itself can never
/// be replaced:
/// ```compile_fail
/// # use pillar::{Group, Table};
/// let mut group = Group::new();
/// let t = group.add_table("t");
/// *group.table_mut(t) = Table::new();
/// ```
#[derive(Debug)]
pub struct TableMut<'g> {
    table: &'g mut Table,
}

/// Mutating [`Table`] methods, forwarded unchanged.
macro_rules! forward_mut {
    ($($name:ident($($arg:ident: $ty:ty),*) $(-> $ret:ty)?;)*) => {
        $(
            #[track_caller]
            pub fn $name(&mut self, $($arg: $ty),*) $(-> $ret)? {
                self.table.$name($($arg),*)
            }
        )*
    };
}

impl TableMut<'_> {
    forward_mut! {
        bump_version();
        add_column(data_type: DataType, name: &str) -> Result<usize>;
        remove_column(col: usize);
        rename_column(col: usize, name: &str);
        add_empty_row() -> Result<usize>;
        add_empty_rows(count: usize) -> Result<usize>;
        insert_empty_row(at: usize) -> Result<()>;
        append_row(values: Vec<Value>) -> Result<usize>;
        remove_row(row: usize);
        remove_last_row();
        clear();
        set_int(col: usize, row: usize, value: i64);
        set_bool(col: usize, row: usize, value: bool);
        set_float(col: usize, row: usize, value: f32);
        set_double(col: usize, row: usize, value: f64);
        set_datetime(col: usize, row: usize, value: DateTime);
        set_string(col: usize, row: usize, value: &str);
        set_binary(col: usize, row: usize, value: &[u8]);
        set_mixed(col: usize, row: usize, value: Mixed);
        add_int(col: usize, delta: i64);
        subtable_mut(col: usize, row: usize) -> &mut Table;
        set_subtable(col: usize, row: usize, table: &Table);
        clear_subtable(col: usize, row: usize);
        nullify_link(col: usize, row: usize);
    }
}

impl Deref for TableMut<'_> {
    type Target = Table;

    fn deref(&self) -> &Table {
        &*self.table
    }
}

/// Identifies one view registration.
pub type ViewHandle = ThunderIndex;

struct ViewLink {
    table: TableKey,
}

pub struct Group {
    tables: GenArena<Table>,
    names: FxHashMap<String, TableKey>,
    views: ThunderArena<ViewLink>,
}

impl Default for Group {
    fn default() -> Self {
        Group::new()
    }
}

/// Listing views of the rows whose cell equals a value.
macro_rules! find_all_views {
    ($($find:ident, $column:ident, $ty:ty;)*) => {
        $(
            #[track_caller]
            pub fn $find(&mut self, key: TableKey, col: usize, value: $ty) -> TableView {
                let table = self.table(key);
                let rows = aggregate::find_all(table.$column(col), 0..table.size(), &value);
                TableView::from_base(ViewBase::listing(self, key, rows))
            }
        )*
    };
}

impl Group {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// A group with room for `size_hint` tables.
    pub fn with_capacity(size_hint: usize) -> Self {
        Group {
            tables: GenArena::with_capacity(size_hint),
            names: FxHashMap::default(),
            views: ThunderArena::new(),
        }
    }

    // Tables

    #[track_caller]
    pub fn add_table(&mut self, name: &str) -> TableKey {
        self.insert_table(name, Table::new())
    }

    /// Add an existing table, which starts with no views and no links into it.
    #[track_caller]
    pub fn insert_table(&mut self, name: &str, table: Table) -> TableKey {
        assert!(
            !self.names.contains_key(name),
            "a table named `{name}` already exists"
        );
        assert!(
            table.link_columns().next().is_none(),
            "tables with link columns cannot be moved between groups"
        );
        let key = TableKey(self.tables.insert(table));
        self.names.insert(name.to_owned(), key);
        key
    }

    pub fn table_key(&self, name: &str) -> Option<TableKey> {
        self.names.get(name).copied()
    }

    pub fn contains(&self, key: TableKey) -> bool {
        self.tables.get(key.0).is_some()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn try_table(&self, key: TableKey) -> Option<&Table> {
        self.tables.get(key.0)
    }

    #[track_caller]
    pub fn table(&self, key: TableKey) -> &Table {
        match self.tables.get(key.0) {
            Some(table) => table,
            None => panic!("{key:?} is not in the group"),
        }
    }

    /// Write access to a table's schema and cells. Row shifting and removal on
    /// a link target must still go through the group's own methods.
    #[track_caller]
    pub fn table_mut(&mut self, key: TableKey) -> TableMut<'_> {
        TableMut {
            table: self.table_entry_mut(key),
        }
    }

    #[track_caller]
    pub(crate) fn table_entry_mut(&mut self, key: TableKey) -> &mut Table {
        match self.tables.get_mut(key.0) {
            Some(table) => table,
            None => panic!("{key:?} is not in the group"),
        }
    }

    /// Destroy a table. Every view of it becomes detached.
    /// - `INV`: no other table links to it.
    #[track_caller]
    pub fn remove_table(&mut self, key: TableKey) {
        let linked_from_elsewhere = self.keys().into_iter().any(|other| {
            other != key
                && self
                    .table(other)
                    .link_columns()
                    .any(|(_, target)| target == key)
        });
        assert!(
            !linked_from_elsewhere,
            "{key:?} is still the target of links from other tables"
        );

        let mut table = match self.tables.remove(key.0) {
            Some(table) => table,
            None => panic!("{key:?} is not in the group"),
        };
        for (_, target) in table.link_columns() {
            if target != key {
                self.table_entry_mut(target).remove_backlink();
            }
        }
        let views = table.take_views();
        for handle in &views {
            self.views.remove(*handle);
        }
        self.names.retain(|_, k| *k != key);
        tracing::debug!(table = ?key, views = views.len(), "removed table, detached its views");
    }

    /// Apply an external change: the table's views will re-sync on next access.
    #[track_caller]
    pub fn bump_version(&mut self, key: TableKey) {
        self.table_entry_mut(key).bump_version();
    }

    // Link aware structure

    /// Add a link column to `key`, each cell null or a row of `target`.
    #[track_caller]
    pub fn add_link_column(&mut self, key: TableKey, name: &str, target: TableKey) -> Result<usize> {
        assert!(self.contains(target), "link target {target:?} is not in the group");
        let table = self.table_entry_mut(key);
        let store = ColumnStore::new_link(target, table.size());
        let col = table.push_column(store, name)?;
        self.table_entry_mut(target).add_backlink();
        Ok(col)
    }

    #[track_caller]
    pub fn remove_column(&mut self, key: TableKey, col: usize) {
        let mut store = self.table_entry_mut(key).take_column(col);
        if let Some(target) = store.link_target() {
            self.table_entry_mut(target).remove_backlink();
        }
        store.destroy();
    }

    pub fn add_empty_row(&mut self, key: TableKey) -> Result<usize> {
        self.table_entry_mut(key).add_empty_rows(1)
    }

    pub fn add_empty_rows(&mut self, key: TableKey, count: usize) -> Result<usize> {
        self.table_entry_mut(key).add_empty_rows(count)
    }

    #[track_caller]
    pub fn insert_empty_row(&mut self, key: TableKey, at: usize) -> Result<()> {
        self.table_entry_mut(key).grow(at, 1)?;
        self.remap_links_into(key, |link| Some(if link >= at { link + 1 } else { link }));
        Ok(())
    }

    /// Append a row, checking any links against their target tables.
    #[track_caller]
    pub fn append_row(&mut self, key: TableKey, values: Vec<Value>) -> Result<usize> {
        let table = self.table(key);
        for (col, target) in table.link_columns() {
            if let Some(Value::Link(Some(row))) = values.get(col) {
                self.check_link_row(target, *row);
            }
        }
        self.table_entry_mut(key).push_row(values)
    }

    /// Remove a row, nullifying links to it and shifting links to later rows.
    #[track_caller]
    pub fn remove_row(&mut self, key: TableKey, row: usize) {
        self.table_entry_mut(key).erase_row(row);
        self.remap_links_into(key, |link| match link.cmp(&row) {
            std::cmp::Ordering::Less => Some(link),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(link - 1),
        });
    }

    #[track_caller]
    pub fn remove_last_row(&mut self, key: TableKey) {
        let size = self.table(key).size();
        assert!(size > 0, "no rows to remove");
        self.remove_row(key, size - 1);
    }

    /// Remove every row, nullifying all links into the table.
    #[track_caller]
    pub fn clear_table(&mut self, key: TableKey) {
        self.table_entry_mut(key).truncate();
        self.remap_links_into(key, |_| None);
    }

    #[track_caller]
    pub fn set_link(&mut self, key: TableKey, col: usize, row: usize, target_row: usize) {
        let target = self.table(key).get_link_target(col);
        self.check_link_row(target, target_row);
        self.table_entry_mut(key).set_link_unchecked(col, row, target_row);
    }

    #[track_caller]
    pub fn nullify_link(&mut self, key: TableKey, col: usize, row: usize) {
        self.table_entry_mut(key).nullify_link(col, row);
    }

    #[track_caller]
    fn check_link_row(&self, target: TableKey, row: usize) {
        let size = self.table(target).size();
        assert!(
            row < size,
            "link to row {row} of {target:?}, which has {size} rows"
        );
    }

    /// Rewrite every non-null link into `target`. Each other table with a
    /// changed cell counts as changed, `target` itself was already changed by
    /// the operation that required the remap.
    fn remap_links_into(&mut self, target: TableKey, remap: impl Fn(usize) -> Option<usize>) {
        if self.table(target).backlink_count() == 0 {
            return;
        }
        let mut changed_tables = 0;
        for key in self.keys() {
            let table = self.table_entry_mut(key);
            let cols: Vec<usize> = table
                .link_columns()
                .filter(|(_, t)| *t == target)
                .map(|(col, _)| col)
                .collect();

            let mut changed = false;
            for col in cols {
                for cell in table.link_cells_mut(col).as_mut_slice() {
                    if let Some(link) = *cell {
                        let remapped = remap(link);
                        if remapped != *cell {
                            *cell = remapped;
                            changed = true;
                        }
                    }
                }
            }
            if changed && key != target {
                table.bump_version();
                changed_tables += 1;
            }
        }
        tracing::debug!(?target, changed_tables, "remapped links");
    }

    fn keys(&self) -> Vec<TableKey> {
        self.tables.iter().map(|(index, _)| TableKey(index)).collect()
    }

    // Queries and views

    /// A query over `key` matching every row, narrowed with the builder methods.
    #[track_caller]
    pub fn query(&self, key: TableKey) -> Query {
        assert!(self.contains(key), "{key:?} is not in the group");
        Query::new(key)
    }

    /// A view listing every row of the table, in order.
    #[track_caller]
    pub fn view_all(&mut self, key: TableKey) -> TableView {
        let rows = (0..self.table(key).size()).collect();
        TableView::from_base(ViewBase::listing(self, key, rows))
    }

    /// A view of hand picked rows.
    #[track_caller]
    pub fn view_rows(&mut self, key: TableKey, rows: Vec<usize>) -> TableView {
        let table = self.table(key);
        for row in &rows {
            table.check_row(*row);
        }
        TableView::from_base(ViewBase::listing(self, key, rows))
    }

    find_all_views! {
        find_all_int, int_column, i64;
        find_all_bool, bool_column, bool;
        find_all_float, float_column, f32;
        find_all_double, double_column, f64;
        find_all_datetime, datetime_column, DateTime;
    }

    #[track_caller]
    pub fn find_all_string(&mut self, key: TableKey, col: usize, value: &str) -> TableView {
        let table = self.table(key);
        let rows = aggregate::find_all(table.string_column(col), 0..table.size(), value);
        TableView::from_base(ViewBase::listing(self, key, rows))
    }

    #[track_caller]
    pub fn find_all_binary(&mut self, key: TableKey, col: usize, value: &[u8]) -> TableView {
        let table = self.table(key);
        let rows = aggregate::find_all(table.binary_column(col), 0..table.size(), value);
        TableView::from_base(ViewBase::listing(self, key, rows))
    }

    // View registry

    /// Total live view registrations across all tables.
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    #[track_caller]
    pub(crate) fn register_view(&mut self, table: TableKey) -> ViewHandle {
        let handle = self.views.insert(ViewLink { table });
        self.table_entry_mut(table).register_view(handle);
        tracing::trace!(?table, ?handle, "registered view");
        handle
    }

    pub(crate) fn unregister_view(&mut self, handle: ViewHandle) {
        if let Some(ViewLink { table }) = self.views.remove(handle) {
            if let Some(t) = self.tables.get_mut(table.0) {
                t.unregister_view(handle);
            }
            tracing::trace!(?table, ?handle, "unregistered view");
        }
    }

    /// The table a registration observes, [`None`] once the table is gone.
    pub(crate) fn view_table(&self, handle: ViewHandle) -> Option<TableKey> {
        self.views.get(handle).map(|link| link.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_do_not_alias_after_removal() {
        let mut group = Group::new();
        let first = group.add_table("first");
        group.remove_table(first);
        let second = group.add_table("second");
        assert!(!group.contains(first));
        assert!(group.contains(second));
        assert_ne!(first, second);
        assert!(group.try_table(first).is_none());
    }

    #[test]
    fn names_resolve_to_keys() {
        let mut group = Group::new();
        let t = group.add_table("t");
        assert_eq!(group.table_key("t"), Some(t));
        group.remove_table(t);
        assert_eq!(group.table_key("t"), None);
        assert_eq!(group.table_count(), 0);
    }

    #[test]
    fn registrations_follow_tables() {
        let mut group = Group::new();
        let t = group.add_table("t");
        let handle = group.register_view(t);
        assert_eq!(group.table(t).view_count(), 1);
        assert_eq!(group.view_table(handle), Some(t));

        group.unregister_view(handle);
        assert_eq!(group.table(t).view_count(), 0);
        assert_eq!(group.view_table(handle), None);

        let handle = group.register_view(t);
        group.remove_table(t);
        assert_eq!(group.view_table(handle), None);
        assert_eq!(group.view_count(), 0);
    }

    #[test]
    #[should_panic(expected = "is not in the group")]
    fn removed_tables_fail_fast() {
        let mut group = Group::new();
        let t = group.add_table("t");
        group.remove_table(t);
        group.table(t);
    }

    #[test]
    fn cloned_tables_enter_as_new_tables() {
        let mut group = Group::new();
        let t = group.add_table("t");
        group.table_mut(t).add_column(DataType::Int, "n").unwrap();
        group.add_empty_rows(t, 3).unwrap();
        let handle = group.register_view(t);
        let before = group.table(t).version();

        let clone = group.table(t).clone();
        let copy = group.insert_table("copy", clone);
        assert_eq!(group.table(copy).version(), 0);
        assert_eq!(group.table(copy).view_count(), 0);
        assert_eq!(group.table(t).version(), before);
        assert_eq!(group.table(t).view_count(), 1);
        assert_eq!(group.view_table(handle), Some(t));
    }

    #[test]
    fn writes_through_the_guard_only_move_versions_forward() {
        let mut group = Group::new();
        let t = group.add_table("t");
        let mut last = group.table(t).version();
        let mut table = group.table_mut(t);
        table.add_column(DataType::Int, "n").unwrap();
        table.add_empty_rows(2).unwrap();
        table.set_int(0, 1, 4);
        table.add_int(0, 1);
        table.clear();
        assert_eq!(table.version(), last + 5);
        last = table.version();
        group.bump_version(t);
        assert!(group.table(t).version() > last);
    }

    #[test]
    fn backlinks_are_counted() {
        let mut group = Group::new();
        let people = group.add_table("people");
        let pets = group.add_table("pets");
        let owner = group.add_link_column(pets, "owner", people).unwrap();
        assert_eq!(group.table(people).backlink_count(), 1);
        assert_eq!(group.table(pets).column_type(owner), DataType::Link);

        group.remove_column(pets, owner);
        assert_eq!(group.table(people).backlink_count(), 0);
        group.table_mut(people).add_empty_rows(2).unwrap();
        group.table_mut(people).remove_row(0);
    }
}
