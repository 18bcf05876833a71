//! # Table Columns
//! The positional contract shared by every column, and the storage behind it.
//!
//! A column is a sequence of cells indexed from `0`. Inserting or erasing at
//! `ndx` shifts every cell at or above `ndx`, and never touches cells below it.
//!
//! | Column type       | Storage                        |
//! |-------------------|--------------------------------|
//! | int               | `BasicColumn<i64>`             |
//! | bool              | `BasicColumn<bool>`            |
//! | float / double    | `BasicColumn<f32>` / `<f64>`   |
//! | string / binary   | `BasicColumn<String>` / bytes  |
//! | datetime          | `BasicColumn<DateTime>`        |
//! | link              | `BasicColumn<Option<usize>>`   |
//! | mixed             | `BasicColumn<Mixed>`           |
//! | table             | `BasicColumn<Table>`           |
//!
//! Tables work with the type-erased [`ColumnStore`], and only drop down to the
//! typed [`BasicColumn`] once the declared type has been checked.

use crate::error::Result;

mod basic;
mod store;

pub use basic::BasicColumn;
pub use store::ColumnStore;

/// A typed, positionally indexed sequence of cells.
pub trait Column {
    type Value;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// - `INV`: `ndx < self.size()`
    fn get(&self, ndx: usize) -> &Self::Value;

    /// - `INV`: `ndx < self.size()`
    fn set(&mut self, ndx: usize, value: Self::Value);

    /// Insert before `ndx`, `ndx == self.size()` appends.
    fn insert(&mut self, ndx: usize, value: Self::Value) -> Result<()>;

    fn add(&mut self, value: Self::Value) -> Result<()> {
        self.insert(self.size(), value)
    }

    /// Remove the cell at `ndx`.
    /// - `INV`: `is_last == (ndx + 1 == self.size())`, the caller decides
    ///   whether the cheaper truncation applies.
    fn erase(&mut self, ndx: usize, is_last: bool);

    fn clear(&mut self);

    /// Release the backing allocation.
    fn destroy(&mut self);
}
