#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod column;
pub mod error;
pub mod group;
pub mod query;
pub mod table;
pub mod types;
pub mod view;

pub use error::{ColumnError, Result};
pub use group::{Group, TableKey, TableMut};
pub use query::{Query, SearchRange};
pub use table::{RowRef, Table};
pub use types::{DataType, DateTime, Mixed, Value};
pub use view::{ConstTableView, SortOrder, TableView, ViewBase, ViewDisplay, ViewState};
