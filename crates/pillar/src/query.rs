//! # Queries
//! A re-executable predicate over one table.
//!
//! Conditions are added with builder methods, consecutive conditions are
//! combined with *and*, [`Query::or`] starts a new alternative within the
//! current group, and [`Query::begin_group`]/[`Query::end_group`] nest.
//! ```
//! use pillar::{DataType, Group, Value};
//! let mut group = Group::new();
//! let t = group.add_table("t");
//! group.table_mut(t).add_column(DataType::Int, "n").unwrap();
//! for n in 0..10 {
//!     group.append_row(t, vec![Value::Int(n)]).unwrap();
//! }
//! // n < 2 || (n >= 5 && !(n == 7))
//! let query = group
//!     .query(t)
//!     .less(0, 2)
//!     .or()
//!     .begin_group()
//!     .greater_equal(0, 5)
//!     .not()
//!     .equal(0, 7)
//!     .end_group();
//! assert_eq!(query.count(&group), 6);
//! ```
//!
//! Queries hold their expression by value, so a clone (such as the one stored
//! in every view a query produces) re-executes independently of the original.

use std::cmp::Ordering;

use crate::{
    column::{Column, ColumnStore},
    group::{Group, TableKey},
    table::Table,
    types::{DataType, Value},
    view::{TableView, ViewBase},
};

/// Which rows of the table a query scans, and how many matches it keeps.
/// - `end` is clamped to the table size at execution, a range stored in a view
///   stays valid as the table shrinks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchRange {
    pub start: usize,
    pub end: Option<usize>,
    pub limit: Option<usize>,
}

impl SearchRange {
    pub fn new(start: usize, end: Option<usize>, limit: Option<usize>) -> Self {
        SearchRange { start, end, limit }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CompareOp {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl CompareOp {
    /// `ordering` is [`None`] for incomparable floats, which only satisfy
    /// [`CompareOp::NotEqual`].
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match self {
            CompareOp::Equal => ordering == Some(Ordering::Equal),
            CompareOp::NotEqual => ordering != Some(Ordering::Equal),
            CompareOp::Greater => ordering == Some(Ordering::Greater),
            CompareOp::GreaterEqual => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            CompareOp::Less => ordering == Some(Ordering::Less),
            CompareOp::LessEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextOp {
    BeginsWith,
    EndsWith,
    Contains,
}

#[derive(Clone, Debug)]
enum Condition {
    Compare {
        column: usize,
        op: CompareOp,
        operand: Value,
    },
    Text {
        column: usize,
        op: TextOp,
        /// Lowercased when not case sensitive.
        needle: String,
        case_sensitive: bool,
    },
    LinksTo {
        column: usize,
        target: Option<usize>,
    },
}

#[derive(Clone, Debug)]
enum Expr {
    Leaf(Condition),
    /// Empty conjunctions match every row.
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

/// An open group: alternatives, each a conjunction.
#[derive(Clone, Debug)]
struct Frame {
    alternatives: Vec<Vec<Expr>>,
    negated: bool,
}

impl Frame {
    fn new(negated: bool) -> Self {
        Frame {
            alternatives: vec![Vec::new()],
            negated,
        }
    }

    fn into_expr(self) -> Expr {
        let mut alternatives: Vec<Expr> = self.alternatives.into_iter().map(Expr::And).collect();
        let expr = if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Expr::Or(alternatives)
        };
        if self.negated {
            Expr::Not(Box::new(expr))
        } else {
            expr
        }
    }
}

#[derive(Clone, Debug)]
pub struct Query {
    table: TableKey,
    /// The root group first, then any open nested groups.
    frames: Vec<Frame>,
    pending_not: bool,
    unbalanced: bool,
}

impl Query {
    /// A query matching every row of `table`, see [`Group::query`].
    pub(crate) fn new(table: TableKey) -> Self {
        Query {
            table,
            frames: vec![Frame::new(false)],
            pending_not: false,
            unbalanced: false,
        }
    }

    pub fn table_key(&self) -> TableKey {
        self.table
    }

    fn push(mut self, expr: Expr) -> Self {
        let expr = if std::mem::take(&mut self.pending_not) {
            Expr::Not(Box::new(expr))
        } else {
            expr
        };
        if let Some(alternative) = self
            .frames
            .last_mut()
            .and_then(|frame| frame.alternatives.last_mut())
        {
            alternative.push(expr);
        }
        self
    }

    fn compare(self, column: usize, op: CompareOp, operand: Value) -> Self {
        self.push(Expr::Leaf(Condition::Compare {
            column,
            op,
            operand,
        }))
    }

    fn text(self, column: usize, op: TextOp, needle: &str, case_sensitive: bool) -> Self {
        let needle = if case_sensitive {
            needle.to_owned()
        } else {
            needle.to_lowercase()
        };
        self.push(Expr::Leaf(Condition::Text {
            column,
            op,
            needle,
            case_sensitive,
        }))
    }

    // Conditions

    pub fn equal(self, column: usize, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Equal, value.into())
    }

    pub fn not_equal(self, column: usize, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::NotEqual, value.into())
    }

    pub fn greater(self, column: usize, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Greater, value.into())
    }

    pub fn greater_equal(self, column: usize, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::GreaterEqual, value.into())
    }

    pub fn less(self, column: usize, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Less, value.into())
    }

    pub fn less_equal(self, column: usize, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::LessEqual, value.into())
    }

    /// Inclusive at both ends.
    pub fn between(self, column: usize, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        let both = Expr::And(vec![
            Expr::Leaf(Condition::Compare {
                column,
                op: CompareOp::GreaterEqual,
                operand: low.into(),
            }),
            Expr::Leaf(Condition::Compare {
                column,
                op: CompareOp::LessEqual,
                operand: high.into(),
            }),
        ]);
        self.push(both)
    }

    pub fn begins_with(self, column: usize, prefix: &str) -> Self {
        self.text(column, TextOp::BeginsWith, prefix, true)
    }

    pub fn begins_with_ci(self, column: usize, prefix: &str) -> Self {
        self.text(column, TextOp::BeginsWith, prefix, false)
    }

    pub fn ends_with(self, column: usize, suffix: &str) -> Self {
        self.text(column, TextOp::EndsWith, suffix, true)
    }

    pub fn ends_with_ci(self, column: usize, suffix: &str) -> Self {
        self.text(column, TextOp::EndsWith, suffix, false)
    }

    pub fn contains(self, column: usize, needle: &str) -> Self {
        self.text(column, TextOp::Contains, needle, true)
    }

    pub fn contains_ci(self, column: usize, needle: &str) -> Self {
        self.text(column, TextOp::Contains, needle, false)
    }

    pub fn links_to(self, column: usize, target_row: usize) -> Self {
        self.push(Expr::Leaf(Condition::LinksTo {
            column,
            target: Some(target_row),
        }))
    }

    pub fn is_null_link(self, column: usize) -> Self {
        self.push(Expr::Leaf(Condition::LinksTo {
            column,
            target: None,
        }))
    }

    // Combinators

    /// Negate the next condition or group.
    pub fn not(mut self) -> Self {
        self.pending_not = !self.pending_not;
        self
    }

    /// Start a new alternative in the current group.
    pub fn or(mut self) -> Self {
        if let Some(frame) = self.frames.last_mut() {
            frame.alternatives.push(Vec::new());
        }
        self
    }

    pub fn begin_group(mut self) -> Self {
        let negated = std::mem::take(&mut self.pending_not);
        self.frames.push(Frame::new(negated));
        self
    }

    pub fn end_group(mut self) -> Self {
        if self.frames.len() < 2 {
            self.unbalanced = true;
            return self;
        }
        match self.frames.pop() {
            Some(frame) => {
                let expr = frame.into_expr();
                if let Some(alternative) = self
                    .frames
                    .last_mut()
                    .and_then(|frame| frame.alternatives.last_mut())
                {
                    alternative.push(expr);
                }
            }
            None => self.unbalanced = true,
        }
        self
    }

    // Execution

    /// The rows matching over the whole table.
    #[track_caller]
    pub fn find_all(&self, group: &mut Group) -> TableView {
        self.find_all_range(group, SearchRange::default())
    }

    /// A view of the matching rows in `range`, in table order. The view keeps a
    /// copy of this query and the range, and re-runs them when the table
    /// changes.
    #[track_caller]
    pub fn find_all_range(&self, group: &mut Group, range: SearchRange) -> TableView {
        let rows = self.find_all_rows(group.table(self.table), range);
        TableView::from_base(ViewBase::queried(group, self.clone(), range, rows))
    }

    #[track_caller]
    pub fn find_first(&self, group: &Group) -> Option<usize> {
        self.find_next(group, 0)
    }

    /// The first matching row at or after `from`.
    #[track_caller]
    pub fn find_next(&self, group: &Group, from: usize) -> Option<usize> {
        let table = group.table(self.table);
        let root = self.root(table);
        (from..table.size()).find(|row| root.eval(table, *row))
    }

    #[track_caller]
    pub fn count(&self, group: &Group) -> usize {
        let table = group.table(self.table);
        let root = self.root(table);
        (0..table.size()).filter(|row| root.eval(table, *row)).count()
    }

    /// Matching rows within `range`, ascending.
    #[track_caller]
    pub(crate) fn find_all_rows(&self, table: &Table, range: SearchRange) -> Vec<usize> {
        let root = self.root(table);
        let end = range.end.map_or(table.size(), |end| end.min(table.size()));
        (range.start.min(end)..end)
            .filter(|row| root.eval(table, *row))
            .take(range.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// The complete expression, checked against the table's schema.
    #[track_caller]
    fn root(&self, table: &Table) -> Expr {
        assert!(
            !self.unbalanced && self.frames.len() == 1,
            "query has unbalanced groups"
        );
        let root = self.frames[0].clone().into_expr();
        root.check(table);
        root
    }
}

impl Expr {
    #[track_caller]
    fn check(&self, table: &Table) {
        match self {
            Expr::Leaf(condition) => condition.check(table),
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().for_each(|e| e.check(table)),
            Expr::Not(expr) => expr.check(table),
        }
    }

    fn eval(&self, table: &Table, row: usize) -> bool {
        match self {
            Expr::Leaf(condition) => condition.eval(table, row),
            Expr::And(exprs) => exprs.iter().all(|e| e.eval(table, row)),
            Expr::Or(exprs) => exprs.iter().any(|e| e.eval(table, row)),
            Expr::Not(expr) => !expr.eval(table, row),
        }
    }
}

fn operand_fits(column: DataType, operand: DataType) -> bool {
    match column {
        DataType::Float | DataType::Double => {
            matches!(operand, DataType::Float | DataType::Double)
        }
        DataType::Table | DataType::Mixed => false,
        other => other == operand,
    }
}

impl Condition {
    #[track_caller]
    fn check(&self, table: &Table) {
        match self {
            Condition::Compare {
                column, operand, ..
            } => {
                let found = table.column_type(*column);
                assert!(
                    operand_fits(found, operand.data_type()),
                    "cannot compare {found} column {column} with a {} operand",
                    operand.data_type()
                );
            }
            Condition::Text { column, .. } => {
                let found = table.column_type(*column);
                assert!(
                    found == DataType::String,
                    "text conditions need a string column, column {column} is {found}"
                );
            }
            Condition::LinksTo { column, .. } => {
                table.get_link_target(*column);
            }
        }
    }

    fn eval(&self, table: &Table, row: usize) -> bool {
        match self {
            Condition::Compare {
                column,
                op,
                operand,
            } => op.holds(compare_cell(table.column(*column), row, operand)),
            Condition::Text {
                column,
                op,
                needle,
                case_sensitive,
            } => {
                let cell = table.get_string(*column, row);
                if *case_sensitive {
                    op.matches(cell, needle)
                } else {
                    op.matches(&cell.to_lowercase(), needle)
                }
            }
            Condition::LinksTo { column, target } => table.get_link(*column, row) == *target,
        }
    }
}

impl TextOp {
    fn matches(self, cell: &str, needle: &str) -> bool {
        match self {
            TextOp::BeginsWith => cell.starts_with(needle),
            TextOp::EndsWith => cell.ends_with(needle),
            TextOp::Contains => cell.contains(needle),
        }
    }
}

/// Order a cell against an operand already checked by [`operand_fits`].
fn compare_cell(store: &ColumnStore, row: usize, operand: &Value) -> Option<Ordering> {
    match (store, operand) {
        (ColumnStore::Int(c), Value::Int(v)) => Some(c.get(row).cmp(v)),
        (ColumnStore::Bool(c), Value::Bool(v)) => Some(c.get(row).cmp(v)),
        (ColumnStore::Float(c), Value::Float(v)) => c.get(row).partial_cmp(v),
        (ColumnStore::Float(c), Value::Double(v)) => f64::from(*c.get(row)).partial_cmp(v),
        (ColumnStore::Double(c), Value::Double(v)) => c.get(row).partial_cmp(v),
        (ColumnStore::Double(c), Value::Float(v)) => c.get(row).partial_cmp(&f64::from(*v)),
        (ColumnStore::String(c), Value::String(v)) => Some(c.get(row).cmp(v)),
        (ColumnStore::Binary(c), Value::Binary(v)) => Some(c.get(row).cmp(v)),
        (ColumnStore::DateTime(c), Value::DateTime(v)) => Some(c.get(row).cmp(v)),
        (ColumnStore::Link { cells, .. }, Value::Link(v)) => Some(cells.get(row).cmp(v)),
        (store, operand) => unreachable!(
            "{} operand reached a {} column",
            operand.data_type(),
            store.data_type()
        ),
    }
}
