//! # Aggregation, search and sorting
//! Generic reducers over one column, restricted to a set of rows.
//!
//! Tables pass every row (`0..size`), views pass their synced row indices, so
//! both share these implementations. Search results are *positions* within the
//! supplied rows, which for a table is the row index itself.
//!
//! Empty row sets sum and count to zero, and have no minimum, maximum or
//! average.

use std::{borrow::Borrow, cmp::Ordering};

use crate::column::{BasicColumn, Column, ColumnStore};

/// Column types that can be summed and averaged.
pub trait Numeric: Copy + PartialOrd {
    /// Sums of 32 bit floats are accumulated as doubles.
    type Sum: Copy + Default;

    /// Add to a running sum. Integer sums wrap on overflow.
    fn accumulate(self, total: Self::Sum) -> Self::Sum;
    fn as_f64(self) -> f64;
}

impl Numeric for i64 {
    type Sum = i64;

    fn accumulate(self, total: i64) -> i64 {
        total.wrapping_add(self)
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Numeric for f32 {
    type Sum = f64;

    fn accumulate(self, total: f64) -> f64 {
        total + self as f64
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Numeric for f64 {
    type Sum = f64;

    fn accumulate(self, total: f64) -> f64 {
        total + self
    }

    fn as_f64(self) -> f64 {
        self
    }
}

pub fn sum<T: Numeric>(column: &BasicColumn<T>, rows: impl IntoIterator<Item = usize>) -> T::Sum {
    rows.into_iter()
        .fold(T::Sum::default(), |total, row| column.get(row).accumulate(total))
}

/// Always accumulated in double precision.
pub fn average<T: Numeric>(
    column: &BasicColumn<T>,
    rows: impl IntoIterator<Item = usize>,
) -> Option<f64> {
    let (total, count) = rows
        .into_iter()
        .fold((0.0, 0usize), |(total, count), row| {
            (total + column.get(row).as_f64(), count + 1)
        });
    (count > 0).then(|| total / count as f64)
}

pub fn minimum<T: Copy + PartialOrd>(
    column: &BasicColumn<T>,
    rows: impl IntoIterator<Item = usize>,
) -> Option<T> {
    extreme(column, rows, Ordering::Less)
}

pub fn maximum<T: Copy + PartialOrd>(
    column: &BasicColumn<T>,
    rows: impl IntoIterator<Item = usize>,
) -> Option<T> {
    extreme(column, rows, Ordering::Greater)
}

/// The first value that no later value beats in direction `wanted`. NaNs never
/// replace a value already held.
fn extreme<T: Copy + PartialOrd>(
    column: &BasicColumn<T>,
    rows: impl IntoIterator<Item = usize>,
    wanted: Ordering,
) -> Option<T> {
    rows.into_iter().map(|row| *column.get(row)).reduce(|best, next| {
        if next.partial_cmp(&best) == Some(wanted) {
            next
        } else {
            best
        }
    })
}

/// Rows whose cell equals `target`.
pub fn count<T, Q>(
    column: &BasicColumn<T>,
    rows: impl IntoIterator<Item = usize>,
    target: &Q,
) -> usize
where
    T: Borrow<Q>,
    Q: PartialEq + ?Sized,
{
    rows.into_iter()
        .filter(|row| column.get(*row).borrow() == target)
        .count()
}

/// Position (within `rows`) of the first cell equal to `target`.
pub fn find_first<T, Q>(
    column: &BasicColumn<T>,
    rows: impl IntoIterator<Item = usize>,
    target: &Q,
) -> Option<usize>
where
    T: Borrow<Q>,
    Q: PartialEq + ?Sized,
{
    rows.into_iter()
        .position(|row| column.get(row).borrow() == target)
}

/// The rows (not positions) whose cell equals `target`, in the order given.
pub fn find_all<T, Q>(
    column: &BasicColumn<T>,
    rows: impl IntoIterator<Item = usize>,
    target: &Q,
) -> Vec<usize>
where
    T: Borrow<Q>,
    Q: PartialEq + ?Sized,
{
    rows.into_iter()
        .filter(|row| column.get(*row).borrow() == target)
        .collect()
}

/// Stable sort of row indices by their cells in `column`. Descending order
/// flips the comparison rather than reversing the result, so equal cells keep
/// their relative order either way.
#[track_caller]
pub fn sort_rows(column: &ColumnStore, rows: &mut [usize], ascending: bool) {
    if ascending {
        rows.sort_by(|a, b| column.compare_rows(*a, *b));
    } else {
        rows.sort_by(|a, b| column.compare_rows(*b, *a));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reducers_over_subset() {
        let c = BasicColumn::from(vec![3i64, 1, 2, 8]);
        assert_eq!(sum(&c, [0, 2]), 5);
        assert_eq!(minimum(&c, [0, 2]), Some(2));
        assert_eq!(maximum(&c, 0..4), Some(8));
        assert_eq!(average(&c, [1, 2]), Some(1.5));
    }

    #[test]
    fn float_sums_widen() {
        let c = BasicColumn::from(vec![f32::MAX, f32::MAX]);
        assert_eq!(sum(&c, 0..2), f32::MAX as f64 * 2.0);
        assert_eq!(average(&c, 0..2), Some(f32::MAX as f64));
    }

    #[test]
    fn int_sums_wrap() {
        let c = BasicColumn::from(vec![i64::MAX, 1, 5]);
        assert_eq!(sum(&c, 0..2), i64::MIN);
        assert_eq!(sum(&c, 0..3), i64::MIN + 5);
        assert_eq!(average(&c, [0, 1]), Some((i64::MAX as f64 + 1.0) / 2.0));
    }

    #[test]
    fn empty_sets() {
        let c = BasicColumn::<f64>::from(vec![1.0]);
        assert_eq!(sum(&c, 0..0), 0.0);
        assert_eq!(minimum(&c, 0..0), None);
        assert_eq!(average(&c, 0..0), None);
        assert_eq!(count(&c, 0..0, &1.0), 0);
    }

    #[test]
    fn searches_report_positions() {
        let c = BasicColumn::from(vec!["x".to_owned(), "y".to_owned(), "x".to_owned()]);
        assert_eq!(find_first(&c, [2, 1, 0], "y"), Some(1));
        assert_eq!(find_first(&c, [2, 0], "y"), None);
        assert_eq!(find_all(&c, 0..3, "x"), vec![0, 2]);
        assert_eq!(count(&c, 0..3, "x"), 2);
    }

    #[test]
    fn sort_is_stable_both_ways() {
        let c = ColumnStore::Int(vec![2, 1, 2, 1].into());
        let mut rows = vec![0, 1, 2, 3];
        sort_rows(&c, &mut rows, true);
        assert_eq!(rows, [1, 3, 0, 2]);
        sort_rows(&c, &mut rows, true);
        assert_eq!(rows, [1, 3, 0, 2]);

        let mut rows = vec![0, 1, 2, 3];
        sort_rows(&c, &mut rows, false);
        assert_eq!(rows, [0, 2, 1, 3]);
    }
}
