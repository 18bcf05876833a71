//! # Vector based Column

use super::Column;
use crate::error::{ColumnError, Result};

/// The single storage implementation behind every column type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasicColumn<T> {
    data: Vec<T>,
}

impl<T> BasicColumn<T> {
    pub fn new(size_hint: usize) -> Self {
        BasicColumn {
            data: Vec::with_capacity(size_hint),
        }
    }

    /// Make room for `additional` cells, so the following adds cannot fail.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.data
            .try_reserve(additional)
            .map_err(|_| ColumnError::AllocationFailure { additional })
    }

    /// Swap-and-shrink removal, for storage where row order does not matter.
    /// The last cell takes the place of `ndx`.
    pub fn move_last_over(&mut self, ndx: usize) {
        self.data.swap_remove(ndx);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn get_mut(&mut self, ndx: usize) -> &mut T {
        &mut self.data[ndx]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Default> BasicColumn<T> {
    /// Insert `count` default cells before `ndx`.
    pub fn insert_defaults(&mut self, ndx: usize, count: usize) -> Result<()> {
        self.reserve(count)?;
        self.data
            .splice(ndx..ndx, std::iter::repeat_with(T::default).take(count));
        Ok(())
    }
}

impl<T> From<Vec<T>> for BasicColumn<T> {
    fn from(data: Vec<T>) -> Self {
        BasicColumn { data }
    }
}

impl<T> Column for BasicColumn<T> {
    type Value = T;

    fn size(&self) -> usize {
        self.data.len()
    }

    fn get(&self, ndx: usize) -> &T {
        &self.data[ndx]
    }

    fn set(&mut self, ndx: usize, value: T) {
        self.data[ndx] = value;
    }

    fn insert(&mut self, ndx: usize, value: T) -> Result<()> {
        self.reserve(1)?;
        self.data.insert(ndx, value);
        Ok(())
    }

    fn erase(&mut self, ndx: usize, is_last: bool) {
        debug_assert_eq!(is_last, ndx + 1 == self.data.len());
        if is_last {
            self.data.truncate(ndx);
        } else {
            self.data.remove(ndx);
        }
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn destroy(&mut self) {
        self.data = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOATS: [f32; 5] = [0.0, 1.0, 2.12345, 12345.12, -12345.12];
    const DOUBLES: [f64; 5] = [0.0, 1.0, 2.12345, 12345.12, -12345.12];

    fn filled<T: Copy>(vals: &[T]) -> BasicColumn<T> {
        let mut c = BasicColumn::new(vals.len());
        for v in vals {
            c.add(*v).unwrap();
        }
        c
    }

    #[test]
    fn starts_empty() {
        let mut c = BasicColumn::<f32>::new(0);
        assert!(c.is_empty());
        assert_eq!(c.size(), 0);
        c.destroy();
    }

    #[test]
    fn add_then_get() {
        let mut c = BasicColumn::new(0);
        for (i, v) in DOUBLES.iter().enumerate() {
            c.add(*v).unwrap();
            assert_eq!(c.size(), i + 1);
            for (j, prev) in DOUBLES[..i].iter().enumerate() {
                assert_eq!(c.get(j), prev);
            }
        }
        c.destroy();
    }

    #[test]
    fn clear_empties() {
        let mut c = BasicColumn::<f32>::new(0);
        c.insert_defaults(0, 100).unwrap();
        assert!(!c.is_empty());
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn set_only_touches_target() {
        let mut c = filled(&FLOATS);
        c.set(0, 1.6);
        c.set(3, -987.23);
        assert_eq!(c.as_slice(), &[1.6, 1.0, 2.12345, -987.23, -12345.12]);
    }

    #[test]
    fn insert_shifts_upper_cells() {
        let mut c = BasicColumn::new(0);
        c.insert(0, DOUBLES[0]).unwrap();
        c.insert(0, DOUBLES[1]).unwrap();
        c.insert(1, DOUBLES[2]).unwrap();
        c.insert(3, DOUBLES[3]).unwrap();
        c.insert(0, DOUBLES[4]).unwrap();
        assert_eq!(
            c.as_slice(),
            &[DOUBLES[4], DOUBLES[1], DOUBLES[2], DOUBLES[0], DOUBLES[3]]
        );
    }

    #[test]
    fn erase_middle_first_and_last() {
        let mut c = filled(&FLOATS);

        c.erase(2, false);
        assert_eq!(c.as_slice(), &[FLOATS[0], FLOATS[1], FLOATS[3], FLOATS[4]]);

        c.erase(0, false);
        assert_eq!(c.as_slice(), &[FLOATS[1], FLOATS[3], FLOATS[4]]);

        c.erase(2, true);
        assert_eq!(c.as_slice(), &[FLOATS[1], FLOATS[3]]);

        c.erase(1, true);
        c.erase(0, true);
        assert!(c.is_empty());
    }

    #[test]
    fn move_last_over_reorders() {
        let mut c = filled(&[1i64, 2, 3, 4]);
        c.move_last_over(1);
        assert_eq!(c.as_slice(), &[1, 4, 3]);
    }

    #[test]
    fn destroyed_column_is_empty() {
        let mut c = filled(&[1i64, 2, 3]);
        c.destroy();
        assert!(c.is_empty());
        c.add(7).unwrap();
        assert_eq!(*c.get(0), 7);
    }

    #[test]
    fn impossible_growth_is_reported() {
        let mut c = BasicColumn::<u64>::new(0);
        assert_eq!(
            c.reserve(usize::MAX),
            Err(ColumnError::AllocationFailure {
                additional: usize::MAX
            })
        );
        assert!(c.is_empty());
    }
}
