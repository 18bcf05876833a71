//! # Recoverable failures
//! Only storage growth can fail recoverably. Contract violations (wrong column
//! type, out of range indices, detached views) panic at the call site, and
//! search misses are reported through [`Option`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    /// The allocator could not provide room for `additional` more cells.
    #[error("failed to allocate space for {additional} more cells")]
    AllocationFailure { additional: usize },
}

pub type Result<T> = std::result::Result<T, ColumnError>;
