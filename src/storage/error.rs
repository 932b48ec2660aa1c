//! Storage layer error types.

use crate::storage::page::PageId;
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Tuple not found: slot {slot_num} is empty or deleted")]
    TupleNotFound { slot_num: u32 },

    #[error("Invalid slot number: {slot_num} (tuple count: {tuple_count})")]
    InvalidSlot { slot_num: u32, tuple_count: u32 },

    #[error("Page is full: requires {required} bytes but only {available} available")]
    PageFull { required: usize, available: usize },

    #[error("Tuple of {size} bytes can never fit in a page (max: {max})")]
    TupleTooLarge { size: usize, max: usize },

    #[error("Tuple payload must not be empty")]
    EmptyTuple,

    #[error("Buffer pool is full: every frame is pinned")]
    BufferPoolFull,

    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Errors a heap reports as a plain failed operation instead of an error.
    pub fn is_operation_failure(&self) -> bool {
        matches!(
            self,
            StorageError::TupleNotFound { .. }
                | StorageError::InvalidSlot { .. }
                | StorageError::PageFull { .. }
                | StorageError::PageNotFound(_)
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
