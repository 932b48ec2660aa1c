//! Storage layer for heapfile.
//!
//! - **PageManager**: reads and writes fixed-size (4KB) pages of a single file
//! - **BufferPoolManager**: in-memory page cache with pinning, LRU eviction
//!   and write-back of dirty pages
//! - **TablePage**: slotted page format holding variable-length tuples
//!
//! Everything above this layer reaches pages through buffer pool guards,
//! which pin a page for as long as they live.

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPoolManager, PageReadGuard, PageWriteGuard};
pub use disk::{PageData, PageManager, PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{PageId, TablePage};
