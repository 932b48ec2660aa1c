//! Access layer for tuple-oriented operations.
//!
//! - **TableHeap**: one table stored as a doubly linked chain of table pages
//! - **TableIterator**: forward cursor over a heap in (page, slot) order
//! - **Tuple / TupleRef**: owned and page-resident tuple payloads
//! - **Rid**: (page id, slot number) address of a tuple
//!
//! Tuple payloads are opaque bytes here; encoding column values into them is
//! left to the layers above.

pub mod heap;
pub mod iterator;
pub mod rid;
pub mod tuple;

pub use heap::TableHeap;
pub use iterator::TableIterator;
pub use rid::{Rid, SlotNum};
pub use tuple::{Tuple, TupleRef};
