//! Forward cursor over a table heap.

use crate::access::heap::TableHeap;
use crate::access::rid::Rid;
use crate::access::tuple::Tuple;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{PageId, TablePage};
use std::mem;

/// Cursor over the live tuples of a [`TableHeap`] in (page, slot) order.
///
/// The tuple under the cursor is copied out of its page when the cursor
/// moves there, so reading it needs no page access. Pages whose tuples were
/// all deleted are skipped. Two cursors are equal when they point at the
/// same rid; every end cursor points at `Rid::INVALID`.
pub struct TableIterator<'a> {
    heap: &'a TableHeap,
    tuple: Tuple,
}

impl<'a> TableIterator<'a> {
    /// Positions a cursor on `rid`, which must hold a live tuple unless it is
    /// `Rid::INVALID`.
    pub fn new(heap: &'a TableHeap, rid: Rid) -> StorageResult<Self> {
        let tuple = if rid.is_valid() {
            heap.get_tuple(rid)?
                .ok_or(StorageError::TupleNotFound {
                    slot_num: rid.slot_num,
                })?
        } else {
            Tuple::eof()
        };
        Ok(Self { heap, tuple })
    }

    pub(crate) fn first(heap: &'a TableHeap) -> StorageResult<Self> {
        let tuple = Self::first_live_tuple(heap, Some(heap.first_page_id()))?;
        Ok(Self { heap, tuple })
    }

    pub(crate) fn end(heap: &'a TableHeap) -> Self {
        Self {
            heap,
            tuple: Tuple::eof(),
        }
    }

    pub fn rid(&self) -> Rid {
        self.tuple.rid()
    }

    pub fn is_end(&self) -> bool {
        !self.tuple.rid().is_valid()
    }

    /// The tuple under the cursor.
    ///
    /// # Panics
    /// If the cursor is at the end of the heap.
    pub fn tuple(&self) -> &Tuple {
        assert!(!self.is_end(), "table iterator dereferenced at end of heap");
        &self.tuple
    }

    /// Moves to the next live tuple, or to the end. A no-op at the end.
    pub fn advance(&mut self) -> StorageResult<()> {
        self.tuple = self.tuple_after(self.rid())?;
        Ok(())
    }

    fn tuple_after(&self, current: Rid) -> StorageResult<Tuple> {
        if !current.is_valid() {
            return Ok(Tuple::eof());
        }

        let next_page_id = {
            let guard = self.heap.buffer_pool().fetch_page(current.page_id)?;
            let page = TablePage::from_data(&*guard);
            if let Some(rid) = page.next_tuple_rid(current) {
                return Ok(page.get_tuple(rid)?.to_tuple());
            }
            page.next_page_id()
        };

        Self::first_live_tuple(self.heap, next_page_id)
    }

    /// Walks the chain from `page_id` until a page with a live tuple turns up.
    fn first_live_tuple(heap: &TableHeap, mut page_id: Option<PageId>) -> StorageResult<Tuple> {
        while let Some(id) = page_id {
            let guard = heap.buffer_pool().fetch_page(id)?;
            let page = TablePage::from_data(&*guard);
            if let Some(rid) = page.first_tuple_rid() {
                return Ok(page.get_tuple(rid)?.to_tuple());
            }
            page_id = page.next_page_id();
        }
        Ok(Tuple::eof())
    }
}

impl PartialEq for TableIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.rid() == other.rid()
    }
}

impl Iterator for TableIterator<'_> {
    type Item = StorageResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }

        match self.tuple_after(self.rid()) {
            Ok(next) => Some(Ok(mem::replace(&mut self.tuple, next))),
            Err(e) => {
                self.tuple = Tuple::eof();
                Some(Err(e))
            }
        }
    }
}
