use crate::access::iterator::TableIterator;
use crate::access::rid::Rid;
use crate::access::tuple::Tuple;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::table_page::TUPLE_OVERHEAD;
use crate::storage::page::{PageId, TablePage};
use crate::storage::{PageData, PAGE_SIZE};
use log::{debug, warn};

/// Largest payload a heap accepts: one tuple alone on an empty page.
pub const MAX_TUPLE_SIZE: usize = PAGE_SIZE - TUPLE_OVERHEAD;

/// A table stored as a chain of table pages linked in allocation order.
///
/// The heap only remembers the first page id; every other page is reached by
/// following `next_page_id` links through the buffer pool. Pages are never
/// removed from the chain, even once all their tuples are deleted.
pub struct TableHeap {
    buffer_pool: BufferPoolManager,
    first_page_id: PageId,
}

impl TableHeap {
    /// Creates a new heap with a single empty page.
    pub fn create(buffer_pool: BufferPoolManager) -> StorageResult<Self> {
        let (first_page_id, mut guard) = buffer_pool.new_page()?;
        TablePage::new(&mut *guard, first_page_id, None, None);
        guard.mark_dirty();
        drop(guard);
        debug!("created table heap at page {}", first_page_id);

        Ok(Self {
            buffer_pool,
            first_page_id,
        })
    }

    /// Opens the heap whose chain starts at `first_page_id`.
    pub fn open(buffer_pool: BufferPoolManager, first_page_id: PageId) -> Self {
        Self {
            buffer_pool,
            first_page_id,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.buffer_pool
    }

    /// Stores `tuple` on the first page in the chain with room for it,
    /// appending a new page when none has.
    pub fn insert_tuple(&self, tuple: &Tuple) -> StorageResult<Rid> {
        let payload = tuple.data();
        if payload.is_empty() {
            return Err(StorageError::EmptyTuple);
        }
        if payload.len() > MAX_TUPLE_SIZE {
            return Err(StorageError::TupleTooLarge {
                size: payload.len(),
                max: MAX_TUPLE_SIZE,
            });
        }

        let mut page_id = self.first_page_id;
        loop {
            let mut guard = self.buffer_pool.fetch_page_write(page_id)?;
            let mut page = TablePage::from_data(&mut *guard);

            match page.insert_tuple(payload) {
                Ok(rid) => {
                    guard.mark_dirty();
                    return Ok(rid);
                }
                Err(StorageError::PageFull { .. }) => {}
                Err(e) => return Err(e),
            }

            if let Some(next_page_id) = page.next_page_id() {
                page_id = next_page_id;
                continue;
            }

            let (new_page_id, mut new_guard) = self.buffer_pool.new_page()?;
            let mut new_page = TablePage::new(&mut *new_guard, new_page_id, Some(page_id), None);
            page.set_next_page_id(Some(new_page_id));
            guard.mark_dirty();
            debug!("extended table heap: page {} -> page {}", page_id, new_page_id);

            // An empty page always has room for a tuple that passed the size check
            let rid = new_page.insert_tuple(payload)?;
            new_guard.mark_dirty();
            return Ok(rid);
        }
    }

    /// Deletes the tuple at `rid`. Returns false if there is no tuple there.
    pub fn delete_tuple(&self, rid: Rid) -> StorageResult<bool> {
        self.modify_page(rid, |page| page.delete_tuple(rid))
    }

    /// Replaces the tuple at `rid` in place. Returns false if there is no
    /// tuple there or its page cannot absorb the new size; the caller then has
    /// to delete it and insert the new version elsewhere.
    pub fn update_tuple(&self, tuple: &Tuple, rid: Rid) -> StorageResult<bool> {
        if tuple.size() == 0 {
            return Err(StorageError::EmptyTuple);
        }
        self.modify_page(rid, |page| page.update_tuple(tuple.data(), rid))
    }

    /// Replaces the tuple at `rid`, moving it to a new rid when its page
    /// cannot absorb the new size. Returns the rid the tuple now lives at, or
    /// `None` if there is no tuple at `rid`.
    ///
    /// The new version is inserted before the old one is deleted, so a failed
    /// move leaves the old tuple in place.
    pub fn update_or_move(&self, tuple: &Tuple, rid: Rid) -> StorageResult<Option<Rid>> {
        if self.update_tuple(tuple, rid)? {
            return Ok(Some(rid));
        }
        if self.get_tuple(rid)?.is_none() {
            return Ok(None);
        }

        let new_rid = self.insert_tuple(tuple)?;
        if !self.delete_tuple(rid)? {
            return Err(StorageError::TupleNotFound {
                slot_num: rid.slot_num,
            });
        }
        debug!("moved tuple {} -> {}", rid, new_rid);
        Ok(Some(new_rid))
    }

    fn modify_page<F>(&self, rid: Rid, op: F) -> StorageResult<bool>
    where
        F: FnOnce(&mut TablePage<&mut PageData>) -> StorageResult<()>,
    {
        if !rid.is_valid() {
            return Ok(false);
        }

        let mut guard = match self.buffer_pool.fetch_page_write(rid.page_id) {
            Ok(guard) => guard,
            Err(StorageError::PageNotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };

        let result = op(&mut TablePage::from_data(&mut *guard));
        match result {
            Ok(()) => {
                guard.mark_dirty();
                Ok(true)
            }
            Err(e) if e.is_operation_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Copies out the tuple at `rid`, or `None` if there is none.
    pub fn get_tuple(&self, rid: Rid) -> StorageResult<Option<Tuple>> {
        if !rid.is_valid() {
            return Ok(None);
        }

        let guard = match self.buffer_pool.fetch_page(rid.page_id) {
            Ok(guard) => guard,
            Err(StorageError::PageNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match TablePage::from_data(&*guard).get_tuple(rid) {
            Ok(tuple) => Ok(Some(tuple.to_tuple())),
            Err(e) if e.is_operation_failure() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Cursor on the first live tuple of the heap, or the end cursor.
    pub fn begin(&self) -> StorageResult<TableIterator<'_>> {
        TableIterator::first(self)
    }

    pub fn end(&self) -> TableIterator<'_> {
        TableIterator::end(self)
    }

    pub fn iter(&self) -> StorageResult<TableIterator<'_>> {
        self.begin()
    }

    /// Page ids of the chain, in chain order.
    pub fn page_ids(&self) -> StorageResult<Vec<PageId>> {
        let mut page_ids = Vec::new();
        let mut next = Some(self.first_page_id);
        while let Some(page_id) = next {
            let guard = self.buffer_pool.fetch_page(page_id)?;
            next = TablePage::from_data(&*guard).next_page_id();
            page_ids.push(page_id);
        }
        Ok(page_ids)
    }
}

impl Drop for TableHeap {
    fn drop(&mut self) {
        if let Err(e) = self.buffer_pool.flush_all() {
            warn!(
                "failed to flush table heap at page {}: {}",
                self.first_page_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::buffer::lru::LruReplacer;
    use crate::storage::disk::PageManager;
    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    fn create_test_table_heap(pool_size: usize) -> Result<(TempDir, TableHeap)> {
        let dir = tempdir()?;
        let page_manager = PageManager::create(&dir.path().join("test.db"))?;
        let replacer = Box::new(LruReplacer::new(pool_size));
        let buffer_pool = BufferPoolManager::new(page_manager, replacer, pool_size);
        Ok((dir, TableHeap::create(buffer_pool)?))
    }

    fn assert_unpinned(heap: &TableHeap) -> Result<()> {
        for page_id in heap.page_ids()? {
            assert_eq!(heap.buffer_pool().pin_count(page_id).unwrap_or(0), 0);
        }
        Ok(())
    }

    #[test]
    fn test_create_initializes_first_page() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        assert_eq!(heap.first_page_id(), PageId(0));
        assert_eq!(heap.page_ids()?, vec![PageId(0)]);
        let guard = heap.buffer_pool().fetch_page(PageId(0))?;
        let page = TablePage::from_data(&*guard);
        assert_eq!(page.page_id(), PageId(0));
        assert_eq!(page.tuple_count(), 0);
        assert_eq!(page.free_space_pointer(), PAGE_SIZE);

        Ok(())
    }

    #[test]
    fn test_insert_and_get() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let rid = heap.insert_tuple(&Tuple::new(b"Hello, World!".to_vec()))?;
        let tuple = heap.get_tuple(rid)?.expect("Tuple should exist");

        assert_eq!(tuple.data(), b"Hello, World!");
        assert_eq!(tuple.rid(), rid);
        assert_unpinned(&heap)?;

        Ok(())
    }

    #[test]
    fn test_multiple_inserts_share_a_page() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let rid1 = heap.insert_tuple(&Tuple::from(&b"First tuple"[..]))?;
        let rid2 = heap.insert_tuple(&Tuple::from(&b"Second tuple"[..]))?;
        let rid3 = heap.insert_tuple(&Tuple::from(&b"Third tuple"[..]))?;

        assert_eq!(rid1, Rid::new(PageId(0), 0));
        assert_eq!(rid2, Rid::new(PageId(0), 1));
        assert_eq!(rid3, Rid::new(PageId(0), 2));
        assert_eq!(heap.get_tuple(rid2)?.unwrap().data(), b"Second tuple");

        Ok(())
    }

    #[test]
    fn test_delete() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let rid = heap.insert_tuple(&Tuple::new(b"To be deleted".to_vec()))?;
        assert!(heap.delete_tuple(rid)?);
        assert!(heap.get_tuple(rid)?.is_none());

        // A second delete finds a tombstone
        assert!(!heap.delete_tuple(rid)?);
        assert_unpinned(&heap)?;

        Ok(())
    }

    #[test]
    fn test_update_in_place() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let keep = heap.insert_tuple(&Tuple::new(b"neighbour".to_vec()))?;
        let rid = heap.insert_tuple(&Tuple::new(b"Original data".to_vec()))?;

        assert!(heap.update_tuple(&Tuple::new(b"Updated, and longer than before".to_vec()), rid)?);
        assert_eq!(
            heap.get_tuple(rid)?.unwrap().data(),
            b"Updated, and longer than before"
        );
        assert_eq!(heap.get_tuple(keep)?.unwrap().data(), b"neighbour");

        assert!(heap.update_tuple(&Tuple::new(b"tiny".to_vec()), rid)?);
        assert_eq!(heap.get_tuple(rid)?.unwrap().data(), b"tiny");
        assert_unpinned(&heap)?;

        Ok(())
    }

    #[test]
    fn test_update_without_room_fails() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let rid = heap.insert_tuple(&Tuple::new(vec![1u8; 2000]))?;
        heap.insert_tuple(&Tuple::new(vec![2u8; 2000]))?;

        assert!(!heap.update_tuple(&Tuple::new(vec![3u8; 2100]), rid)?);
        assert_eq!(heap.get_tuple(rid)?.unwrap().data(), vec![1u8; 2000].as_slice());
        assert_unpinned(&heap)?;

        Ok(())
    }

    #[test]
    fn test_update_or_move() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let rid = heap.insert_tuple(&Tuple::new(vec![1u8; 2000]))?;
        heap.insert_tuple(&Tuple::new(vec![2u8; 2000]))?;

        let small = Tuple::new(vec![4u8; 100]);
        assert_eq!(heap.update_or_move(&small, rid)?, Some(rid));

        let moved = heap
            .update_or_move(&Tuple::new(vec![3u8; 2100]), rid)?
            .unwrap();
        assert_ne!(moved, rid);
        assert_eq!(moved.page_id, PageId(1));
        assert!(heap.get_tuple(rid)?.is_none());
        assert_eq!(heap.get_tuple(moved)?.unwrap().data(), vec![3u8; 2100].as_slice());

        assert_eq!(heap.update_or_move(&small, rid)?, None);
        assert_unpinned(&heap)?;

        Ok(())
    }

    #[test]
    fn test_failed_move_keeps_old_tuple() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let rid = heap.insert_tuple(&Tuple::new(b"hello".to_vec()))?;

        let result = heap.update_or_move(&Tuple::new(vec![b'x'; MAX_TUPLE_SIZE + 32]), rid);
        assert!(matches!(result, Err(StorageError::TupleTooLarge { .. })));
        assert_eq!(heap.get_tuple(rid)?.unwrap().data(), b"hello");
        assert_eq!(heap.page_ids()?, vec![PageId(0)]);
        assert_unpinned(&heap)?;

        Ok(())
    }

    #[test]
    fn test_missing_page_and_slot() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let missing_page = Rid::new(PageId(42), 0);
        assert!(heap.get_tuple(missing_page)?.is_none());
        assert!(!heap.delete_tuple(missing_page)?);
        assert!(!heap.update_tuple(&Tuple::new(b"x".to_vec()), missing_page)?);
        assert_eq!(heap.buffer_pool().pin_count(PageId(42)), None);

        let missing_slot = Rid::new(PageId(0), 3);
        assert!(heap.get_tuple(missing_slot)?.is_none());
        assert!(!heap.delete_tuple(missing_slot)?);
        assert!(heap.get_tuple(Rid::INVALID)?.is_none());
        assert_unpinned(&heap)?;

        Ok(())
    }

    #[test]
    fn test_oversized_tuple_rejected_without_side_effects() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let result = heap.insert_tuple(&Tuple::new(vec![0u8; MAX_TUPLE_SIZE + 1]));
        assert!(matches!(result, Err(StorageError::TupleTooLarge { .. })));
        assert_eq!(heap.page_ids()?, vec![PageId(0)]);
        assert_eq!(heap.buffer_pool().num_pages()?, 1);

        // The largest accepted tuple fills a page exactly
        let rid = heap.insert_tuple(&Tuple::new(vec![7u8; MAX_TUPLE_SIZE]))?;
        assert_eq!(rid, Rid::new(PageId(0), 0));

        assert!(matches!(
            heap.insert_tuple(&Tuple::new(Vec::new())),
            Err(StorageError::EmptyTuple)
        ));

        Ok(())
    }

    #[test]
    fn test_chain_growth() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(4)?;

        let large = vec![0xAA; 1000];
        let mut rids = Vec::new();
        for _ in 0..20 {
            rids.push(heap.insert_tuple(&Tuple::new(large.clone()))?);
        }

        // Four 1000-byte tuples fit per page
        let page_ids = heap.page_ids()?;
        assert_eq!(page_ids.len(), 5);
        assert_eq!(heap.first_page_id(), PageId(0));
        for (i, rid) in rids.iter().enumerate() {
            assert_eq!(rid.page_id, page_ids[i / 4]);
            assert_eq!(heap.get_tuple(*rid)?.unwrap().data(), large.as_slice());
        }

        for pair in page_ids.windows(2) {
            let guard = heap.buffer_pool().fetch_page(pair[1])?;
            let page = TablePage::from_data(&*guard);
            assert_eq!(page.prev_page_id(), Some(pair[0]));
        }
        assert_unpinned(&heap)?;

        Ok(())
    }

    #[test]
    fn test_freed_space_reused_before_new_page() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let rids: Vec<Rid> = (0..4)
            .map(|_| heap.insert_tuple(&Tuple::new(vec![1u8; 1000])))
            .collect::<StorageResult<_>>()?;
        assert_eq!(heap.page_ids()?.len(), 1);

        assert!(heap.delete_tuple(rids[1])?);
        let rid = heap.insert_tuple(&Tuple::new(vec![2u8; 1000]))?;

        assert_eq!(rid, rids[1]);
        assert_eq!(heap.page_ids()?.len(), 1);

        Ok(())
    }

    #[test]
    fn test_scenario_reuses_first_page_slot() -> Result<()> {
        let (_dir, heap) = create_test_table_heap(10)?;

        let a = heap.insert_tuple(&Tuple::new(vec![b'a'; 4000]))?;
        assert_eq!(a, Rid::new(PageId(0), 0));

        let b = heap.insert_tuple(&Tuple::new(vec![b'b'; 200]))?;
        assert_eq!(b, Rid::new(PageId(1), 0));
        assert_eq!(heap.page_ids()?, vec![PageId(0), PageId(1)]);

        assert!(heap.delete_tuple(a)?);
        let c = heap.insert_tuple(&Tuple::new(vec![b'c'; 3000]))?;
        assert_eq!(c, Rid::new(PageId(0), 0));
        assert_eq!(heap.page_ids()?, vec![PageId(0), PageId(1)]);

        Ok(())
    }
}
