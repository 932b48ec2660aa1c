//! Slotted page format for heap files.
//!
//! ```text
//! +-------------------------------+ offset 0
//! | page_id            (4B)       |
//! | prev_page_id       (4B)       |
//! | next_page_id       (4B)       |
//! | free_space_pointer (4B)       |
//! | tuple_count        (4B)       |
//! +-------------------------------+ offset 20
//! | slot 0: offset(4B) size(4B)   |
//! | slot 1 ...                    | (grows toward the page end)
//! +-------------------------------+
//! | free space                    |
//! +-------------------------------+ free_space_pointer
//! | tuple payloads, packed        | (grows toward the header)
//! +-------------------------------+ page end
//! ```
//!
//! All header and slot fields are little-endian `u32`. A slot with size 0 is a
//! tombstone. Payloads stay packed: deleting or resizing a tuple moves the
//! bytes between the free space pointer and the affected tuple, so free space
//! is always one contiguous run.

use crate::access::rid::{Rid, SlotNum};
use crate::access::tuple::TupleRef;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use byteorder::{ByteOrder, LittleEndian};
use log::trace;

const PAGE_ID_OFFSET: usize = 0;
const PREV_PAGE_ID_OFFSET: usize = 4;
const NEXT_PAGE_ID_OFFSET: usize = 8;
const FREE_SPACE_POINTER_OFFSET: usize = 12;
const TUPLE_COUNT_OFFSET: usize = 16;

pub const HEADER_SIZE: usize = 20;

// Slot entry: 4 bytes tuple offset, 4 bytes tuple size
pub const SLOT_SIZE: usize = 8;
const SLOT_TUPLE_OFFSET: usize = 0;
const SLOT_TUPLE_SIZE: usize = 4;

/// Header plus one slot entry: what a tuple costs on top of its payload on an empty page.
pub const TUPLE_OVERHEAD: usize = HEADER_SIZE + SLOT_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    offset: usize,
    size: usize,
}

impl Slot {
    const TOMBSTONE: Slot = Slot { offset: 0, size: 0 };

    fn is_tombstone(&self) -> bool {
        self.size == 0
    }
}

/// Typed view of a table page over a byte buffer owned by someone else,
/// normally a pinned buffer pool frame.
pub struct TablePage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> TablePage<T> {
    pub fn from_data(data: T) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> T {
        self.data
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn read_u32(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.bytes()[offset..offset + 4])
    }

    pub fn page_size(&self) -> usize {
        self.bytes().len()
    }

    pub fn page_id(&self) -> PageId {
        PageId(self.read_u32(PAGE_ID_OFFSET))
    }

    pub fn prev_page_id(&self) -> Option<PageId> {
        PageId(self.read_u32(PREV_PAGE_ID_OFFSET)).to_option()
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        PageId(self.read_u32(NEXT_PAGE_ID_OFFSET)).to_option()
    }

    pub fn free_space_pointer(&self) -> usize {
        self.read_u32(FREE_SPACE_POINTER_OFFSET) as usize
    }

    /// Number of slots ever allocated on this page, tombstones included.
    pub fn tuple_count(&self) -> u32 {
        self.read_u32(TUPLE_COUNT_OFFSET)
    }

    /// Bytes between the end of the slot directory and the free space pointer.
    ///
    /// # Panics
    /// If the directory and the payload region overlap.
    pub fn free_space(&self) -> usize {
        let directory_end = Self::slot_position(self.tuple_count());
        let free_space_pointer = self.free_space_pointer();
        assert!(
            free_space_pointer >= directory_end,
            "table page {}: free space pointer {} is inside the slot directory (ends at {})",
            self.page_id(),
            free_space_pointer,
            directory_end
        );
        free_space_pointer - directory_end
    }

    /// Number of slots holding a tuple.
    pub fn live_tuple_count(&self) -> usize {
        (0..self.tuple_count())
            .filter(|&slot_num| !self.slot(slot_num).is_tombstone())
            .count()
    }

    fn slot_position(slot_num: SlotNum) -> usize {
        HEADER_SIZE + SLOT_SIZE * slot_num as usize
    }

    fn slot(&self, slot_num: SlotNum) -> Slot {
        let position = Self::slot_position(slot_num);
        Slot {
            offset: self.read_u32(position + SLOT_TUPLE_OFFSET) as usize,
            size: self.read_u32(position + SLOT_TUPLE_SIZE) as usize,
        }
    }

    fn live_slot(&self, slot_num: SlotNum) -> StorageResult<Slot> {
        let tuple_count = self.tuple_count();
        if slot_num >= tuple_count {
            return Err(StorageError::InvalidSlot {
                slot_num,
                tuple_count,
            });
        }

        let slot = self.slot(slot_num);
        if slot.is_tombstone() {
            return Err(StorageError::TupleNotFound { slot_num });
        }

        assert!(
            slot.offset >= self.free_space_pointer(),
            "table page {}: slot {} at offset {} lies below the free space pointer {}",
            self.page_id(),
            slot_num,
            slot.offset,
            self.free_space_pointer()
        );
        Ok(slot)
    }

    /// Returns a view of the tuple stored in `rid`'s slot.
    pub fn get_tuple(&self, rid: Rid) -> StorageResult<TupleRef<'_>> {
        let slot = self.live_slot(rid.slot_num)?;
        Ok(TupleRef::new(
            rid,
            &self.bytes()[slot.offset..slot.offset + slot.size],
        ))
    }

    pub fn first_tuple_rid(&self) -> Option<Rid> {
        self.live_rid_from(0)
    }

    /// The first live slot after `current` on this page.
    pub fn next_tuple_rid(&self, current: Rid) -> Option<Rid> {
        debug_assert_eq!(current.page_id, self.page_id());
        current
            .slot_num
            .checked_add(1)
            .and_then(|start| self.live_rid_from(start))
    }

    fn live_rid_from(&self, start: SlotNum) -> Option<Rid> {
        (start..self.tuple_count())
            .find(|&slot_num| !self.slot(slot_num).is_tombstone())
            .map(|slot_num| Rid::new(self.page_id(), slot_num))
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> TablePage<T> {
    /// Wraps `data` and formats it as an empty page.
    pub fn new(data: T, page_id: PageId, prev: Option<PageId>, next: Option<PageId>) -> Self {
        let mut page = Self::from_data(data);
        page.init(page_id, prev, next);
        page
    }

    pub fn init(&mut self, page_id: PageId, prev: Option<PageId>, next: Option<PageId>) {
        let page_size = self.page_size();
        self.write_u32(PAGE_ID_OFFSET, page_id.0);
        self.set_prev_page_id(prev);
        self.set_next_page_id(next);
        self.set_free_space_pointer(page_size);
        self.set_tuple_count(0);
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        LittleEndian::write_u32(&mut self.bytes_mut()[offset..offset + 4], value);
    }

    pub fn set_prev_page_id(&mut self, prev: Option<PageId>) {
        self.write_u32(PREV_PAGE_ID_OFFSET, PageId::from_option(prev).0);
    }

    pub fn set_next_page_id(&mut self, next: Option<PageId>) {
        self.write_u32(NEXT_PAGE_ID_OFFSET, PageId::from_option(next).0);
    }

    fn set_free_space_pointer(&mut self, pointer: usize) {
        self.write_u32(FREE_SPACE_POINTER_OFFSET, pointer as u32);
    }

    fn set_tuple_count(&mut self, count: u32) {
        self.write_u32(TUPLE_COUNT_OFFSET, count);
    }

    fn set_slot(&mut self, slot_num: SlotNum, slot: Slot) {
        let position = Self::slot_position(slot_num);
        self.write_u32(position + SLOT_TUPLE_OFFSET, slot.offset as u32);
        self.write_u32(position + SLOT_TUPLE_SIZE, slot.size as u32);
    }

    /// Adds `old_size - new_size` to the offset of every live slot stored
    /// below `boundary`, after the bytes under `boundary` moved by that amount.
    fn relocate_slots_below(&mut self, boundary: usize, old_size: usize, new_size: usize) {
        for slot_num in 0..self.tuple_count() {
            let slot = self.slot(slot_num);
            if !slot.is_tombstone() && slot.offset < boundary {
                let offset = slot.offset + old_size - new_size;
                self.set_slot(slot_num, Slot { offset, ..slot });
            }
        }
    }

    /// Stores `payload` and returns its rid. The first tombstone slot is
    /// reused before the directory is extended.
    pub fn insert_tuple(&mut self, payload: &[u8]) -> StorageResult<Rid> {
        if payload.is_empty() {
            return Err(StorageError::EmptyTuple);
        }

        let size = payload.len();
        let available = self.free_space();
        if available < size {
            return Err(StorageError::PageFull {
                required: size,
                available,
            });
        }

        let tuple_count = self.tuple_count();
        let slot_num = match (0..tuple_count).find(|&i| self.slot(i).is_tombstone()) {
            Some(slot_num) => {
                trace!("page {}: reusing slot {}", self.page_id(), slot_num);
                slot_num
            }
            None => {
                if available < size + SLOT_SIZE {
                    return Err(StorageError::PageFull {
                        required: size + SLOT_SIZE,
                        available,
                    });
                }
                tuple_count
            }
        };

        let offset = self.free_space_pointer() - size;
        self.bytes_mut()[offset..offset + size].copy_from_slice(payload);
        self.set_free_space_pointer(offset);
        self.set_slot(slot_num, Slot { offset, size });
        if slot_num == tuple_count {
            self.set_tuple_count(tuple_count + 1);
        }

        Ok(Rid::new(self.page_id(), slot_num))
    }

    /// Removes the tuple in `rid`'s slot and closes the gap it leaves.
    pub fn delete_tuple(&mut self, rid: Rid) -> StorageResult<()> {
        let slot = self.live_slot(rid.slot_num)?;
        let free_space_pointer = self.free_space_pointer();

        self.bytes_mut()
            .copy_within(free_space_pointer..slot.offset, free_space_pointer + slot.size);
        self.set_free_space_pointer(free_space_pointer + slot.size);
        self.set_slot(rid.slot_num, Slot::TOMBSTONE);
        self.relocate_slots_below(slot.offset, slot.size, 0);

        Ok(())
    }

    /// Replaces the tuple in `rid`'s slot with `payload`, keeping the rid.
    ///
    /// Fails with `PageFull` before touching any byte when the page cannot
    /// absorb the growth; the caller then has to move the tuple elsewhere.
    pub fn update_tuple(&mut self, payload: &[u8], rid: Rid) -> StorageResult<()> {
        if payload.is_empty() {
            return Err(StorageError::EmptyTuple);
        }

        let slot = self.live_slot(rid.slot_num)?;
        let new_size = payload.len();
        let available = self.free_space();
        if new_size > slot.size && new_size - slot.size > available {
            return Err(StorageError::PageFull {
                required: new_size - slot.size,
                available,
            });
        }

        let free_space_pointer = self.free_space_pointer();
        let new_free_space_pointer = free_space_pointer + slot.size - new_size;
        let tuple_end = slot.offset + slot.size;

        self.bytes_mut()
            .copy_within(free_space_pointer..slot.offset, new_free_space_pointer);
        self.bytes_mut()[tuple_end - new_size..tuple_end].copy_from_slice(payload);
        self.set_free_space_pointer(new_free_space_pointer);
        self.set_slot(
            rid.slot_num,
            Slot {
                offset: slot.offset,
                size: new_size,
            },
        );
        // The updated slot is below the boundary too and ends up at tuple_end - new_size.
        self.relocate_slots_below(tuple_end, slot.size, new_size);

        Ok(())
    }
}
