use crate::storage::page::PageId;
use std::fmt;

/// Slot number within a table page.
pub type SlotNum = u32;

/// Record identifier: the page holding a tuple and its slot in that page's directory.
///
/// Rids order by page id first and slot number second, which is also the
/// order a heap scan yields tuples in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_num: SlotNum,
}

impl Rid {
    /// End-of-stream sentinel. Sorts after every real rid.
    pub const INVALID: Rid = Rid {
        page_id: PageId::INVALID,
        slot_num: SlotNum::MAX,
    };

    pub fn new(page_id: PageId, slot_num: SlotNum) -> Self {
        Self { page_id, slot_num }
    }

    pub fn is_valid(&self) -> bool {
        self.page_id.is_valid()
    }

    /// Packs the rid into one comparable value (page id in the high 32 bits).
    pub fn as_u64(&self) -> u64 {
        (u64::from(self.page_id.0) << 32) | u64::from(self.slot_num)
    }

    pub fn from_u64(value: u64) -> Self {
        Self {
            page_id: PageId((value >> 32) as u32),
            slot_num: value as u32,
        }
    }
}

impl Default for Rid {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "({}, {})", self.page_id, self.slot_num)
        } else {
            write!(f, "(EOF)")
        }
    }
}
