pub mod table_page;

use std::fmt;

/// Identifier of a page within the page file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// On-disk sentinel for "no page".
    pub const INVALID: PageId = PageId(u32::MAX);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Maps the on-disk sentinel to `None`.
    pub fn to_option(self) -> Option<PageId> {
        self.is_valid().then_some(self)
    }

    pub fn from_option(page_id: Option<PageId>) -> PageId {
        page_id.unwrap_or(Self::INVALID)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "INVALID")
        }
    }
}

pub use table_page::TablePage;
