use crate::access::rid::Rid;

/// A detached tuple that owns its payload.
///
/// Tuples built by callers for insertion carry `Rid::INVALID` until the heap
/// assigns a location. Tuples read back from a heap are copies taken while the
/// page was pinned, so they stay valid after the pin is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    rid: Rid,
    data: Vec<u8>,
}

impl Tuple {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            rid: Rid::INVALID,
            data: data.into(),
        }
    }

    pub(crate) fn with_rid(rid: Rid, data: Vec<u8>) -> Self {
        Self { rid, data }
    }

    /// The empty tuple an iterator holds once it reaches the end.
    pub(crate) fn eof() -> Self {
        Self::with_rid(Rid::INVALID, Vec::new())
    }

    pub fn rid(&self) -> Rid {
        self.rid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for Tuple {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Tuple {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

/// A tuple that still lives inside a page buffer.
///
/// The borrow ties it to the page view it came from, and the page view to
/// the pin guard, so it cannot be used after the page is unpinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleRef<'a> {
    rid: Rid,
    data: &'a [u8],
}

impl<'a> TupleRef<'a> {
    pub(crate) fn new(rid: Rid, data: &'a [u8]) -> Self {
        Self { rid, data }
    }

    pub fn rid(&self) -> Rid {
        self.rid
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Copies the payload out of the page.
    pub fn to_tuple(&self) -> Tuple {
        Tuple::with_rid(self.rid, self.data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PageId;

    #[test]
    fn test_detached_tuple() {
        let tuple = Tuple::new(vec![1, 2, 3, 4, 5]);

        assert_eq!(tuple.rid(), Rid::INVALID);
        assert_eq!(tuple.size(), 5);
        assert_eq!(tuple.data(), &[1, 2, 3, 4, 5]);
        assert_eq!(Tuple::from(&b"abc"[..]).into_data(), b"abc".to_vec());
    }

    #[test]
    fn test_tuple_ref_copy_out() {
        let buffer = b"....payload".to_vec();
        let rid = Rid::new(PageId(3), 1);
        let view = TupleRef::new(rid, &buffer[4..]);

        let owned = view.to_tuple();
        drop(buffer);

        assert_eq!(owned.rid(), rid);
        assert_eq!(owned.data(), b"payload");
        assert_eq!(owned.size(), 7);
    }
}
