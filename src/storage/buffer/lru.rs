use super::replacer::{FrameId, Replacer};
use std::collections::{HashSet, VecDeque};

/// Evicts the frame whose pin count dropped to zero longest ago.
#[derive(Debug)]
pub struct LruReplacer {
    /// Evictable frames, least recently unpinned at the front
    queue: VecDeque<FrameId>,
    evictable: HashSet<FrameId>,
    capacity: usize,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            evictable: HashSet::with_capacity(capacity),
            capacity,
        }
    }
}

impl Replacer for LruReplacer {
    fn evict(&mut self) -> Option<FrameId> {
        let frame_id = self.queue.pop_front()?;
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    fn pin(&mut self, frame_id: FrameId) {
        if self.evictable.remove(&frame_id) {
            self.queue.retain(|&id| id != frame_id);
        }
    }

    fn unpin(&mut self, frame_id: FrameId) {
        if self.evictable.len() < self.capacity && self.evictable.insert(frame_id) {
            self.queue.push_back(frame_id);
        }
    }

    fn size(&self) -> usize {
        self.queue.len()
    }
}
