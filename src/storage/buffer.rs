pub mod lru;
pub mod replacer;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::{PageData, PageId, PageManager};
use dashmap::DashMap;
use log::{debug, trace};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock};
use replacer::{FrameId, Replacer};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

type FrameData = Arc<RwLock<Box<PageData>>>;

#[derive(Debug, Default)]
struct FrameMeta {
    page_id: Option<PageId>,
    pin_count: u32,
    is_dirty: bool,
}

struct PoolState {
    frames: Vec<FrameMeta>,
    free_list: VecDeque<FrameId>,
}

/// Fixed-size page cache over a [`PageManager`].
///
/// Pages are handed out as guards that hold a pin; dropping a guard unpins
/// the page, marking it dirty if the guard was. Unpinned pages become
/// eviction candidates and dirty victims are written back before reuse.
#[derive(Clone)]
pub struct BufferPoolManager {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    frame_data: Vec<FrameData>,
    page_table: DashMap<PageId, FrameId>,
    // Bookkeeping latch, taken before the replacer and the page manager
    state: Mutex<PoolState>,
    replacer: Mutex<Box<dyn Replacer>>,
    page_manager: Mutex<PageManager>,
}

impl BufferPoolManager {
    pub fn new(page_manager: PageManager, replacer: Box<dyn Replacer>, pool_size: usize) -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                frame_data: (0..pool_size)
                    .map(|_| Arc::new(RwLock::new(Box::new([0u8; crate::storage::PAGE_SIZE]))))
                    .collect(),
                page_table: DashMap::with_capacity(pool_size),
                state: Mutex::new(PoolState {
                    frames: (0..pool_size).map(|_| FrameMeta::default()).collect(),
                    free_list: (0..pool_size).collect(),
                }),
                replacer: Mutex::new(replacer),
                page_manager: Mutex::new(page_manager),
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.inner.frame_data.len()
    }

    /// Pins `page_id` for reading.
    pub fn fetch_page(&self, page_id: PageId) -> StorageResult<PageReadGuard> {
        let frame_id = self.inner.pin_page(page_id)?;
        Ok(PageReadGuard {
            data: self.inner.frame_data[frame_id].read_arc(),
            pin: Pin::new(&self.inner, page_id),
        })
    }

    /// Pins `page_id` for writing. The page is only written back if the guard
    /// is marked dirty.
    pub fn fetch_page_write(&self, page_id: PageId) -> StorageResult<PageWriteGuard> {
        let frame_id = self.inner.pin_page(page_id)?;
        Ok(PageWriteGuard {
            data: self.inner.frame_data[frame_id].write_arc(),
            pin: Pin::new(&self.inner, page_id),
        })
    }

    /// Allocates a zeroed page in the file and pins it. The new page is dirty.
    pub fn new_page(&self) -> StorageResult<(PageId, PageWriteGuard)> {
        let (page_id, frame_id) = {
            let mut state = self.inner.state.lock();
            let frame_id = self.inner.acquire_frame(&mut state)?;

            let page_id = match self.inner.page_manager.lock().allocate_page() {
                Ok(page_id) => page_id,
                Err(e) => {
                    state.free_list.push_back(frame_id);
                    return Err(e);
                }
            };

            self.inner.frame_data[frame_id].write().fill(0);
            state.frames[frame_id] = FrameMeta {
                page_id: Some(page_id),
                pin_count: 1,
                is_dirty: true,
            };
            self.inner.page_table.insert(page_id, frame_id);
            self.inner.replacer.lock().pin(frame_id);
            (page_id, frame_id)
        };

        debug!("allocated page {} in frame {}", page_id, frame_id);
        Ok((
            page_id,
            PageWriteGuard {
                data: self.inner.frame_data[frame_id].write_arc(),
                pin: Pin::new(&self.inner, page_id),
            },
        ))
    }

    /// Writes `page_id` back if it is cached, dirty and unpinned.
    ///
    /// A pinned page is skipped; it is written back once its guards are gone,
    /// on eviction or on a later flush.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        let mut state = self.inner.state.lock();
        let Some(frame_id) = self.inner.page_table.get(&page_id).map(|e| *e.value()) else {
            return Ok(());
        };
        if state.frames[frame_id].pin_count == 0 {
            self.inner.write_back(&mut state, frame_id)?;
        }
        self.inner.page_manager.lock().sync()
    }

    /// Writes back every dirty unpinned page.
    ///
    /// Frame locks are only taken on unpinned frames while the bookkeeping
    /// latch is held, so this never waits on a guard from any thread.
    pub fn flush_all(&self) -> StorageResult<()> {
        let mut state = self.inner.state.lock();
        for frame_id in 0..state.frames.len() {
            if state.frames[frame_id].pin_count > 0 {
                trace!("skipping pinned frame {} on flush", frame_id);
                continue;
            }
            self.inner.write_back(&mut state, frame_id)?;
        }
        self.inner.page_manager.lock().sync()
    }

    /// Current pin count of a cached page, `None` if it is not cached.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.inner.state.lock();
        self.inner
            .page_table
            .get(&page_id)
            .map(|e| state.frames[*e.value()].pin_count)
    }

    pub fn num_pages(&self) -> StorageResult<u32> {
        self.inner.page_manager.lock().num_pages()
    }
}

impl BufferPoolInner {
    fn pin_page(&self, page_id: PageId) -> StorageResult<FrameId> {
        let mut state = self.state.lock();

        if let Some(frame_id) = self.page_table.get(&page_id).map(|e| *e.value()) {
            state.frames[frame_id].pin_count += 1;
            self.replacer.lock().pin(frame_id);
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let loaded = {
            let mut data = self.frame_data[frame_id].write();
            self.page_manager.lock().read_page(page_id, &mut data)
        };
        if let Err(e) = loaded {
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        state.frames[frame_id] = FrameMeta {
            page_id: Some(page_id),
            pin_count: 1,
            is_dirty: false,
        };
        self.page_table.insert(page_id, frame_id);
        self.replacer.lock().pin(frame_id);
        trace!("loaded page {} into frame {}", page_id, frame_id);

        Ok(frame_id)
    }

    /// Releases one pin on `page_id`. Returns false if the page is not
    /// cached or not pinned.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock();
        let Some(frame_id) = self.page_table.get(&page_id).map(|e| *e.value()) else {
            return false;
        };

        let frame = &mut state.frames[frame_id];
        if frame.pin_count == 0 {
            return false;
        }
        frame.is_dirty |= is_dirty;
        frame.pin_count -= 1;
        if frame.pin_count == 0 {
            self.replacer.lock().unpin(frame_id);
        }
        true
    }

    /// Takes a frame from the free list, or evicts one, writing it back if dirty.
    fn acquire_frame(&self, state: &mut PoolState) -> StorageResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self
            .replacer
            .lock()
            .evict()
            .ok_or(StorageError::BufferPoolFull)?;

        if let Err(e) = self.write_back(state, frame_id) {
            self.replacer.lock().unpin(frame_id);
            return Err(e);
        }
        if let Some(old_page_id) = state.frames[frame_id].page_id.take() {
            self.page_table.remove(&old_page_id);
            trace!("evicted page {} from frame {}", old_page_id, frame_id);
        }
        state.frames[frame_id] = FrameMeta::default();

        Ok(frame_id)
    }

    fn write_back(&self, state: &mut PoolState, frame_id: FrameId) -> StorageResult<()> {
        let frame = &mut state.frames[frame_id];
        if let (Some(page_id), true) = (frame.page_id, frame.is_dirty) {
            let data = self.frame_data[frame_id].read();
            self.page_manager.lock().write_page(page_id, &data)?;
            frame.is_dirty = false;
        }
        Ok(())
    }
}

/// A pin on one page, released exactly once when dropped.
struct Pin {
    inner: Arc<BufferPoolInner>,
    page_id: PageId,
    is_dirty: bool,
}

impl Pin {
    fn new(inner: &Arc<BufferPoolInner>, page_id: PageId) -> Self {
        Self {
            inner: Arc::clone(inner),
            page_id,
            is_dirty: false,
        }
    }
}

impl Drop for Pin {
    fn drop(&mut self) {
        self.inner.unpin_page(self.page_id, self.is_dirty);
    }
}

// Field order matters: the frame lock is released before the pin.

pub struct PageReadGuard {
    data: ArcRwLockReadGuard<RawRwLock, Box<PageData>>,
    pin: Pin,
}

impl PageReadGuard {
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }
}

impl Deref for PageReadGuard {
    type Target = PageData;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

pub struct PageWriteGuard {
    data: ArcRwLockWriteGuard<RawRwLock, Box<PageData>>,
    pin: Pin,
}

impl PageWriteGuard {
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// Marks the page as modified; it is unpinned dirty when the guard drops.
    pub fn mark_dirty(&mut self) {
        self.pin.is_dirty = true;
    }
}

impl Deref for PageWriteGuard {
    type Target = PageData;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for PageWriteGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}
