use crate::access::TableHeap;
use crate::storage::buffer::lru::LruReplacer;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::disk::PageManager;
use crate::storage::page::PageId;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Frames in the buffer pool unless configured otherwise.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Page id of the heap's first page in a database file.
pub const HEAP_ROOT_PAGE_ID: PageId = PageId(0);

/// A database file holding one table heap rooted at page 0.
pub struct Database {
    heap: TableHeap,
}

impl Database {
    /// Create a new database at the specified path
    pub fn create(path: &Path, pool_size: usize) -> Result<Self> {
        if path.exists() {
            bail!("Database file already exists at {:?}", path);
        }

        let page_manager = PageManager::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        let buffer_pool = Self::buffer_pool(page_manager, pool_size);
        let heap = TableHeap::create(buffer_pool).context("Failed to create table heap")?;
        if heap.first_page_id() != HEAP_ROOT_PAGE_ID {
            bail!(
                "Table heap was created at page {} instead of {}",
                heap.first_page_id(),
                HEAP_ROOT_PAGE_ID
            );
        }

        Ok(Self { heap })
    }

    /// Open an existing database
    pub fn open(path: &Path, pool_size: usize) -> Result<Self> {
        if !path.exists() {
            bail!("Database file does not exist at {:?}", path);
        }

        let page_manager = PageManager::open(path)
            .with_context(|| format!("Failed to open file: {:?}", path))?;
        if page_manager.num_pages()? == 0 {
            bail!("Database file {:?} contains no pages", path);
        }
        let buffer_pool = Self::buffer_pool(page_manager, pool_size);

        Ok(Self {
            heap: TableHeap::open(buffer_pool, HEAP_ROOT_PAGE_ID),
        })
    }

    pub fn open_or_create(path: &Path, pool_size: usize) -> Result<Self> {
        if path.exists() {
            Self::open(path, pool_size)
        } else {
            Self::create(path, pool_size)
        }
    }

    pub fn heap(&self) -> &TableHeap {
        &self.heap
    }

    pub fn flush(&self) -> Result<()> {
        self.heap
            .buffer_pool()
            .flush_all()
            .context("Failed to flush buffer pool")
    }

    fn buffer_pool(page_manager: PageManager, pool_size: usize) -> BufferPoolManager {
        let replacer = Box::new(LruReplacer::new(pool_size));
        BufferPoolManager::new(page_manager, replacer, pool_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Tuple;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_reopen() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("heap.db");

        let rid = {
            let db = Database::create(&path, 8)?;
            db.heap().insert_tuple(&Tuple::new(b"durable".to_vec()))?
        };

        let db = Database::open(&path, 8)?;
        assert_eq!(
            db.heap().get_tuple(rid)?.map(Tuple::into_data),
            Some(b"durable".to_vec())
        );

        Ok(())
    }

    #[test]
    fn test_create_refuses_existing_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("heap.db");
        Database::create(&path, 4)?;

        assert!(Database::create(&path, 4).is_err());
        assert!(Database::open(&dir.path().join("missing.db"), 4).is_err());

        Ok(())
    }

    #[test]
    fn test_rejected_update_survives_reopen() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("heap.db");

        let rid = {
            let db = Database::create(&path, 8)?;
            let rid = db.heap().insert_tuple(&Tuple::new(b"hello".to_vec()))?;
            let oversized = Tuple::new(vec![b'x'; 4100]);
            assert!(db.heap().update_or_move(&oversized, rid).is_err());
            rid
        };

        let db = Database::open(&path, 8)?;
        assert_eq!(
            db.heap().get_tuple(rid)?.map(Tuple::into_data),
            Some(b"hello".to_vec())
        );
        assert_eq!(db.heap().iter()?.count(), 1);

        Ok(())
    }

    #[test]
    fn test_open_or_create() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("heap.db");

        Database::open_or_create(&path, 4)?;
        let db = Database::open_or_create(&path, 4)?;
        assert_eq!(db.heap().page_ids()?, vec![HEAP_ROOT_PAGE_ID]);

        Ok(())
    }
}
