use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const PAGE_SIZE: usize = 4096;

/// Raw contents of one page.
pub type PageData = [u8; PAGE_SIZE];

/// Page-granular access to a single database file. Page `n` lives at byte
/// offset `n * PAGE_SIZE`; ids are handed out densely from 0.
pub struct PageManager {
    file: File,
}

impl PageManager {
    /// Creates the file, truncating anything already there.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self { file })
    }

    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    pub fn read_page(&mut self, page_id: PageId, buf: &mut PageData) -> StorageResult<()> {
        if !page_id.is_valid() || page_id.0 >= self.num_pages()? {
            return Err(StorageError::PageNotFound(page_id));
        }

        self.file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    pub fn write_page(&mut self, page_id: PageId, data: &PageData) -> StorageResult<()> {
        if !page_id.is_valid() {
            return Err(StorageError::PageNotFound(page_id));
        }

        // Writing past the end grows the file
        self.file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Extends the file by one zeroed page and returns its id.
    pub fn allocate_page(&mut self) -> StorageResult<PageId> {
        let page_id = PageId(self.num_pages()?);
        self.file
            .set_len(Self::page_offset(page_id) + PAGE_SIZE as u64)?;
        Ok(page_id)
    }

    pub fn num_pages(&self) -> StorageResult<u32> {
        let file_size = self.file.metadata()?.len();
        Ok((file_size / PAGE_SIZE as u64) as u32)
    }

    pub fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn page_offset(page_id: PageId) -> u64 {
        u64::from(page_id.0) * PAGE_SIZE as u64
    }
}
