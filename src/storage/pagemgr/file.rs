use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use crate::{
    error::{IndexError, IndexResult},
    storage::{
        page::{PAGE_SIZE, PageId},
        pagemgr::manager::PageManager,
    },
};

#[derive(Debug)]
pub struct FilePageManager {
    file: File,
    next_page_id: u32,
}

impl FilePageManager {
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let size = file.metadata()?.len();
        if size % PAGE_SIZE as u64 != 0 {
            return Err(IndexError::corrupted(
                PageId((size / PAGE_SIZE as u64) as u32),
                format!("file length {size} is not a multiple of the page size"),
            ));
        }

        Ok(Self {
            file,
            next_page_id: (size / PAGE_SIZE as u64) as u32,
        })
    }

    fn offset_of(id: PageId) -> u64 {
        id.0 as u64 * PAGE_SIZE as u64
    }
}

impl PageManager for FilePageManager {
    fn num_pages(&self) -> u32 {
        self.next_page_id
    }

    fn allocate_page(&mut self) -> IndexResult<PageId> {
        let id = PageId(self.next_page_id);
        self.next_page_id += 1;
        Ok(id)
    }

    fn read_page(&mut self, id: PageId, buf: &mut [u8; PAGE_SIZE]) -> IndexResult<()> {
        if id.0 >= self.next_page_id {
            return Err(IndexError::PageNotFound { page_id: id });
        }

        let len = self.file.metadata()?.len();
        let offset = Self::offset_of(id);
        if offset >= len {
            // allocated but never flushed
            buf.fill(0);
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&mut self, id: PageId, buf: &[u8; PAGE_SIZE]) -> IndexResult<()> {
        if id.0 >= self.next_page_id {
            return Err(IndexError::PageNotFound { page_id: id });
        }

        self.file.seek(SeekFrom::Start(Self::offset_of(id)))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn sync(&mut self) -> IndexResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
