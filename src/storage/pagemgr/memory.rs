use crate::{
    error::{IndexError, IndexResult},
    storage::{
        page::{PAGE_SIZE, PageId},
        pagemgr::manager::PageManager,
    },
};

/// Volatile page manager for tests and scratch indexes.
#[derive(Debug, Default)]
pub struct MemoryPageManager {
    pages: Vec<Box<[u8; PAGE_SIZE]>>,
}

impl MemoryPageManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageManager for MemoryPageManager {
    fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    fn allocate_page(&mut self) -> IndexResult<PageId> {
        let id = PageId(self.pages.len() as u32);
        self.pages.push(Box::new([0u8; PAGE_SIZE]));
        Ok(id)
    }

    fn read_page(&mut self, id: PageId, buf: &mut [u8; PAGE_SIZE]) -> IndexResult<()> {
        let page = self
            .pages
            .get(id.0 as usize)
            .ok_or(IndexError::PageNotFound { page_id: id })?;
        buf.copy_from_slice(&page[..]);
        Ok(())
    }

    fn write_page(&mut self, id: PageId, buf: &[u8; PAGE_SIZE]) -> IndexResult<()> {
        let page = self
            .pages
            .get_mut(id.0 as usize)
            .ok_or(IndexError::PageNotFound { page_id: id })?;
        page.copy_from_slice(buf);
        Ok(())
    }

    fn sync(&mut self) -> IndexResult<()> {
        Ok(())
    }
}
