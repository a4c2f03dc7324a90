use crate::{
    error::IndexResult,
    storage::page::{PAGE_SIZE, PageId},
};

/// Raw page I/O underneath the buffer pool. One manager serves one index file.
pub trait PageManager: Send {
    /// Number of pages the file holds, including allocated but unwritten ones.
    fn num_pages(&self) -> u32;

    fn allocate_page(&mut self) -> IndexResult<PageId>;

    fn read_page(&mut self, id: PageId, buf: &mut [u8; PAGE_SIZE]) -> IndexResult<()>;

    fn write_page(&mut self, id: PageId, buf: &[u8; PAGE_SIZE]) -> IndexResult<()>;

    fn sync(&mut self) -> IndexResult<()>;
}
