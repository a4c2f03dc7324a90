use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::{IndexError, IndexResult},
    storage::{
        page::{Lsn, PAGE_SIZE, PageFrame, PageId},
        pagemgr::manager::PageManager,
    },
    txn::TxnId,
};

pub type BufferPoolHandle = Arc<Mutex<BufferPool>>;

/// Page cache in front of one index file. Frames stay resident until the pool
/// is dropped; there is no eviction.
pub struct BufferPool {
    pm: Box<dyn PageManager>,
    frames: HashMap<PageId, PageFrame>,
}

impl BufferPool {
    pub fn new(pm: Box<dyn PageManager>) -> Self {
        Self {
            pm,
            frames: HashMap::new(),
        }
    }

    pub fn into_handle(self) -> BufferPoolHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn num_blocks(&self) -> u32 {
        self.pm.num_pages()
    }

    /// Appends a block initialised with `initial` (zero-padded) and returns its
    /// number. The initial image is written and synced before this returns, so
    /// logged pointers into the block never outlive it on disk.
    pub fn add_block(&mut self, initial: &[u8]) -> IndexResult<PageId> {
        if initial.len() > PAGE_SIZE {
            return Err(IndexError::RecordTooLarge {
                size: initial.len(),
                max: PAGE_SIZE,
            });
        }

        let pid = self.pm.allocate_page()?;
        let mut frame = PageFrame::new(pid);
        frame.data[..initial.len()].copy_from_slice(initial);

        self.pm.write_page(pid, &frame.data)?;
        self.pm.sync()?;

        self.frames.insert(pid, frame);
        Ok(pid)
    }

    pub fn fetch_page(&mut self, pid: PageId) -> IndexResult<&mut PageFrame> {
        if pid.0 >= self.pm.num_pages() {
            return Err(IndexError::PageNotFound { page_id: pid });
        }

        if !self.frames.contains_key(&pid) {
            let mut frame = PageFrame::new(pid);
            self.pm.read_page(pid, &mut frame.data)?;
            self.frames.insert(pid, frame);
        }

        self.frames
            .get_mut(&pid)
            .ok_or(IndexError::PageNotFound { page_id: pid })
    }

    pub fn read_bytes(&mut self, pid: PageId, offset: usize, len: usize) -> IndexResult<Vec<u8>> {
        Ok(self.fetch_page(pid)?.read(offset, len)?.to_vec())
    }

    pub fn write(
        &mut self,
        pid: PageId,
        offset: usize,
        bytes: &[u8],
        txn: TxnId,
        lsn: Lsn,
    ) -> IndexResult<()> {
        self.fetch_page(pid)?.write(offset, bytes, txn, lsn)
    }

    pub fn page_lsn(&mut self, pid: PageId) -> IndexResult<Lsn> {
        Ok(self.fetch_page(pid)?.lsn)
    }

    pub fn flush_all(&mut self) -> IndexResult<()> {
        let mut dirty: Vec<PageId> = self
            .frames
            .values()
            .filter(|f| f.dirty)
            .map(|f| f.id)
            .collect();
        dirty.sort();

        for pid in dirty {
            if let Some(frame) = self.frames.get_mut(&pid) {
                self.pm.write_page(pid, &frame.data)?;
                frame.dirty = false;
            }
        }

        self.pm.sync()
    }
}
