use std::fmt;

use crate::{
    error::{IndexError, IndexResult},
    txn::TxnId,
};

pub const PAGE_SIZE: usize = 4096;

/// Block number inside one index file. Stored on disk as `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(pub u32);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Log sequence number stamped on every page write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Lsn(pub u64);

impl Lsn {
    pub const INVALID: Lsn = Lsn(0);
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct PageFrame {
    pub id: PageId,
    pub data: [u8; PAGE_SIZE],
    pub lsn: Lsn,
    pub last_writer: Option<TxnId>,
    pub dirty: bool,
}

impl PageFrame {
    pub fn new(id: PageId) -> Self {
        Self {
            id,
            data: [0u8; PAGE_SIZE],
            lsn: Lsn::INVALID,
            last_writer: None,
            dirty: false,
        }
    }

    pub fn read(&self, offset: usize, len: usize) -> IndexResult<&[u8]> {
        self.data
            .get(offset..offset + len)
            .ok_or_else(|| IndexError::corrupted(self.id, format!("read past end at {offset}+{len}")))
    }

    /// Applies `bytes` at `offset` and stamps the frame with the writer and its LSN.
    pub fn write(&mut self, offset: usize, bytes: &[u8], txn: TxnId, lsn: Lsn) -> IndexResult<()> {
        let id = self.id;
        let dst = self
            .data
            .get_mut(offset..offset + bytes.len())
            .ok_or_else(|| {
                IndexError::corrupted(id, format!("write past end at {offset}+{}", bytes.len()))
            })?;

        dst.copy_from_slice(bytes);
        if lsn > self.lsn {
            self.lsn = lsn;
        }
        self.last_writer = Some(txn);
        self.dirty = true;
        Ok(())
    }
}
