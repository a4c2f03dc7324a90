use crate::{
    error::{IndexError, IndexResult},
    index::{layout, record::NodeRef},
    storage::page::PageId,
};

/// Local header carried by every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub key_columns: i32,
    pub unique: bool,
    pub free_offset: u32,
}

impl PageHeader {
    pub fn fresh(key_columns: usize, unique: bool, root: bool) -> Self {
        Self {
            key_columns: key_columns as i32,
            unique,
            free_offset: if root {
                layout::ROOT_RECORD_AREA as u32
            } else {
                layout::RECORD_AREA as u32
            },
        }
    }

    pub fn encode(&self) -> [u8; layout::PAGE_HEADER_LEN] {
        let mut out = [0u8; layout::PAGE_HEADER_LEN];
        out[layout::HDR_KEY_COLUMNS..layout::HDR_KEY_COLUMNS + 4]
            .copy_from_slice(&self.key_columns.to_le_bytes());
        out[layout::HDR_UNIQUE] = self.unique as u8;
        out[layout::HDR_FREE_OFFSET..layout::HDR_FREE_OFFSET + 4]
            .copy_from_slice(&(self.free_offset as i32).to_le_bytes());
        out
    }

    pub fn decode(page: &[u8], page_id: PageId) -> IndexResult<Self> {
        let bytes = page
            .get(..layout::PAGE_HEADER_LEN)
            .ok_or_else(|| IndexError::corrupted(page_id, "truncated page header"))?;

        let key_columns = read_i32(bytes, layout::HDR_KEY_COLUMNS);
        let free = read_i32(bytes, layout::HDR_FREE_OFFSET);
        if free < layout::RECORD_AREA as i32 {
            return Err(IndexError::corrupted(
                page_id,
                format!("free offset {free} inside the header"),
            ));
        }

        Ok(Self {
            key_columns,
            unique: bytes[layout::HDR_UNIQUE] != 0,
            free_offset: free as u32,
        })
    }
}

/// Block 0's pointer to the START sentinel of the top level.
pub fn encode_top_head(top: NodeRef) -> [u8; 8] {
    top.encode()
}

pub fn decode_top_head(page: &[u8], page_id: PageId) -> IndexResult<NodeRef> {
    let bytes = page
        .get(layout::HDR_TOP_BLOCK..layout::HDR_TOP_OFFSET + 4)
        .ok_or_else(|| IndexError::corrupted(page_id, "truncated root header"))?;
    Ok(NodeRef::decode(bytes))
}

pub(crate) fn read_i32(bytes: &[u8], at: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    i32::from_le_bytes(raw)
}
