//! On-page record codec.
//!
//! A record is a type tag, three or four pointer/RID fields and, except for
//! START sentinels, an encoded key. The tag is decoded once into
//! [`RecordKind`]; nothing downstream inspects raw tag bytes.

use std::fmt;

use crate::{
    error::{IndexError, IndexResult},
    index::{
        header::read_i32,
        key::KeySchema,
        layout::{
            FIELD_DOWN, FIELD_NEXT, FIELD_PREV, FIELD_RID, FIELD_TYPE, FIELD_UP,
            INTERNAL_HEADER_LEN, LEAF_HEADER_LEN, POINTER_LEN, RID_LEN, START_LEN, TAG_INTERNAL,
            TAG_LEAF, TAG_START, TAG_TOMBSTONE,
        },
    },
    storage::page::PageId,
    types::value::Value,
};

/// Physical address of a record: block number and byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordPtr {
    pub block: PageId,
    pub offset: u32,
}

impl RecordPtr {
    pub fn new(block: PageId, offset: u32) -> Self {
        Self { block, offset }
    }

    pub fn field(&self, field: usize) -> usize {
        self.offset as usize + field
    }
}

impl fmt::Display for RecordPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.offset)
    }
}

/// A pointer field. `(0, 0)` on disk is `Null`; block 0 offset 0 is header space
/// so no record can live there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeRef {
    #[default]
    Null,
    At(RecordPtr),
}

impl NodeRef {
    pub fn decode(bytes: &[u8]) -> NodeRef {
        let block = read_i32(bytes, 0);
        let offset = read_i32(bytes, 4);
        if block == 0 && offset == 0 {
            NodeRef::Null
        } else {
            NodeRef::At(RecordPtr::new(PageId(block as u32), offset as u32))
        }
    }

    pub fn encode(self) -> [u8; POINTER_LEN] {
        let mut out = [0u8; POINTER_LEN];
        if let NodeRef::At(ptr) = self {
            out[..4].copy_from_slice(&(ptr.block.0 as i32).to_le_bytes());
            out[4..].copy_from_slice(&(ptr.offset as i32).to_le_bytes());
        }
        out
    }

    pub fn ptr(self) -> Option<RecordPtr> {
        match self {
            NodeRef::Null => None,
            NodeRef::At(ptr) => Some(ptr),
        }
    }

    pub fn is_null(self) -> bool {
        matches!(self, NodeRef::Null)
    }
}

impl From<RecordPtr> for NodeRef {
    fn from(ptr: RecordPtr) -> Self {
        NodeRef::At(ptr)
    }
}

/// Row identifier of a base-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub node: i32,
    pub device: i32,
    pub block: i32,
    pub record: i32,
}

impl Rid {
    pub fn new(node: i32, device: i32, block: i32, record: i32) -> Self {
        Self {
            node,
            device,
            block,
            record,
        }
    }

    pub fn encode(&self) -> [u8; RID_LEN] {
        let mut out = [0u8; RID_LEN];
        for (i, part) in [self.node, self.device, self.block, self.record]
            .iter()
            .enumerate()
        {
            out[i * 4..i * 4 + 4].copy_from_slice(&part.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Rid {
        Rid {
            node: read_i32(bytes, 0),
            device: read_i32(bytes, 4),
            block: read_i32(bytes, 8),
            record: read_i32(bytes, 12),
        }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{},{},{})",
            self.node, self.device, self.block, self.record
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Links {
    pub prev: NodeRef,
    pub next: NodeRef,
    pub up: NodeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordKind {
    Start { down: NodeRef },
    Internal { down: NodeRef, key: Vec<Value> },
    Leaf { rid: Rid, key: Vec<Value> },
    Tombstone { rid: Rid, key: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub at: RecordPtr,
    pub links: Links,
    pub kind: RecordKind,
}

impl Record {
    /// Decodes the record starting at `at.offset` of `page`.
    pub fn decode(page: &[u8], at: RecordPtr, schema: &KeySchema) -> IndexResult<Record> {
        let start = at.offset as usize;
        let corrupt = |reason: &str| IndexError::corrupted(at.block, format!("{reason} at {at}"));

        let tag = *page.get(start + FIELD_TYPE).ok_or_else(|| corrupt("record past end of page"))?;
        let header_len = match tag {
            TAG_INTERNAL => INTERNAL_HEADER_LEN,
            TAG_START => START_LEN,
            TAG_LEAF | TAG_TOMBSTONE => LEAF_HEADER_LEN,
            other => return Err(corrupt(&format!("unknown record tag {other}"))),
        };

        let header = page
            .get(start..start + header_len)
            .ok_or_else(|| corrupt("truncated record header"))?;

        let links = Links {
            prev: NodeRef::decode(&header[FIELD_PREV..FIELD_PREV + POINTER_LEN]),
            next: NodeRef::decode(&header[FIELD_NEXT..FIELD_NEXT + POINTER_LEN]),
            up: NodeRef::decode(&header[FIELD_UP..FIELD_UP + POINTER_LEN]),
        };

        let mut key_bytes = &page[start + header_len..];

        let kind = match tag {
            TAG_START => RecordKind::Start {
                down: NodeRef::decode(&header[FIELD_DOWN..FIELD_DOWN + POINTER_LEN]),
            },
            TAG_INTERNAL => RecordKind::Internal {
                down: NodeRef::decode(&header[FIELD_DOWN..FIELD_DOWN + POINTER_LEN]),
                key: schema.decode_key(&mut key_bytes, at.block)?,
            },
            TAG_LEAF => RecordKind::Leaf {
                rid: Rid::decode(&header[FIELD_RID..FIELD_RID + RID_LEN]),
                key: schema.decode_key(&mut key_bytes, at.block)?,
            },
            _ => RecordKind::Tombstone {
                rid: Rid::decode(&header[FIELD_RID..FIELD_RID + RID_LEN]),
                key: schema.decode_key(&mut key_bytes, at.block)?,
            },
        };

        Ok(Record { at, links, kind })
    }

    /// `None` for START sentinels, which compare below every key.
    pub fn key(&self) -> Option<&[Value]> {
        match &self.kind {
            RecordKind::Start { .. } => None,
            RecordKind::Internal { key, .. }
            | RecordKind::Leaf { key, .. }
            | RecordKind::Tombstone { key, .. } => Some(key),
        }
    }

    pub fn down(&self) -> NodeRef {
        match &self.kind {
            RecordKind::Start { down } | RecordKind::Internal { down, .. } => *down,
            RecordKind::Leaf { .. } | RecordKind::Tombstone { .. } => NodeRef::Null,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self.kind, RecordKind::Start { .. })
    }

    pub fn is_live_leaf(&self) -> bool {
        matches!(self.kind, RecordKind::Leaf { .. })
    }

    pub fn encode_start(links: Links, down: NodeRef) -> Vec<u8> {
        let mut out = Vec::with_capacity(START_LEN);
        out.push(TAG_START);
        push_links(&mut out, links);
        out.extend_from_slice(&down.encode());
        out
    }

    pub fn encode_internal(links: Links, down: NodeRef, key_bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(INTERNAL_HEADER_LEN + key_bytes.len());
        out.push(TAG_INTERNAL);
        push_links(&mut out, links);
        out.extend_from_slice(&down.encode());
        out.extend_from_slice(key_bytes);
        out
    }

    pub fn encode_leaf(links: Links, rid: Rid, key_bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(LEAF_HEADER_LEN + key_bytes.len());
        out.push(TAG_LEAF);
        push_links(&mut out, links);
        out.extend_from_slice(&rid.encode());
        out.extend_from_slice(key_bytes);
        out
    }
}

fn push_links(out: &mut Vec<u8>, links: Links) {
    out.extend_from_slice(&links.prev.encode());
    out.extend_from_slice(&links.next.encode());
    out.extend_from_slice(&links.up.encode());
}
