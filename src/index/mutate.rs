//! Leaf insertion, randomized promotion, tombstone delete and RID replace.
//!
//! Every field change goes through [`IndexCore::write_field`], which captures
//! the before-image and hands it to the change log before the page is
//! touched. Records are appended, never moved or freed.

use std::cmp::Ordering;

use rand::Rng;
use tracing::{debug, error};

use crate::{
    error::{IndexError, IndexResult},
    index::{
        header::{PageHeader, encode_top_head},
        layout::{
            FIELD_NEXT, FIELD_PREV, FIELD_RID, FIELD_TYPE, FIELD_UP, HDR_FREE_OFFSET,
            HDR_TOP_BLOCK, MAX_RECORD_LEN, TAG_TOMBSTONE,
        },
        locate::SearchMode,
        record::{Links, NodeRef, Record, RecordKind, RecordPtr, Rid},
        skip_index::IndexCore,
    },
    storage::page::{PAGE_SIZE, PageId},
    txn::{LockMode, Transaction},
    types::value::{Value, format_key},
};

/// Whether a mutation submits change records.
///
/// `Unlogged` still stamps pages with a fresh LSN. It is meant for bulk
/// operations whose durability is handled elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Logged,
    Unlogged,
}

/// Counts consecutive successful draws of the promotion coin.
pub fn promotion_height<R: Rng>(rng: &mut R, probability: f64) -> usize {
    let mut height = 0;
    while rng.random_bool(probability) {
        height += 1;
    }
    height
}

impl IndexCore {
    fn write_field(
        &self,
        txn: &Transaction,
        durability: Durability,
        block: PageId,
        offset: usize,
        after: &[u8],
    ) -> IndexResult<()> {
        let mut pool = self.pool.lock();
        let lsn = match durability {
            Durability::Logged => {
                let before = pool.read_bytes(block, offset, after.len())?;
                self.log
                    .record_change(txn.id(), block, offset as u32, &before, after)?
            }
            Durability::Unlogged => self.log.next_lsn(),
        };
        pool.write(block, offset, after, txn.id(), lsn)
    }

    fn write_pointer(
        &self,
        txn: &Transaction,
        durability: Durability,
        at: RecordPtr,
        field: usize,
        target: NodeRef,
    ) -> IndexResult<()> {
        self.write_field(txn, durability, at.block, at.field(field), &target.encode())
    }

    /// Places `bytes` at the free offset of the last block, or in a new block
    /// when it does not fit.
    fn append_record(
        &self,
        txn: &mut Transaction,
        durability: Durability,
        bytes: &[u8],
    ) -> IndexResult<RecordPtr> {
        if bytes.len() > MAX_RECORD_LEN {
            return Err(IndexError::RecordTooLarge {
                size: bytes.len(),
                max: MAX_RECORD_LEN,
            });
        }

        // the last block can change while we wait for its lock
        let last = loop {
            let last = self.last_block()?;
            txn.latch(last, LockMode::Exclusive)?;
            if self.last_block()? == last {
                break last;
            }
        };

        let header = {
            let mut pool = self.pool.lock();
            let frame = pool.fetch_page(last)?;
            PageHeader::decode(&frame.data, last)?
        };

        let free = header.free_offset as usize;
        if free + bytes.len() <= PAGE_SIZE {
            let at = RecordPtr::new(last, free as u32);
            self.write_field(txn, durability, last, free, bytes)?;
            let bumped = ((free + bytes.len()) as i32).to_le_bytes();
            self.write_field(txn, durability, last, HDR_FREE_OFFSET, &bumped)?;
            return Ok(at);
        }

        let mut fresh = PageHeader::fresh(self.schema.len(), self.unique, false);
        let offset = fresh.free_offset;
        fresh.free_offset += bytes.len() as u32;

        let mut initial = fresh.encode().to_vec();
        initial.extend_from_slice(bytes);

        let block = self.pool.lock().add_block(&initial)?;
        txn.latch(block, LockMode::Exclusive)?;
        debug!(index = %self.name, %block, "allocated index block");

        Ok(RecordPtr::new(block, offset))
    }

    fn last_block(&self) -> IndexResult<PageId> {
        let blocks = self.pool.lock().num_blocks();
        blocks
            .checked_sub(1)
            .map(PageId)
            .ok_or_else(|| IndexError::NotInitialized(self.name.clone()))
    }

    fn set_top_head(
        &self,
        txn: &mut Transaction,
        durability: Durability,
        head: RecordPtr,
    ) -> IndexResult<()> {
        let root = PageId(0);
        txn.latch(root, LockMode::Exclusive)?;
        self.write_field(
            txn,
            durability,
            root,
            HDR_TOP_BLOCK,
            &encode_top_head(head.into()),
        )
    }

    /// Splices a new leaf after the last key equal to `key`, then promotes it
    /// `height` levels.
    pub(crate) fn insert(
        &self,
        txn: &mut Transaction,
        durability: Durability,
        key: &[Value],
        rid: Rid,
        height: usize,
    ) -> IndexResult<RecordPtr> {
        let key_bytes = self.schema.encode_key(key)?;

        let mut pred = self.locate(txn, LockMode::Exclusive, key, SearchMode::Before)?;
        while let Some(next_at) = pred.links.next.ptr() {
            let next = self.read_record(txn, next_at, LockMode::Exclusive)?;
            if next.key().map(|k| self.schema.compare(k, key)) != Some(Ordering::Equal) {
                break;
            }
            if self.unique && next.is_live_leaf() {
                return Err(IndexError::UniqueConstraintViolation {
                    index: self.name.clone(),
                    key: format_key(key),
                });
            }
            pred = next;
        }

        let succ = pred.links.next;
        let links = Links {
            prev: pred.at.into(),
            next: succ,
            up: NodeRef::Null,
        };
        let leaf = Record::encode_leaf(links, rid, &key_bytes);

        let at = self.append_record(txn, durability, &leaf)?;
        self.write_pointer(txn, durability, pred.at, FIELD_NEXT, at.into())?;
        if let Some(succ) = succ.ptr() {
            self.write_pointer(txn, durability, succ, FIELD_PREV, at.into())?;
        }

        debug!(index = %self.name, key = %format_key(key), %rid, %at, height, "inserted leaf");

        self.promote(txn, durability, at, &key_bytes, height)?;
        Ok(at)
    }

    /// Builds a tower of `height` INTERNAL records above `node`.
    fn promote(
        &self,
        txn: &mut Transaction,
        durability: Durability,
        mut node: RecordPtr,
        key_bytes: &[u8],
        height: usize,
    ) -> IndexResult<()> {
        for _ in 0..height {
            let anchor = self.promotion_anchor(txn, node)?;

            let raised = match anchor {
                Some(anchor) => self.link_above(txn, durability, anchor, node, key_bytes)?,
                None => self.grow_level(txn, durability, node, key_bytes)?,
            };

            self.write_pointer(txn, durability, node, FIELD_UP, raised.into())?;
            node = raised;
        }
        Ok(())
    }

    /// Walks left from `node` to the nearest record with an `up` link and
    /// returns that link. `None` when the level START has no level above.
    fn promotion_anchor(
        &self,
        txn: &mut Transaction,
        node: RecordPtr,
    ) -> IndexResult<Option<RecordPtr>> {
        let mut cursor = self.read_record(txn, node, LockMode::Exclusive)?;

        loop {
            let prev = cursor.links.prev.ptr().ok_or_else(|| {
                IndexError::corrupted(cursor.at.block, format!("record {} has no prev", cursor.at))
            })?;
            cursor = self.read_record(txn, prev, LockMode::Exclusive)?;

            if let Some(up) = cursor.links.up.ptr() {
                return Ok(Some(up));
            }
            if cursor.is_start() {
                return Ok(None);
            }
        }
    }

    fn link_above(
        &self,
        txn: &mut Transaction,
        durability: Durability,
        anchor: RecordPtr,
        node: RecordPtr,
        key_bytes: &[u8],
    ) -> IndexResult<RecordPtr> {
        let anchor = self.read_record(txn, anchor, LockMode::Exclusive)?;
        let succ = anchor.links.next;

        let links = Links {
            prev: anchor.at.into(),
            next: succ,
            up: NodeRef::Null,
        };
        let internal = Record::encode_internal(links, node.into(), key_bytes);

        let at = self.append_record(txn, durability, &internal)?;
        self.write_pointer(txn, durability, anchor.at, FIELD_NEXT, at.into())?;
        if let Some(succ) = succ.ptr() {
            self.read_record(txn, succ, LockMode::Exclusive)?;
            self.write_pointer(txn, durability, succ, FIELD_PREV, at.into())?;
        }
        Ok(at)
    }

    /// Adds a level on top: a new START over the old top and one INTERNAL
    /// pointing down at `node`.
    fn grow_level(
        &self,
        txn: &mut Transaction,
        durability: Durability,
        node: RecordPtr,
        key_bytes: &[u8],
    ) -> IndexResult<RecordPtr> {
        let old_top = self.top_head(txn, LockMode::Exclusive)?;
        self.read_record(txn, old_top, LockMode::Exclusive)?;

        let start = Record::encode_start(Links::default(), old_top.into());
        let start_at = self.append_record(txn, durability, &start)?;
        self.write_pointer(txn, durability, old_top, FIELD_UP, start_at.into())?;

        let links = Links {
            prev: start_at.into(),
            ..Links::default()
        };
        let internal = Record::encode_internal(links, node.into(), key_bytes);
        let at = self.append_record(txn, durability, &internal)?;
        self.write_pointer(txn, durability, start_at, FIELD_NEXT, at.into())?;

        self.set_top_head(txn, durability, start_at)?;
        debug!(index = %self.name, head = %start_at, "grew a new top level");
        Ok(at)
    }

    fn live_match(
        &self,
        txn: &mut Transaction,
        key: &[Value],
        rid: Rid,
    ) -> IndexResult<RecordPtr> {
        self.schema.encode_key(key)?;

        let found = self.find_equal(txn, LockMode::Exclusive, key, |record| {
            matches!(record.kind, RecordKind::Leaf { rid: r, .. } if r == rid)
        })?;

        match found {
            Some(record) => Ok(record.at),
            None => {
                error!(index = %self.name, key = %format_key(key), %rid, "no live entry to mutate");
                Err(IndexError::RecordNotFound {
                    index: self.name.clone(),
                    key: format_key(key),
                    rid,
                })
            }
        }
    }

    /// Marks the live leaf `(key, rid)` as a tombstone.
    pub(crate) fn delete(
        &self,
        txn: &mut Transaction,
        durability: Durability,
        key: &[Value],
        rid: Rid,
    ) -> IndexResult<()> {
        let at = self.live_match(txn, key, rid)?;
        self.write_field(txn, durability, at.block, at.field(FIELD_TYPE), &[TAG_TOMBSTONE])?;
        debug!(index = %self.name, key = %format_key(key), %rid, %at, "tombstoned leaf");
        Ok(())
    }

    /// Overwrites the RID of the live leaf `(key, old)` with `new`.
    pub(crate) fn replace(
        &self,
        txn: &mut Transaction,
        durability: Durability,
        key: &[Value],
        old: Rid,
        new: Rid,
    ) -> IndexResult<()> {
        let at = self.live_match(txn, key, old)?;
        self.write_field(txn, durability, at.block, at.field(FIELD_RID), &new.encode())?;
        debug!(index = %self.name, key = %format_key(key), %old, %new, "replaced rid");
        Ok(())
    }
}
