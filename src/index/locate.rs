//! Positioning: multi-level descent to the leaf-level predecessor of a key.

use std::cmp::Ordering;

use tracing::trace;

use crate::{
    error::{IndexError, IndexResult},
    index::{
        header::decode_top_head,
        record::{NodeRef, Record, RecordPtr},
        skip_index::IndexCore,
    },
    storage::page::PageId,
    txn::{LockMode, Transaction},
    types::value::Value,
};

/// How `locate` treats keys equal to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Stop before the first key equal to the target.
    Before,
    /// Move past every key equal to the target.
    Through,
}

impl IndexCore {
    /// Latches the record's page in `mode`, then decodes the record.
    pub(crate) fn read_record(
        &self,
        txn: &mut Transaction,
        at: RecordPtr,
        mode: LockMode,
    ) -> IndexResult<Record> {
        txn.latch(at.block, mode)?;

        let mut pool = self.pool.lock();
        let frame = pool.fetch_page(at.block)?;
        Record::decode(&frame.data, at, &self.schema)
    }

    /// The START sentinel of the top level, as named by block 0.
    pub(crate) fn top_head(&self, txn: &mut Transaction, mode: LockMode) -> IndexResult<RecordPtr> {
        let root = PageId(0);
        txn.latch(root, mode)?;

        let head = {
            let mut pool = self.pool.lock();
            let frame = pool.fetch_page(root)?;
            decode_top_head(&frame.data, root)?
        };

        head.ptr()
            .ok_or_else(|| IndexError::corrupted(root, "top level head is null"))
    }

    /// Returns the last leaf-level record ordered before `target`
    /// (`Before`) or not after it (`Through`). The result may be the leaf
    /// START sentinel.
    pub(crate) fn locate(
        &self,
        txn: &mut Transaction,
        mode: LockMode,
        target: &[Value],
        search: SearchMode,
    ) -> IndexResult<Record> {
        let top = self.top_head(txn, mode)?;
        let mut current = self.read_record(txn, top, mode)?;
        let mut level = 0usize;

        loop {
            if let Some(next_at) = current.links.next.ptr() {
                let next = self.read_record(txn, next_at, mode)?;
                if self.moves_right(&next, target, search) {
                    current = next;
                    continue;
                }
            }

            match current.down().ptr() {
                Some(down) => {
                    current = self.read_record(txn, down, mode)?;
                    level += 1;
                }
                None => {
                    trace!(index = %self.name, levels = level + 1, at = %current.at, "located");
                    return Ok(current);
                }
            }
        }
    }

    fn moves_right(&self, next: &Record, target: &[Value], search: SearchMode) -> bool {
        let Some(key) = next.key() else {
            return false;
        };
        match (self.schema.compare(key, target), search) {
            (Ordering::Less, _) => true,
            (Ordering::Equal, SearchMode::Through) => true,
            _ => false,
        }
    }

    /// The leaf-level START sentinel, reached by following `down` only.
    pub(crate) fn first_position(
        &self,
        txn: &mut Transaction,
        mode: LockMode,
    ) -> IndexResult<Record> {
        let top = self.top_head(txn, mode)?;
        let mut current = self.read_record(txn, top, mode)?;

        while let Some(down) = current.down().ptr() {
            current = self.read_record(txn, down, mode)?;
        }
        Ok(current)
    }

    /// Walks the run of records equal to `key` following the predecessor and
    /// returns the first one `wanted` accepts.
    pub(crate) fn find_equal(
        &self,
        txn: &mut Transaction,
        mode: LockMode,
        key: &[Value],
        mut wanted: impl FnMut(&Record) -> bool,
    ) -> IndexResult<Option<Record>> {
        let pred = self.locate(txn, mode, key, SearchMode::Before)?;
        let mut cursor = pred.links.next;

        while let Some(at) = cursor.ptr() {
            let record = self.read_record(txn, at, mode)?;
            if record.key().map(|k| self.schema.compare(k, key)) != Some(Ordering::Equal) {
                break;
            }
            if wanted(&record) {
                return Ok(Some(record));
            }
            cursor = record.links.next;
        }

        Ok(None)
    }

    /// Number of records (sentinel excluded) on each level, leaf level first.
    /// Tombstones count; they stay linked.
    pub(crate) fn level_sizes(&self, txn: &mut Transaction) -> IndexResult<Vec<usize>> {
        let mut sizes = Vec::new();
        let mut head: NodeRef = self.top_head(txn, LockMode::Shared)?.into();

        while let Some(start_at) = head.ptr() {
            let start = self.read_record(txn, start_at, LockMode::Shared)?;
            let mut count = 0usize;
            let mut cursor = start.links.next;
            while let Some(at) = cursor.ptr() {
                let record = self.read_record(txn, at, LockMode::Shared)?;
                count += 1;
                cursor = record.links.next;
            }
            sizes.push(count);
            head = start.down();
        }

        sizes.reverse();
        Ok(sizes)
    }
}
