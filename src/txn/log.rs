//! Change logging contract consumed by the mutation engine.
//!
//! Every page field the index changes is first described to the log as a
//! before/after byte image. The returned LSN is stamped on the page write.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    error::IndexResult,
    storage::{
        buffer::BufferPoolHandle,
        page::{Lsn, PageId},
    },
    txn::TxnId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub lsn: Lsn,
    pub txn: TxnId,
    pub block: PageId,
    pub offset: u32,
    pub before: Vec<u8>,
    pub after: Vec<u8>,
}

pub trait ChangeLog: Send + Sync {
    /// Durably describes one field change and returns its sequence number.
    fn record_change(
        &self,
        txn: TxnId,
        block: PageId,
        offset: u32,
        before: &[u8],
        after: &[u8],
    ) -> IndexResult<Lsn>;

    /// Allocates a sequence number without recording anything.
    fn next_lsn(&self) -> Lsn;
}

/// Keeps change records in memory, in LSN order.
#[derive(Debug)]
pub struct MemoryChangeLog {
    next: AtomicU64,
    records: Mutex<Vec<ChangeRecord>>,
}

impl Default for MemoryChangeLog {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
            records: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records_for(&self, txn: TxnId) -> Vec<ChangeRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.txn == txn)
            .cloned()
            .collect()
    }

    /// Re-applies the before-images of `txn`'s changes, newest first, and
    /// forgets them. Returns how many changes were undone.
    pub fn rollback(&self, txn: TxnId, pool: &BufferPoolHandle) -> IndexResult<usize> {
        let undo: Vec<ChangeRecord> = {
            let mut records = self.records.lock();
            let (mine, rest): (Vec<_>, Vec<_>) = records.drain(..).partition(|r| r.txn == txn);
            *records = rest;
            mine
        };

        let mut pool = pool.lock();
        for record in undo.iter().rev() {
            let lsn = self.next_lsn();
            pool.write(
                record.block,
                record.offset as usize,
                &record.before,
                txn,
                lsn,
            )?;
        }

        debug!(%txn, undone = undo.len(), "rolled back change records");
        Ok(undo.len())
    }
}

impl ChangeLog for MemoryChangeLog {
    fn record_change(
        &self,
        txn: TxnId,
        block: PageId,
        offset: u32,
        before: &[u8],
        after: &[u8],
    ) -> IndexResult<Lsn> {
        let mut records = self.records.lock();
        // allocated under the lock so records stay in LSN order
        let lsn = self.next_lsn();
        records.push(ChangeRecord {
            lsn,
            txn,
            block,
            offset,
            before: before.to_vec(),
            after: after.to_vec(),
        });
        Ok(lsn)
    }

    fn next_lsn(&self) -> Lsn {
        Lsn(self.next.fetch_add(1, Ordering::SeqCst))
    }
}
