use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::warn;

use crate::{
    error::{IndexError, IndexResult},
    storage::page::PageId,
    txn::{
        TxnId,
        lock::{LockManager, LockMode},
    },
};

/// A caller's transaction as seen by the index.
///
/// The page arena remembers which pages this handle already locked and in
/// which mode, so repeated visits inside one operation sequence skip the lock
/// manager. It is only sound while a transaction runs at most one mutating
/// operation against a given index at a time. Scans run on a [`fork`] with an
/// arena of their own, and stop latching once the owner has finished.
///
/// [`fork`]: Transaction::fork
pub struct Transaction {
    id: TxnId,
    locks: Arc<dyn LockManager>,
    arena: HashMap<PageId, LockMode>,
    owner: bool,
    live: Arc<AtomicBool>,
}

impl Transaction {
    pub fn begin(id: TxnId, locks: Arc<dyn LockManager>) -> Self {
        Self {
            id,
            locks,
            arena: HashMap::new(),
            owner: true,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Locks `block` in `mode` unless the arena says it already is.
    ///
    /// Fails with [`IndexError::TransactionFinished`] once the owning
    /// transaction has committed, even for pages in the arena: their locks
    /// are gone.
    pub fn latch(&mut self, block: PageId, mode: LockMode) -> IndexResult<()> {
        if !self.is_live() {
            return Err(IndexError::TransactionFinished(self.id));
        }
        if self.arena.get(&block).is_some_and(|held| *held >= mode) {
            return Ok(());
        }

        self.locks.acquire(block, self.id, mode)?;

        // the owner may have released everything while we waited
        if !self.is_live() {
            warn!(txn = %self.id, %block, "lock granted after owner finished, releasing");
            self.locks.release_all(self.id);
            return Err(IndexError::TransactionFinished(self.id));
        }

        self.arena.insert(block, mode);
        Ok(())
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn holds(&self, block: PageId, mode: LockMode) -> bool {
        self.arena.get(&block).is_some_and(|held| *held >= mode)
    }

    pub fn pages_latched(&self) -> usize {
        self.arena.len()
    }

    /// Same transaction identity with an empty arena. Forks never release
    /// locks and share the owner's liveness.
    pub fn fork(&self) -> Transaction {
        Transaction {
            id: self.id,
            locks: self.locks.clone(),
            arena: HashMap::new(),
            owner: false,
            live: self.live.clone(),
        }
    }

    /// Ends the transaction and releases every page lock it holds.
    pub fn commit(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.owner {
            self.live.store(false, Ordering::SeqCst);
            self.locks.release_all(self.id);
            self.owner = false;
        }
        self.arena.clear();
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.finish();
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("pages_latched", &self.arena.len())
            .field("owner", &self.owner)
            .field("live", &self.is_live())
            .finish()
    }
}
