//! Page-granularity two-phase locks.
//!
//! Locks are granted per (page, transaction) and held until
//! [`LockManager::release_all`] at transaction end. There is no deadlock
//! detection; a configured wait timeout is the only way out of a cycle.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::{
    error::{IndexError, IndexResult},
    storage::page::PageId,
    txn::TxnId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub trait LockManager: Send + Sync {
    fn acquire_shared(&self, block: PageId, txn: TxnId) -> IndexResult<()>;
    fn acquire_exclusive(&self, block: PageId, txn: TxnId) -> IndexResult<()>;
    fn release_all(&self, txn: TxnId);

    fn acquire(&self, block: PageId, txn: TxnId, mode: LockMode) -> IndexResult<()> {
        match mode {
            LockMode::Shared => self.acquire_shared(block, txn),
            LockMode::Exclusive => self.acquire_exclusive(block, txn),
        }
    }
}

#[derive(Debug, Default)]
struct PageLock {
    shared: HashSet<TxnId>,
    exclusive: Option<TxnId>,
}

impl PageLock {
    fn grantable(&self, txn: TxnId, mode: LockMode) -> bool {
        let writer_ok = self.exclusive.is_none_or(|owner| owner == txn);
        match mode {
            LockMode::Shared => writer_ok,
            LockMode::Exclusive => writer_ok && self.shared.iter().all(|t| *t == txn),
        }
    }

    fn grant(&mut self, txn: TxnId, mode: LockMode) {
        match mode {
            LockMode::Shared => {
                if self.exclusive != Some(txn) {
                    self.shared.insert(txn);
                }
            }
            LockMode::Exclusive => {
                self.shared.remove(&txn);
                self.exclusive = Some(txn);
            }
        }
    }

    fn is_free(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none()
    }
}

#[derive(Debug, Default)]
struct LockState {
    pages: HashMap<PageId, PageLock>,
    held: HashMap<TxnId, HashSet<PageId>>,
}

/// Blocking in-process lock table.
#[derive(Debug, Default)]
pub struct LockTable {
    state: Mutex<LockState>,
    released: Condvar,
    timeout: Option<Duration>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Number of pages `txn` currently holds any lock on.
    pub fn held_by(&self, txn: TxnId) -> usize {
        self.state.lock().held.get(&txn).map_or(0, |s| s.len())
    }

    fn lock(&self, block: PageId, txn: TxnId, mode: LockMode) -> IndexResult<()> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();

        loop {
            let entry = state.pages.entry(block).or_default();
            if entry.grantable(txn, mode) {
                entry.grant(txn, mode);
                state.held.entry(txn).or_default().insert(block);
                trace!(%txn, page = %block, ?mode, "lock granted");
                return Ok(());
            }

            debug!(%txn, page = %block, ?mode, "waiting for page lock");
            match deadline {
                Some(deadline) => {
                    let timed_out = self.released.wait_until(&mut state, deadline).timed_out();
                    let entry = state.pages.entry(block).or_default();
                    if timed_out && !entry.grantable(txn, mode) {
                        return Err(IndexError::LockTimeout {
                            txn,
                            page_id: block,
                        });
                    }
                }
                None => self.released.wait(&mut state),
            }
        }
    }
}

impl LockManager for LockTable {
    fn acquire_shared(&self, block: PageId, txn: TxnId) -> IndexResult<()> {
        self.lock(block, txn, LockMode::Shared)
    }

    fn acquire_exclusive(&self, block: PageId, txn: TxnId) -> IndexResult<()> {
        self.lock(block, txn, LockMode::Exclusive)
    }

    fn release_all(&self, txn: TxnId) {
        let mut state = self.state.lock();
        let Some(blocks) = state.held.remove(&txn) else {
            return;
        };

        for block in blocks {
            if let Some(entry) = state.pages.get_mut(&block) {
                entry.shared.remove(&txn);
                if entry.exclusive == Some(txn) {
                    entry.exclusive = None;
                }
                if entry.is_free() {
                    state.pages.remove(&block);
                }
            }
        }

        drop(state);
        self.released.notify_all();
    }
}
