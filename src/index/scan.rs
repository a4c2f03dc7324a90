//! Predicate-driven range scans.
//!
//! The first `next()` builds a [`ScanPlan`] and positions on the leaf level in
//! the caller's thread. A named producer thread then walks the leaves and
//! feeds matches through a bounded channel, so a slow consumer holds the
//! producer back instead of buffering the whole range.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc::{Receiver, SyncSender, sync_channel},
    },
    thread::{self, JoinHandle},
};

use tracing::{debug, warn};

use crate::{
    error::{IndexError, IndexResult},
    index::{
        locate::SearchMode,
        plan::{ScanPlan, StartBound},
        predicate::Predicate,
        record::{NodeRef, RecordKind, Rid},
        skip_index::IndexCore,
    },
    txn::{LockMode, Transaction},
    types::value::Value,
};

/// One match produced by a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanItem {
    Rid(Rid),
    /// Index-only access: the requested key columns, in request order.
    Tuple(Vec<Value>),
}

impl ScanItem {
    pub fn rid(&self) -> Option<Rid> {
        match self {
            ScanItem::Rid(rid) => Some(*rid),
            ScanItem::Tuple(_) => None,
        }
    }
}

/// Predicates and output shape of one scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanRequest {
    leading: Option<Predicate>,
    filters: Vec<Predicate>,
    projection: Option<Vec<usize>>,
}

impl ScanRequest {
    /// A scan over every live entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The predicate used for positioning.
    pub fn leading(mut self, predicate: Predicate) -> Self {
        self.leading = Some(predicate);
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Yield the given key columns instead of RIDs.
    pub fn project(mut self, columns: Vec<usize>) -> Self {
        self.projection = Some(columns);
        self
    }

    /// Splits a conjunction: the first predicate leads, the rest filter.
    pub fn from_conjunction(predicates: Vec<Predicate>) -> Self {
        let mut iter = predicates.into_iter();
        Self {
            leading: iter.next(),
            filters: iter.collect(),
            projection: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Unpositioned,
    Positioned,
    Exhausted,
}

enum ScanMessage {
    Item(ScanItem),
    End,
    Failed(IndexError),
}

/// Iterator over a scan's matches.
///
/// Dropping or [`close`](IndexScan::close)-ing the scan disconnects the
/// channel and joins the producer.
pub struct IndexScan {
    core: Arc<IndexCore>,
    txn: Transaction,
    request: Option<ScanRequest>,
    capacity: usize,
    phase: ScanPhase,
    rx: Option<Receiver<ScanMessage>>,
    producer: Option<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
    registered: bool,
}

impl IndexScan {
    pub(crate) fn new(
        core: Arc<IndexCore>,
        txn: Transaction,
        request: ScanRequest,
        capacity: usize,
        active: Arc<AtomicUsize>,
    ) -> Self {
        let already = active.fetch_add(1, Ordering::SeqCst);
        if already > 0 {
            warn!(index = %core.name, active = already + 1, "more than one scan active on the same index");
        }

        Self {
            core,
            txn,
            request: Some(request),
            capacity,
            phase: ScanPhase::Unpositioned,
            rx: None,
            producer: None,
            active,
            registered: true,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    fn position(&mut self) -> IndexResult<()> {
        let request = self
            .request
            .take()
            .ok_or_else(|| IndexError::InvalidScan("scan already positioned".into()))?;

        let schema = &self.core.schema;
        if let Some(cols) = &request.projection {
            if let Some(bad) = cols.iter().find(|c| **c >= schema.len()) {
                return Err(IndexError::InvalidScan(format!(
                    "projection column {bad} out of range, index has {}",
                    schema.len()
                )));
            }
        }

        let plan = ScanPlan::build(schema, request.leading, request.filters)?;

        let start = match &plan.start {
            StartBound::First => self.core.first_position(&mut self.txn, LockMode::Shared)?,
            StartBound::AtOrAfter(key) => {
                self.core
                    .locate(&mut self.txn, LockMode::Shared, key, SearchMode::Before)?
            }
            StartBound::After(key) => {
                self.core
                    .locate(&mut self.txn, LockMode::Shared, key, SearchMode::Through)?
            }
        };
        debug!(index = %self.core.name, from = %start.at, "scan positioned");

        let (tx, rx) = sync_channel(self.capacity);
        let producer = Producer {
            core: self.core.clone(),
            txn: self.txn.fork(),
            plan,
            projection: request.projection,
            tx,
        };
        let cursor = start.links.next;

        let handle = thread::Builder::new()
            .name(format!("scan-{}", self.core.name))
            .spawn(move || producer.run(cursor))?;

        self.rx = Some(rx);
        self.producer = Some(handle);
        self.phase = ScanPhase::Positioned;
        Ok(())
    }

    /// Disconnects the channel, joins the producer and marks the scan exhausted.
    pub fn close(&mut self) {
        self.rx = None;
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                warn!(index = %self.core.name, "scan producer panicked");
            }
        }
        self.phase = ScanPhase::Exhausted;

        if self.registered {
            self.registered = false;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Iterator for IndexScan {
    type Item = IndexResult<ScanItem>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.phase {
            ScanPhase::Exhausted => return None,
            ScanPhase::Unpositioned => {
                if let Err(e) = self.position() {
                    self.close();
                    return Some(Err(e));
                }
            }
            ScanPhase::Positioned => {}
        }

        let received = self.rx.as_ref()?.recv();
        match received {
            Ok(ScanMessage::Item(item)) => Some(Ok(item)),
            Ok(ScanMessage::End) => {
                self.close();
                None
            }
            Ok(ScanMessage::Failed(e)) => {
                self.close();
                Some(Err(e))
            }
            Err(_) => {
                self.close();
                Some(Err(IndexError::InvalidScan(
                    "scan producer stopped without finishing".into(),
                )))
            }
        }
    }
}

impl Drop for IndexScan {
    fn drop(&mut self) {
        self.close();
    }
}

struct Producer {
    core: Arc<IndexCore>,
    txn: Transaction,
    plan: ScanPlan,
    projection: Option<Vec<usize>>,
    tx: SyncSender<ScanMessage>,
}

impl Producer {
    fn run(mut self, cursor: NodeRef) {
        match self.walk(cursor) {
            Ok(true) => {
                let _ = self.tx.send(ScanMessage::End);
            }
            Ok(false) => debug!(index = %self.core.name, "scan consumer went away"),
            Err(e) => {
                let _ = self.tx.send(ScanMessage::Failed(e));
            }
        }
    }

    /// Returns `false` when the consumer disconnected first.
    fn walk(&mut self, mut cursor: NodeRef) -> IndexResult<bool> {
        let schema = &self.core.schema;

        while let Some(at) = cursor.ptr() {
            let record = self.core.read_record(&mut self.txn, at, LockMode::Shared)?;
            cursor = record.links.next;

            let (key, rid) = match &record.kind {
                RecordKind::Leaf { key, rid } => (key, *rid),
                RecordKind::Tombstone { .. } | RecordKind::Start { .. } => continue,
                RecordKind::Internal { .. } => {
                    return Err(IndexError::corrupted(
                        at.block,
                        format!("internal record {at} on the leaf level"),
                    ));
                }
            };

            if self.plan.should_stop(schema, key) {
                break;
            }
            if !self.plan.accepts(key)? {
                continue;
            }

            let item = match &self.projection {
                Some(cols) => ScanItem::Tuple(cols.iter().map(|c| key[*c].clone()).collect()),
                None => ScanItem::Rid(rid),
            };
            if self.tx.send(ScanMessage::Item(item)).is_err() {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
