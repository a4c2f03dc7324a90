use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info};

use crate::{
    config::IndexConfig,
    error::{IndexError, IndexResult},
    index::{
        header::{PageHeader, decode_top_head, encode_top_head},
        key::KeySchema,
        layout::{HDR_TOP_BLOCK, ROOT_HEADER_LEN, ROOT_RECORD_AREA, START_LEN},
        mutate::{Durability, promotion_height},
        record::{Links, NodeRef, Record, RecordKind, RecordPtr, Rid},
        scan::{IndexScan, ScanItem, ScanRequest},
    },
    storage::{buffer::BufferPoolHandle, page::PageId},
    txn::{ChangeLog, LockMode, Transaction},
    types::value::Value,
};

/// State shared by an index handle, its clones and their scan producers.
pub(crate) struct IndexCore {
    pub(crate) name: String,
    pub(crate) schema: KeySchema,
    pub(crate) unique: bool,
    pub(crate) pool: BufferPoolHandle,
    pub(crate) log: Arc<dyn ChangeLog>,
}

/// A live leaf entry.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key: Vec<Value>,
    pub rid: Rid,
}

/// Handle to one skip-list index file.
///
/// Point operations run synchronously under the caller's [`Transaction`].
/// Besides standalone [`IndexScan`]s, the handle carries one cursor driven by
/// [`configure_scan`](SkipIndex::configure_scan) and [`next`](SkipIndex::next).
pub struct SkipIndex {
    core: Arc<IndexCore>,
    config: IndexConfig,
    rng: Arc<Mutex<StdRng>>,
    active_scans: Arc<AtomicUsize>,
    pending: Option<ScanRequest>,
    cursor: Option<IndexScan>,
}

impl SkipIndex {
    /// Initialises an empty index in a pool with no blocks: block 0 with its
    /// header and the leaf-level START sentinel.
    pub fn create(
        name: impl Into<String>,
        pool: BufferPoolHandle,
        log: Arc<dyn ChangeLog>,
        schema: KeySchema,
        unique: bool,
        config: IndexConfig,
    ) -> IndexResult<Self> {
        let name = name.into();
        config.validate()?;
        if schema.is_empty() {
            return Err(IndexError::Config(format!(
                "index '{name}' needs at least one key column"
            )));
        }

        {
            let mut guard = pool.lock();
            if guard.num_blocks() > 0 {
                return Err(IndexError::AlreadyExists(name));
            }

            let start_at = RecordPtr::new(PageId(0), ROOT_RECORD_AREA as u32);
            let mut header = PageHeader::fresh(schema.len(), unique, true);
            header.free_offset += START_LEN as u32;

            let mut initial = vec![0u8; ROOT_HEADER_LEN];
            initial[..header.encode().len()].copy_from_slice(&header.encode());
            initial[HDR_TOP_BLOCK..ROOT_HEADER_LEN]
                .copy_from_slice(&encode_top_head(start_at.into()));
            initial.extend_from_slice(&Record::encode_start(Links::default(), NodeRef::Null));

            guard.add_block(&initial)?;
        }

        info!(index = %name, columns = schema.len(), unique, "created index");
        Ok(Self::assemble(name, pool, log, schema, unique, config))
    }

    /// Opens an index previously created in `pool`. The unique flag is read
    /// from block 0 and cached.
    pub fn open(
        name: impl Into<String>,
        pool: BufferPoolHandle,
        log: Arc<dyn ChangeLog>,
        schema: KeySchema,
        config: IndexConfig,
    ) -> IndexResult<Self> {
        let name = name.into();
        config.validate()?;

        let header = {
            let mut guard = pool.lock();
            if guard.num_blocks() == 0 {
                return Err(IndexError::NotInitialized(name));
            }
            let frame = guard.fetch_page(PageId(0))?;
            decode_top_head(&frame.data, PageId(0))?;
            PageHeader::decode(&frame.data, PageId(0))?
        };

        if header.key_columns as usize != schema.len() {
            return Err(IndexError::SchemaMismatch {
                index: name,
                expected: schema.len(),
                found: header.key_columns.max(0) as usize,
            });
        }

        debug!(index = %name, unique = header.unique, "opened index");
        Ok(Self::assemble(name, pool, log, schema, header.unique, config))
    }

    fn assemble(
        name: String,
        pool: BufferPoolHandle,
        log: Arc<dyn ChangeLog>,
        schema: KeySchema,
        unique: bool,
        config: IndexConfig,
    ) -> Self {
        let rng = match config.promotion_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            core: Arc::new(IndexCore {
                name,
                schema,
                unique,
                pool,
                log,
            }),
            config,
            rng: Arc::new(Mutex::new(rng)),
            active_scans: Arc::new(AtomicUsize::new(0)),
            pending: None,
            cursor: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn schema(&self) -> &KeySchema {
        &self.core.schema
    }

    pub fn is_unique(&self) -> bool {
        self.core.unique
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn draw_height(&self) -> usize {
        let mut rng = self.rng.lock();
        promotion_height(&mut *rng, self.config.promotion_probability)
    }

    pub fn insert(&self, txn: &mut Transaction, key: &[Value], rid: Rid) -> IndexResult<()> {
        let height = self.draw_height();
        self.core
            .insert(txn, Durability::Logged, key, rid, height)
            .map(|_| ())
    }

    /// [`insert`](Self::insert) without change records. Bulk loads only.
    pub fn insert_unlogged(
        &self,
        txn: &mut Transaction,
        key: &[Value],
        rid: Rid,
    ) -> IndexResult<()> {
        let height = self.draw_height();
        self.core
            .insert(txn, Durability::Unlogged, key, rid, height)
            .map(|_| ())
    }

    pub fn delete(&self, txn: &mut Transaction, key: &[Value], rid: Rid) -> IndexResult<()> {
        self.core.delete(txn, Durability::Logged, key, rid)
    }

    pub fn delete_unlogged(
        &self,
        txn: &mut Transaction,
        key: &[Value],
        rid: Rid,
    ) -> IndexResult<()> {
        self.core.delete(txn, Durability::Unlogged, key, rid)
    }

    pub fn replace(
        &self,
        txn: &mut Transaction,
        key: &[Value],
        old: Rid,
        new: Rid,
    ) -> IndexResult<()> {
        self.core.replace(txn, Durability::Logged, key, old, new)
    }

    pub fn replace_unlogged(
        &self,
        txn: &mut Transaction,
        key: &[Value],
        old: Rid,
        new: Rid,
    ) -> IndexResult<()> {
        self.core.replace(txn, Durability::Unlogged, key, old, new)
    }

    /// First live entry whose key equals `key` exactly.
    pub fn get(&self, txn: &mut Transaction, key: &[Value]) -> IndexResult<Option<IndexEntry>> {
        self.core.schema.encode_key(key)?;

        let found = self
            .core
            .find_equal(txn, LockMode::Shared, key, |r| r.is_live_leaf())?;

        Ok(found.and_then(|record| match record.kind {
            RecordKind::Leaf { key, rid } => Some(IndexEntry { key, rid }),
            RecordKind::Internal { .. } | RecordKind::Tombstone { .. } | RecordKind::Start { .. } => {
                None
            }
        }))
    }

    /// Starts an independent scan under a fork of `txn`.
    pub fn scan(&self, txn: &Transaction, request: ScanRequest) -> IndexScan {
        IndexScan::new(
            self.core.clone(),
            txn.fork(),
            request,
            self.config.scan_queue_capacity,
            self.active_scans.clone(),
        )
    }

    /// Arms the handle's cursor. Any previous cursor is closed.
    pub fn configure_scan(&mut self, request: ScanRequest) {
        self.close();
        self.pending = Some(request);
    }

    /// Next match of the configured cursor, `None` once exhausted.
    pub fn next(&mut self, txn: &Transaction) -> IndexResult<Option<ScanItem>> {
        if self.cursor.is_none() {
            let request = self
                .pending
                .take()
                .ok_or_else(|| IndexError::InvalidScan("no scan configured".into()))?;
            self.cursor = Some(self.scan(txn, request));
        }

        match self.cursor.as_mut() {
            Some(cursor) => cursor.next().transpose(),
            None => Ok(None),
        }
    }

    /// Closes the handle's cursor and joins its producer.
    pub fn close(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
        self.pending = None;
    }

    /// Writes every dirty page back to the page manager.
    pub fn flush(&self) -> IndexResult<()> {
        self.core.pool.lock().flush_all()
    }

    /// Records per level, leaf level first; tombstones included.
    pub fn level_sizes(&self, txn: &mut Transaction) -> IndexResult<Vec<usize>> {
        self.core.level_sizes(txn)
    }

    pub fn level_count(&self, txn: &mut Transaction) -> IndexResult<usize> {
        Ok(self.level_sizes(txn)?.len())
    }

    pub fn active_scans(&self) -> usize {
        self.active_scans.load(Ordering::SeqCst)
    }
}

/// Clones share the file, log and promotion coin; scan state starts fresh.
impl Clone for SkipIndex {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            config: self.config.clone(),
            rng: self.rng.clone(),
            active_scans: self.active_scans.clone(),
            pending: None,
            cursor: None,
        }
    }
}

impl std::fmt::Debug for SkipIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipIndex")
            .field("name", &self.core.name)
            .field("columns", &self.core.schema.len())
            .field("unique", &self.core.unique)
            .finish()
    }
}
