use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use skipdex::{
    IndexConfig, IndexResult, KeySchema, Rid, ScanItem, ScanRequest, SkipIndex, Value,
    storage::{
        buffer::{BufferPool, BufferPoolHandle},
        pagemgr::{FilePageManager, MemoryPageManager, PageManager},
    },
    txn::{LockTable, MemoryChangeLog, Transaction, TxnId},
};

/// An index wired to in-process collaborators, with autocommit helpers.
pub struct TestIndex {
    pub index: SkipIndex,
    pub pool: BufferPoolHandle,
    pub log: Arc<MemoryChangeLog>,
    pub locks: Arc<LockTable>,
    next_txn: AtomicU64,
}

impl std::fmt::Debug for TestIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestIndex").finish_non_exhaustive()
    }
}

#[allow(dead_code)]
impl TestIndex {
    pub fn seeded_config() -> IndexConfig {
        IndexConfig {
            promotion_seed: Some(42),
            ..Default::default()
        }
    }

    pub fn memory(schema: KeySchema, unique: bool) -> Self {
        Self::with_config(schema, unique, Self::seeded_config())
    }

    pub fn with_config(schema: KeySchema, unique: bool, config: IndexConfig) -> Self {
        Self::create_in(Box::new(MemoryPageManager::new()), schema, unique, config)
            .expect("create in-memory index")
    }

    pub fn create_on_disk(path: &Path, schema: KeySchema, unique: bool) -> anyhow::Result<Self> {
        let pm = FilePageManager::open(path)?;
        Ok(Self::create_in(
            Box::new(pm),
            schema,
            unique,
            Self::seeded_config(),
        )?)
    }

    pub fn open_on_disk(path: &Path, schema: KeySchema) -> anyhow::Result<Self> {
        let pool = BufferPool::new(Box::new(FilePageManager::open(path)?)).into_handle();
        let log = Arc::new(MemoryChangeLog::new());
        let index = SkipIndex::open(
            "test_idx",
            pool.clone(),
            log.clone(),
            schema,
            Self::seeded_config(),
        )?;
        Ok(Self::assemble(index, pool, log, Arc::new(LockTable::new())))
    }

    fn create_in(
        pm: Box<dyn PageManager>,
        schema: KeySchema,
        unique: bool,
        config: IndexConfig,
    ) -> IndexResult<Self> {
        let pool = BufferPool::new(pm).into_handle();
        let log = Arc::new(MemoryChangeLog::new());
        let locks = Arc::new(LockTable::with_timeout(config.lock_wait_timeout()));
        let index = SkipIndex::create("test_idx", pool.clone(), log.clone(), schema, unique, config)?;
        Ok(Self::assemble(index, pool, log, locks))
    }

    fn assemble(
        index: SkipIndex,
        pool: BufferPoolHandle,
        log: Arc<MemoryChangeLog>,
        locks: Arc<LockTable>,
    ) -> Self {
        Self {
            index,
            pool,
            log,
            locks,
            next_txn: AtomicU64::new(1),
        }
    }

    pub fn begin(&self) -> Transaction {
        let id = TxnId(self.next_txn.fetch_add(1, Ordering::SeqCst));
        Transaction::begin(id, self.locks.clone())
    }

    fn autocommit<T>(
        &self,
        op: impl FnOnce(&SkipIndex, &mut Transaction) -> IndexResult<T>,
    ) -> IndexResult<T> {
        let mut txn = self.begin();
        let out = op(&self.index, &mut txn);
        txn.commit();
        out
    }

    pub fn insert(&self, key: &[Value], rid: Rid) -> IndexResult<()> {
        self.autocommit(|index, txn| index.insert(txn, key, rid))
    }

    pub fn delete(&self, key: &[Value], rid: Rid) -> IndexResult<()> {
        self.autocommit(|index, txn| index.delete(txn, key, rid))
    }

    pub fn replace(&self, key: &[Value], old: Rid, new: Rid) -> IndexResult<()> {
        self.autocommit(|index, txn| index.replace(txn, key, old, new))
    }

    pub fn get(&self, key: &[Value]) -> IndexResult<Option<Rid>> {
        self.autocommit(|index, txn| Ok(index.get(txn, key)?.map(|e| e.rid)))
    }

    pub fn scan(&self, request: ScanRequest) -> IndexResult<Vec<ScanItem>> {
        self.autocommit(|index, txn| index.scan(txn, request).collect())
    }

    pub fn scan_rids(&self, request: ScanRequest) -> IndexResult<Vec<Rid>> {
        Ok(self
            .scan(request)?
            .into_iter()
            .filter_map(|item| item.rid())
            .collect())
    }

    /// Every live key in index order.
    pub fn keys(&self) -> Vec<Vec<Value>> {
        let all: Vec<usize> = (0..self.index.schema().len()).collect();
        self.scan(ScanRequest::new().project(all))
            .expect("full scan")
            .into_iter()
            .map(|item| match item {
                ScanItem::Tuple(values) => values,
                ScanItem::Rid(rid) => panic!("projected scan yielded rid {rid}"),
            })
            .collect()
    }

    pub fn level_sizes(&self) -> Vec<usize> {
        self.autocommit(|index, txn| index.level_sizes(txn))
            .expect("level sizes")
    }

    /// Raw bytes of every block, for before/after comparisons.
    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        let mut pool = self.pool.lock();
        (0..pool.num_blocks())
            .map(|b| {
                pool.read_bytes(skipdex::storage::page::PageId(b), 0, skipdex::storage::page::PAGE_SIZE)
                    .expect("read block")
            })
            .collect()
    }
}
