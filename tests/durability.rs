mod helpers;

use std::sync::Arc;

use helpers::{
    data::{int, int_schema, name_schema, pair_schema, rid, text},
    harness::TestIndex,
};
use skipdex::{
    IndexConfig, IndexError, ScanRequest, SkipIndex,
    storage::{
        buffer::BufferPool,
        page::{PAGE_SIZE, PageId},
        pagemgr::MemoryPageManager,
    },
    txn::MemoryChangeLog,
};

#[test]
fn every_field_change_is_logged_with_before_image() {
    let idx = TestIndex::memory(int_schema(), false);
    let mut txn = idx.begin();
    let id = txn.id();

    idx.index.insert(&mut txn, &int(1), rid(1)).unwrap();
    let records = idx.log.records_for(id);

    // record bytes, free offset, predecessor next; no successor yet
    assert!(records.len() >= 3, "{records:?}");
    assert!(records.windows(2).all(|w| w[0].lsn < w[1].lsn));
    assert!(records[0].before.iter().all(|b| *b == 0));
    assert_eq!(records[0].after[0], 1, "leaf tag");
    assert_eq!(records[1].offset, 5, "free offset field");

    let page_lsn = idx.pool.lock().page_lsn(PageId(0)).unwrap();
    assert_eq!(page_lsn, records.last().unwrap().lsn);
    txn.commit();
}

#[test]
fn rollback_restores_prior_bytes() {
    let idx = TestIndex::memory(int_schema(), false);
    for v in (0..40).step_by(2) {
        idx.insert(&int(v), rid(v)).unwrap();
    }
    let before = idx.snapshot();
    let keys_before = idx.keys();

    let mut txn = idx.begin();
    let id = txn.id();
    for v in [5, 11, 17, 23, 29] {
        idx.index.insert(&mut txn, &int(v), rid(v)).unwrap();
    }
    idx.index.delete(&mut txn, &int(10), rid(10)).unwrap();
    idx.index
        .replace(&mut txn, &int(12), rid(12), rid(99))
        .unwrap();
    assert_eq!(idx.pool.lock().num_blocks(), 1, "changes must stay in block 0");

    let undone = idx.log.rollback(id, &idx.pool).unwrap();
    assert!(undone > 0);
    drop(txn);

    assert_eq!(idx.snapshot(), before);
    assert_eq!(idx.keys(), keys_before);
}

#[test]
fn unlogged_mutations_stamp_pages_without_records() {
    let idx = TestIndex::memory(int_schema(), false);
    let mut txn = idx.begin();

    let lsn_before = idx.pool.lock().page_lsn(PageId(0)).unwrap();
    for v in 0..10 {
        idx.index.insert_unlogged(&mut txn, &int(v), rid(v)).unwrap();
    }
    idx.index.delete_unlogged(&mut txn, &int(3), rid(3)).unwrap();
    idx.index
        .replace_unlogged(&mut txn, &int(4), rid(4), rid(44))
        .unwrap();
    txn.commit();

    assert!(idx.log.is_empty());
    assert!(idx.pool.lock().page_lsn(PageId(0)).unwrap() > lsn_before);
    assert_eq!(idx.get(&int(3)).unwrap(), None);
    assert_eq!(idx.get(&int(4)).unwrap(), Some(rid(44)));
    assert_eq!(idx.keys().len(), 9);
}

#[test]
fn flushed_index_reopens_with_same_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.idx");

    let expected = {
        let idx = TestIndex::create_on_disk(&path, int_schema(), true).unwrap();
        for v in (0..500).rev() {
            idx.insert(&int(v * 3), rid(v)).unwrap();
        }
        idx.delete(&int(30), rid(10)).unwrap();
        idx.index.flush().unwrap();
        (idx.keys(), idx.level_sizes())
    };

    let idx = TestIndex::open_on_disk(&path, int_schema()).unwrap();
    assert!(idx.index.is_unique());
    assert_eq!((idx.keys(), idx.level_sizes()), expected);

    let rids = idx
        .scan_rids(ScanRequest::new().leading(skipdex::Predicate::column(
            0,
            skipdex::CompareOp::Eq,
            skipdex::Value::Int32(33),
        )))
        .unwrap();
    assert_eq!(rids, vec![rid(11)]);

    // the cached unique flag still applies
    assert!(matches!(
        idx.insert(&int(3), rid(1)),
        Err(IndexError::UniqueConstraintViolation { .. })
    ));
}

#[test]
fn spilled_blocks_are_on_disk_before_logged_links_reach_them() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("names.idx");
    let idx = TestIndex::create_on_disk(&path, name_schema(), false).unwrap();

    let mut txn = idx.begin();
    let id = txn.id();
    let mut n = 0;
    while idx.pool.lock().num_blocks() < 3 {
        let name = format!("{n:04}-{}", "k".repeat(60));
        idx.index.insert(&mut txn, &text(&name), rid(n)).unwrap();
        n += 1;
    }
    // a few more so block 2 also takes logged appends
    for extra in 0..5 {
        let name = format!("z{extra}-{}", "k".repeat(60));
        idx.index.insert(&mut txn, &text(&name), rid(n + extra)).unwrap();
    }
    txn.commit();

    // no flush: every allocated block already has its image in the file
    let blocks = idx.pool.lock().num_blocks() as u64;
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        blocks * PAGE_SIZE as u64
    );

    let records = idx.log.records_for(id);
    assert!(records.iter().any(|r| r.block == PageId(1)));
    assert!(records.iter().all(|r| (r.block.0 as u64) < blocks));
}

#[test]
fn open_and_create_validate_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairs.idx");

    let empty = TestIndex::open_on_disk(&path, int_schema()).unwrap_err();
    assert!(matches!(
        empty.downcast_ref::<IndexError>(),
        Some(IndexError::NotInitialized(_))
    ));

    {
        let idx = TestIndex::create_on_disk(&path, pair_schema(), false).unwrap();
        idx.index.flush().unwrap();
    }

    let mismatch = TestIndex::open_on_disk(&path, int_schema()).unwrap_err();
    assert!(matches!(
        mismatch.downcast_ref::<IndexError>(),
        Some(IndexError::SchemaMismatch {
            expected: 1,
            found: 2,
            ..
        })
    ));

    let again = TestIndex::create_on_disk(&path, pair_schema(), false).unwrap_err();
    assert!(matches!(
        again.downcast_ref::<IndexError>(),
        Some(IndexError::AlreadyExists(_))
    ));
}

#[test]
fn create_rejects_bad_config_and_empty_key() {
    let pool = BufferPool::new(Box::new(MemoryPageManager::new())).into_handle();
    let log = Arc::new(MemoryChangeLog::new());

    let bad = IndexConfig {
        promotion_probability: 0.0,
        ..Default::default()
    };
    let err = SkipIndex::create("bad", pool.clone(), log.clone(), int_schema(), false, bad)
        .unwrap_err();
    assert!(matches!(err, IndexError::Config(_)));

    let err = SkipIndex::create(
        "empty",
        pool.clone(),
        log,
        skipdex::KeySchema::new(vec![]),
        false,
        IndexConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, IndexError::Config(_)));
    assert_eq!(pool.lock().num_blocks(), 0);
}

#[test]
fn conflicting_writer_times_out() {
    let config = IndexConfig {
        lock_wait_timeout_ms: Some(50),
        ..TestIndex::seeded_config()
    };
    let idx = TestIndex::with_config(int_schema(), false, config);
    idx.insert(&int(1), rid(1)).unwrap();

    let mut holder = idx.begin();
    idx.index.insert(&mut holder, &int(2), rid(2)).unwrap();

    let mut waiter = idx.begin();
    let err = idx.index.insert(&mut waiter, &int(3), rid(3)).unwrap_err();
    assert!(matches!(err, IndexError::LockTimeout { .. }));
    drop(waiter);

    holder.commit();
    idx.insert(&int(3), rid(3)).unwrap();
    assert_eq!(idx.keys(), vec![int(1), int(2), int(3)]);
}
