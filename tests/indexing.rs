//! # Indexing Pipeline Integration Tests
//!
//! Concurrent writers against the asynchronous pipeline, ordering of
//! replaces and deletes per id, and clear/drop interplay with queued work.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use analytics_dataservice::{
    AnalyticsDataService, Config, InMemoryRecordStore, Record, RecordGroup, RecordIter, RecordStore,
    RecordValue, Result, TIME_MAX, TIME_MIN,
};

fn open(shards: usize) -> Arc<AnalyticsDataService> {
    let config = Config {
        index_shards: shards,
        index_queue_capacity: 16,
        index_batch_size: 8,
        parallel_analysis_threshold: 4,
        ..Config::default()
    };
    Arc::new(AnalyticsDataService::open(config).unwrap())
}

fn record(table: &str, id: &str, state: &str) -> Record {
    let mut values = HashMap::new();
    values.insert("state".to_string(), RecordValue::from(state));
    Record::with_id(id, table, values)
}

#[test]
fn test_concurrent_writers_with_small_queues() {
    let service = open(4);
    service.create_table("t").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|writer| {
            let service = service.clone();
            thread::spawn(move || {
                for batch in 0..25 {
                    let records = (0..10)
                        .map(|i| record("t", &format!("w{}-{}-{}", writer, batch, i), "open"))
                        .collect();
                    service.put(records).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    service.wait_for_indexing(-1).unwrap();
    assert_eq!(service.search_count("t", "state:open").unwrap(), 1000);

    let stats = service.stats().unwrap();
    assert_eq!(stats.indexing.enqueued, 1000);
    assert_eq!(stats.indexing.pending, 0);
    assert_eq!(stats.indexing.failed, 0);
}

#[test]
fn test_last_write_per_id_wins_in_index() {
    let service = open(3);
    service.create_table("t").unwrap();

    for round in 0..20 {
        let state = if round % 2 == 0 { "open" } else { "closed" };
        let records = (0..10).map(|i| record("t", &format!("r{}", i), state)).collect();
        service.put(records).unwrap();
    }
    service.delete_ids("t", &["r0".to_string()]).unwrap();
    service.wait_for_indexing(-1).unwrap();

    assert_eq!(service.search_count("t", "state:open").unwrap(), 0);
    assert_eq!(service.search_count("t", "state:closed").unwrap(), 9);
}

#[test]
fn test_clear_then_put_keeps_only_new_records() {
    let service = open(2);
    service.create_table("t").unwrap();
    service.put((0..50).map(|i| record("t", &format!("old{}", i), "open")).collect()).unwrap();
    service.clear_index_data("t").unwrap();
    service.put(vec![record("t", "new", "open")]).unwrap();
    service.wait_for_indexing(-1).unwrap();

    let hits = service.search("t", "state:open", 0, 100).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "new");
}

#[test]
fn test_recreated_table_starts_empty() {
    let service = open(2);
    service.create_table("t").unwrap();
    service.put((0..30).map(|i| record("t", &format!("r{}", i), "open")).collect()).unwrap();
    service.delete_table("t").unwrap();
    service.create_table("t").unwrap();
    service.put(vec![record("t", "fresh", "open")]).unwrap();
    service.wait_for_indexing(-1).unwrap();

    assert_eq!(service.search_count("t", "*:*").unwrap(), 1);
}

#[test]
fn test_wait_with_bound_succeeds_when_idle() {
    let service = open(2);
    service.wait_for_indexing(0).unwrap();
    service.wait_for_indexing(10).unwrap();
}

#[test]
fn test_recreated_table_never_serves_dropped_records() {
    let service = open(3);
    service.create_table("t").unwrap();
    service.put((0..200).map(|i| record("t", &format!("old{}", i), "open")).collect()).unwrap();
    service.delete_table("t").unwrap();
    service.create_table("t").unwrap();

    // No wait: events of the dropped table may still be queued
    let hits = service.search("t", "*:*", 0, 500).unwrap();
    assert!(hits.iter().all(|hit| !hit.id.starts_with("old")));
    assert_eq!(service.search_count("t", "state:open").unwrap(), hits.len() as u64);

    service.put(vec![record("t", "fresh", "open")]).unwrap();
    service.wait_for_indexing(-1).unwrap();
    assert_eq!(service.search_count("t", "*:*").unwrap(), 1);
    assert_eq!(service.stats().unwrap().indexed_documents, 1);
}

/// Store whose table drops take long enough for other calls to interleave
struct SlowDropStore {
    inner: InMemoryRecordStore,
    delay: Duration,
}

impl RecordStore for SlowDropStore {
    fn create_table(&self, table: &str) -> Result<()> {
        self.inner.create_table(table)
    }

    fn delete_table(&self, table: &str) -> Result<()> {
        thread::sleep(self.delay);
        self.inner.delete_table(table)
    }

    fn put(&self, table: &str, records: &[Record]) -> Result<()> {
        self.inner.put(table, records)
    }

    fn delete_ids(&self, table: &str, ids: &[String]) -> Result<Vec<String>> {
        self.inner.delete_ids(table, ids)
    }

    fn delete_range(&self, table: &str, from: i64, to: i64) -> Result<Vec<String>> {
        self.inner.delete_range(table, from, to)
    }

    fn count(&self, table: &str, from: i64, to: i64) -> Result<u64> {
        self.inner.count(table, from, to)
    }

    fn partition_count(&self) -> usize {
        self.inner.partition_count()
    }

    fn is_pagination_supported(&self) -> bool {
        self.inner.is_pagination_supported()
    }

    fn plan_range(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        from: i64,
        to: i64,
        offset: u64,
        count: Option<u64>,
    ) -> Result<Vec<RecordGroup>> {
        self.inner.plan_range(table, partitions_hint, columns, from, to, offset, count)
    }

    fn plan_ids(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        ids: &[String],
    ) -> Result<Vec<RecordGroup>> {
        self.inner.plan_ids(table, partitions_hint, columns, ids)
    }

    fn read_records(&self, group: &RecordGroup) -> Result<RecordIter> {
        self.inner.read_records(group)
    }

    fn destroy(&self) {
        self.inner.destroy()
    }
}

#[test]
fn test_create_during_slow_drop_leaves_usable_table() {
    let store = Arc::new(SlowDropStore { inner: InMemoryRecordStore::new(4), delay: Duration::from_millis(200) });
    let config = Config { index_shards: 2, ..Config::default() };
    let service = Arc::new(AnalyticsDataService::open_with_store(config, store).unwrap());
    service.create_table("t").unwrap();
    service.put(vec![record("t", "before", "open")]).unwrap();

    let dropper = {
        let service = service.clone();
        thread::spawn(move || service.delete_table("t").unwrap())
    };
    thread::sleep(Duration::from_millis(50));
    service.create_table("t").unwrap();
    dropper.join().unwrap();

    // Whichever order the two calls took, catalog and store agree
    if service.table_exists("t").unwrap() {
        service.put(vec![record("t", "after", "open")]).unwrap();
        assert_eq!(service.get_record_count("t", TIME_MIN, TIME_MAX).unwrap(), 1);
        service.wait_for_indexing(-1).unwrap();
        let hits = service.search("t", "*:*", 0, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "after");
    } else {
        assert!(service.put(vec![record("t", "after", "open")]).unwrap_err().is_table_not_available());
    }
}

#[test]
fn test_concurrent_create_and_drop_keep_catalog_and_store_in_step() {
    let store = Arc::new(SlowDropStore { inner: InMemoryRecordStore::new(4), delay: Duration::from_millis(2) });
    let config = Config { index_shards: 2, ..Config::default() };
    let service = Arc::new(AnalyticsDataService::open_with_store(config, store).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    if worker % 2 == 0 {
                        service.create_table("t").unwrap();
                    } else {
                        service.delete_table("t").unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    service.create_table("t").unwrap();
    service.put(vec![record("t", "r1", "open")]).unwrap();
    assert_eq!(service.get_record_count("t", TIME_MIN, TIME_MAX).unwrap(), 1);
}
