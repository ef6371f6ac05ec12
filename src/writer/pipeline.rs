use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{debug, warn};
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::catalog::catalog::TableEntry;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{IndexingStats, IndexingStatsSnapshot};
use crate::core::types::Record;
use crate::index::document::IndexedRecord;
use crate::index::segment::TableSegment;
use crate::parallel::indexer::ParallelIndexer;
use crate::writer::barrier::IndexingBarrier;
use crate::writer::event::{shard_for, IndexEvent, IndexOperation, ShardMessage};

/// State shared by every shard worker
struct PipelineContext {
    analyzers: Arc<AnalyzerRegistry>,
    barrier: Arc<IndexingBarrier>,
    stats: Arc<IndexingStats>,
    indexer: ParallelIndexer,
    batch_size: usize,
    retry_budget: usize,
}

/// Asynchronous index maintenance.
///
/// Events are routed to one of `index_shards` bounded queues by (table, id);
/// each queue is drained by a dedicated worker that is the only writer of its
/// shard segment in every table. A full queue blocks the caller.
pub struct IndexingPipeline {
    senders: Vec<Sender<ShardMessage>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    barrier: Arc<IndexingBarrier>,
    stats: Arc<IndexingStats>,
    closed: AtomicBool,
}

impl IndexingPipeline {
    /// Worker `i` owns segment `i` of every table index, so `config.index_shards`
    /// must match the shard count the catalog allocates.
    pub fn start(config: &Config, analyzers: Arc<AnalyzerRegistry>) -> Result<Self> {
        let shards = config.index_shards.max(1);
        let barrier = Arc::new(IndexingBarrier::new(shards));
        let stats = Arc::new(IndexingStats::default());
        let context = Arc::new(PipelineContext {
            analyzers,
            barrier: barrier.clone(),
            stats: stats.clone(),
            indexer: ParallelIndexer::new(config.parallel_analysis_threshold),
            batch_size: config.index_batch_size.max(1),
            retry_budget: config.index_retry_budget.max(1),
        });

        let mut senders = Vec::with_capacity(shards);
        let mut workers = Vec::with_capacity(shards);
        for shard in 0..shards {
            let (sender, receiver) = bounded(config.index_queue_capacity.max(1));
            let worker = ShardWorker { shard, receiver, context: context.clone() };
            let handle = thread::Builder::new()
                .name(format!("index-shard-{}", shard))
                .spawn(move || worker.run())?;
            senders.push(sender);
            workers.push(handle);
        }

        Ok(IndexingPipeline {
            senders,
            workers: Mutex::new(workers),
            barrier,
            stats,
            closed: AtomicBool::new(false),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.senders.len()
    }

    pub fn enqueue_upserts(&self, entry: &Arc<TableEntry>, records: Vec<Record>) -> Result<()> {
        for record in records {
            let shard = shard_for(&entry.name, &record.id, self.shard_count());
            self.send(shard, IndexEvent::upsert(entry, record))?;
        }
        Ok(())
    }

    pub fn enqueue_tombstones(&self, entry: &Arc<TableEntry>, ids: &[String]) -> Result<()> {
        for id in ids {
            let shard = shard_for(&entry.name, id, self.shard_count());
            self.send(shard, IndexEvent::tombstone(entry, id))?;
        }
        Ok(())
    }

    /// Queued on every shard so that it takes effect after all earlier events
    pub fn enqueue_clear(&self, entry: &Arc<TableEntry>) -> Result<()> {
        for shard in 0..self.shard_count() {
            self.send(shard, IndexEvent::clear(entry))?;
        }
        Ok(())
    }

    fn send(&self, shard: usize, event: IndexEvent) -> Result<()> {
        if self.is_closed() {
            return Err(Error::closed());
        }
        self.barrier.register(shard);
        if self.senders[shard].send(ShardMessage::Event(event)).is_err() {
            self.barrier.complete(shard, 1);
            return Err(Error::closed());
        }
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Waits for every event enqueued before the call. `None` waits without bound.
    pub fn wait_for_indexing(&self, max_wait: Option<Duration>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::closed());
        }
        debug!(pending = self.barrier.pending(), ?max_wait, "waiting for indexing");
        self.barrier.wait(max_wait)
    }

    pub fn pending(&self) -> u64 {
        self.barrier.pending()
    }

    pub fn stats(&self) -> IndexingStatsSnapshot {
        self.stats.snapshot(self.barrier.pending())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Processes what is already queued, then stops the workers
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for sender in &self.senders {
            let _ = sender.send(ShardMessage::Shutdown);
        }
        for handle in self.workers.lock().drain(..) {
            if handle.join().is_err() {
                warn!("index worker exited with a panic");
            }
        }
    }
}

impl Drop for IndexingPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ShardWorker {
    shard: usize,
    receiver: Receiver<ShardMessage>,
    context: Arc<PipelineContext>,
}

impl ShardWorker {
    fn run(self) {
        let mut batch = Vec::with_capacity(self.context.batch_size);
        loop {
            let mut shutdown = false;
            match self.receiver.recv() {
                Ok(ShardMessage::Event(event)) => batch.push(event),
                Ok(ShardMessage::Shutdown) | Err(_) => break,
            }
            while batch.len() < self.context.batch_size {
                match self.receiver.try_recv() {
                    Ok(ShardMessage::Event(event)) => batch.push(event),
                    Ok(ShardMessage::Shutdown) => {
                        shutdown = true;
                        break;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            self.process(std::mem::take(&mut batch));
            if shutdown {
                break;
            }
        }
        self.release_stragglers();
    }

    /// Events that raced a shutdown are not applied, but must not hold up waiters
    fn release_stragglers(&self) {
        let mut skipped = 0;
        while let Ok(message) = self.receiver.try_recv() {
            if let ShardMessage::Event(_) = message {
                skipped += 1;
            }
        }
        self.context.barrier.complete(self.shard, skipped);
    }

    fn process(&self, events: Vec<IndexEvent>) {
        let ctx = &self.context;
        let analyzed = ctx.indexer.analyze_batch(&events, &ctx.analyzers);
        let count = events.len() as u64;

        for (event, analysis) in events.iter().zip(analyzed) {
            self.apply_with_retry(event, analysis);
        }

        ctx.stats.processed.fetch_add(count, Ordering::Relaxed);
        ctx.stats.batches.fetch_add(1, Ordering::Relaxed);
        ctx.barrier.complete(self.shard, count);
    }

    fn apply_with_retry(&self, event: &IndexEvent, mut analysis: Option<Result<IndexedRecord>>) {
        let ctx = &self.context;
        let mut attempt = 1;
        loop {
            let result = self.apply(event, analysis.take());
            let err = match result {
                Ok(()) => return,
                Err(err) => err,
            };

            // Analysis errors are properties of the record and will not go away
            if err.kind != ErrorKind::IndexError && attempt < ctx.retry_budget {
                ctx.stats.retried.fetch_add(1, Ordering::Relaxed);
                debug!(table = %event.table(), id = ?event.record_id(), attempt, error = %err, "retrying index event");
                attempt += 1;
                continue;
            }

            warn!(
                table = %event.table(),
                id = ?event.record_id(),
                attempts = attempt,
                error = %err,
                "dropping index event"
            );
            ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
            if let IndexOperation::Upsert(record) = &event.operation {
                // The stored record changed, so the previous version must not stay searchable
                let _ = self.with_segment(event, |segment| {
                    segment.delete(&record.id);
                });
            }
            return;
        }
    }

    fn apply(&self, event: &IndexEvent, analysis: Option<Result<IndexedRecord>>) -> Result<()> {
        let ctx = &self.context;
        match &event.operation {
            IndexOperation::Upsert(record) => {
                let indexed = match analysis {
                    Some(analyzed) => analyzed?,
                    None => ctx.indexer.analyze_one(&event.entry, record, &ctx.analyzers)?,
                };
                self.with_segment(event, |segment| segment.upsert(&indexed))
            }
            IndexOperation::Tombstone(id) => {
                self.with_segment(event, |segment| {
                    segment.delete(id);
                })
            }
            IndexOperation::Clear => {
                self.with_segment(event, |segment| segment.clear())
            }
        }
    }

    /// Runs a mutation on this worker's segment of the event's table and publishes it
    fn with_segment<F>(&self, event: &IndexEvent, mutation: F) -> Result<()>
    where
        F: FnOnce(&mut TableSegment),
    {
        event.entry.index
            .update(self.shard, |segment| panic::catch_unwind(AssertUnwindSafe(|| mutation(segment))))
            .map_err(|_| Error::new(ErrorKind::Internal, format!("index update on '{}' panicked", event.table())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::catalog::catalog::TableCatalog;
    use crate::core::types::RecordValue;
    use crate::index::inverted::Term;
    use crate::schema::schema::{AnalyticsSchema, ColumnType};

    struct Fixture {
        catalog: Arc<TableCatalog>,
        table: Arc<TableEntry>,
        pipeline: IndexingPipeline,
    }

    fn fixture(shards: usize) -> Fixture {
        let config = Config { index_shards: shards, ..Config::default() };
        let catalog = Arc::new(TableCatalog::new(shards));
        catalog.create("t");
        let table = catalog.require("t").unwrap();
        let pipeline = IndexingPipeline::start(&config, Arc::new(AnalyzerRegistry::default())).unwrap();
        Fixture { catalog, table, pipeline }
    }

    fn record(id: &str, city: &str) -> Record {
        let mut values = HashMap::new();
        values.insert("city".to_string(), RecordValue::from(city));
        Record::with_id(id, "t", values)
    }

    fn has_term(table: &TableEntry, field: &str, text: &str) -> bool {
        table.index.snapshots().iter().any(|s| s.inverted.search_term(&Term::new(field, text)).is_some())
    }

    #[test]
    fn test_barrier_makes_upserts_visible() {
        let f = fixture(4);
        let records: Vec<Record> = (0..100).map(|i| record(&format!("r{}", i), "ny")).collect();
        f.pipeline.enqueue_upserts(&f.table, records).unwrap();
        f.pipeline.wait_for_indexing(None).unwrap();

        assert_eq!(f.table.index.doc_count(), 100);
        assert_eq!(f.pipeline.stats().processed, 100);
        assert_eq!(f.pipeline.pending(), 0);
    }

    #[test]
    fn test_tombstone_after_upsert_applies_in_order() {
        let f = fixture(2);
        f.pipeline.enqueue_upserts(&f.table, vec![record("r1", "ny")]).unwrap();
        f.pipeline.enqueue_tombstones(&f.table, &["r1".to_string()]).unwrap();
        f.pipeline.enqueue_upserts(&f.table, vec![record("r2", "la")]).unwrap();
        f.pipeline.wait_for_indexing(Some(Duration::from_secs(5))).unwrap();

        assert!(!has_term(&f.table, "city", "ny"));
        assert!(has_term(&f.table, "city", "la"));
    }

    #[test]
    fn test_clear_is_ordered_with_queued_events() {
        let f = fixture(3);
        f.pipeline.enqueue_upserts(&f.table, (0..20).map(|i| record(&format!("a{}", i), "ny")).collect()).unwrap();
        f.pipeline.enqueue_clear(&f.table).unwrap();
        f.pipeline.enqueue_upserts(&f.table, vec![record("b1", "la")]).unwrap();
        f.pipeline.wait_for_indexing(None).unwrap();

        assert_eq!(f.table.index.doc_count(), 1);
        assert!(!has_term(&f.table, "city", "ny"));
    }

    #[test]
    fn test_events_of_dropped_table_stay_detached() {
        let f = fixture(2);
        f.pipeline.enqueue_upserts(&f.table, (0..10).map(|i| record(&format!("old{}", i), "ny")).collect()).unwrap();
        {
            let _guard = f.table.lock_writes();
            f.catalog.remove(&f.table);
        }
        f.catalog.create("t");
        let fresh = f.catalog.require("t").unwrap();
        f.pipeline.enqueue_upserts(&fresh, vec![record("new", "la")]).unwrap();
        f.pipeline.wait_for_indexing(None).unwrap();

        assert_eq!(fresh.index.doc_count(), 1);
        assert!(!has_term(&fresh, "city", "ny"));
        assert_eq!(f.table.index.doc_count(), 10);
    }

    #[test]
    fn test_poisoned_event_does_not_stall_queue() {
        let f = fixture(1);
        f.catalog.set_schema("t", AnalyticsSchema::new().add_column("amount", ColumnType::Long, true)).unwrap();

        let mut bad = record("bad", "ny");
        bad.add_value("amount", RecordValue::from("not a number"));
        f.pipeline.enqueue_upserts(&f.table, vec![bad, record("good", "la")]).unwrap();
        f.pipeline.wait_for_indexing(Some(Duration::from_secs(5))).unwrap();

        let stats = f.pipeline.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processed, 2);
        assert!(has_term(&f.table, "city", "la"));
        assert!(!f.table.index.snapshots()[0].contains("bad"));
    }

    #[test]
    fn test_shutdown_rejects_new_work() {
        let f = fixture(2);
        f.pipeline.enqueue_upserts(&f.table, vec![record("r1", "ny")]).unwrap();
        f.pipeline.shutdown();

        assert_eq!(f.table.index.doc_count(), 1);
        let err = f.pipeline.enqueue_upserts(&f.table, vec![record("r2", "ny")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Closed);
        assert_eq!(f.pipeline.wait_for_indexing(None).unwrap_err().kind, ErrorKind::Closed);
    }
}
