use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::catalog::catalog::TableCatalog;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::stats::ServiceStats;
use crate::core::types::{normalize_table_name, Record};
use crate::drilldown::aggregator::DrillDownAggregator;
use crate::drilldown::request::{
    AnalyticsDrillDownRange, AnalyticsDrillDownRequest, CategoryDrillDownRequest, SubCategories,
};
use crate::reader::record_reader::AnalyticsRecordReader;
use crate::router::record_router::RecordRouter;
use crate::schema::schema::AnalyticsSchema;
use crate::search::engine::SearchEngine;
use crate::search::results::SearchResultEntry;
use crate::store::memory::InMemoryRecordStore;
use crate::store::record_store::{RecordGroup, RecordIter, RecordStore};
use crate::writer::pipeline::IndexingPipeline;

/// Multi-tenant analytics data service: record storage, asynchronous
/// indexing, search and drilldown over named tables.
///
/// Writes are durable in the record store when `put`/`delete` return; search
/// and drilldown see them once the indexing pipeline has applied them, which
/// [`wait_for_indexing`](Self::wait_for_indexing) makes observable.
pub struct AnalyticsDataService {
    config: Config,
    catalog: Arc<TableCatalog>,
    store: Arc<dyn RecordStore>,
    pipeline: Arc<IndexingPipeline>,
    router: RecordRouter,
    engine: Arc<SearchEngine>,
    drilldown: DrillDownAggregator,
    destroyed: AtomicBool,
}

impl AnalyticsDataService {
    /// Service over an in-memory record store
    pub fn open(config: Config) -> Result<Self> {
        let store = Arc::new(InMemoryRecordStore::new(config.store_partitions));
        Self::open_with_store(config, store)
    }

    pub fn open_with_store(config: Config, store: Arc<dyn RecordStore>) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(TableCatalog::new(config.index_shards));
        let analyzers = Arc::new(AnalyzerRegistry::new(&config.default_analyzer));
        let pipeline = Arc::new(IndexingPipeline::start(&config, analyzers.clone())?);
        let router = RecordRouter::new(catalog.clone(), store.clone(), pipeline.clone());
        let engine = Arc::new(SearchEngine::new(catalog.clone(), analyzers, config.query_cache_size));
        let drilldown = DrillDownAggregator::new(engine.clone(), catalog.clone());

        info!(shards = config.index_shards, partitions = store.partition_count(), "analytics data service started");
        Ok(AnalyticsDataService {
            config,
            catalog,
            store,
            pipeline,
            router,
            engine,
            drilldown,
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ensure_open(&self) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::closed());
        }
        Ok(())
    }

    // Tables

    /// Idempotent
    pub fn create_table(&self, table: &str) -> Result<()> {
        self.ensure_open()?;
        let name = normalize_table_name(table);
        let _name_guard = self.catalog.lock_name(&name);
        self.store.create_table(&name)?;
        if self.catalog.create(&name) {
            info!(table = %name, "created table");
        }
        Ok(())
    }

    pub fn set_table_schema(&self, table: &str, schema: AnalyticsSchema) -> Result<()> {
        self.ensure_open()?;
        self.catalog.set_schema(table, schema)?;
        self.engine.clear_cache();
        debug!(table = %normalize_table_name(table), "schema replaced");
        Ok(())
    }

    pub fn get_table_schema(&self, table: &str) -> Result<AnalyticsSchema> {
        self.ensure_open()?;
        self.catalog.schema(table)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.catalog.exists(table))
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.catalog.list())
    }

    /// Idempotent. Records go at once. The dropped table's index is detached
    /// with its catalog entry, so a table recreated under the same name starts
    /// with an empty index even while old events are still queued.
    pub fn delete_table(&self, table: &str) -> Result<()> {
        self.ensure_open()?;
        let _name_guard = self.catalog.lock_name(table);
        let Some(entry) = self.catalog.get(table) else {
            return Ok(());
        };
        let _guard = entry.lock_writes();
        if entry.is_dropped() {
            return Ok(());
        }
        self.store.delete_table(&entry.name)?;
        self.catalog.remove(&entry);
        self.engine.clear_cache();
        info!(table = %entry.name, "deleted table");
        Ok(())
    }

    // Records

    pub fn get_record_count(&self, table: &str, time_from: i64, time_to: i64) -> Result<u64> {
        self.ensure_open()?;
        self.router.count(table, time_from, time_to)
    }

    /// Stores the records and schedules their indexing. Returns the resolved
    /// ids in input order.
    pub fn put(&self, records: Vec<Record>) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.router.put(records)
    }

    pub fn delete(&self, table: &str, time_from: i64, time_to: i64) -> Result<()> {
        self.ensure_open()?;
        self.router.delete_range(table, time_from, time_to)
    }

    pub fn delete_ids(&self, table: &str, ids: &[String]) -> Result<()> {
        self.ensure_open()?;
        self.router.delete_ids(table, ids)
    }

    // Search

    pub fn search(&self, table: &str, query: &str, start: usize, count: usize) -> Result<Vec<SearchResultEntry>> {
        self.ensure_open()?;
        self.engine.search(table, query, start, count)
    }

    pub fn search_count(&self, table: &str, query: &str) -> Result<u64> {
        self.ensure_open()?;
        self.engine.search_count(table, query)
    }

    /// Blocks until everything enqueued before the call is indexed.
    /// A negative `max_wait_ms` waits without bound.
    pub fn wait_for_indexing(&self, max_wait_ms: i64) -> Result<()> {
        self.ensure_open()?;
        let max_wait = u64::try_from(max_wait_ms).ok().map(Duration::from_millis);
        self.pipeline.wait_for_indexing(max_wait)
    }

    pub fn drill_down_search(&self, request: &AnalyticsDrillDownRequest) -> Result<Vec<SearchResultEntry>> {
        self.ensure_open()?;
        self.drilldown.drill_down_search(request)
    }

    pub fn drill_down_search_count(&self, request: &AnalyticsDrillDownRequest) -> Result<u64> {
        self.ensure_open()?;
        self.drilldown.drill_down_search_count(request)
    }

    pub fn drill_down_categories(&self, request: &CategoryDrillDownRequest) -> Result<SubCategories> {
        self.ensure_open()?;
        self.drilldown.drill_down_categories(request)
    }

    pub fn drill_down_range_count(&self, request: &AnalyticsDrillDownRequest) -> Result<Vec<AnalyticsDrillDownRange>> {
        self.ensure_open()?;
        self.drilldown.drill_down_range_count(request)
    }

    /// Drops the table's index without touching its records. Processed in
    /// queue order, so earlier in-flight events cannot bring entries back.
    pub fn clear_index_data(&self, table: &str) -> Result<()> {
        self.ensure_open()?;
        let Some(entry) = self.catalog.get(table) else {
            return Ok(());
        };
        let _guard = entry.lock_writes();
        self.pipeline.enqueue_clear(&entry)?;
        self.engine.clear_cache();
        info!(table = %entry.name, "cleared index data");
        Ok(())
    }

    // Lifecycle

    /// Drains and stops the index workers and destroys the store.
    /// Every later call fails with `Closed`.
    pub fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.pipeline.shutdown();
        self.store.destroy();
        self.engine.clear_cache();
        info!("analytics data service destroyed");
        Ok(())
    }

    pub fn stats(&self) -> Result<ServiceStats> {
        self.ensure_open()?;
        let indexed_documents = self.catalog.entries().iter()
            .map(|entry| entry.index.doc_count())
            .sum();
        Ok(ServiceStats {
            table_count: self.catalog.len(),
            indexed_documents,
            index_shards: self.pipeline.shard_count(),
            indexing: self.pipeline.stats(),
            cache_stats: self.engine.cache_stats(),
        })
    }
}

impl AnalyticsRecordReader for AnalyticsDataService {
    fn get_records(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        time_from: i64,
        time_to: i64,
        records_from: u64,
        records_count: Option<u64>,
    ) -> Result<Vec<RecordGroup>> {
        self.ensure_open()?;
        self.router.get_range(table, partitions_hint, columns, time_from, time_to, records_from, records_count)
    }

    fn get_records_by_ids(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        ids: &[String],
    ) -> Result<Vec<RecordGroup>> {
        self.ensure_open()?;
        self.router.get_ids(table, partitions_hint, columns, ids)
    }

    fn read_records(&self, group: &RecordGroup) -> Result<RecordIter> {
        self.ensure_open()?;
        self.router.read_records(group)
    }

    fn get_record_count(&self, table: &str, time_from: i64, time_to: i64) -> Result<u64> {
        AnalyticsDataService::get_record_count(self, table, time_from, time_to)
    }

    fn is_pagination_supported(&self) -> bool {
        self.router.is_pagination_supported()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::core::error::ErrorKind;
    use crate::core::types::{RecordValue, TIME_MAX, TIME_MIN};

    fn service() -> AnalyticsDataService {
        let config = Config { index_shards: 2, ..Config::default() };
        AnalyticsDataService::open(config).unwrap()
    }

    fn record(id: &str, city: &str) -> Record {
        let mut values = HashMap::new();
        values.insert("city".to_string(), RecordValue::from(city));
        Record::with_id(id, "Sales", values)
    }

    #[test]
    fn test_table_names_are_case_insensitive() {
        let service = service();
        service.create_table("Sales").unwrap();
        service.create_table("SALES").unwrap();
        assert!(service.table_exists("sales").unwrap());
        assert_eq!(service.list_tables().unwrap(), vec!["sales".to_string()]);

        let err = service.get_table_schema("missing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TableNotAvailable);
    }

    #[test]
    fn test_delete_table_clears_search() {
        let service = service();
        service.create_table("sales").unwrap();
        service.put(vec![record("r1", "NY")]).unwrap();
        service.wait_for_indexing(-1).unwrap();
        assert_eq!(service.search_count("sales", "city:ny").unwrap(), 1);

        service.delete_table("sales").unwrap();
        service.delete_table("sales").unwrap();
        assert!(!service.table_exists("sales").unwrap());
        assert_eq!(service.search_count("sales", "city:ny").unwrap(), 0);

        service.create_table("sales").unwrap();
        service.wait_for_indexing(-1).unwrap();
        assert_eq!(service.search_count("sales", "*:*").unwrap(), 0);
        assert_eq!(service.get_record_count("sales", TIME_MIN, TIME_MAX).unwrap(), 0);
    }

    #[test]
    fn test_clear_index_keeps_records() {
        let service = service();
        service.create_table("sales").unwrap();
        service.put(vec![record("r1", "NY"), record("r2", "LA")]).unwrap();
        service.clear_index_data("sales").unwrap();
        service.wait_for_indexing(5000).unwrap();

        assert_eq!(service.search_count("sales", "*:*").unwrap(), 0);
        assert_eq!(service.get_record_count("sales", TIME_MIN, TIME_MAX).unwrap(), 2);
        service.clear_index_data("missing").unwrap();
    }

    #[test]
    fn test_destroy_closes_every_operation() {
        let service = service();
        service.create_table("sales").unwrap();
        service.destroy().unwrap();
        service.destroy().unwrap();

        assert_eq!(service.table_exists("sales").unwrap_err().kind, ErrorKind::Closed);
        assert_eq!(service.put(vec![record("r1", "NY")]).unwrap_err().kind, ErrorKind::Closed);
        assert_eq!(service.wait_for_indexing(-1).unwrap_err().kind, ErrorKind::Closed);
        assert_eq!(service.stats().unwrap_err().kind, ErrorKind::Closed);
    }

    #[test]
    fn test_stats_track_indexing() {
        let service = service();
        service.create_table("sales").unwrap();
        service.put(vec![record("r1", "NY"), record("r2", "LA")]).unwrap();
        service.wait_for_indexing(-1).unwrap();

        let stats = service.stats().unwrap();
        assert_eq!(stats.table_count, 1);
        assert_eq!(stats.indexed_documents, 2);
        assert_eq!(stats.indexing.processed, 2);
        assert_eq!(stats.indexing.pending, 0);
    }
}
