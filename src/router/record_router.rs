use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use crate::catalog::catalog::{TableCatalog, TableEntry};
use crate::core::error::Result;
use crate::core::types::{normalize_table_name, Record};
use crate::router::id::resolve_id;
use crate::store::record_store::{RecordGroup, RecordIter, RecordStore};
use crate::writer::pipeline::IndexingPipeline;

/// Write and direct-read path: store first, then index asynchronously.
pub struct RecordRouter {
    catalog: Arc<TableCatalog>,
    store: Arc<dyn RecordStore>,
    pipeline: Arc<IndexingPipeline>,
}

impl RecordRouter {
    pub fn new(catalog: Arc<TableCatalog>, store: Arc<dyn RecordStore>, pipeline: Arc<IndexingPipeline>) -> Self {
        RecordRouter { catalog, store, pipeline }
    }

    /// Stores and enqueues records, returning their resolved ids in input order.
    ///
    /// Every target table is checked before anything is written. A store
    /// failure aborts the rest of the batch; tables already written stay
    /// written, since the store is not transactional across tables.
    pub fn put(&self, records: Vec<Record>) -> Result<Vec<String>> {
        let total = records.len();
        let mut order: Vec<String> = Vec::new();
        let mut by_table: HashMap<String, Vec<(usize, Record)>> = HashMap::new();
        for (position, record) in records.into_iter().enumerate() {
            let table = normalize_table_name(&record.table);
            by_table.entry(table.clone())
                .or_insert_with(|| {
                    order.push(table);
                    Vec::new()
                })
                .push((position, record));
        }

        let entries: Vec<Arc<TableEntry>> = order.iter()
            .map(|table| self.catalog.require(table))
            .collect::<Result<_>>()?;

        let mut ids = vec![String::new(); total];
        for entry in entries {
            let Some(batch) = by_table.remove(&entry.name) else {
                continue;
            };
            let _guard = entry.lock_writes();
            entry.ensure_live()?;
            let schema = entry.schema();

            let mut resolved = Vec::with_capacity(batch.len());
            for (position, mut record) in batch {
                record.id = resolve_id(&record, &schema)?;
                record.table = entry.name.clone();
                ids[position] = record.id.clone();
                resolved.push(record);
            }

            self.store.put(&entry.name, &resolved)?;
            debug!(table = %entry.name, records = resolved.len(), "stored records");
            self.pipeline.enqueue_upserts(&entry, resolved)?;
        }
        Ok(ids)
    }

    pub fn get_range(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        from: i64,
        to: i64,
        records_from: u64,
        records_count: Option<u64>,
    ) -> Result<Vec<RecordGroup>> {
        let entry = self.catalog.require(table)?;
        self.store.plan_range(&entry.name, partitions_hint, columns, from, to, records_from, records_count)
    }

    pub fn get_ids(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        ids: &[String],
    ) -> Result<Vec<RecordGroup>> {
        let entry = self.catalog.require(table)?;
        self.store.plan_ids(&entry.name, partitions_hint, columns, ids)
    }

    pub fn read_records(&self, group: &RecordGroup) -> Result<RecordIter> {
        self.store.read_records(group)
    }

    pub fn is_pagination_supported(&self) -> bool {
        self.store.is_pagination_supported()
    }

    pub fn count(&self, table: &str, from: i64, to: i64) -> Result<u64> {
        let entry = self.catalog.require(table)?;
        self.store.count(&entry.name, from, to)
    }

    pub fn delete_range(&self, table: &str, from: i64, to: i64) -> Result<()> {
        let entry = self.catalog.require(table)?;
        let _guard = entry.lock_writes();
        entry.ensure_live()?;
        let deleted = self.store.delete_range(&entry.name, from, to)?;
        debug!(table = %entry.name, from, to, deleted = deleted.len(), "deleted time range");
        self.pipeline.enqueue_tombstones(&entry, &deleted)
    }

    pub fn delete_ids(&self, table: &str, ids: &[String]) -> Result<()> {
        let entry = self.catalog.require(table)?;
        let _guard = entry.lock_writes();
        entry.ensure_live()?;
        let deleted = self.store.delete_ids(&entry.name, ids)?;
        debug!(table = %entry.name, requested = ids.len(), deleted = deleted.len(), "deleted records");
        self.pipeline.enqueue_tombstones(&entry, &deleted)
    }
}
