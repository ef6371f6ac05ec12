use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use parking_lot::{Mutex, MutexGuard, RwLock};
use crate::core::error::{Error, Result};
use crate::core::types::normalize_table_name;
use crate::index::table_index::TableIndex;
use crate::schema::schema::AnalyticsSchema;

const NAME_LOCK_STRIPES: usize = 64;

#[derive(Debug, Default)]
struct VersionedSchema {
    schema: AnalyticsSchema,
    version: u64,
}

/// Catalog entry for one incarnation of a table.
///
/// The entry owns the table's index, so a dropped and recreated table never
/// shares index state with its predecessor.
#[derive(Debug)]
pub struct TableEntry {
    pub name: String,
    /// Unique per catalog, increases with every create
    pub epoch: u64,
    pub index: Arc<TableIndex>,
    schema: RwLock<VersionedSchema>,
    write_lock: Mutex<()>,
    dropped: AtomicBool,
}

impl TableEntry {
    fn new(name: String, epoch: u64, shard_count: usize) -> Self {
        TableEntry {
            name,
            epoch,
            index: Arc::new(TableIndex::new(shard_count)),
            schema: RwLock::new(VersionedSchema::default()),
            write_lock: Mutex::new(()),
            dropped: AtomicBool::new(false),
        }
    }

    pub fn schema(&self) -> AnalyticsSchema {
        self.schema.read().schema.clone()
    }

    /// Schema together with its version, which changes on every replace
    pub fn versioned_schema(&self) -> (AnalyticsSchema, u64) {
        let current = self.schema.read();
        (current.schema.clone(), current.version)
    }

    /// Serializes writers and the drop of this table.
    ///
    /// Index workers never take this lock, so it may be held while blocking
    /// on a full pipeline queue.
    pub fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    /// Fails with `TableNotAvailable` once the table has been dropped.
    /// Call with the write lock held.
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_dropped() {
            return Err(Error::table_not_available(&self.name));
        }
        Ok(())
    }
}

/// Table existence and schemas, keyed by the lowercased table name
#[derive(Debug)]
pub struct TableCatalog {
    tables: RwLock<HashMap<String, Arc<TableEntry>>>,
    name_locks: Vec<Mutex<()>>,
    next_epoch: AtomicU64,
    shard_count: usize,
}

impl TableCatalog {
    /// `shard_count` segments are allocated for every table's index
    pub fn new(shard_count: usize) -> Self {
        TableCatalog {
            tables: RwLock::new(HashMap::new()),
            name_locks: (0..NAME_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            next_epoch: AtomicU64::new(1),
            shard_count: shard_count.max(1),
        }
    }

    /// Serializes create and drop of one table name, including the record
    /// store calls made on their behalf.
    pub fn lock_name(&self, table: &str) -> MutexGuard<'_, ()> {
        let stripe = crc32fast::hash(normalize_table_name(table).as_bytes()) as usize % self.name_locks.len();
        self.name_locks[stripe].lock()
    }

    /// Idempotent. Returns true when the table did not exist before.
    pub fn create(&self, table: &str) -> bool {
        let name = normalize_table_name(table);
        let mut tables = self.tables.write();
        if tables.contains_key(&name) {
            return false;
        }
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        tables.insert(name.clone(), Arc::new(TableEntry::new(name, epoch, self.shard_count)));
        true
    }

    pub fn exists(&self, table: &str) -> bool {
        self.tables.read().contains_key(&normalize_table_name(table))
    }

    pub fn get(&self, table: &str) -> Option<Arc<TableEntry>> {
        self.tables.read().get(&normalize_table_name(table)).cloned()
    }

    pub fn require(&self, table: &str) -> Result<Arc<TableEntry>> {
        self.get(table)
            .ok_or_else(|| Error::table_not_available(&normalize_table_name(table)))
    }

    pub fn schema(&self, table: &str) -> Result<AnalyticsSchema> {
        Ok(self.require(table)?.schema())
    }

    /// Schema used to index a table's records. A table that is gone indexes
    /// with the empty schema; a pending clear removes the result anyway.
    pub fn schema_or_empty(&self, table: &str) -> AnalyticsSchema {
        self.get(table).map(|entry| entry.schema()).unwrap_or_default()
    }

    /// Overwrites the previous schema, no merge
    pub fn set_schema(&self, table: &str, schema: AnalyticsSchema) -> Result<()> {
        let entry = self.require(table)?;
        let _guard = entry.lock_writes();
        entry.ensure_live()?;
        let mut current = entry.schema.write();
        current.schema = schema;
        current.version += 1;
        Ok(())
    }

    /// Unlinks the entry and marks it dropped so writers still holding it fail.
    /// The caller must hold the entry's write lock.
    pub fn remove(&self, entry: &TableEntry) {
        entry.dropped.store(true, Ordering::Release);
        let mut tables = self.tables.write();
        if let Some(current) = tables.get(&entry.name) {
            if std::ptr::eq(Arc::as_ptr(current), entry) {
                tables.remove(&entry.name);
            }
        }
    }

    pub fn list(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<Arc<TableEntry>> {
        self.tables.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::schema::schema::ColumnType;

    #[test]
    fn test_names_are_case_insensitive() {
        let catalog = TableCatalog::new(1);
        assert!(catalog.create("Sales"));
        assert!(!catalog.create("SALES"));
        assert!(catalog.exists("sales"));
        assert_eq!(catalog.list(), vec!["sales".to_string()]);
    }

    #[test]
    fn test_set_schema_overwrites() {
        let catalog = TableCatalog::new(1);
        catalog.create("t");
        catalog.set_schema("t", AnalyticsSchema::new().add_column("a", ColumnType::Long, true)).unwrap();
        catalog.set_schema("T", AnalyticsSchema::new().add_column("b", ColumnType::String, true)).unwrap();

        let schema = catalog.schema("t").unwrap();
        assert!(schema.column("a").is_none());
        assert!(schema.column("b").is_some());
        assert_eq!(catalog.require("t").unwrap().versioned_schema().1, 2);
    }

    #[test]
    fn test_missing_table_schema_fails() {
        let catalog = TableCatalog::new(1);
        assert_eq!(catalog.schema("nope").unwrap_err().kind, ErrorKind::TableNotAvailable);
        assert_eq!(
            catalog.set_schema("nope", AnalyticsSchema::new()).unwrap_err().kind,
            ErrorKind::TableNotAvailable
        );
        assert!(catalog.schema_or_empty("nope").is_empty());
    }

    #[test]
    fn test_removed_entry_rejects_writers() {
        let catalog = TableCatalog::new(1);
        catalog.create("t");
        let entry = catalog.require("t").unwrap();
        {
            let _guard = entry.lock_writes();
            catalog.remove(&entry);
        }
        assert!(!catalog.exists("t"));
        assert!(entry.ensure_live().unwrap_err().is_table_not_available());

        // A recreated table is a fresh entry
        catalog.create("t");
        let fresh = catalog.require("t").unwrap();
        assert!(fresh.ensure_live().is_ok());
        assert!(fresh.epoch > entry.epoch);
        assert!(!Arc::ptr_eq(&fresh.index, &entry.index));
        catalog.remove(&entry);
        assert!(catalog.exists("t"));
    }
}
