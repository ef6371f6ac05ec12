use serde::{Serialize, Deserialize};
use crate::core::error::Result;
use crate::core::types::Record;

/// Which records of a group's partitions are read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupSelection {
    /// Records with `from <= timestamp < to`, then `offset`/`count` applied
    /// over the group's ordered output. `count == None` is unbounded.
    TimeRange {
        from: i64,
        to: i64,
        offset: u64,
        count: Option<u64>,
    },
    /// Point lookups; ids that do not resolve are skipped
    Ids(Vec<String>),
}

/// A partition-scoped, serializable handle over part of a result set.
///
/// The group is a pure descriptor: it carries no pointer into the store and
/// is re-read through [`RecordStore::read_records`], so it can be shipped to
/// another process holding the same store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordGroup {
    pub table: String,
    pub partitions: Vec<usize>,
    /// Projection; `None` returns every column
    pub columns: Option<Vec<String>>,
    pub selection: GroupSelection,
}

impl RecordGroup {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Lazy record sequence of one group, loaded a partition at a time
pub type RecordIter = Box<dyn Iterator<Item = Record> + Send>;

/// Durable keyed storage of records per table.
///
/// Table names reaching the store are already canonical. Implementations must
/// apply `put` as a full replace keyed by record id.
pub trait RecordStore: Send + Sync {
    fn create_table(&self, table: &str) -> Result<()>;

    /// Idempotent
    fn delete_table(&self, table: &str) -> Result<()>;

    fn put(&self, table: &str, records: &[Record]) -> Result<()>;

    /// Removes the given ids and returns those that existed
    fn delete_ids(&self, table: &str, ids: &[String]) -> Result<Vec<String>>;

    /// Removes `[from, to)` and returns the ids removed
    fn delete_range(&self, table: &str, from: i64, to: i64) -> Result<Vec<String>>;

    fn count(&self, table: &str, from: i64, to: i64) -> Result<u64>;

    fn partition_count(&self) -> usize;

    fn is_pagination_supported(&self) -> bool;

    /// Splits a time-range read into groups
    fn plan_range(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        from: i64,
        to: i64,
        offset: u64,
        count: Option<u64>,
    ) -> Result<Vec<RecordGroup>>;

    /// Splits a point lookup into groups
    fn plan_ids(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        ids: &[String],
    ) -> Result<Vec<RecordGroup>>;

    fn read_records(&self, group: &RecordGroup) -> Result<RecordIter>;

    /// Releases all data; later calls fail
    fn destroy(&self);
}
