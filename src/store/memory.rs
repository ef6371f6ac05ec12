use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::RwLock;
use crate::core::error::{Error, Result};
use crate::core::types::{Record, TIME_MAX};
use crate::store::record_store::{GroupSelection, RecordGroup, RecordIter, RecordStore};

#[derive(Debug, Default)]
struct Partition {
    by_id: HashMap<String, Record>,
    by_time: BTreeSet<(i64, String)>,
}

impl Partition {
    fn insert(&mut self, record: Record) {
        if let Some(previous) = self.by_id.remove(&record.id) {
            self.by_time.remove(&(previous.timestamp, previous.id));
        }
        self.by_time.insert((record.timestamp, record.id.clone()));
        self.by_id.insert(record.id.clone(), record);
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.by_id.remove(id) {
            Some(record) => {
                self.by_time.remove(&(record.timestamp, record.id));
                true
            }
            None => false,
        }
    }

    fn time_range(&self, from: i64, to: i64) -> impl Iterator<Item = &(i64, String)> + '_ {
        let (from, upper) = if to == TIME_MAX {
            (from, Bound::Unbounded)
        } else {
            // An inverted range collapses to the empty [to, to)
            (from.min(to), Bound::Excluded((to, String::new())))
        };
        self.by_time.range((Bound::Included((from, String::new())), upper))
    }
}

#[derive(Debug)]
struct TableData {
    partitions: Vec<RwLock<Partition>>,
}

impl TableData {
    fn new(partitions: usize) -> Self {
        TableData {
            partitions: (0..partitions).map(|_| RwLock::new(Partition::default())).collect(),
        }
    }

    /// Records of one partition matching a selection, in (timestamp, id) order
    fn load(&self, partition: usize, selection: &GroupSelection) -> Vec<Record> {
        let Some(lock) = self.partitions.get(partition) else {
            return Vec::new();
        };
        let partition = lock.read();
        match selection {
            GroupSelection::TimeRange { from, to, .. } => partition
                .time_range(*from, *to)
                .filter_map(|(_, id)| partition.by_id.get(id).cloned())
                .collect(),
            GroupSelection::Ids(ids) => ids.iter()
                .filter_map(|id| partition.by_id.get(id).cloned())
                .collect(),
        }
    }
}

/// Reference record store: hash-partitioned tables held in memory.
///
/// Pagination can be switched off to exercise callers that must cope with
/// stores unable to honor `recordsFrom`/`recordsCount`.
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<String, Arc<TableData>>>,
    partitions: usize,
    pagination: bool,
    destroyed: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new(partitions: usize) -> Self {
        InMemoryRecordStore {
            tables: RwLock::new(HashMap::new()),
            partitions: partitions.max(1),
            pagination: true,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn with_pagination(mut self, supported: bool) -> Self {
        self.pagination = supported;
        self
    }

    pub fn partition_of(&self, id: &str) -> usize {
        crc32fast::hash(id.as_bytes()) as usize % self.partitions
    }

    fn table(&self, table: &str) -> Result<Arc<TableData>> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::closed());
        }
        self.tables.read()
            .get(table)
            .cloned()
            .ok_or_else(|| Error::table_not_available(table))
    }

    /// Partitions spread round-robin over `groups` groups
    fn split_partitions(&self, hint: usize) -> Vec<Vec<usize>> {
        let groups = hint.clamp(1, self.partitions);
        let mut split = vec![Vec::new(); groups];
        for partition in 0..self.partitions {
            split[partition % groups].push(partition);
        }
        split
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create_table(&self, table: &str) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::closed());
        }
        self.tables.write()
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(TableData::new(self.partitions)));
        Ok(())
    }

    fn delete_table(&self, table: &str) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::closed());
        }
        self.tables.write().remove(table);
        Ok(())
    }

    fn put(&self, table: &str, records: &[Record]) -> Result<()> {
        let data = self.table(table)?;
        for record in records {
            let partition = self.partition_of(&record.id);
            data.partitions[partition].write().insert(record.clone());
        }
        Ok(())
    }

    fn delete_ids(&self, table: &str, ids: &[String]) -> Result<Vec<String>> {
        let data = self.table(table)?;
        Ok(ids.iter()
            .filter(|id| data.partitions[self.partition_of(id)].write().remove(id))
            .cloned()
            .collect())
    }

    fn delete_range(&self, table: &str, from: i64, to: i64) -> Result<Vec<String>> {
        let data = self.table(table)?;
        let mut deleted = Vec::new();
        for lock in &data.partitions {
            let mut partition = lock.write();
            let ids: Vec<String> = partition.time_range(from, to)
                .map(|(_, id)| id.clone())
                .collect();
            for id in &ids {
                partition.remove(id);
            }
            deleted.extend(ids);
        }
        Ok(deleted)
    }

    fn count(&self, table: &str, from: i64, to: i64) -> Result<u64> {
        let data = self.table(table)?;
        Ok(data.partitions.iter()
            .map(|lock| lock.read().time_range(from, to).count() as u64)
            .sum())
    }

    fn partition_count(&self) -> usize {
        self.partitions
    }

    fn is_pagination_supported(&self) -> bool {
        self.pagination
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
        self.table(table)?;
        let windowed = self.pagination && (offset > 0 || count.is_some());

        if windowed {
            // A global window needs global order, so it cannot be split
            return Ok(vec![RecordGroup {
                table: table.to_string(),
                partitions: (0..self.partitions).collect(),
                columns,
                selection: GroupSelection::TimeRange { from, to, offset, count },
            }]);
        }

        Ok(self.split_partitions(partitions_hint)
            .into_iter()
            .map(|partitions| RecordGroup {
                table: table.to_string(),
                partitions,
                columns: columns.clone(),
                selection: GroupSelection::TimeRange { from, to, offset: 0, count: None },
            })
            .collect())
    }

    fn plan_ids(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        ids: &[String],
    ) -> Result<Vec<RecordGroup>> {
        self.table(table)?;
        let mut seen = HashSet::new();
        let unique: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();

        Ok(self.split_partitions(partitions_hint)
            .into_iter()
            .filter_map(|partitions| {
                let owned: Vec<String> = unique.iter()
                    .filter(|id| partitions.contains(&self.partition_of(id)))
                    .map(|id| id.to_string())
                    .collect();
                if owned.is_empty() {
                    return None;
                }
                Some(RecordGroup {
                    table: table.to_string(),
                    partitions,
                    columns: columns.clone(),
                    selection: GroupSelection::Ids(owned),
                })
            })
            .collect())
    }

    fn read_records(&self, group: &RecordGroup) -> Result<RecordIter> {
        let data = self.table(&group.table)?;

        if let GroupSelection::TimeRange { offset, count, .. } = group.selection {
            if offset > 0 || count.is_some() {
                let mut window: Vec<Record> = group.partitions.iter()
                    .flat_map(|&p| data.load(p, &group.selection))
                    .collect();
                window.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
                let window = window.into_iter()
                    .skip(offset as usize)
                    .take(count.map(|c| c as usize).unwrap_or(usize::MAX));
                let columns = group.columns.clone();
                return Ok(Box::new(window.map(move |r| r.project(columns.as_deref()))));
            }
        }

        Ok(Box::new(PartitionScan {
            data,
            pending: group.partitions.iter().copied().collect(),
            current: Vec::new().into_iter(),
            selection: group.selection.clone(),
            columns: group.columns.clone(),
        }))
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.tables.write().clear();
    }
}

/// Reads a group one partition at a time
struct PartitionScan {
    data: Arc<TableData>,
    pending: VecDeque<usize>,
    current: std::vec::IntoIter<Record>,
    selection: GroupSelection,
    columns: Option<Vec<String>>,
}

impl Iterator for PartitionScan {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(record.project(self.columns.as_deref()));
            }
            let partition = self.pending.pop_front()?;
            self.current = self.data.load(partition, &self.selection).into_iter();
        }
    }
}
