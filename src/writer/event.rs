use std::sync::Arc;
use crate::catalog::catalog::TableEntry;
use crate::core::types::Record;

/// Index work item, applied by the shard worker that owns the id
#[derive(Debug, Clone)]
pub enum IndexOperation {
    Upsert(Record),
    Tombstone(String),
    /// Drop the table's index state. Broadcast to every shard and applied in
    /// each shard's queue order, so earlier events cannot resurrect cleared state.
    Clear,
}

/// Events target the table incarnation they were issued for. Once that
/// incarnation is dropped they only touch its detached index.
#[derive(Debug, Clone)]
pub struct IndexEvent {
    pub entry: Arc<TableEntry>,
    pub operation: IndexOperation,
}

impl IndexEvent {
    pub fn upsert(entry: &Arc<TableEntry>, record: Record) -> Self {
        IndexEvent { entry: entry.clone(), operation: IndexOperation::Upsert(record) }
    }

    pub fn tombstone(entry: &Arc<TableEntry>, id: &str) -> Self {
        IndexEvent { entry: entry.clone(), operation: IndexOperation::Tombstone(id.to_string()) }
    }

    pub fn clear(entry: &Arc<TableEntry>) -> Self {
        IndexEvent { entry: entry.clone(), operation: IndexOperation::Clear }
    }

    pub fn table(&self) -> &str {
        &self.entry.name
    }

    pub fn record_id(&self) -> Option<&str> {
        match &self.operation {
            IndexOperation::Upsert(record) => Some(record.id.as_str()),
            IndexOperation::Tombstone(id) => Some(id.as_str()),
            IndexOperation::Clear => None,
        }
    }
}

pub(crate) enum ShardMessage {
    Event(IndexEvent),
    Shutdown,
}

/// Every event for one (table, id) lands on the same shard, which keeps
/// per-id updates in enqueue order.
pub fn shard_for(table: &str, id: &str, shards: usize) -> usize {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(table.as_bytes());
    hasher.update(&[0]);
    hasher.update(id.as_bytes());
    hasher.finalize() as usize % shards.max(1)
}
