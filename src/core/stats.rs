use std::sync::atomic::{AtomicU64, Ordering};
use serde::{Serialize, Deserialize};
use crate::query::cache::CacheStats;

/// Live counters of the indexing pipeline
#[derive(Debug, Default)]
pub struct IndexingStats {
    pub enqueued: AtomicU64,
    pub processed: AtomicU64,
    pub failed: AtomicU64,
    pub retried: AtomicU64,
    pub batches: AtomicU64,
}

impl IndexingStats {
    pub fn snapshot(&self, pending: u64) -> IndexingStatsSnapshot {
        IndexingStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingStatsSnapshot {
    pub enqueued: u64,
    pub processed: u64,
    /// Events dropped after exhausting the retry budget
    pub failed: u64,
    pub retried: u64,
    pub batches: u64,
    pub pending: u64,
}

/// Service statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub table_count: usize,
    pub indexed_documents: u64,
    pub index_shards: usize,
    pub indexing: IndexingStatsSnapshot,
    pub cache_stats: CacheStats,
}
