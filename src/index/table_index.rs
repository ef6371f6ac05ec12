use std::sync::Arc;
use parking_lot::RwLock;
use crate::index::segment::TableSegment;

/// A table's index: one segment per pipeline shard.
///
/// Each shard slot holds a published snapshot. Readers clone the `Arc` and
/// evaluate without holding the slot lock; the shard worker copies a snapshot
/// only when a reader still holds it.
#[derive(Debug)]
pub struct TableIndex {
    shards: Vec<RwLock<Arc<TableSegment>>>,
}

impl TableIndex {
    pub fn new(shard_count: usize) -> Self {
        TableIndex {
            shards: (0..shard_count.max(1)).map(|_| RwLock::new(Arc::new(TableSegment::new()))).collect(),
        }
    }

    /// Current published state of every shard
    pub fn snapshots(&self) -> Vec<Arc<TableSegment>> {
        self.shards.iter().map(|slot| slot.read().clone()).collect()
    }

    /// Applies a change to one shard and publishes it with a new generation
    pub fn update<R, F>(&self, shard: usize, mutation: F) -> R
    where
        F: FnOnce(&mut TableSegment) -> R,
    {
        let mut slot = self.shards[shard].write();
        let segment = Arc::make_mut(&mut slot);
        let result = mutation(segment);
        segment.bump_generation();
        result
    }

    pub fn doc_count(&self) -> u64 {
        self.shards.iter().map(|slot| slot.read().doc_count()).sum()
    }
}
