use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use crate::core::error::{Error, ErrorKind, Result};

/// Tracks enqueued versus processed events per shard.
///
/// Shard queues are FIFO, so once a shard has processed as many events as had
/// been registered on it when a waiter arrived, everything that waiter could
/// have observed as written is applied.
pub struct IndexingBarrier {
    enqueued: Vec<AtomicU64>,
    processed: Mutex<Vec<u64>>,
    progress: Condvar,
}

impl IndexingBarrier {
    pub fn new(shards: usize) -> Self {
        IndexingBarrier {
            enqueued: (0..shards).map(|_| AtomicU64::new(0)).collect(),
            processed: Mutex::new(vec![0; shards]),
            progress: Condvar::new(),
        }
    }

    /// Called before the event is handed to the shard queue
    pub fn register(&self, shard: usize) {
        self.enqueued[shard].fetch_add(1, Ordering::SeqCst);
    }

    pub fn complete(&self, shard: usize, events: u64) {
        if events == 0 {
            return;
        }
        let mut processed = self.processed.lock();
        processed[shard] += events;
        self.progress.notify_all();
    }

    pub fn pending(&self) -> u64 {
        let processed = self.processed.lock();
        self.enqueued.iter()
            .zip(processed.iter())
            .map(|(enqueued, done)| enqueued.load(Ordering::SeqCst).saturating_sub(*done))
            .sum()
    }

    /// Blocks until every event registered before this call is processed.
    /// `None` waits without bound.
    pub fn wait(&self, max_wait: Option<Duration>) -> Result<()> {
        let targets: Vec<u64> = self.enqueued.iter()
            .map(|count| count.load(Ordering::SeqCst))
            .collect();
        let deadline = max_wait.map(|wait| Instant::now() + wait);

        let mut processed = self.processed.lock();
        while !reached(&processed, &targets) {
            match deadline {
                None => self.progress.wait(&mut processed),
                Some(deadline) => {
                    if self.progress.wait_until(&mut processed, deadline).timed_out()
                        && !reached(&processed, &targets)
                    {
                        let remaining: u64 = targets.iter()
                            .zip(processed.iter())
                            .map(|(target, done)| target.saturating_sub(*done))
                            .sum();
                        return Err(Error::new(
                            ErrorKind::Timeout,
                            format!("{} index events still pending after {:?}", remaining, max_wait.unwrap_or_default()),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn reached(processed: &[u64], targets: &[u64]) -> bool {
    processed.iter().zip(targets).all(|(done, target)| done >= target)
}
