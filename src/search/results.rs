use std::collections::BinaryHeap;
use std::cmp::Ordering;
use serde::{Serialize, Deserialize};

/// Record id with relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultEntry {
    pub id: String,
    pub score: f32,
}

impl SearchResultEntry {
    pub fn new(id: &str, score: f32) -> Self {
        SearchResultEntry { id: id.to_string(), score }
    }
}

/// Result order: score descending, then id ascending so pages are stable
pub fn rank_order(a: &SearchResultEntry, b: &SearchResultEntry) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

// Heap entry where "greater" means "ranks later", so the heap top is the
// weakest entry kept
struct Ranked(SearchResultEntry);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_order(&self.0, &other.0)
    }
}

/// Top-K collector for efficient result collection
pub struct TopKCollector {
    heap: BinaryHeap<Ranked>,
    pub k: usize,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
            k,
        }
    }

    pub fn collect(&mut self, entry: SearchResultEntry) {
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(Ranked(entry));
            return;
        }

        let entry = Ranked(entry);
        if let Some(weakest) = self.heap.peek() {
            if entry < *weakest {
                self.heap.pop();
                self.heap.push(entry);
            }
        }
    }

    /// Best first
    pub fn get_results(self) -> Vec<SearchResultEntry> {
        self.heap.into_sorted_vec().into_iter().map(|r| r.0).collect()
    }
}
