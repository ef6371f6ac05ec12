use std::sync::Arc;
use crate::index::inverted::Term;
use crate::index::segment::TableSegment;
use crate::index::table_index::TableIndex;
use crate::scoring::scorer::{FieldScoringStats, TermStats};

/// Consistent read view over every shard segment of one table.
///
/// Pins the published snapshot of each shard; workers keep applying events
/// to their own copies while the view is alive.
pub struct IndexReader {
    segments: Vec<Arc<TableSegment>>,
}

impl IndexReader {
    pub fn open(index: &TableIndex) -> Self {
        IndexReader { segments: index.snapshots() }
    }

    pub fn segments(&self) -> &[Arc<TableSegment>] {
        &self.segments
    }

    pub fn doc_count(&self) -> u64 {
        self.segments.iter().map(|s| s.doc_count()).sum()
    }

    /// Changes whenever any shard applies an event
    pub fn generation(&self) -> u64 {
        self.segments.iter().map(|s| s.generation()).sum()
    }

    pub fn term_stats(&self, term: &Term) -> TermStats {
        TermStats {
            doc_freq: self.segments.iter()
                .filter_map(|s| s.inverted.search_term(term))
                .map(|list| list.doc_freq() as u64)
                .sum(),
        }
    }

    pub fn field_stats(&self, field: &str) -> FieldScoringStats {
        let (docs, length) = self.segments.iter()
            .map(|s| s.inverted.field_stats(field))
            .fold((0u64, 0u64), |(docs, length), stats| {
                (docs + stats.doc_count, length + stats.total_length)
            });
        FieldScoringStats {
            total_docs: docs,
            avg_field_length: if docs == 0 { 0.0 } else { length as f32 / docs as f32 },
        }
    }
}
