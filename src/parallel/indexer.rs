use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use rayon::prelude::*;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::catalog::catalog::TableEntry;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Record;
use crate::index::document::{IndexedRecord, RecordIndexer};
use crate::schema::schema::AnalyticsSchema;
use crate::writer::event::{IndexEvent, IndexOperation};

/// Analyzes the upserts of a drained batch before the shard lock is taken.
/// Large batches are tokenized on the rayon pool.
pub struct ParallelIndexer {
    pub threshold: usize,
}

impl ParallelIndexer {
    pub fn new(threshold: usize) -> Self {
        ParallelIndexer { threshold }
    }

    /// One slot per event: `None` for events that carry no record
    pub fn analyze_batch(
        &self,
        events: &[IndexEvent],
        analyzers: &AnalyzerRegistry,
    ) -> Vec<Option<Result<IndexedRecord>>> {
        // One schema read per table incarnation in the batch
        let mut schemas: HashMap<u64, AnalyticsSchema> = HashMap::new();
        let mut upserts = 0;
        for event in events {
            if let IndexOperation::Upsert(_) = event.operation {
                upserts += 1;
                schemas.entry(event.entry.epoch)
                    .or_insert_with(|| event.entry.schema());
            }
        }

        let analyze = |event: &IndexEvent| match &event.operation {
            IndexOperation::Upsert(record) => {
                let schema = &schemas[&event.entry.epoch];
                Some(analyze_record(record, schema, analyzers))
            }
            _ => None,
        };

        if upserts >= self.threshold.max(1) {
            events.par_iter().map(analyze).collect()
        } else {
            events.iter().map(analyze).collect()
        }
    }

    pub fn analyze_one(&self, entry: &TableEntry, record: &Record, analyzers: &AnalyzerRegistry) -> Result<IndexedRecord> {
        analyze_record(record, &entry.schema(), analyzers)
    }
}

fn analyze_record(record: &Record, schema: &AnalyticsSchema, analyzers: &AnalyzerRegistry) -> Result<IndexedRecord> {
    panic::catch_unwind(AssertUnwindSafe(|| RecordIndexer::new(schema, analyzers).index(record)))
        .unwrap_or_else(|_| Err(Error::new(
            ErrorKind::Internal,
            format!("analysis of record '{}' panicked", record.id),
        )))
}
