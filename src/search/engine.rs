use std::sync::Arc;
use rayon::prelude::*;
use tracing::debug;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::catalog::catalog::TableCatalog;
use crate::core::error::Result;
use crate::core::types::normalize_table_name;
use crate::index::table_index::TableIndex;
use crate::index::segment::TableSegment;
use crate::query::cache::{CacheStats, QueryCache, QueryKey};
use crate::query::optimizer::QueryOptimizer;
use crate::query::parser::QueryParser;
use crate::query::planner::{LogicalPlan, QueryPlanner};
use crate::reader::index_reader::IndexReader;
use crate::search::executor::{QueryExecutor, Scored};
use crate::search::results::{SearchResultEntry, TopKCollector};

/// A query planned against one table's index
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub table: String,
    pub query: String,
    pub index: Arc<TableIndex>,
    /// Table incarnation and schema version the plan was built against
    pub epoch: u64,
    pub schema_version: u64,
    pub plan: LogicalPlan,
    /// Canonical form of any added filters, part of the cache key
    pub scope: String,
}

impl PreparedQuery {
    /// Adds match constraints that leave scores unchanged
    pub fn restrict(mut self, filters: Vec<LogicalPlan>, scope: String) -> Self {
        if filters.is_empty() {
            return self;
        }
        let mut must = vec![self.plan];
        must.extend(filters);
        self.plan = LogicalPlan::all_of(must);
        self.scope = scope;
        self
    }
}

/// Ranked search and counting over the per-shard segments of a table
pub struct SearchEngine {
    catalog: Arc<TableCatalog>,
    analyzers: Arc<AnalyzerRegistry>,
    parser: QueryParser,
    optimizer: QueryOptimizer,
    executor: QueryExecutor,
    cache: QueryCache,
}

impl SearchEngine {
    pub fn new(
        catalog: Arc<TableCatalog>,
        analyzers: Arc<AnalyzerRegistry>,
        cache_size: usize,
    ) -> Self {
        SearchEngine {
            catalog,
            analyzers,
            parser: QueryParser::new(),
            optimizer: QueryOptimizer::new(),
            executor: QueryExecutor::new(),
            cache: QueryCache::new(cache_size),
        }
    }

    /// Parses and plans `query`. `None` means the table does not exist.
    pub fn prepare(&self, table: &str, query: &str) -> Result<Option<PreparedQuery>> {
        // Syntax errors surface even for tables without index data
        let parsed = self.parser.parse(query)?;

        let table = normalize_table_name(table);
        let Some(entry) = self.catalog.get(&table) else {
            return Ok(None);
        };
        let (schema, schema_version) = entry.versioned_schema();
        let plan = QueryPlanner::new(&schema, &self.analyzers).plan(&parsed)?;
        let plan = self.optimizer.optimize(plan);
        debug!(table = %table, plan = ?plan, "planned query");

        Ok(Some(PreparedQuery {
            table,
            query: query.to_string(),
            index: entry.index.clone(),
            epoch: entry.epoch,
            schema_version,
            plan,
            scope: String::new(),
        }))
    }

    pub fn search(&self, table: &str, query: &str, start: usize, count: usize) -> Result<Vec<SearchResultEntry>> {
        match self.prepare(table, query)? {
            Some(prepared) => self.ranked(&prepared, start, count),
            None => Ok(Vec::new()),
        }
    }

    pub fn search_count(&self, table: &str, query: &str) -> Result<u64> {
        match self.prepare(table, query)? {
            Some(prepared) => self.count(&prepared),
            None => Ok(0),
        }
    }

    /// Window `[start, start + count)` of the ranking, score descending then id
    pub fn ranked(&self, prepared: &PreparedQuery, start: usize, count: usize) -> Result<Vec<SearchResultEntry>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let reader = IndexReader::open(&prepared.index);
        let key = QueryKey {
            table: prepared.table.clone(),
            query: prepared.query.clone(),
            scope: prepared.scope.clone(),
            epoch: prepared.epoch,
            schema_version: prepared.schema_version,
            start,
            count,
            generation: reader.generation(),
        };
        if let Some(results) = self.cache.get(&key) {
            return Ok(results);
        }

        // Each segment contributes its own best k, which contains the global best k
        let k = start.saturating_add(count);
        let per_segment = reader.segments()
            .par_iter()
            .map(|segment| self.executor.top_k(&reader, segment, &prepared.plan, k))
            .collect::<Result<Vec<_>>>()?;

        let mut collector = TopKCollector::new(k);
        for entry in per_segment.into_iter().flatten() {
            collector.collect(entry);
        }
        let results: Vec<SearchResultEntry> = collector.get_results().into_iter().skip(start).collect();

        self.cache.put(key, results.clone());
        Ok(results)
    }

    /// Number of matches, same predicate as [`ranked`](Self::ranked)
    pub fn count(&self, prepared: &PreparedQuery) -> Result<u64> {
        let counts = self.scan(prepared, false, |_, scored| Ok(scored.docs.len()))?;
        Ok(counts.into_iter().sum())
    }

    /// Evaluates the plan on every segment in parallel and maps each result
    pub fn scan<T, F>(&self, prepared: &PreparedQuery, want_scores: bool, map: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&TableSegment, Scored) -> Result<T> + Sync,
    {
        let reader = IndexReader::open(&prepared.index);
        reader.segments()
            .par_iter()
            .map(|segment| {
                let scored = self.executor.evaluate(&reader, segment, &prepared.plan, want_scores)?;
                map(&**segment, scored)
            })
            .collect()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
