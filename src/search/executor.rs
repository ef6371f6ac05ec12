use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::core::error::Result;
use crate::index::inverted::Term;
use crate::index::posting::{DocOrdinal, PostingList};
use crate::index::segment::TableSegment;
use crate::query::planner::LogicalPlan;
use crate::reader::index_reader::IndexReader;
use crate::scoring::scorer::{BM25Scorer, Scorer};
use crate::search::results::{SearchResultEntry, TopKCollector};

/// Documents matched in one segment, with scores when requested
#[derive(Debug, Default)]
pub struct Scored {
    pub docs: RoaringBitmap,
    pub scores: HashMap<DocOrdinal, f32>,
}

impl Scored {
    fn constant(docs: RoaringBitmap, boost: f32, want_scores: bool) -> Self {
        let scores = if want_scores {
            docs.iter().map(|doc| (doc, boost)).collect()
        } else {
            HashMap::new()
        };
        Scored { docs, scores }
    }

    pub fn score(&self, doc: DocOrdinal) -> f32 {
        self.scores.get(&doc).copied().unwrap_or(0.0)
    }
}

/// Evaluates optimized plans against segments.
///
/// Term statistics come from the whole reader so scores are comparable
/// across shards.
pub struct QueryExecutor {
    pub scorer: Box<dyn Scorer>,
}

impl QueryExecutor {
    pub fn new() -> Self {
        QueryExecutor {
            scorer: Box::new(BM25Scorer::default()),
        }
    }

    pub fn evaluate(
        &self,
        reader: &IndexReader,
        segment: &TableSegment,
        plan: &LogicalPlan,
        want_scores: bool,
    ) -> Result<Scored> {
        match plan {
            LogicalPlan::MatchAll { boost } => {
                Ok(Scored::constant(segment.live.clone(), *boost, want_scores))
            }
            LogicalPlan::MatchNone => Ok(Scored::default()),
            LogicalPlan::Term { field, term, boost } => {
                Ok(self.execute_term(reader, segment, field, term, *boost, want_scores))
            }
            LogicalPlan::Phrase { field, terms, boost } => {
                Ok(self.execute_phrase(reader, segment, field, terms, *boost, want_scores))
            }
            LogicalPlan::Prefix { field, prefix, boost } => {
                let mut docs = RoaringBitmap::new();
                for (_, list) in segment.inverted.prefix_terms(field, prefix) {
                    docs.extend(list.docs());
                }
                Ok(Scored::constant(docs, *boost, want_scores))
            }
            LogicalPlan::Wildcard { field, pattern, boost } => {
                let mut docs = RoaringBitmap::new();
                for (_, list) in segment.inverted.wildcard_terms(field, pattern)? {
                    docs.extend(list.docs());
                }
                Ok(Scored::constant(docs, *boost, want_scores))
            }
            LogicalPlan::NumericRange { field, lower, upper, boost } => {
                let docs = segment.numeric.range(field, *lower, *upper);
                Ok(Scored::constant(docs, *boost, want_scores))
            }
            LogicalPlan::Facet { field, path, boost } => {
                let docs = segment.facets.docs_under(field, path);
                Ok(Scored::constant(docs, *boost, want_scores))
            }
            LogicalPlan::Bool { must, should, must_not, boost } => {
                self.execute_bool(reader, segment, must, should, must_not, *boost, want_scores)
            }
        }
    }

    /// Best `k` entries of one segment
    pub fn top_k(
        &self,
        reader: &IndexReader,
        segment: &TableSegment,
        plan: &LogicalPlan,
        k: usize,
    ) -> Result<Vec<SearchResultEntry>> {
        let scored = self.evaluate(reader, segment, plan, true)?;
        let mut collector = TopKCollector::new(k);
        for doc in &scored.docs {
            if let Some(id) = segment.id_of(doc) {
                collector.collect(SearchResultEntry::new(id, scored.score(doc)));
            }
        }
        Ok(collector.get_results())
    }

    fn execute_term(
        &self,
        reader: &IndexReader,
        segment: &TableSegment,
        field: &str,
        text: &str,
        boost: f32,
        want_scores: bool,
    ) -> Scored {
        let term = Term::new(field, text);
        let Some(list) = segment.inverted.search_term(&term) else {
            return Scored::default();
        };

        let mut scored = Scored { docs: list.docs().collect(), scores: HashMap::new() };
        if want_scores {
            let term_stats = reader.term_stats(&term);
            let field_stats = reader.field_stats(field);
            for posting in &list.postings {
                let score = self.scorer.score(posting, &term_stats, &field_stats) * boost;
                scored.scores.insert(posting.doc, score);
            }
        }
        scored
    }

    fn execute_phrase(
        &self,
        reader: &IndexReader,
        segment: &TableSegment,
        field: &str,
        terms: &[(String, u32)],
        boost: f32,
        want_scores: bool,
    ) -> Scored {
        if terms.is_empty() {
            return Scored::default();
        }

        let mut lists: Vec<(&PostingList, u32, Term)> = Vec::with_capacity(terms.len());
        for (text, offset) in terms {
            let term = Term::new(field, text);
            match segment.inverted.search_term(&term) {
                Some(list) => lists.push((list, *offset, term)),
                None => return Scored::default(),
            }
        }

        let mut candidates: RoaringBitmap = lists[0].0.docs().collect();
        for (list, _, _) in &lists[1..] {
            candidates &= list.docs().collect::<RoaringBitmap>();
        }

        let mut scored = Scored::default();
        for doc in candidates {
            if !phrase_matches(&lists, doc) {
                continue;
            }
            scored.docs.insert(doc);
        }

        if want_scores {
            let field_stats = reader.field_stats(field);
            let stats: Vec<_> = lists.iter().map(|(_, _, term)| reader.term_stats(term)).collect();
            for doc in &scored.docs {
                let score: f32 = lists.iter().zip(&stats)
                    .filter_map(|((list, _, _), term_stats)| {
                        list.get(doc).map(|posting| self.scorer.score(posting, term_stats, &field_stats))
                    })
                    .sum();
                scored.scores.insert(doc, score * boost);
            }
        }
        scored
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_bool(
        &self,
        reader: &IndexReader,
        segment: &TableSegment,
        must: &[LogicalPlan],
        should: &[LogicalPlan],
        must_not: &[LogicalPlan],
        boost: f32,
        want_scores: bool,
    ) -> Result<Scored> {
        let musts = must.iter()
            .map(|p| self.evaluate(reader, segment, p, want_scores))
            .collect::<Result<Vec<_>>>()?;
        let shoulds = should.iter()
            .map(|p| self.evaluate(reader, segment, p, want_scores))
            .collect::<Result<Vec<_>>>()?;

        // Required clauses decide the match; without them any optional one does
        let mut docs = if let Some((first, rest)) = musts.split_first() {
            let mut docs = first.docs.clone();
            for clause in rest {
                docs &= &clause.docs;
            }
            docs
        } else if !shoulds.is_empty() {
            let mut docs = RoaringBitmap::new();
            for clause in &shoulds {
                docs |= &clause.docs;
            }
            docs
        } else {
            segment.live.clone()
        };

        for plan in must_not {
            if docs.is_empty() {
                break;
            }
            docs -= &self.evaluate(reader, segment, plan, false)?.docs;
        }

        let mut scores = HashMap::new();
        if want_scores {
            let positive = musts.len() + shoulds.len() > 0;
            for doc in &docs {
                let score = if positive {
                    musts.iter().chain(shoulds.iter())
                        .filter(|clause| clause.docs.contains(doc))
                        .map(|clause| clause.score(doc))
                        .sum::<f32>() * boost
                } else {
                    boost
                };
                scores.insert(doc, score);
            }
        }
        Ok(Scored { docs, scores })
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Every term found at its offset from some start position of the first
fn phrase_matches(lists: &[(&PostingList, u32, Term)], doc: DocOrdinal) -> bool {
    let postings: Vec<_> = lists.iter()
        .map(|(list, offset, _)| list.get(doc).map(|p| (p, *offset)))
        .collect();
    let Some(postings) = postings.into_iter().collect::<Option<Vec<_>>>() else {
        return false;
    };

    let (first, first_offset) = postings[0];
    first.positions.iter().any(|&position| {
        let Some(start) = position.checked_sub(first_offset) else {
            return false;
        };
        postings[1..].iter().all(|(posting, offset)| posting.positions.contains(&(start + offset)))
    })
}
