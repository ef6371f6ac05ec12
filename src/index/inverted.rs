use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use regex::Regex;
use crate::analysis::token::Token;
use crate::core::error::Result;
use crate::index::posting::{DocOrdinal, Posting, PostingList};

/// Term representation: an analyzed token scoped to one field.
/// Ordered by field first so a field's terms form one contiguous range.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: &str, text: &str) -> Self {
        Term {
            field: field.to_string(),
            text: text.to_string(),
        }
    }
}

/// Per-field length statistics used for BM25 normalization
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldStats {
    pub doc_count: u64,
    pub total_length: u64,
}

/// Inverted index structure
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    pub postings: BTreeMap<Term, PostingList>,
    pub field_stats: HashMap<String, FieldStats>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex::default()
    }

    /// Adds one field value's tokens for a document. Returns the distinct terms
    /// written so the caller can remove exactly those later.
    pub fn add_field(&mut self, doc: DocOrdinal, field: &str, tokens: &[Token]) -> Vec<Term> {
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut term_positions: HashMap<&str, Vec<u32>> = HashMap::new();

        // Group tokens by term
        for token in tokens {
            term_positions.entry(token.text.as_str())
                .or_default()
                .push(token.position);
        }

        let field_length = tokens.len() as u32;
        let mut terms = Vec::with_capacity(term_positions.len());

        for (text, positions) in term_positions {
            let term = Term::new(field, text);
            let posting = Posting {
                doc,
                term_freq: positions.len() as u32,
                positions,
                field_length,
            };

            self.postings.entry(term.clone())
                .or_default()
                .add_posting(posting);
            terms.push(term);
        }

        let stats = self.field_stats.entry(field.to_string()).or_default();
        stats.doc_count += 1;
        stats.total_length += field_length as u64;

        terms
    }

    pub fn remove_field(&mut self, doc: DocOrdinal, field: &str, terms: &[Term], field_length: u32) {
        for term in terms {
            if let Some(list) = self.postings.get_mut(term) {
                list.remove(doc);
                if list.is_empty() {
                    self.postings.remove(term);
                }
            }
        }

        if let Some(stats) = self.field_stats.get_mut(field) {
            stats.doc_count = stats.doc_count.saturating_sub(1);
            stats.total_length = stats.total_length.saturating_sub(field_length as u64);
            if stats.doc_count == 0 {
                self.field_stats.remove(field);
            }
        }
    }

    pub fn search_term(&self, term: &Term) -> Option<&PostingList> {
        self.postings.get(term)
    }

    pub fn field_stats(&self, field: &str) -> FieldStats {
        self.field_stats.get(field).copied().unwrap_or_default()
    }

    /// All terms of a field, in order
    pub fn field_terms<'a>(&'a self, field: &'a str) -> impl Iterator<Item = (&'a Term, &'a PostingList)> + 'a {
        let start = Term::new(field, "");
        self.postings
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(move |(term, _)| term.field == field)
    }

    pub fn prefix_terms<'a>(&'a self, field: &'a str, prefix: &'a str) -> impl Iterator<Item = (&'a Term, &'a PostingList)> + 'a {
        let start = Term::new(field, prefix);
        self.postings
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(move |(term, _)| term.field == field && term.text.starts_with(prefix))
    }

    /// Terms of a field matching a `*`/`?` wildcard pattern
    pub fn wildcard_terms<'a>(&'a self, field: &'a str, pattern: &'a str) -> Result<Vec<(&'a Term, &'a PostingList)>> {
        let regex = wildcard_regex(pattern)?;

        // Everything before the first wildcard is a literal prefix
        let literal_len = pattern.find(['*', '?']).unwrap_or(pattern.len());
        let literal = &pattern[..literal_len];

        Ok(self.prefix_terms(field, literal)
            .filter(|(term, _)| regex.is_match(&term.text))
            .collect())
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.field_stats.clear();
    }
}

/// Convert wildcard pattern to an anchored regex: * -> .*, ? -> .
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut regex_pattern = String::with_capacity(pattern.len() + 8);
    regex_pattern.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex_pattern.push_str(".*"),
            '?' => regex_pattern.push('.'),
            other => regex_pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex_pattern.push('$');
    Ok(Regex::new(&regex_pattern)?)
}
