use serde::{Serialize, Deserialize};

/// Parsed query string, before any field-aware analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),         // Single word
    Phrase(PhraseQuery),     // Quoted text
    Bool(BoolQuery),         // Boolean combinations
    Range(RangeQuery),       // Numeric range
    Prefix(PrefixQuery),     // term*
    Wildcard(WildcardQuery), // te?m*
    MatchAll,                // *:* or empty query
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseQuery {
    pub field: String,
    pub text: String,
    pub boost: Option<f32>,
}

/// Boolean query with must/should/must_not clauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub must: Vec<Query>,      // All must match (AND)
    pub should: Vec<Query>,    // At least one must match unless there are musts (OR)
    pub must_not: Vec<Query>,  // None may match (NOT)
    pub boost: Option<f32>,
}

/// Range bounds as written; `None` is an open (`*`) bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field: String,
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub include_lower: bool,
    pub include_upper: bool,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub field: String,
    pub prefix: String,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardQuery {
    pub field: String,
    pub pattern: String, // Pattern with wildcards (* and ?)
    pub boost: Option<f32>,
}

impl Query {
    pub fn term(field: &str, value: &str) -> Query {
        Query::Term(TermQuery { field: field.to_string(), value: value.to_string(), boost: None })
    }

    pub fn with_boost(self, boost: f32) -> Query {
        match self {
            Query::Term(q) => Query::Term(TermQuery { boost: Some(boost), ..q }),
            Query::Phrase(q) => Query::Phrase(PhraseQuery { boost: Some(boost), ..q }),
            Query::Bool(q) => Query::Bool(BoolQuery { boost: Some(boost), ..q }),
            Query::Range(q) => Query::Range(RangeQuery { boost: Some(boost), ..q }),
            Query::Prefix(q) => Query::Prefix(PrefixQuery { boost: Some(boost), ..q }),
            Query::Wildcard(q) => Query::Wildcard(WildcardQuery { boost: Some(boost), ..q }),
            Query::MatchAll => Query::Bool(BoolQuery {
                boost: Some(boost),
                ..BoolQuery::new().with_must(Query::MatchAll)
            }),
        }
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery {
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
            boost: None,
        }
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }
}

impl Default for BoolQuery {
    fn default() -> Self {
        Self::new()
    }
}
