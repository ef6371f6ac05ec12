use std::sync::Arc;
use crate::analysis::analyzer::{Analyzer, AnalyzerRegistry};
use crate::core::error::{Error, Result};
use crate::core::types::{ALL_FIELD, ID_FIELD, TIMESTAMP_FIELD};
use crate::index::document::parse_facet_path;
use crate::index::numeric::NumericBound;
use crate::query::ast::{BoolQuery, Query, RangeQuery};
use crate::schema::schema::{AnalyticsSchema, ColumnDefinition, ColumnType};

/// Logical execution plan: the query with every value analyzed for the
/// structure its field is indexed in
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    MatchAll { boost: f32 },
    MatchNone,
    Term { field: String, term: String, boost: f32 },
    /// Terms with their positions relative to the first one
    Phrase { field: String, terms: Vec<(String, u32)>, boost: f32 },
    Prefix { field: String, prefix: String, boost: f32 },
    Wildcard { field: String, pattern: String, boost: f32 },
    NumericRange { field: String, lower: NumericBound, upper: NumericBound, boost: f32 },
    Facet { field: String, path: Vec<String>, boost: f32 },
    Bool {
        must: Vec<LogicalPlan>,
        should: Vec<LogicalPlan>,
        must_not: Vec<LogicalPlan>,
        boost: f32,
    },
}

impl LogicalPlan {
    pub fn any_of(mut alternatives: Vec<LogicalPlan>) -> LogicalPlan {
        match alternatives.len() {
            0 => LogicalPlan::MatchNone,
            1 => alternatives.remove(0),
            _ => LogicalPlan::Bool { must: Vec::new(), should: alternatives, must_not: Vec::new(), boost: 1.0 },
        }
    }

    pub fn all_of(required: Vec<LogicalPlan>) -> LogicalPlan {
        LogicalPlan::Bool { must: required, should: Vec::new(), must_not: Vec::new(), boost: 1.0 }
    }
}

/// How a query field is indexed for a given table
enum FieldKind<'s> {
    Id,
    Timestamp,
    All,
    Declared(&'s ColumnDefinition),
    Dynamic,
}

/// Query planner: rewrites a parsed query against the table schema.
///
/// Declared columns are planned by their type. Undeclared columns were indexed
/// by the type of each stored value, so a value is looked up in every
/// structure it could have landed in.
pub struct QueryPlanner<'a> {
    pub schema: &'a AnalyticsSchema,
    pub analyzers: &'a AnalyzerRegistry,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(schema: &'a AnalyticsSchema, analyzers: &'a AnalyzerRegistry) -> Self {
        QueryPlanner { schema, analyzers }
    }

    pub fn plan(&self, query: &Query) -> Result<LogicalPlan> {
        match query {
            Query::MatchAll => Ok(LogicalPlan::MatchAll { boost: 1.0 }),
            Query::Term(q) => self.plan_value(&q.field, &q.value, q.boost.unwrap_or(1.0)),
            Query::Phrase(q) => self.plan_value(&q.field, &q.text, q.boost.unwrap_or(1.0)),
            Query::Prefix(q) => self.plan_prefix(&q.field, &q.prefix, q.boost.unwrap_or(1.0)),
            Query::Wildcard(q) => self.plan_wildcard(&q.field, &q.pattern, q.boost.unwrap_or(1.0)),
            Query::Range(q) => self.plan_range(q),
            Query::Bool(q) => self.plan_bool(q),
        }
    }

    fn plan_bool(&self, query: &BoolQuery) -> Result<LogicalPlan> {
        let plan_all = |queries: &[Query]| -> Result<Vec<LogicalPlan>> {
            queries.iter().map(|q| self.plan(q)).collect()
        };
        Ok(LogicalPlan::Bool {
            must: plan_all(&query.must)?,
            should: plan_all(&query.should)?,
            must_not: plan_all(&query.must_not)?,
            boost: query.boost.unwrap_or(1.0),
        })
    }

    fn kind(&self, field: &str) -> FieldKind<'a> {
        match field {
            ID_FIELD => FieldKind::Id,
            TIMESTAMP_FIELD => FieldKind::Timestamp,
            ALL_FIELD => FieldKind::All,
            _ => match self.schema.column(field) {
                Some(column) => FieldKind::Declared(column),
                None => FieldKind::Dynamic,
            },
        }
    }

    /// Term or phrase value
    fn plan_value(&self, field: &str, text: &str, boost: f32) -> Result<LogicalPlan> {
        match self.kind(field) {
            FieldKind::Id => Ok(LogicalPlan::Term { field: field.to_string(), term: text.to_string(), boost }),
            FieldKind::Timestamp => numeric_equals(field, text, boost),
            FieldKind::All => Ok(text_plan(field, &self.analyzers.default_analyzer(), text, boost)),
            FieldKind::Declared(column) if !column.indexed => Ok(LogicalPlan::MatchNone),
            FieldKind::Declared(column) => match column.column_type {
                ColumnType::String => {
                    let analyzer = self.analyzers.resolve(column.analyzer.as_ref())?;
                    Ok(text_plan(field, &analyzer, text, boost))
                }
                ColumnType::Boolean => Ok(LogicalPlan::Term {
                    field: field.to_string(),
                    term: text.trim().to_lowercase(),
                    boost,
                }),
                ColumnType::Facet => Ok(LogicalPlan::Facet {
                    field: field.to_string(),
                    path: parse_facet_path(text),
                    boost,
                }),
                ColumnType::Binary => Ok(LogicalPlan::MatchNone),
                _ => numeric_equals(field, text, boost),
            },
            FieldKind::Dynamic => {
                let mut alternatives = Vec::new();
                match text_plan(field, &self.analyzers.default_analyzer(), text, boost) {
                    LogicalPlan::MatchNone => {}
                    plan => alternatives.push(plan),
                }
                if let Ok(number) = text.trim().parse::<f64>() {
                    alternatives.push(equals(field, number, boost));
                }
                let path = parse_facet_path(text);
                if !path.is_empty() {
                    alternatives.push(LogicalPlan::Facet { field: field.to_string(), path, boost });
                }
                Ok(LogicalPlan::any_of(alternatives))
            }
        }
    }

    fn plan_prefix(&self, field: &str, prefix: &str, boost: f32) -> Result<LogicalPlan> {
        let everything = prefix.is_empty();
        match self.kind(field) {
            FieldKind::Id => Ok(LogicalPlan::Prefix { field: field.to_string(), prefix: prefix.to_string(), boost }),
            FieldKind::Timestamp if everything => Ok(any_number(field, boost)),
            FieldKind::Timestamp => Ok(LogicalPlan::MatchNone),
            FieldKind::All => Ok(self.text_prefix(field, &self.analyzers.default_analyzer(), prefix, boost)),
            FieldKind::Declared(column) if !column.indexed => Ok(LogicalPlan::MatchNone),
            FieldKind::Declared(column) => match column.column_type {
                ColumnType::String => {
                    let analyzer = self.analyzers.resolve(column.analyzer.as_ref())?;
                    Ok(self.text_prefix(field, &analyzer, prefix, boost))
                }
                ColumnType::Boolean => Ok(LogicalPlan::Prefix {
                    field: field.to_string(),
                    prefix: prefix.to_lowercase(),
                    boost,
                }),
                ColumnType::Facet if everything => Ok(LogicalPlan::Facet { field: field.to_string(), path: Vec::new(), boost }),
                ColumnType::Facet | ColumnType::Binary => Ok(LogicalPlan::MatchNone),
                _ if everything => Ok(any_number(field, boost)),
                _ => Ok(LogicalPlan::MatchNone),
            },
            FieldKind::Dynamic => {
                let mut alternatives = vec![self.text_prefix(field, &self.analyzers.default_analyzer(), prefix, boost)];
                if everything {
                    alternatives.push(any_number(field, boost));
                    alternatives.push(LogicalPlan::Facet { field: field.to_string(), path: Vec::new(), boost });
                }
                Ok(LogicalPlan::any_of(alternatives))
            }
        }
    }

    fn text_prefix(&self, field: &str, analyzer: &Arc<Analyzer>, prefix: &str, boost: f32) -> LogicalPlan {
        let prefix = if analyzer.lowercases() { prefix.to_lowercase() } else { prefix.to_string() };
        LogicalPlan::Prefix { field: field.to_string(), prefix, boost }
    }

    fn plan_wildcard(&self, field: &str, pattern: &str, boost: f32) -> Result<LogicalPlan> {
        let analyzer = match self.kind(field) {
            FieldKind::Id => self.analyzers.keyword(),
            FieldKind::All | FieldKind::Dynamic => self.analyzers.default_analyzer(),
            FieldKind::Declared(column) if column.indexed && column.column_type == ColumnType::String => {
                self.analyzers.resolve(column.analyzer.as_ref())?
            }
            FieldKind::Declared(column) if column.indexed && column.column_type == ColumnType::Boolean => {
                self.analyzers.default_analyzer()
            }
            _ => return Ok(LogicalPlan::MatchNone),
        };
        let pattern = if analyzer.lowercases() { pattern.to_lowercase() } else { pattern.to_string() };
        Ok(LogicalPlan::Wildcard { field: field.to_string(), pattern, boost })
    }

    fn plan_range(&self, query: &RangeQuery) -> Result<LogicalPlan> {
        let field = query.field.as_str();
        match self.kind(field) {
            FieldKind::Timestamp | FieldKind::Dynamic => {}
            FieldKind::Declared(column) if !column.indexed => return Ok(LogicalPlan::MatchNone),
            FieldKind::Declared(column) if column.column_type.is_numeric() => {}
            _ => return Err(Error::index(format!("range query on non-numeric field '{}'", field))),
        }

        let lower = bound(field, query.lower.as_deref(), query.include_lower)?;
        let upper = bound(field, query.upper.as_deref(), query.include_upper)?;
        Ok(LogicalPlan::NumericRange {
            field: field.to_string(),
            lower,
            upper,
            boost: query.boost.unwrap_or(1.0),
        })
    }
}

/// One token is a term, several are a phrase, none (all stop words) match nothing
fn text_plan(field: &str, analyzer: &Analyzer, text: &str, boost: f32) -> LogicalPlan {
    let mut tokens = analyzer.analyze(text);
    match tokens.len() {
        0 => LogicalPlan::MatchNone,
        1 => LogicalPlan::Term { field: field.to_string(), term: tokens.remove(0).text, boost },
        _ => {
            let first = tokens[0].position;
            LogicalPlan::Phrase {
                field: field.to_string(),
                terms: tokens.into_iter().map(|t| (t.text, t.position - first)).collect(),
                boost,
            }
        }
    }
}

fn equals(field: &str, value: f64, boost: f32) -> LogicalPlan {
    LogicalPlan::NumericRange {
        field: field.to_string(),
        lower: NumericBound::Included(value),
        upper: NumericBound::Included(value),
        boost,
    }
}

fn any_number(field: &str, boost: f32) -> LogicalPlan {
    LogicalPlan::NumericRange {
        field: field.to_string(),
        lower: NumericBound::Unbounded,
        upper: NumericBound::Unbounded,
        boost,
    }
}

fn numeric_equals(field: &str, text: &str, boost: f32) -> Result<LogicalPlan> {
    let value = parse_number(field, text)?;
    Ok(equals(field, value, boost))
}

fn parse_number(field: &str, text: &str) -> Result<f64> {
    text.trim().parse::<f64>()
        .map_err(|_| Error::index(format!("field '{}' is numeric but '{}' is not a number", field, text)))
}

fn bound(field: &str, value: Option<&str>, inclusive: bool) -> Result<NumericBound> {
    Ok(match value {
        None => NumericBound::Unbounded,
        Some(text) => {
            let value = parse_number(field, text)?;
            if inclusive { NumericBound::Included(value) } else { NumericBound::Excluded(value) }
        }
    })
}
