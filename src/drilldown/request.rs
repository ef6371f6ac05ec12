use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

/// Numeric bucket `[from, to)`. `to = +inf` leaves the bucket open above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsDrillDownRange {
    pub label: String,
    pub from: f64,
    pub to: f64,
    /// Aggregated weight of the matches in the bucket, filled in by the aggregator
    pub score: f64,
}

impl AnalyticsDrillDownRange {
    pub fn new(label: &str, from: f64, to: f64) -> Self {
        AnalyticsDrillDownRange {
            label: label.to_string(),
            from,
            to,
            score: 0.0,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.from && value < self.to
    }
}

/// Search scoped by facet paths and range buckets on top of a free-text query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsDrillDownRequest {
    pub table_name: String,
    /// Empty or absent matches everything
    pub query: Option<String>,
    /// Facet field -> required category path prefix
    pub category_paths: BTreeMap<String, Vec<String>>,
    pub range_field: Option<String>,
    pub ranges: Vec<AnalyticsDrillDownRange>,
    /// Numeric column whose value weighs each match; weight 1 when unset
    pub score_field: Option<String>,
    pub record_start: usize,
    pub record_count: usize,
}

impl AnalyticsDrillDownRequest {
    pub fn new(table: &str) -> Self {
        AnalyticsDrillDownRequest {
            table_name: table.to_string(),
            record_count: 10,
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = Some(query.to_string());
        self
    }

    pub fn add_category_path<S: AsRef<str>>(mut self, field: &str, path: &[S]) -> Self {
        self.category_paths.insert(
            field.to_string(),
            path.iter().map(|p| p.as_ref().to_string()).collect(),
        );
        self
    }

    pub fn with_ranges(mut self, field: &str, ranges: Vec<AnalyticsDrillDownRange>) -> Self {
        self.range_field = Some(field.to_string());
        self.ranges = ranges;
        self
    }

    pub fn with_score_field(mut self, field: &str) -> Self {
        self.score_field = Some(field.to_string());
        self
    }

    pub fn window(mut self, start: usize, count: usize) -> Self {
        self.record_start = start;
        self.record_count = count;
        self
    }

    pub fn query_str(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }
}

/// One level of a facet tree under `path`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryDrillDownRequest {
    pub table_name: String,
    pub field_name: String,
    pub path: Vec<String>,
    pub query: Option<String>,
    pub score_field: Option<String>,
    pub start: usize,
    pub count: usize,
}

impl CategoryDrillDownRequest {
    pub fn new(table: &str, field: &str) -> Self {
        CategoryDrillDownRequest {
            table_name: table.to_string(),
            field_name: field.to_string(),
            count: usize::MAX,
            ..Default::default()
        }
    }

    pub fn with_path<S: AsRef<str>>(mut self, path: &[S]) -> Self {
        self.path = path.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = Some(query.to_string());
        self
    }

    pub fn with_score_field(mut self, field: &str) -> Self {
        self.score_field = Some(field.to_string());
        self
    }

    pub fn window(mut self, start: usize, count: usize) -> Self {
        self.start = start;
        self.count = count;
        self
    }

    pub fn query_str(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }
}

/// Category tree node. Children are one level deep; resubmit with a longer
/// path to descend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubCategories {
    pub label: String,
    pub path: Vec<String>,
    /// Matching records at or below this node
    pub count: u64,
    pub score: f64,
    pub children: Vec<SubCategories>,
}

impl SubCategories {
    pub fn child(&self, label: &str) -> Option<&SubCategories> {
        self.children.iter().find(|c| c.label == label)
    }
}
