use std::collections::HashMap;
use std::sync::Arc;
use crate::catalog::catalog::TableCatalog;
use crate::core::error::{Error, Result};
use crate::drilldown::request::{
    AnalyticsDrillDownRange, AnalyticsDrillDownRequest, CategoryDrillDownRequest, SubCategories,
};
use crate::index::numeric::NumericBound;
use crate::index::posting::DocOrdinal;
use crate::index::segment::TableSegment;
use crate::query::planner::LogicalPlan;
use crate::schema::schema::{AnalyticsSchema, ColumnType};
use crate::search::engine::{PreparedQuery, SearchEngine};
use crate::search::results::SearchResultEntry;

/// Facet and range aggregation over the matches of a search
pub struct DrillDownAggregator {
    engine: Arc<SearchEngine>,
    catalog: Arc<TableCatalog>,
}

impl DrillDownAggregator {
    pub fn new(engine: Arc<SearchEngine>, catalog: Arc<TableCatalog>) -> Self {
        DrillDownAggregator { engine, catalog }
    }

    pub fn drill_down_search(&self, request: &AnalyticsDrillDownRequest) -> Result<Vec<SearchResultEntry>> {
        match self.prepare(request, true)? {
            Some(prepared) => self.engine.ranked(&prepared, request.record_start, request.record_count),
            None => Ok(Vec::new()),
        }
    }

    pub fn drill_down_search_count(&self, request: &AnalyticsDrillDownRequest) -> Result<u64> {
        match self.prepare(request, true)? {
            Some(prepared) => self.engine.count(&prepared),
            None => Ok(0),
        }
    }

    /// Children of `request.path`, score descending then label
    pub fn drill_down_categories(&self, request: &CategoryDrillDownRequest) -> Result<SubCategories> {
        let schema = self.catalog.schema_or_empty(&request.table_name);
        check_facet_field(&schema, &request.field_name)?;
        check_score_field(&schema, request.score_field.as_deref())?;

        let mut node = SubCategories {
            label: request.path.last().cloned().unwrap_or_default(),
            path: request.path.clone(),
            ..Default::default()
        };

        let Some(prepared) = self.engine.prepare(&request.table_name, request.query_str())? else {
            return Ok(node);
        };
        let filter = LogicalPlan::Facet {
            field: request.field_name.clone(),
            path: request.path.clone(),
            boost: 0.0,
        };
        let scope = format!("categories:{}:{:?}", request.field_name, request.path);
        let prepared = prepared.restrict(vec![filter], scope);

        let field = request.field_name.as_str();
        let path = request.path.as_slice();
        let score_field = request.score_field.as_deref();
        let partials = self.engine.scan(&prepared, false, |segment, scored| {
            let mut children: HashMap<String, (u64, f64)> = HashMap::new();
            let mut total = 0.0;
            for doc in &scored.docs {
                total += weight(segment, doc, score_field);
            }
            for (doc, label) in segment.facets.children(field, path, &scored.docs) {
                let entry = children.entry(label.to_string()).or_default();
                entry.0 += 1;
                entry.1 += weight(segment, doc, score_field);
            }
            Ok((scored.docs.len(), total, children))
        })?;

        let mut merged: HashMap<String, (u64, f64)> = HashMap::new();
        for (count, score, children) in partials {
            node.count += count;
            node.score += score;
            for (label, (count, score)) in children {
                let entry = merged.entry(label).or_default();
                entry.0 += count;
                entry.1 += score;
            }
        }

        let mut children: Vec<SubCategories> = merged.into_iter()
            .map(|(label, (count, score))| {
                let mut path = request.path.clone();
                path.push(label.clone());
                SubCategories { label, path, count, score, children: Vec::new() }
            })
            .collect();
        children.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.label.cmp(&b.label)));
        node.children = children.into_iter().skip(request.start).take(request.count).collect();
        Ok(node)
    }

    /// Aggregated weight of the matches falling in each bucket
    pub fn drill_down_range_count(&self, request: &AnalyticsDrillDownRequest) -> Result<Vec<AnalyticsDrillDownRange>> {
        let Some(field) = request.range_field.as_deref() else {
            return Err(Error::index("range drilldown requires a range field"));
        };
        let mut buckets = request.ranges.clone();
        for bucket in &mut buckets {
            bucket.score = 0.0;
        }

        // Buckets partition the matches, so the ranges themselves are not a filter here
        let Some(prepared) = self.prepare(request, false)? else {
            return Ok(buckets);
        };

        let score_field = request.score_field.as_deref();
        let ranges = &request.ranges;
        let partials = self.engine.scan(&prepared, false, |segment, scored| {
            let mut scores = vec![0.0f64; ranges.len()];
            for (i, bucket) in ranges.iter().enumerate() {
                let (lower, upper) = bucket_bounds(bucket);
                let docs = segment.numeric.range(field, lower, upper) & &scored.docs;
                for doc in &docs {
                    scores[i] += weight(segment, doc, score_field);
                }
            }
            Ok(scores)
        })?;

        for scores in partials {
            for (bucket, score) in buckets.iter_mut().zip(scores) {
                bucket.score += score;
            }
        }
        Ok(buckets)
    }

    /// Validates the request and plans its query with every facet path
    /// (and optionally the range buckets) as score-neutral filters
    fn prepare(&self, request: &AnalyticsDrillDownRequest, with_ranges: bool) -> Result<Option<PreparedQuery>> {
        let schema = self.catalog.schema_or_empty(&request.table_name);
        for field in request.category_paths.keys() {
            check_facet_field(&schema, field)?;
        }
        check_score_field(&schema, request.score_field.as_deref())?;
        if let Some(field) = &request.range_field {
            check_numeric_field(&schema, field, "range")?;
            check_buckets(&request.ranges)?;
        }

        let Some(prepared) = self.engine.prepare(&request.table_name, request.query_str())? else {
            return Ok(None);
        };

        let mut filters: Vec<LogicalPlan> = request.category_paths.iter()
            .map(|(field, path)| LogicalPlan::Facet { field: field.clone(), path: path.clone(), boost: 0.0 })
            .collect();
        let range_field = request.range_field.as_ref().filter(|_| with_ranges && !request.ranges.is_empty());
        if let Some(field) = range_field {
            let alternatives = request.ranges.iter()
                .map(|bucket| {
                    let (lower, upper) = bucket_bounds(bucket);
                    LogicalPlan::NumericRange { field: field.clone(), lower, upper, boost: 0.0 }
                })
                .collect();
            filters.push(LogicalPlan::any_of(alternatives));
        }

        let scoped_ranges: &[AnalyticsDrillDownRange] = if range_field.is_some() { &request.ranges } else { &[] };
        let scope = serde_json::to_string(&(&request.category_paths, range_field, scoped_ranges))?;
        Ok(Some(prepared.restrict(filters, scope)))
    }
}

fn weight(segment: &TableSegment, doc: DocOrdinal, score_field: Option<&str>) -> f64 {
    match score_field {
        Some(field) => segment.number_of(doc, field).unwrap_or(0.0),
        None => 1.0,
    }
}

fn bucket_bounds(bucket: &AnalyticsDrillDownRange) -> (NumericBound, NumericBound) {
    let upper = if bucket.to == f64::INFINITY {
        NumericBound::Unbounded
    } else {
        NumericBound::Excluded(bucket.to)
    };
    (NumericBound::Included(bucket.from), upper)
}

fn check_buckets(ranges: &[AnalyticsDrillDownRange]) -> Result<()> {
    for bucket in ranges {
        if bucket.from.is_nan() || bucket.to.is_nan() || bucket.from > bucket.to {
            return Err(Error::index(format!("invalid range bucket '{}'", bucket.label)));
        }
    }

    let mut sorted: Vec<&AnalyticsDrillDownRange> = ranges.iter().collect();
    sorted.sort_by(|a, b| a.from.total_cmp(&b.from));
    for pair in sorted.windows(2) {
        if pair[0].contains(pair[1].from) {
            return Err(Error::index(format!(
                "range buckets '{}' and '{}' overlap", pair[0].label, pair[1].label
            )));
        }
    }
    Ok(())
}

fn check_facet_field(schema: &AnalyticsSchema, field: &str) -> Result<()> {
    match schema.column(field) {
        Some(column) if column.column_type != ColumnType::Facet || !column.indexed => {
            Err(Error::index(format!("'{}' is not an indexed facet column", field)))
        }
        _ => Ok(()),
    }
}

fn check_numeric_field(schema: &AnalyticsSchema, field: &str, role: &str) -> Result<()> {
    match schema.column(field) {
        Some(column) if !column.column_type.is_numeric() || !column.indexed => {
            Err(Error::index(format!("'{}' is not an indexed numeric column, cannot be a {} field", field, role)))
        }
        _ => Ok(()),
    }
}

fn check_score_field(schema: &AnalyticsSchema, field: Option<&str>) -> Result<()> {
    match field {
        Some(field) => check_numeric_field(schema, field, "score"),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_validation() {
        let ok = vec![
            AnalyticsDrillDownRange::new("low", 0.0, 10.0),
            AnalyticsDrillDownRange::new("high", 10.0, f64::INFINITY),
        ];
        assert!(check_buckets(&ok).is_ok());

        let overlapping = vec![
            AnalyticsDrillDownRange::new("a", 0.0, 10.0),
            AnalyticsDrillDownRange::new("b", 5.0, 20.0),
        ];
        assert!(check_buckets(&overlapping).is_err());

        let inverted = vec![AnalyticsDrillDownRange::new("a", 10.0, 0.0)];
        assert!(check_buckets(&inverted).is_err());
    }

    #[test]
    fn test_declared_columns_are_checked() {
        let schema = AnalyticsSchema::new()
            .add_text_column("city", None)
            .add_facet_column("location")
            .add_score_column("amount", ColumnType::Double);

        assert!(check_facet_field(&schema, "location").is_ok());
        assert!(check_facet_field(&schema, "undeclared").is_ok());
        assert!(check_facet_field(&schema, "city").is_err());
        assert!(check_score_field(&schema, Some("amount")).is_ok());
        assert!(check_score_field(&schema, Some("city")).is_err());
    }

    #[test]
    fn test_open_bucket_has_no_upper_bound() {
        let (lower, upper) = bucket_bounds(&AnalyticsDrillDownRange::new("x", 1.0, f64::INFINITY));
        assert_eq!(lower, NumericBound::Included(1.0));
        assert_eq!(upper, NumericBound::Unbounded);
    }
}
