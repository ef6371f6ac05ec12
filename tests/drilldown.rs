//! # Drilldown Integration Tests
//!
//! Facet category navigation, weighted aggregation through a score field,
//! and validation of drilldown requests against the table schema.

use std::collections::HashMap;
use analytics_dataservice::{
    AnalyticsDataService, AnalyticsDrillDownRange, AnalyticsDrillDownRequest, AnalyticsSchema,
    CategoryDrillDownRequest, ColumnType, Config, ErrorKind, Record, RecordValue,
};

fn sales_service() -> AnalyticsDataService {
    let config = Config { index_shards: 2, ..Config::default() };
    let service = AnalyticsDataService::open(config).expect("Failed to open service");
    service.create_table("sales").unwrap();
    service.set_table_schema(
        "sales",
        AnalyticsSchema::new()
            .add_text_column("product", None)
            .add_facet_column("location")
            .add_score_column("amount", ColumnType::Double),
    ).unwrap();

    let rows = [
        ("s1", "red shoe", "usa,ny", 10.0),
        ("s2", "blue shoe", "usa,ca", 5.0),
        ("s3", "red hat", "usa,ny", 1.0),
        ("s4", "red shoe", "uk,london", 2.0),
    ];
    let records = rows.iter()
        .map(|(id, product, location, amount)| {
            let mut values = HashMap::new();
            values.insert("product".to_string(), RecordValue::from(*product));
            values.insert("location".to_string(), RecordValue::from(*location));
            values.insert("amount".to_string(), RecordValue::from(*amount));
            Record::with_id(id, "sales", values)
        })
        .collect();
    service.put(records).unwrap();
    service.wait_for_indexing(10_000).unwrap();
    service
}

#[test]
fn test_category_levels_are_counted() {
    let service = sales_service();

    let root = service.drill_down_categories(&CategoryDrillDownRequest::new("sales", "location")).unwrap();
    assert_eq!(root.count, 4);
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.child("usa").map(|c| c.count), Some(3));
    assert_eq!(root.child("uk").map(|c| c.count), Some(1));

    let usa = service.drill_down_categories(
        &CategoryDrillDownRequest::new("sales", "location").with_path(&["usa"]),
    ).unwrap();
    assert_eq!(usa.label, "usa");
    let labels: Vec<&str> = usa.children.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["ny", "ca"]);
    assert_eq!(usa.children[0].path, vec!["usa".to_string(), "ny".to_string()]);
}

#[test]
fn test_categories_respect_query_and_score_field() {
    let service = sales_service();

    let request = CategoryDrillDownRequest::new("sales", "location")
        .with_path(&["usa"])
        .with_query("product:red")
        .with_score_field("amount");
    let usa = service.drill_down_categories(&request).unwrap();

    assert_eq!(usa.count, 2);
    assert_eq!(usa.score, 11.0);
    assert_eq!(usa.children.len(), 1);
    assert_eq!(usa.children[0].label, "ny");
    assert_eq!(usa.children[0].score, 11.0);

    let windowed = service.drill_down_categories(
        &CategoryDrillDownRequest::new("sales", "location").with_path(&["usa"]).window(1, 5),
    ).unwrap();
    assert_eq!(windowed.children.len(), 1);
    assert_eq!(windowed.children[0].label, "ca");
}

#[test]
fn test_search_scoped_by_facet_and_query() {
    let service = sales_service();

    let request = AnalyticsDrillDownRequest::new("sales")
        .with_query("product:shoe")
        .add_category_path("location", &["usa"]);
    let hits = service.drill_down_search(&request).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"s1") && ids.contains(&"s2"));
    assert_eq!(service.drill_down_search_count(&request).unwrap(), 2);

    // Filters never change relevance
    let plain = service.search("sales", "product:shoe", 0, 10).unwrap();
    for hit in &hits {
        let unscoped = plain.iter().find(|p| p.id == hit.id).unwrap();
        assert_eq!(unscoped.score, hit.score);
    }
}

#[test]
fn test_range_count_weighs_by_score_field() {
    let service = sales_service();
    let request = AnalyticsDrillDownRequest::new("sales")
        .with_ranges("amount", vec![
            AnalyticsDrillDownRange::new("cheap", 0.0, 5.0),
            AnalyticsDrillDownRange::new("pricey", 5.0, f64::INFINITY),
        ])
        .with_score_field("amount");

    let buckets = service.drill_down_range_count(&request).unwrap();
    assert_eq!(buckets[0].label, "cheap");
    assert_eq!(buckets[0].score, 3.0);
    assert_eq!(buckets[1].score, 15.0);
}

#[test]
fn test_unconfigured_fields_are_index_errors() {
    let service = sales_service();

    let not_facet = service.drill_down_categories(&CategoryDrillDownRequest::new("sales", "product"));
    assert_eq!(not_facet.unwrap_err().kind, ErrorKind::IndexError);

    let not_numeric = AnalyticsDrillDownRequest::new("sales")
        .with_ranges("product", vec![AnalyticsDrillDownRange::new("a", 0.0, 1.0)]);
    assert_eq!(service.drill_down_range_count(&not_numeric).unwrap_err().kind, ErrorKind::IndexError);

    let overlapping = AnalyticsDrillDownRequest::new("sales").with_ranges("amount", vec![
        AnalyticsDrillDownRange::new("a", 0.0, 6.0),
        AnalyticsDrillDownRange::new("b", 5.0, 9.0),
    ]);
    assert_eq!(service.drill_down_range_count(&overlapping).unwrap_err().kind, ErrorKind::IndexError);
}

#[test]
fn test_unknown_table_is_empty() {
    let service = sales_service();
    let request = AnalyticsDrillDownRequest::new("nothing").add_category_path("location", &["usa"]);
    assert!(service.drill_down_search(&request).unwrap().is_empty());
    assert_eq!(service.drill_down_search_count(&request).unwrap(), 0);

    let node = service.drill_down_categories(&CategoryDrillDownRequest::new("nothing", "location")).unwrap();
    assert_eq!(node.count, 0);
    assert!(node.children.is_empty());
}
