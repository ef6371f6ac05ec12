//! # Data Service Behaviour Tests
//!
//! End-to-end checks of the service contract: idempotent deletes, full-replace
//! puts, the indexing barrier, search/count agreement and range buckets.
//!
//! ```sh
//! cargo test --test dataservice_properties -- --nocapture
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use analytics_dataservice::{
    AnalyticsDataService, AnalyticsDrillDownRange, AnalyticsDrillDownRequest, AnalyticsRecordReader,
    AnalyticsSchema, Config, ErrorKind, InMemoryRecordStore, Record, RecordValue, TIME_MAX, TIME_MIN,
};

fn open_service() -> AnalyticsDataService {
    let config = Config { index_shards: 3, store_partitions: 4, ..Config::default() };
    AnalyticsDataService::open(config).expect("Failed to open service")
}

fn record(table: &str, id: &str, values: &[(&str, RecordValue)]) -> Record {
    let values: HashMap<String, RecordValue> = values.iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    Record::with_id(id, table, values)
}

fn read_by_id(service: &AnalyticsDataService, table: &str, id: &str) -> Option<Record> {
    let groups = service.get_records_by_ids(table, 1, None, &[id.to_string()]).unwrap();
    service.read_all(&groups).unwrap().into_iter().next()
}

#[test]
fn test_deletes_are_idempotent() {
    let service = open_service();
    service.delete_table("never_created").unwrap();

    service.create_table("t").unwrap();
    service.delete_ids("t", &["ghost".to_string()]).unwrap();
    service.delete("t", 100, 200).unwrap();
    service.delete("t", 200, 100).unwrap();
    service.delete_table("t").unwrap();
    service.delete_table("t").unwrap();
}

#[test]
fn test_missing_table_errors() {
    let service = open_service();
    let put = service.put(vec![record("nope", "r1", &[])]);
    assert_eq!(put.unwrap_err().kind, ErrorKind::TableNotAvailable);

    let get = service.get_records("nope", 1, None, TIME_MIN, TIME_MAX, 0, None);
    assert_eq!(get.unwrap_err().kind, ErrorKind::TableNotAvailable);

    let delete = service.delete_ids("nope", &["r1".to_string()]);
    assert_eq!(delete.unwrap_err().kind, ErrorKind::TableNotAvailable);

    let schema = service.set_table_schema("nope", AnalyticsSchema::new());
    assert_eq!(schema.unwrap_err().kind, ErrorKind::TableNotAvailable);
}

#[test]
fn test_put_fully_replaces_record() {
    let service = open_service();
    service.create_table("t").unwrap();

    service.put(vec![record("t", "r1", &[("city", "NY".into()), ("amount", 5.into())])]).unwrap();
    service.put(vec![record("t", "r1", &[("country", "US".into())])]).unwrap();

    let stored = read_by_id(&service, "t", "r1").unwrap();
    assert_eq!(stored.values.len(), 1);
    assert_eq!(stored.get_value("country"), Some(&RecordValue::from("US")));

    service.wait_for_indexing(-1).unwrap();
    assert_eq!(service.search_count("t", "city:ny").unwrap(), 0);
    assert_eq!(service.search_count("t", "country:us").unwrap(), 1);
}

#[test]
fn test_barrier_makes_every_put_searchable() {
    let service = open_service();
    service.create_table("events").unwrap();

    let records: Vec<Record> = (0..500)
        .map(|i| record("events", &format!("e{}", i), &[("kind", "click".into()), ("n", RecordValue::from(i))]))
        .collect();
    service.put(records).unwrap();
    service.wait_for_indexing(-1).unwrap();

    let hits = service.search("events", "kind:click", 0, 1000).unwrap();
    assert_eq!(hits.len(), 500);
    let ids: HashSet<String> = hits.into_iter().map(|h| h.id).collect();
    assert!((0..500).all(|i| ids.contains(&format!("e{}", i))));
}

#[test]
fn test_count_matches_exhaustive_pagination() {
    let service = open_service();
    service.create_table("t").unwrap();
    let records: Vec<Record> = (0..57)
        .map(|i| {
            let body = if i % 3 == 0 { "red apple" } else { "green apple pie" };
            record("t", &format!("r{:02}", i), &[("body", body.into()), ("n", RecordValue::from(i))])
        })
        .collect();
    service.put(records).unwrap();
    service.wait_for_indexing(10_000).unwrap();

    for query in ["apple", "body:red", "green AND pie", "n:[10 TO 20}", "*:*", "NOT body:red", "body:app*"] {
        let total = service.search_count("t", query).unwrap();
        let mut seen = HashSet::new();
        let mut start = 0;
        loop {
            let page = service.search("t", query, start, 7).unwrap();
            if page.is_empty() {
                break;
            }
            start += page.len();
            seen.extend(page.into_iter().map(|e| e.id));
        }
        assert_eq!(seen.len() as u64, total, "query {}", query);
    }
}

#[test]
fn test_schema_replace_keeps_search_and_count_in_step() {
    let service = open_service();
    service.create_table("t").unwrap();
    service.put(vec![record("t", "r1", &[("city", "NY".into())])]).unwrap();
    service.wait_for_indexing(10_000).unwrap();
    assert_eq!(service.search("t", "city:NY", 0, 10).unwrap().len(), 1);

    service.set_table_schema("t", AnalyticsSchema::new().add_text_column("city", Some("keyword".to_string()))).unwrap();

    let hits = service.search("t", "city:NY", 0, 10).unwrap();
    let total = service.search_count("t", "city:NY").unwrap();
    assert_eq!(hits.len() as u64, total);
    assert_eq!(total, 0);
}

#[test]
fn test_ranking_is_stable_across_pages() {
    let service = open_service();
    service.create_table("t").unwrap();
    let records: Vec<Record> = (0..20)
        .map(|i| record("t", &format!("r{:02}", i), &[("tag", "same".into())]))
        .collect();
    service.put(records).unwrap();
    service.wait_for_indexing(-1).unwrap();

    let all = service.search("t", "tag:same", 0, 20).unwrap();
    let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let page = service.search("t", "tag:same", 5, 5).unwrap();
    assert_eq!(page, all[5..10].to_vec());
}

#[test]
fn test_range_buckets_partition_matches() {
    let service = open_service();
    service.create_table("t").unwrap();
    let records: Vec<Record> = (0..40)
        .map(|i| record("t", &format!("r{}", i), &[("amount", RecordValue::from(i * 5))]))
        .collect();
    service.put(records).unwrap();
    service.wait_for_indexing(-1).unwrap();

    let buckets = vec![
        AnalyticsDrillDownRange::new("low", f64::NEG_INFINITY, 50.0),
        AnalyticsDrillDownRange::new("mid", 50.0, 120.0),
        AnalyticsDrillDownRange::new("high", 120.0, f64::INFINITY),
    ];
    let request = AnalyticsDrillDownRequest::new("t").with_ranges("amount", buckets);
    let scored = service.drill_down_range_count(&request).unwrap();
    let total: f64 = scored.iter().map(|b| b.score).sum();

    let unscoped = AnalyticsDrillDownRequest::new("t");
    assert_eq!(total as u64, service.drill_down_search_count(&unscoped).unwrap());
    assert_eq!(scored[0].score, 10.0);
    assert_eq!(scored[1].score, 14.0);
    assert_eq!(scored[2].score, 16.0);
}

#[test]
fn test_unpaginated_store_returns_superset() {
    let store = Arc::new(InMemoryRecordStore::new(4).with_pagination(false));
    let service = AnalyticsDataService::open_with_store(Config::default(), store).unwrap();
    assert!(!service.is_pagination_supported());

    service.create_table("t").unwrap();
    let records: Vec<Record> = (0..10)
        .map(|i| record("t", &format!("r{}", i), &[]).at(i))
        .collect();
    service.put(records).unwrap();

    let groups = service.get_records("t", 2, None, TIME_MIN, TIME_MAX, 3, Some(2)).unwrap();
    let records = service.read_all(&groups).unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(service.get_record_count("t", TIME_MIN, TIME_MAX).unwrap(), 10);
}

#[test]
fn test_single_record_search_scenario() {
    let service = open_service();
    service.create_table("T").unwrap();
    service.put(vec![record("T", "r1", &[("city", "NY".into()), ("amount", 5.into())])]).unwrap();
    service.wait_for_indexing(5000).unwrap();

    let hits = service.search("T", "city:NY", 0, 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "r1");
}

#[test]
fn test_two_bucket_scenario() {
    let service = open_service();
    service.create_table("T").unwrap();
    service.put(vec![
        record("T", "small", &[("amount", 3.into())]),
        record("T", "large", &[("amount", 12.into())]),
    ]).unwrap();
    service.wait_for_indexing(5000).unwrap();

    let buckets = vec![
        AnalyticsDrillDownRange::new("[0,10)", 0.0, 10.0),
        AnalyticsDrillDownRange::new("[10,100)", 10.0, 100.0),
    ];
    let request = AnalyticsDrillDownRequest::new("T").with_ranges("amount", buckets.clone());
    let scored = service.drill_down_range_count(&request).unwrap();
    assert_eq!(scored[0].score, 1.0);
    assert_eq!(scored[1].score, 1.0);

    let first_only = AnalyticsDrillDownRequest::new("T").with_ranges("amount", vec![buckets[0].clone()]);
    let hits = service.drill_down_search(&first_only).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "small");
}

#[test]
fn test_primary_keys_derive_stable_ids() {
    let service = open_service();
    service.create_table("users").unwrap();
    service.set_table_schema("users", AnalyticsSchema::new().with_primary_keys(&["user"])).unwrap();

    let first = service.put(vec![record("users", "", &[("user", "alice".into()), ("visits", 1.into())])]).unwrap();
    let second = service.put(vec![record("users", "", &[("user", "alice".into()), ("visits", 2.into())])]).unwrap();
    assert_eq!(first, second);
    assert_eq!(service.get_record_count("users", TIME_MIN, TIME_MAX).unwrap(), 1);

    let missing_key = service.put(vec![record("users", "", &[("visits", 3.into())])]);
    assert_eq!(missing_key.unwrap_err().kind, ErrorKind::InvalidArgument);

    let generated = service.put(vec![Record::new("users", HashMap::new())]);
    assert_eq!(generated.unwrap_err().kind, ErrorKind::InvalidArgument);
}

#[test]
fn test_deletes_reach_the_index() {
    let service = open_service();
    service.create_table("t").unwrap();
    let records: Vec<Record> = (0..10)
        .map(|i| record("t", &format!("r{}", i), &[("kind", "x".into())]).at(i * 10))
        .collect();
    service.put(records).unwrap();

    service.delete_ids("t", &["r0".to_string(), "r1".to_string()]).unwrap();
    service.delete("t", 50, 80).unwrap();
    service.wait_for_indexing(-1).unwrap();

    assert_eq!(service.search_count("t", "kind:x").unwrap(), 5);
    assert_eq!(service.get_record_count("t", TIME_MIN, TIME_MAX).unwrap(), 5);
    assert!(read_by_id(&service, "t", "r6").is_none());
}

#[test]
fn test_malformed_query_is_an_index_error() {
    let service = open_service();
    service.create_table("t").unwrap();
    let err = service.search("t", "city:(ny", 0, 10).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IndexError);
    assert_eq!(service.search("t", "city:ny", 0, 10).unwrap(), Vec::new());
}
