/// Analytics Data Service API Demo
///
/// Demonstrates the main service operations:
/// - Tables and schemas
/// - Puts, partitioned reads and deletes
/// - Search after the indexing barrier
/// - Category and range drilldown
/// - Permission-checked access

use analytics_dataservice::{
    AnalyticsDataService, AnalyticsDrillDownRange, AnalyticsDrillDownRequest, AnalyticsRecordReader,
    AnalyticsSchema, CategoryDrillDownRequest, ColumnType, Config, Permission, Record, RecordValue,
    SecureAnalyticsDataService, StaticPermissionGate, TIME_MAX, TIME_MIN,
};
use std::collections::HashMap;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║   Analytics Data Service - API Demo           ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    // Step 1: Open service
    println!("Opening service...");
    let service = AnalyticsDataService::open(Config::default())?;
    println!("Done!\n");

    // Step 2: TABLES - Create and describe a table
    println!("Step 2: TABLES - Creating 'Sales'...");
    service.create_table("Sales")?;
    service.set_table_schema(
        "sales",
        AnalyticsSchema::new()
            .add_text_column("product", None)
            .add_facet_column("location")
            .add_score_column("amount", ColumnType::Double),
    )?;
    println!("  Tables: {:?}\n", service.list_tables()?);

    // Step 3: PUT - Store records
    println!("Step 3: PUT - Storing records...");
    let ids = service.put(vec![
        create_sale("s1", "Red running shoe", "usa,ny", 120.0, 1),
        create_sale("s2", "Blue running shoe", "usa,ca", 95.0, 2),
        create_sale("s3", "Red wool hat", "usa,ny", 25.0, 3),
        create_sale("s4", "Green trail shoe", "uk,london", 140.0, 4),
    ])?;
    println!("  Stored {} records\n", ids.len());

    // Step 4: WAIT - Indexing is asynchronous
    println!("Step 4: WAIT - Waiting for the index...");
    service.wait_for_indexing(5_000)?;
    println!("  Index is up to date\n");

    // Step 5: SEARCH - Different query types
    println!("Step 5: SEARCH - Querying records...");
    for query in ["product:shoe", "product:\"running shoe\"", "red AND NOT hat", "amount:[100 TO *]"] {
        let hits = service.search("sales", query, 0, 10)?;
        let total = service.search_count("sales", query)?;
        println!("  '{}': {} results (of {})", query, hits.len(), total);
        for hit in hits {
            println!("    {} score={:.3}", hit.id, hit.score);
        }
    }
    println!();

    // Step 6: DRILLDOWN - Categories and ranges
    println!("Step 6: DRILLDOWN - Aggregating...");
    let usa = service.drill_down_categories(
        &CategoryDrillDownRequest::new("sales", "location").with_path(&["usa"]).with_score_field("amount"),
    )?;
    for child in &usa.children {
        println!("  usa/{}: count={} amount={}", child.label, child.count, child.score);
    }

    let ranges = AnalyticsDrillDownRequest::new("sales").with_ranges("amount", vec![
        AnalyticsDrillDownRange::new("under 100", 0.0, 100.0),
        AnalyticsDrillDownRange::new("100 and up", 100.0, f64::INFINITY),
    ]);
    for bucket in service.drill_down_range_count(&ranges)? {
        println!("  {}: {}", bucket.label, bucket.score);
    }
    println!();

    // Step 7: READ - Partitioned retrieval bypassing the index
    println!("Step 7: READ - Reading by time range...");
    let groups = service.get_records("sales", 2, Some(vec!["product".to_string()]), TIME_MIN, TIME_MAX, 0, None)?;
    for (i, group) in groups.iter().enumerate() {
        let records: Vec<Record> = service.read_records(group)?.collect();
        println!("  group {}: {} records", i, records.len());
    }
    println!();

    // Step 8: DELETE - Remove a record
    println!("Step 8: DELETE - Removing s3...");
    service.delete_ids("sales", &["s3".to_string()])?;
    service.wait_for_indexing(5_000)?;
    println!("  'product:hat': {} results\n", service.search_count("sales", "product:hat")?);

    // Step 9: STATS
    let stats = service.stats()?;
    println!("Step 9: STATS");
    println!("  tables={} indexed={} processed={} cache_hit_rate={:.2}\n",
             stats.table_count,
             stats.indexed_documents,
             stats.indexing.processed,
             stats.cache_stats.hit_rate());

    // Step 10: SECURITY - Same service behind a permission gate
    println!("Step 10: SECURITY - Permission-checked access...");
    let gate = StaticPermissionGate::new().grant("analyst", &[Permission::Search]);
    let secure = SecureAnalyticsDataService::new(service, gate);
    println!("  analyst search: {} results", secure.search_count("analyst", "sales", "shoe")?);
    match secure.delete_table("analyst", "sales") {
        Ok(()) => println!("  analyst dropped the table"),
        Err(e) => println!("  analyst drop denied: {}", e),
    }

    secure.destroy()?;
    println!("\nDone!");
    Ok(())
}

fn create_sale(id: &str, product: &str, location: &str, amount: f64, timestamp: i64) -> Record {
    let mut values = HashMap::new();
    values.insert("product".to_string(), RecordValue::from(product));
    values.insert("location".to_string(), RecordValue::from(location));
    values.insert("amount".to_string(), RecordValue::from(amount));
    Record::with_id(id, "sales", values).at(timestamp)
}
