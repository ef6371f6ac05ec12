use crate::core::error::Result;
use crate::core::types::Record;
use crate::store::record_store::{RecordGroup, RecordIter};

/// Direct record retrieval that bypasses the index.
///
/// `time_to` is exclusive; `TIME_MIN`/`TIME_MAX` leave a side unbounded.
/// `records_count == None` reads to the end. When
/// [`is_pagination_supported`](Self::is_pagination_supported) is false the
/// window may be ignored and the caller trims the (complete) result itself.
pub trait AnalyticsRecordReader {
    fn get_records(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        time_from: i64,
        time_to: i64,
        records_from: u64,
        records_count: Option<u64>,
    ) -> Result<Vec<RecordGroup>>;

    /// Ids that do not resolve are left out
    fn get_records_by_ids(
        &self,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        ids: &[String],
    ) -> Result<Vec<RecordGroup>>;

    fn read_records(&self, group: &RecordGroup) -> Result<RecordIter>;

    fn get_record_count(&self, table: &str, time_from: i64, time_to: i64) -> Result<u64>;

    fn is_pagination_supported(&self) -> bool;

    /// Drains every group in order
    fn read_all(&self, groups: &[RecordGroup]) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for group in groups {
            records.extend(self.read_records(group)?);
        }
        Ok(records)
    }
}
