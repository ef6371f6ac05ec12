use std::collections::{HashMap, HashSet};
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::service::AnalyticsDataService;
use crate::core::stats::ServiceStats;
use crate::core::types::Record;
use crate::drilldown::request::{
    AnalyticsDrillDownRange, AnalyticsDrillDownRequest, CategoryDrillDownRequest, SubCategories,
};
use crate::reader::record_reader::AnalyticsRecordReader;
use crate::schema::schema::AnalyticsSchema;
use crate::search::results::SearchResultEntry;
use crate::store::record_store::{RecordGroup, RecordIter};

/// Actions a user can be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    CreateTable,
    DropTable,
    ListTables,
    GetSchema,
    SetSchema,
    PutRecord,
    GetRecord,
    DeleteRecord,
    Search,
    ClearIndex,
}

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::CreateTable,
        Permission::DropTable,
        Permission::ListTables,
        Permission::GetSchema,
        Permission::SetSchema,
        Permission::PutRecord,
        Permission::GetRecord,
        Permission::DeleteRecord,
        Permission::Search,
        Permission::ClearIndex,
    ];
}

/// Decides whether a user may perform an action
pub trait AuthorizationGate: Send + Sync {
    fn is_authorized(&self, username: &str, permission: Permission) -> bool;
}

/// Grants everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllGate;

impl AuthorizationGate for AllowAllGate {
    fn is_authorized(&self, _username: &str, _permission: Permission) -> bool {
        true
    }
}

/// Fixed grants per username
#[derive(Debug, Default, Clone)]
pub struct StaticPermissionGate {
    grants: HashMap<String, HashSet<Permission>>,
}

impl StaticPermissionGate {
    pub fn new() -> Self {
        StaticPermissionGate::default()
    }

    pub fn grant(mut self, username: &str, permissions: &[Permission]) -> Self {
        self.grants.entry(username.to_string())
            .or_default()
            .extend(permissions.iter().copied());
        self
    }

    pub fn grant_all(self, username: &str) -> Self {
        self.grant(username, &Permission::ALL)
    }
}

impl AuthorizationGate for StaticPermissionGate {
    fn is_authorized(&self, username: &str, permission: Permission) -> bool {
        self.grants.get(username).is_some_and(|granted| granted.contains(&permission))
    }
}

/// Data service whose table operations act on behalf of a user.
///
/// Identity is only ever seen by the gate; the wrapped service is
/// username-agnostic.
pub struct SecureAnalyticsDataService<G: AuthorizationGate> {
    service: AnalyticsDataService,
    gate: G,
}

impl<G: AuthorizationGate> SecureAnalyticsDataService<G> {
    pub fn new(service: AnalyticsDataService, gate: G) -> Self {
        SecureAnalyticsDataService { service, gate }
    }

    pub fn inner(&self) -> &AnalyticsDataService {
        &self.service
    }

    fn authorize(&self, username: &str, permission: Permission) -> Result<()> {
        if self.gate.is_authorized(username, permission) {
            return Ok(());
        }
        debug!(username, ?permission, "permission denied");
        Err(Error::new(
            ErrorKind::Unauthorized,
            format!("user '{}' lacks permission {:?}", username, permission),
        ))
    }

    pub fn create_table(&self, username: &str, table: &str) -> Result<()> {
        self.authorize(username, Permission::CreateTable)?;
        self.service.create_table(table)
    }

    pub fn clear_index_data(&self, username: &str, table: &str) -> Result<()> {
        self.authorize(username, Permission::ClearIndex)?;
        self.service.clear_index_data(table)
    }

    pub fn set_table_schema(&self, username: &str, table: &str, schema: AnalyticsSchema) -> Result<()> {
        self.authorize(username, Permission::SetSchema)?;
        self.service.set_table_schema(table, schema)
    }

    pub fn get_table_schema(&self, username: &str, table: &str) -> Result<AnalyticsSchema> {
        self.authorize(username, Permission::GetSchema)?;
        self.service.get_table_schema(table)
    }

    pub fn table_exists(&self, username: &str, table: &str) -> Result<bool> {
        self.authorize(username, Permission::ListTables)?;
        self.service.table_exists(table)
    }

    pub fn delete_table(&self, username: &str, table: &str) -> Result<()> {
        self.authorize(username, Permission::DropTable)?;
        self.service.delete_table(table)
    }

    pub fn list_tables(&self, username: &str) -> Result<Vec<String>> {
        self.authorize(username, Permission::ListTables)?;
        self.service.list_tables()
    }

    pub fn get_record_count(&self, username: &str, table: &str, time_from: i64, time_to: i64) -> Result<u64> {
        self.authorize(username, Permission::GetRecord)?;
        self.service.get_record_count(table, time_from, time_to)
    }

    pub fn put(&self, username: &str, records: Vec<Record>) -> Result<Vec<String>> {
        self.authorize(username, Permission::PutRecord)?;
        self.service.put(records)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get(
        &self,
        username: &str,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        time_from: i64,
        time_to: i64,
        records_from: u64,
        records_count: Option<u64>,
    ) -> Result<Vec<RecordGroup>> {
        self.authorize(username, Permission::GetRecord)?;
        self.service.get_records(table, partitions_hint, columns, time_from, time_to, records_from, records_count)
    }

    pub fn get_by_ids(
        &self,
        username: &str,
        table: &str,
        partitions_hint: usize,
        columns: Option<Vec<String>>,
        ids: &[String],
    ) -> Result<Vec<RecordGroup>> {
        self.authorize(username, Permission::GetRecord)?;
        self.service.get_records_by_ids(table, partitions_hint, columns, ids)
    }

    /// Groups were authorized when they were handed out
    pub fn read_records(&self, group: &RecordGroup) -> Result<RecordIter> {
        self.service.read_records(group)
    }

    pub fn is_pagination_supported(&self) -> bool {
        self.service.is_pagination_supported()
    }

    pub fn delete(&self, username: &str, table: &str, time_from: i64, time_to: i64) -> Result<()> {
        self.authorize(username, Permission::DeleteRecord)?;
        self.service.delete(table, time_from, time_to)
    }

    pub fn delete_ids(&self, username: &str, table: &str, ids: &[String]) -> Result<()> {
        self.authorize(username, Permission::DeleteRecord)?;
        self.service.delete_ids(table, ids)
    }

    pub fn search(
        &self,
        username: &str,
        table: &str,
        query: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<SearchResultEntry>> {
        self.authorize(username, Permission::Search)?;
        self.service.search(table, query, start, count)
    }

    pub fn search_count(&self, username: &str, table: &str, query: &str) -> Result<u64> {
        self.authorize(username, Permission::Search)?;
        self.service.search_count(table, query)
    }

    pub fn wait_for_indexing(&self, max_wait_ms: i64) -> Result<()> {
        self.service.wait_for_indexing(max_wait_ms)
    }

    pub fn drill_down_search(
        &self,
        username: &str,
        request: &AnalyticsDrillDownRequest,
    ) -> Result<Vec<SearchResultEntry>> {
        self.authorize(username, Permission::Search)?;
        self.service.drill_down_search(request)
    }

    pub fn drill_down_search_count(&self, username: &str, request: &AnalyticsDrillDownRequest) -> Result<u64> {
        self.authorize(username, Permission::Search)?;
        self.service.drill_down_search_count(request)
    }

    pub fn drill_down_categories(&self, username: &str, request: &CategoryDrillDownRequest) -> Result<SubCategories> {
        self.authorize(username, Permission::Search)?;
        self.service.drill_down_categories(request)
    }

    pub fn drill_down_range_count(
        &self,
        username: &str,
        request: &AnalyticsDrillDownRequest,
    ) -> Result<Vec<AnalyticsDrillDownRange>> {
        self.authorize(username, Permission::Search)?;
        self.service.drill_down_range_count(request)
    }

    pub fn destroy(&self) -> Result<()> {
        self.service.destroy()
    }

    pub fn stats(&self) -> Result<ServiceStats> {
        self.service.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_gate_grants() {
        let gate = StaticPermissionGate::new()
            .grant("analyst", &[Permission::Search, Permission::GetRecord])
            .grant_all("admin");

        assert!(gate.is_authorized("analyst", Permission::Search));
        assert!(!gate.is_authorized("analyst", Permission::DropTable));
        assert!(gate.is_authorized("admin", Permission::DropTable));
        assert!(!gate.is_authorized("nobody", Permission::Search));
        assert!(AllowAllGate.is_authorized("nobody", Permission::DropTable));
    }
}
