//! This module defines the `RemoteStore`, the record store backed by the
//! hosted relational database.
//!
//! Every entity lives in its own table and references its analysis through a
//! foreign key. Failed queries are logged here and returned to the caller.

mod query_client;
mod rows;

use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub use query_client::{Query, QueryClient, RestClient, Table};

use crate::analytics::{self, NetworkStats};
use crate::data_provider::ScanSource;
use crate::error::{Result, StoreError};
use crate::model::{
    CoveragePoint, Issue, IssueId, IssuePatch, Network, NetworkId, NetworkPatch,
    NewCoveragePoint, NewIssue, NewNetwork, NewPerformanceMetric, NewReport,
    NewScan, PerformanceMetric, Report, ReportId, Scan, ScanDetail, ScanId,
    ScanPatch, ScanStatus,
};
use crate::report::{self, ReportRequest};
use rows::{
    AnalysisInsert, AnalysisRow, CoveragePointInsert, CoveragePointRow,
    IssueInsert, IssueRow, NetworkInsert, NetworkRow, PerformanceMetricInsert,
    PerformanceMetricRow, ReportInsert, ReportRow, REPORT_SELECT,
};

const SCAN_FK: &str = "analise_id";
const REPORT_SCAN_FK: &str = "relatorio_analise_id";

fn decode<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                error!("Unexpected row shape in {}: {}", table, e);
                anyhow::Error::from(StoreError::Backend(format!(
                    "unexpected {} row: {}",
                    table, e
                )))
            })
        })
        .collect()
}

fn first<T>(table: Table, rows: Vec<T>) -> Result<T> {
    rows.into_iter().next().ok_or_else(|| {
        StoreError::Backend(format!("{} returned no row", table)).into()
    })
}

fn by_id(id: i64) -> Query {
    Query::new().eq("id", id)
}

fn by_scan(scan_id: ScanId) -> Query {
    Query::new().eq(SCAN_FK, scan_id)
}

/// The remote variant of the record store.
pub struct RemoteStore<C> {
    client: C,
}

impl<C> RemoteStore<C>
where
    C: QueryClient,
{
    pub fn new(client: C) -> Self {
        RemoteStore { client }
    }

    async fn select<T: DeserializeOwned>(
        &self, table: Table, query: Query,
    ) -> Result<Vec<T>> {
        let rows = self.client.select(table, query).await.map_err(|e| {
            error!("Failed to read {}: {:#}", table, e);
            e
        })?;
        decode(table, rows)
    }

    async fn insert<R: Serialize, T: DeserializeOwned>(
        &self, table: Table, rows: &[R],
    ) -> Result<Vec<T>> {
        let values = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<Value>>>()?;

        let stored = self.client.insert(table, values).await.map_err(|e| {
            error!("Failed to insert into {}: {:#}", table, e);
            e
        })?;
        decode(table, stored)
    }

    async fn insert_one<R: Serialize, T: DeserializeOwned>(
        &self, table: Table, row: R,
    ) -> Result<T> {
        first(table, self.insert(table, &[row]).await?)
    }

    async fn update<T: DeserializeOwned>(
        &self, table: Table, id: i64, patch: Map<String, Value>,
    ) -> Result<Option<T>> {
        let rows = self
            .client
            .update(table, by_id(id), Value::Object(patch))
            .await
            .map_err(|e| {
                error!("Failed to update {} {}: {:#}", table, id, e);
                e
            })?;
        Ok(decode(table, rows)?.into_iter().next())
    }

    /// Deletes matching rows and returns how many were removed.
    async fn delete(&self, table: Table, query: Query) -> Result<usize> {
        let rows = self.client.delete(table, query).await.map_err(|e| {
            error!("Failed to delete from {}: {:#}", table, e);
            e
        })?;
        Ok(rows.len())
    }

    async fn require_scan(&self, scan_id: ScanId) -> Result<()> {
        if self.get_scan(scan_id).await?.is_none() {
            info!("Analysis {} not found", scan_id);
            return Err(StoreError::not_found("scan", scan_id).into());
        }
        Ok(())
    }

    // --- analyses ---

    /// All analyses, newest first.
    pub async fn list_scans(&self) -> Result<Vec<Scan>> {
        let rows: Vec<AnalysisRow> = self
            .select(Table::Analysis, Query::new().order("created_at", false))
            .await?;
        Ok(rows.into_iter().map(Scan::from).collect())
    }

    pub async fn get_scan(&self, id: ScanId) -> Result<Option<Scan>> {
        let rows: Vec<AnalysisRow> = self.select(Table::Analysis, by_id(id)).await?;
        Ok(rows.into_iter().next().map(Scan::from))
    }

    pub async fn create_scan(&self, new_scan: NewScan) -> Result<Scan> {
        new_scan.validate()?;

        let row: AnalysisRow = self
            .insert_one(Table::Analysis, AnalysisInsert::from(new_scan))
            .await?;
        info!("Analysis {} created", row.id);
        Ok(row.into())
    }

    /// Applies a patch. A patch with no stored column (status only) leaves
    /// the row untouched and returns it as is.
    pub async fn update_scan(
        &self, id: ScanId, patch: ScanPatch,
    ) -> Result<Option<Scan>> {
        patch.validate()?;
        // analyses have no status column and always read back as complete
        if let Some(status) = patch.status.filter(|s| *s != ScanStatus::Complete) {
            return Err(StoreError::validation(
                "status",
                format!("analyses cannot be marked {:?}", status),
            )
            .into());
        }

        let columns = rows::analysis_patch(patch);
        if columns.is_empty() {
            return self.get_scan(id).await;
        }
        let row: Option<AnalysisRow> = self.update(Table::Analysis, id, columns).await?;
        Ok(row.map(Scan::from))
    }

    /// Removes an analysis after its networks, issues, metrics, coverage
    /// points and reports.
    ///
    /// # Returns
    ///
    /// `true` if the analysis row was removed.
    pub async fn delete_scan(&self, id: ScanId) -> Result<bool> {
        let mut children = 0;
        for table in [
            Table::Issues,
            Table::PerformanceMetrics,
            Table::CoveragePoints,
            Table::Networks,
        ] {
            children += self.delete(table, by_scan(id)).await?;
        }
        children += self
            .delete(Table::Reports, Query::new().eq(REPORT_SCAN_FK, id))
            .await?;

        let removed = self.delete(Table::Analysis, by_id(id)).await? > 0;
        if removed {
            info!("Analysis {} deleted with {} dependent rows", id, children);
        } else {
            info!("Analysis {} not found, nothing deleted", id);
        }
        Ok(removed)
    }

    // --- networks ---

    /// Networks of an analysis, strongest signal first.
    pub async fn list_networks(&self, scan_id: ScanId) -> Result<Vec<Network>> {
        let rows: Vec<NetworkRow> = self
            .select(
                Table::Networks,
                by_scan(scan_id).order("signal_strength", false),
            )
            .await?;
        rows.into_iter().map(NetworkRow::into_network).collect()
    }

    pub async fn get_network(&self, id: NetworkId) -> Result<Option<Network>> {
        let rows: Vec<NetworkRow> = self.select(Table::Networks, by_id(id)).await?;
        rows.into_iter().next().map(NetworkRow::into_network).transpose()
    }

    /// # Errors
    ///
    /// `StoreError::NotFound` if the analysis does not exist.
    pub async fn create_network(
        &self, scan_id: ScanId, new_network: NewNetwork,
    ) -> Result<Network> {
        new_network.validate()?;
        self.require_scan(scan_id).await?;

        let row: NetworkRow = self
            .insert_one(Table::Networks, NetworkInsert::new(scan_id, new_network)?)
            .await?;
        info!("Network {} added to analysis {}", row.id, scan_id);
        row.into_network()
    }

    /// Inserts several networks in one request. Nothing is sent for an empty
    /// batch.
    pub async fn bulk_create_networks(
        &self, scan_id: ScanId, networks: Vec<NewNetwork>,
    ) -> Result<Vec<Network>> {
        if networks.is_empty() {
            return Ok(Vec::new());
        }
        for network in &networks {
            network.validate()?;
        }
        self.require_scan(scan_id).await?;

        let inserts = networks
            .into_iter()
            .map(|n| NetworkInsert::new(scan_id, n))
            .collect::<Result<Vec<_>>>()?;
        let rows: Vec<NetworkRow> = self.insert(Table::Networks, &inserts).await?;

        info!("{} networks added to analysis {}", rows.len(), scan_id);
        rows.into_iter().map(NetworkRow::into_network).collect()
    }

    pub async fn update_network(
        &self, id: NetworkId, patch: NetworkPatch,
    ) -> Result<Option<Network>> {
        patch.validate()?;

        let columns = rows::network_patch(patch);
        if columns.is_empty() {
            return self.get_network(id).await;
        }
        let row: Option<NetworkRow> = self.update(Table::Networks, id, columns).await?;
        row.map(NetworkRow::into_network).transpose()
    }

    pub async fn delete_network(&self, id: NetworkId) -> Result<bool> {
        Ok(self.delete(Table::Networks, by_id(id)).await? > 0)
    }

    // --- issues ---

    /// Issues of an analysis, most severe first and newest first within a
    /// severity.
    pub async fn list_issues(&self, scan_id: ScanId) -> Result<Vec<Issue>> {
        let rows: Vec<IssueRow> = self
            .select(Table::Issues, by_scan(scan_id).order("created_at", false))
            .await?;

        let mut issues: Vec<Issue> = rows.into_iter().map(Issue::from).collect();
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));
        Ok(issues)
    }

    async fn check_issue_network(
        &self, scan_id: ScanId, new_issue: &NewIssue,
    ) -> Result<()> {
        let Some(network_id) = new_issue.network_id else {
            return Ok(());
        };
        match self.get_network(network_id).await? {
            Some(network) if network.scan_id == scan_id => Ok(()),
            _ => Err(StoreError::not_found("network", network_id).into()),
        }
    }

    /// # Errors
    ///
    /// `StoreError::NotFound` if the analysis, or the network the issue
    /// refers to, does not exist.
    pub async fn create_issue(
        &self, scan_id: ScanId, new_issue: NewIssue,
    ) -> Result<Issue> {
        new_issue.validate()?;
        self.require_scan(scan_id).await?;
        self.check_issue_network(scan_id, &new_issue).await?;

        let row: IssueRow = self
            .insert_one(Table::Issues, IssueInsert::new(scan_id, new_issue))
            .await?;
        info!("Issue {} added to analysis {}", row.id, scan_id);
        Ok(row.into())
    }

    pub async fn bulk_create_issues(
        &self, scan_id: ScanId, issues: Vec<NewIssue>,
    ) -> Result<Vec<Issue>> {
        if issues.is_empty() {
            return Ok(Vec::new());
        }
        for issue in &issues {
            issue.validate()?;
        }
        self.require_scan(scan_id).await?;
        for issue in &issues {
            self.check_issue_network(scan_id, issue).await?;
        }

        let inserts: Vec<IssueInsert> = issues
            .into_iter()
            .map(|i| IssueInsert::new(scan_id, i))
            .collect();
        let rows: Vec<IssueRow> = self.insert(Table::Issues, &inserts).await?;

        info!("{} issues added to analysis {}", rows.len(), scan_id);
        Ok(rows.into_iter().map(Issue::from).collect())
    }

    pub async fn update_issue(
        &self, id: IssueId, patch: IssuePatch,
    ) -> Result<Option<Issue>> {
        patch.validate()?;

        let columns = rows::issue_patch(patch);
        if columns.is_empty() {
            let rows: Vec<IssueRow> = self.select(Table::Issues, by_id(id)).await?;
            return Ok(rows.into_iter().next().map(Issue::from));
        }
        let row: Option<IssueRow> = self.update(Table::Issues, id, columns).await?;
        Ok(row.map(Issue::from))
    }

    pub async fn delete_issue(&self, id: IssueId) -> Result<bool> {
        Ok(self.delete(Table::Issues, by_id(id)).await? > 0)
    }

    // --- measurements ---

    /// Performance samples of an analysis, newest first.
    pub async fn list_performance_metrics(
        &self, scan_id: ScanId,
    ) -> Result<Vec<PerformanceMetric>> {
        let rows: Vec<PerformanceMetricRow> = self
            .select(
                Table::PerformanceMetrics,
                by_scan(scan_id).order("timestamp", false),
            )
            .await?;
        Ok(rows.into_iter().map(PerformanceMetric::from).collect())
    }

    pub async fn create_performance_metric(
        &self, scan_id: ScanId, metric: NewPerformanceMetric,
    ) -> Result<PerformanceMetric> {
        metric.validate()?;
        self.require_scan(scan_id).await?;

        let insert = PerformanceMetricInsert::new(scan_id, metric, Utc::now());
        let row: PerformanceMetricRow =
            self.insert_one(Table::PerformanceMetrics, insert).await?;
        Ok(row.into())
    }

    /// Coverage points of an analysis ordered by position.
    pub async fn list_coverage_points(
        &self, scan_id: ScanId,
    ) -> Result<Vec<CoveragePoint>> {
        let rows: Vec<CoveragePointRow> = self
            .select(
                Table::CoveragePoints,
                by_scan(scan_id)
                    .order("x_coordinate", true)
                    .order("y_coordinate", true),
            )
            .await?;
        Ok(rows.into_iter().map(CoveragePoint::from).collect())
    }

    pub async fn create_coverage_point(
        &self, scan_id: ScanId, point: NewCoveragePoint,
    ) -> Result<CoveragePoint> {
        point.validate()?;
        self.require_scan(scan_id).await?;

        let row: CoveragePointRow = self
            .insert_one(Table::CoveragePoints, CoveragePointInsert::new(scan_id, point))
            .await?;
        Ok(row.into())
    }

    // --- reports ---

    fn reports_from(rows: Vec<ReportRow>) -> Vec<Report> {
        rows.into_iter()
            .filter_map(|row| {
                let id = row.id;
                let report = row.into_report(None);
                if report.is_none() {
                    warn!("Report {} has no analysis, skipped", id);
                }
                report
            })
            .collect()
    }

    /// All reports, newest first.
    pub async fn list_reports(&self) -> Result<Vec<Report>> {
        let rows: Vec<ReportRow> = self
            .select(
                Table::Reports,
                Query::new().select(REPORT_SELECT).order("created_at", false),
            )
            .await?;
        Ok(Self::reports_from(rows))
    }

    pub async fn get_report(&self, id: ReportId) -> Result<Option<Report>> {
        let rows: Vec<ReportRow> = self
            .select(Table::Reports, by_id(id).select(REPORT_SELECT))
            .await?;
        Ok(Self::reports_from(rows).into_iter().next())
    }

    /// # Errors
    ///
    /// `StoreError::NotFound` if the analysis does not exist.
    pub async fn create_report(&self, new_report: NewReport) -> Result<Report> {
        new_report.validate()?;
        self.require_scan(new_report.scan_id).await?;

        let scan_name = new_report.scan_name.clone();
        let row: ReportRow = self
            .insert_one(Table::Reports, ReportInsert::from(new_report))
            .await?;
        let report = row.into_report(Some(scan_name)).ok_or_else(|| {
            StoreError::Backend("stored report lost its analysis".to_string())
        })?;

        info!("Report {} created for analysis {}", report.id, report.scan_id);
        Ok(report)
    }

    /// Generates a report from the current snapshot of an analysis and
    /// stores it.
    pub async fn generate_report(
        &self, scan_id: ScanId, request: ReportRequest,
    ) -> Result<Report> {
        let detail = self
            .complete_analysis(scan_id)
            .await?
            .ok_or(StoreError::not_found("scan", scan_id))?;
        let new_report = report::build(&detail, request, Utc::now())?;
        self.create_report(new_report).await
    }

    pub async fn delete_report(&self, id: ReportId) -> Result<bool> {
        let removed = self.delete(Table::Reports, by_id(id)).await? > 0;
        if removed {
            info!("Report {} deleted", id);
        }
        Ok(removed)
    }

    // --- joined views ---

    /// Fetches an analysis together with all of its child rows. The five
    /// queries run concurrently.
    pub async fn complete_analysis(&self, id: ScanId) -> Result<Option<ScanDetail>> {
        let (scan, networks, issues, performance_metrics, coverage_points) = futures::try_join!(
            self.get_scan(id),
            self.list_networks(id),
            self.list_issues(id),
            self.list_performance_metrics(id),
            self.list_coverage_points(id),
        )?;

        Ok(scan.map(|scan| ScanDetail {
            scan,
            networks,
            issues,
            performance_metrics,
            coverage_points,
        }))
    }

    pub async fn network_stats(&self, scan_id: ScanId) -> Result<Option<NetworkStats>> {
        Ok(analytics::network_stats(&self.list_networks(scan_id).await?))
    }
}

#[async_trait]
impl<C> ScanSource for RemoteStore<C>
where
    C: QueryClient,
{
    async fn list_scans(&self) -> Result<Vec<Scan>> {
        RemoteStore::list_scans(self).await
    }

    async fn complete_scan(&self, id: ScanId) -> Result<Option<ScanDetail>> {
        self.complete_analysis(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_not_found;
    use crate::model::{fixtures, Severity};
    use mockall::Sequence;
    use query_client::MockQueryClient;
    use serde_json::json;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn analysis_row(id: i64, created_at: &str) -> Value {
        json!({
            "id": id,
            "analise_nome": format!("Analysis {}", id),
            "analise_local": "HQ",
            "analise_descricao": null,
            "analise_ambiente": "office",
            "created_at": created_at,
        })
    }

    fn network_row(id: i64, channel: u16, dbm: i32) -> Value {
        json!({
            "id": id,
            "analise_id": 1,
            "ssid": format!("net-{}", id),
            "bssid": "aa:bb:cc:dd:ee:ff",
            "signal_strength": dbm,
            "signal_quality": 0,
            "channel": channel,
            "clients_count": 4,
            "created_at": "2024-03-01T10:00:00Z",
        })
    }

    fn issue_row(id: i64, severity: &str, created_at: &str) -> Value {
        json!({
            "id": id,
            "analise_id": 1,
            "network_id": null,
            "issue_type": "interference",
            "severity": severity,
            "title": format!("Issue {}", id),
            "description": "",
            "created_at": created_at,
        })
    }

    fn analysis_only(mock: &mut MockQueryClient, rows: Vec<Value>) {
        mock.expect_select().returning(move |table, _| match table {
            Table::Analysis => Ok(rows.clone()),
            _ => Ok(Vec::new()),
        });
    }

    #[tokio::test]
    async fn test_list_scans_newest_first() {
        init_logger();
        let mut mock = MockQueryClient::new();

        mock.expect_select()
            .withf(|table, query| {
                *table == Table::Analysis
                    && query.order_columns() == vec![("created_at", false)]
            })
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    analysis_row(2, "2024-03-02T10:00:00Z"),
                    analysis_row(1, "2024-03-01T10:00:00Z"),
                ])
            });

        let scans = RemoteStore::new(mock).list_scans().await.unwrap();
        assert_eq!(scans.iter().map(|s| s.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(scans[0].environment.as_deref(), Some("office"));
        assert!(scans.iter().all(|s| s.status == ScanStatus::Complete));
    }

    #[tokio::test]
    async fn test_create_scan_sends_wire_columns() {
        init_logger();
        let mut mock = MockQueryClient::new();

        mock.expect_insert()
            .withf(|table, rows| {
                *table == Table::Analysis
                    && rows.len() == 1
                    && rows[0]["analise_nome"] == "Office"
                    && rows[0]["analise_local"] == "Floor 2"
                    && rows[0].get("status").is_none()
            })
            .times(1)
            .returning(|_, _| Ok(vec![analysis_row(7, "2024-03-01T10:00:00Z")]));

        let scan = RemoteStore::new(mock)
            .create_scan(NewScan::new("Office", "Floor 2"))
            .await
            .unwrap();
        assert_eq!(scan.id, 7);
    }

    #[tokio::test]
    async fn test_create_scan_validates_before_sending() {
        init_logger();
        let mut mock = MockQueryClient::new();
        mock.expect_insert().times(0);

        let result = RemoteStore::new(mock).create_scan(NewScan::new("", "x")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_status_only_patch_skips_update() {
        init_logger();
        let mut mock = MockQueryClient::new();
        analysis_only(&mut mock, vec![analysis_row(3, "2024-03-01T10:00:00Z")]);
        mock.expect_update().times(0);

        let scan = RemoteStore::new(mock)
            .update_scan(3, ScanPatch::status(ScanStatus::Complete))
            .await
            .unwrap();
        assert_eq!(scan.map(|s| s.id), Some(3));
    }

    #[tokio::test]
    async fn test_update_scan_rejects_unsupported_status() {
        init_logger();
        let mut mock = MockQueryClient::new();
        mock.expect_select().times(0);
        mock.expect_update().times(0);

        let store = RemoteStore::new(mock);
        for status in [ScanStatus::InProgress, ScanStatus::Cancelled] {
            let err = store.update_scan(3, ScanPatch::status(status)).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<StoreError>(),
                Some(StoreError::Validation { field: "status", .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_child_creation_requires_existing_analysis() {
        init_logger();
        let mut mock = MockQueryClient::new();
        analysis_only(&mut mock, Vec::new());
        mock.expect_insert().times(0);

        let store = RemoteStore::new(mock);
        let err = store
            .create_network(9, fixtures::new_network("corp", 6, -60.0))
            .await
            .unwrap_err();
        assert!(is_not_found(&err));

        let err = store
            .create_issue(9, fixtures::new_issue("Overlap", Severity::Low))
            .await
            .unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_create_network_round_trips_signal() {
        init_logger();
        let mut mock = MockQueryClient::new();
        analysis_only(&mut mock, vec![analysis_row(1, "2024-03-01T10:00:00Z")]);
        mock.expect_insert()
            .withf(|table, rows| {
                *table == Table::Networks
                    && rows[0]["signal_strength"] == -58.0
                    && rows[0]["analise_id"] == 1
            })
            .times(1)
            .returning(|_, _| Ok(vec![network_row(11, 6, -58)]));

        let network = RemoteStore::new(mock)
            .create_network(1, fixtures::new_network("corp", 6, -58.0))
            .await
            .unwrap();
        assert_eq!(network.id, 11);
        assert_eq!(network.signal.dbm(), -58.0);
        assert_eq!(network.frequency_mhz, 2437);
    }

    #[tokio::test]
    async fn test_empty_bulk_insert_sends_nothing() {
        init_logger();
        let mock = MockQueryClient::new();
        let store = RemoteStore::new(mock);

        assert!(store.bulk_create_networks(1, Vec::new()).await.unwrap().is_empty());
        assert!(store.bulk_create_issues(1, Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_issues_sorted_by_severity_then_recency() {
        init_logger();
        let mut mock = MockQueryClient::new();
        mock.expect_select()
            .withf(|table, query| {
                *table == Table::Issues && query.eq_value(SCAN_FK) == Some("1")
            })
            .returning(|_, _| {
                Ok(vec![
                    issue_row(4, "low", "2024-03-04T10:00:00Z"),
                    issue_row(3, "critical", "2024-03-03T10:00:00Z"),
                    issue_row(2, "medium", "2024-03-02T10:00:00Z"),
                    issue_row(1, "critical", "2024-03-01T10:00:00Z"),
                ])
            });

        let issues = RemoteStore::new(mock).list_issues(1).await.unwrap();
        assert_eq!(issues.iter().map(|i| i.id).collect::<Vec<_>>(), vec![3, 1, 2, 4]);
    }

    #[tokio::test]
    async fn test_query_failure_is_propagated() {
        init_logger();
        let mut mock = MockQueryClient::new();
        mock.expect_select()
            .returning(|_, _| Err(StoreError::Backend("timeout".to_string()).into()));

        let err = RemoteStore::new(mock).list_networks(1).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::Backend("timeout".to_string()))
        );
    }

    #[tokio::test]
    async fn test_delete_scan_removes_children_first() {
        init_logger();
        let mut mock = MockQueryClient::new();
        let mut seq = Sequence::new();

        for table in [
            Table::Issues,
            Table::PerformanceMetrics,
            Table::CoveragePoints,
            Table::Networks,
        ] {
            mock.expect_delete()
                .withf(move |t, query| *t == table && query.eq_value(SCAN_FK) == Some("3"))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(vec![json!({})]));
        }
        mock.expect_delete()
            .withf(|t, query| {
                *t == Table::Reports && query.eq_value(REPORT_SCAN_FK) == Some("3")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Vec::new()));
        mock.expect_delete()
            .withf(|t, query| *t == Table::Analysis && query.eq_value("id") == Some("3"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![analysis_row(3, "2024-03-01T10:00:00Z")]));

        assert!(RemoteStore::new(mock).delete_scan(3).await.unwrap());
    }

    #[tokio::test]
    async fn test_complete_analysis_joins_children() {
        init_logger();
        let mut mock = MockQueryClient::new();
        mock.expect_select().returning(|table, _| match table {
            Table::Analysis => Ok(vec![analysis_row(1, "2024-03-01T10:00:00Z")]),
            Table::Networks => Ok(vec![network_row(1, 1, -45), network_row(2, 36, -70)]),
            Table::Issues => Ok(vec![issue_row(5, "high", "2024-03-01T10:00:00Z")]),
            _ => Ok(Vec::new()),
        });

        let store = RemoteStore::new(mock);
        let detail = store.complete_analysis(1).await.unwrap().unwrap();
        assert_eq!(detail.networks.len(), 2);
        assert_eq!(detail.issues.len(), 1);
        assert!(detail.coverage_points.is_empty());

        let stats = store.network_stats(1).await.unwrap().unwrap();
        assert_eq!(stats.total_networks, 2);
        assert_eq!(stats.strongest_signal_dbm, -45.0);
    }

    #[tokio::test]
    async fn test_complete_analysis_missing() {
        init_logger();
        let mut mock = MockQueryClient::new();
        mock.expect_select().returning(|_, _| Ok(Vec::new()));

        assert_eq!(RemoteStore::new(mock).complete_analysis(8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reports_use_embedded_name_and_skip_orphans() {
        init_logger();
        let mut mock = MockQueryClient::new();
        mock.expect_select()
            .withf(|table, query| {
                *table == Table::Reports
                    && query.params()[0] == ("select".to_string(), REPORT_SELECT.to_string())
            })
            .returning(|_, _| {
                Ok(vec![
                    json!({
                        "id": 2, "relatorio_nome": "Monthly", "relatorio_analise_id": 1,
                        "relatorio_tipo": "summary", "relatorio_notas": "# Report: Monthly",
                        "report_data": null, "export_format": "PDF",
                        "wifi_analise": { "analise_nome": "Lobby" },
                        "created_at": "2024-03-02T10:00:00Z"
                    }),
                    json!({
                        "id": 1, "relatorio_nome": "Stray", "relatorio_analise_id": null,
                        "created_at": "2024-03-01T10:00:00Z"
                    }),
                ])
            });

        let reports = RemoteStore::new(mock).list_reports().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].scan_name, "Lobby");
        assert_eq!(reports[0].export_format, Some(crate::model::ExportFormat::Pdf));
    }

    #[tokio::test]
    async fn test_generate_report_stores_rendered_content() {
        init_logger();
        let mut mock = MockQueryClient::new();
        mock.expect_select().returning(|table, _| match table {
            Table::Analysis => Ok(vec![analysis_row(1, "2024-03-01T10:00:00Z")]),
            Table::Networks => Ok(vec![network_row(1, 6, -55)]),
            _ => Ok(Vec::new()),
        });
        mock.expect_insert()
            .withf(|table, rows| {
                *table == Table::Reports
                    && rows[0]["relatorio_analise_id"] == 1
                    && rows[0]["relatorio_notas"]
                        .as_str()
                        .is_some_and(|c| c.contains("net-1"))
            })
            .times(1)
            .returning(|_, rows| {
                let mut row = rows[0].clone();
                row["id"] = json!(30);
                row["created_at"] = json!("2024-03-05T10:00:00Z");
                Ok(vec![row])
            });

        let request = ReportRequest {
            name: "Walkthrough".to_string(),
            report_type: "complete".to_string(),
            notes: None,
            export_format: None,
        };
        let report = RemoteStore::new(mock).generate_report(1, request).await.unwrap();
        assert_eq!(report.id, 30);
        assert_eq!(report.scan_name, "Analysis 1");
    }
}
