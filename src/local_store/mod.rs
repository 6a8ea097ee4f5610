//! This module defines the `LocalStore`, the key-value backed record store.
//!
//! Each collection (scans, reports) is one serialized array under a named key.
//! Every operation loads the whole collection, and every mutation writes it
//! back. Identifiers are millisecond timestamps, bumped when needed so they
//! strictly increase within a store.

mod kv_db;
mod schemas;

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};

pub use kv_db::DiskBasedDb;
pub use kv_db::KvDbOps;
pub use schemas::{StoredNetwork, StoredScan, REPORTS_KEY, SCANS_KEY};

use crate::data_provider::ScanSource;
use crate::error::{Result, StoreError};
use crate::model::{
    Issue, IssueId, IssuePatch, Network, NetworkId, NetworkPatch, NewIssue,
    NewNetwork, NewReport, NewScan, Report, ReportId, Scan, ScanDetail, ScanId,
    ScanPatch,
};
use crate::report::{self, ReportRequest};

/// The local variant of the record store.
pub struct LocalStore<Db> {
    data_db: Db,
    last_id: AtomicI64,
}

impl<Db> LocalStore<Db>
where
    Db: KvDbOps,
{
    /// Creates a new `LocalStore` over the given database.
    ///
    /// Missing collections are initialised empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read or written.
    pub fn new(data_db: Db) -> Result<Self> {
        let store = LocalStore { data_db, last_id: AtomicI64::new(0) };
        store.initialize_if_empty()?;

        let last_id = store
            .load_scans()?
            .iter()
            .map(StoredScan::max_id)
            .chain(store.load_reports()?.iter().map(|r| r.id))
            .max()
            .unwrap_or(0);
        store.last_id.store(last_id, Ordering::SeqCst);

        Ok(store)
    }

    /// Writes empty collections for keys that hold nothing yet.
    pub fn initialize_if_empty(&self) -> Result<()> {
        if self.data_db.add(SCANS_KEY, &Vec::<StoredScan>::new())? {
            info!("Scan collection initialised");
        }
        if self.data_db.add(REPORTS_KEY, &Vec::<Report>::new())? {
            info!("Report collection initialised");
        }
        Ok(())
    }

    fn next_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }

    fn load_scans(&self) -> Result<Vec<StoredScan>> {
        match self.data_db.read::<Vec<StoredScan>>(SCANS_KEY) {
            Ok(scans) => Ok(scans.unwrap_or_default()),
            Err(e) if e.downcast_ref::<serde_json::Error>().is_some() => {
                warn!("Stored scans are unreadable, using an empty list: {}", e);
                Ok(Vec::new())
            }
            Err(e) => {
                error!("Failed to load scans: {}", e);
                Err(e)
            }
        }
    }

    fn save_scans(&self, scans: &Vec<StoredScan>) -> Result<()> {
        self.data_db.update(SCANS_KEY, scans)
    }

    fn load_reports(&self) -> Result<Vec<Report>> {
        match self.data_db.read::<Vec<Report>>(REPORTS_KEY) {
            Ok(reports) => Ok(reports.unwrap_or_default()),
            Err(e) if e.downcast_ref::<serde_json::Error>().is_some() => {
                warn!("Stored reports are unreadable, using an empty list: {}", e);
                Ok(Vec::new())
            }
            Err(e) => {
                error!("Failed to load reports: {}", e);
                Err(e)
            }
        }
    }

    fn save_reports(&self, reports: &Vec<Report>) -> Result<()> {
        self.data_db.update(REPORTS_KEY, reports)
    }

    /// Loads scans, applies `f` to the scan with `scan_id` and persists the
    /// collection if `f` reports a change.
    fn modify_scan<T, F>(&self, scan_id: ScanId, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut StoredScan) -> Result<Option<T>>,
    {
        let mut scans = self.load_scans()?;
        let Some(scan) = scans.iter_mut().find(|s| s.scan.id == scan_id) else {
            info!("Scan {} not found", scan_id);
            return Ok(None);
        };

        let result = f(scan)?;
        if result.is_some() {
            self.save_scans(&scans)?;
        }
        Ok(result)
    }

    // --- scans ---

    /// All scans in insertion order.
    pub fn list_scans(&self) -> Result<Vec<ScanDetail>> {
        Ok(self.load_scans()?.iter().map(StoredScan::to_detail).collect())
    }

    pub fn get_scan(&self, id: ScanId) -> Result<Option<ScanDetail>> {
        Ok(self
            .load_scans()?
            .iter()
            .find(|s| s.scan.id == id)
            .map(StoredScan::to_detail))
    }

    pub fn create_scan(&self, new_scan: NewScan) -> Result<ScanDetail> {
        new_scan.validate()?;

        let mut scans = self.load_scans()?;
        let scan = new_scan.into_scan(self.next_id(), Utc::now());
        let stored = StoredScan::new(scan);
        let detail = stored.to_detail();

        scans.push(stored);
        self.save_scans(&scans)?;

        info!("Scan {} created", detail.id());
        Ok(detail)
    }

    pub fn update_scan(
        &self, id: ScanId, patch: ScanPatch,
    ) -> Result<Option<ScanDetail>> {
        patch.validate()?;

        let updated = self.modify_scan(id, |stored| {
            patch.apply(&mut stored.scan);
            Ok(Some(stored.to_detail()))
        })?;

        if updated.is_some() {
            info!("Scan {} updated", id);
        }
        Ok(updated)
    }

    /// Removes a scan and every report generated from it.
    ///
    /// Reports are written first, so a failed write never leaves reports
    /// pointing at a scan that is gone.
    ///
    /// # Returns
    ///
    /// `true` if a scan was removed.
    pub fn delete_scan(&self, id: ScanId) -> Result<bool> {
        let mut scans = self.load_scans()?;
        let before = scans.len();
        scans.retain(|s| s.scan.id != id);

        if scans.len() == before {
            info!("Scan {} not found, nothing deleted", id);
            return Ok(false);
        }

        let mut reports = self.load_reports()?;
        let reports_before = reports.len();
        reports.retain(|r| r.scan_id != id);
        if reports.len() != reports_before {
            self.save_reports(&reports)?;
        }
        self.save_scans(&scans)?;

        info!(
            "Scan {} deleted with {} dependent reports",
            id,
            reports_before - reports.len()
        );
        Ok(true)
    }

    // --- networks ---

    pub fn list_networks(&self, scan_id: ScanId) -> Result<Vec<Network>> {
        Ok(self
            .load_scans()?
            .iter()
            .find(|s| s.scan.id == scan_id)
            .map(StoredScan::networks)
            .unwrap_or_default())
    }

    /// Adds a network to a scan. Returns `None` if the scan does not exist.
    pub fn add_network(
        &self, scan_id: ScanId, new_network: NewNetwork,
    ) -> Result<Option<Network>> {
        new_network.validate()?;
        let id = self.next_id();

        let network = self.modify_scan(scan_id, |stored| {
            let network = new_network.into_network(id, scan_id, Utc::now())?;
            stored.networks.push(StoredNetwork::from_network(&network));
            Ok(Some(network))
        })?;

        if let Some(network) = &network {
            info!("Network {} added to scan {}", network.id, scan_id);
        }
        Ok(network)
    }

    pub fn update_network(
        &self, scan_id: ScanId, network_id: NetworkId, patch: NetworkPatch,
    ) -> Result<Option<Network>> {
        patch.validate()?;

        self.modify_scan(scan_id, |stored| {
            let Some(slot) = stored.networks.iter_mut().find(|n| n.id == network_id)
            else {
                info!("Network {} not found in scan {}", network_id, scan_id);
                return Ok(None);
            };

            let mut network = slot.to_network(scan_id);
            patch.apply(&mut network);
            *slot = StoredNetwork::from_network(&network);
            Ok(Some(network))
        })
    }

    pub fn delete_network(
        &self, scan_id: ScanId, network_id: NetworkId,
    ) -> Result<bool> {
        let removed = self.modify_scan(scan_id, |stored| {
            let before = stored.networks.len();
            stored.networks.retain(|n| n.id != network_id);
            Ok((stored.networks.len() != before).then_some(()))
        })?;
        Ok(removed.is_some())
    }

    // --- issues ---

    /// Adds an issue to a scan. Returns `None` if the scan does not exist.
    pub fn add_issue(
        &self, scan_id: ScanId, new_issue: NewIssue,
    ) -> Result<Option<Issue>> {
        new_issue.validate()?;
        let id = self.next_id();

        let issue = self.modify_scan(scan_id, |stored| {
            if let Some(network_id) = new_issue.network_id {
                if !stored.networks.iter().any(|n| n.id == network_id) {
                    return Err(StoreError::not_found("network", network_id).into());
                }
            }
            let issue = new_issue.into_issue(id, scan_id, Utc::now());
            stored.issues.push(issue.clone());
            Ok(Some(issue))
        })?;

        if let Some(issue) = &issue {
            info!("Issue {} added to scan {}", issue.id, scan_id);
        }
        Ok(issue)
    }

    pub fn update_issue(
        &self, scan_id: ScanId, issue_id: IssueId, patch: IssuePatch,
    ) -> Result<Option<Issue>> {
        patch.validate()?;

        self.modify_scan(scan_id, |stored| {
            let Some(issue) = stored.issues.iter_mut().find(|i| i.id == issue_id)
            else {
                info!("Issue {} not found in scan {}", issue_id, scan_id);
                return Ok(None);
            };
            patch.apply(issue);
            Ok(Some(issue.clone()))
        })
    }

    pub fn delete_issue(&self, scan_id: ScanId, issue_id: IssueId) -> Result<bool> {
        let removed = self.modify_scan(scan_id, |stored| {
            let before = stored.issues.len();
            stored.issues.retain(|i| i.id != issue_id);
            Ok((stored.issues.len() != before).then_some(()))
        })?;
        Ok(removed.is_some())
    }

    // --- reports ---

    pub fn list_reports(&self) -> Result<Vec<Report>> {
        self.load_reports()
    }

    pub fn get_report(&self, id: ReportId) -> Result<Option<Report>> {
        Ok(self.load_reports()?.into_iter().find(|r| r.id == id))
    }

    /// Stores a report. Returns `None` if its parent scan does not exist.
    pub fn create_report(&self, new_report: NewReport) -> Result<Option<Report>> {
        new_report.validate()?;

        if !self.load_scans()?.iter().any(|s| s.scan.id == new_report.scan_id) {
            info!("Scan {} not found, report not created", new_report.scan_id);
            return Ok(None);
        }

        let mut reports = self.load_reports()?;
        let report = new_report.into_report(self.next_id(), Utc::now());
        reports.push(report.clone());
        self.save_reports(&reports)?;

        info!("Report {} created for scan {}", report.id, report.scan_id);
        Ok(Some(report))
    }

    /// Generates a report from the current snapshot of a completed scan and
    /// stores it.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the scan does not exist,
    /// `StoreError::Validation` if it is not complete.
    pub fn generate_report(
        &self, scan_id: ScanId, request: ReportRequest,
    ) -> Result<Report> {
        let detail = self
            .get_scan(scan_id)?
            .ok_or(StoreError::not_found("scan", scan_id))?;
        let new_report = report::build(&detail, request, Utc::now())?;

        self.create_report(new_report)?
            .ok_or_else(|| StoreError::not_found("scan", scan_id).into())
    }

    pub fn delete_report(&self, id: ReportId) -> Result<bool> {
        let mut reports = self.load_reports()?;
        let before = reports.len();
        reports.retain(|r| r.id != id);

        if reports.len() == before {
            return Ok(false);
        }
        self.save_reports(&reports)?;
        info!("Report {} deleted", id);
        Ok(true)
    }
}

#[async_trait]
impl<Db> ScanSource for LocalStore<Db>
where
    Db: KvDbOps,
{
    /// Scans are stored oldest first; the provider wants them newest first.
    async fn list_scans(&self) -> Result<Vec<Scan>> {
        let mut scans: Vec<Scan> = LocalStore::list_scans(self)?
            .into_iter()
            .map(|detail| detail.scan)
            .collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(scans)
    }

    async fn complete_scan(&self, id: ScanId) -> Result<Option<ScanDetail>> {
        self.get_scan(id)
    }
}
