//! Shared dashboard state: the scan list plus a small cache of fully joined
//! scans, loaded from whichever record store was configured.
//!
//! Nothing refreshes in the background. Views call [`DataProvider::refresh`]
//! when they need fresh data.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, error, info, warn};

use crate::analytics::{self, DashboardSummary, NetworkStats, SeriesPoint};
use crate::error::Result;
use crate::model::{Scan, ScanDetail, ScanId};

#[cfg(test)]
use mockall::automock;

/// Number of complete scans kept in memory.
pub const CACHE_CAPACITY: usize = 5;

/// Read side of a record store, as seen by the provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScanSource: Send + Sync + 'static {
    /// All scans, newest first.
    async fn list_scans(&self) -> Result<Vec<Scan>>;

    /// A scan joined with its child records, `None` if it does not exist.
    async fn complete_scan(&self, id: ScanId) -> Result<Option<ScanDetail>>;
}

#[derive(Default)]
struct ProviderState {
    scans: Vec<Scan>,
    // most recently inserted first
    complete: VecDeque<ScanDetail>,
}

impl ProviderState {
    fn cached(&self, id: ScanId) -> Option<ScanDetail> {
        self.complete.iter().find(|d| d.id() == id).cloned()
    }

    fn insert(&mut self, detail: ScanDetail) {
        self.complete.retain(|d| d.id() != detail.id());
        self.complete.push_front(detail);
        self.complete.truncate(CACHE_CAPACITY);
    }
}

pub struct DataProvider<S> {
    source: S,
    state: Mutex<ProviderState>,
}

impl<S> DataProvider<S>
where
    S: ScanSource,
{
    /// Builds the provider and performs its initial load.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan list cannot be loaded.
    pub async fn activate(source: S) -> Result<Self> {
        let provider =
            DataProvider { source, state: Mutex::new(ProviderState::default()) };
        provider.refresh().await?;
        Ok(provider)
    }

    fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reloads the scan list and the complete scans of the newest
    /// [`CACHE_CAPACITY`] entries. The recent scans are fetched concurrently;
    /// a scan that fails to load is logged and left out of the cache.
    ///
    /// # Errors
    ///
    /// Returns an error, keeping the previous state, if the scan list cannot
    /// be loaded.
    pub async fn refresh(&self) -> Result<()> {
        let scans = self.source.list_scans().await.map_err(|e| {
            error!("Failed to refresh scans: {:#}", e);
            e
        })?;

        let recent: Vec<ScanId> =
            scans.iter().take(CACHE_CAPACITY).map(|s| s.id).collect();
        let results =
            join_all(recent.iter().map(|id| self.source.complete_scan(*id))).await;

        let mut complete = VecDeque::with_capacity(CACHE_CAPACITY);
        for (id, result) in recent.iter().zip(results) {
            match result {
                Ok(Some(detail)) => complete.push_back(detail),
                Ok(None) => warn!("Scan {} disappeared during refresh", id),
                Err(e) => error!("Failed to load scan {}: {:#}", id, e),
            }
        }

        info!("Loaded {} scans, {} cached in full", scans.len(), complete.len());
        let mut state = self.state();
        state.scans = scans;
        state.complete = complete;
        Ok(())
    }

    /// Returns a complete scan from the cache, or fetches and caches it.
    pub async fn get_complete(&self, id: ScanId) -> Result<Option<ScanDetail>> {
        let cached = self.state().cached(id);
        if let Some(detail) = cached {
            debug!("Scan {} served from cache", id);
            return Ok(Some(detail));
        }

        let Some(detail) = self.source.complete_scan(id).await? else {
            info!("Scan {} not found", id);
            return Ok(None);
        };
        self.state().insert(detail.clone());
        Ok(Some(detail))
    }

    pub async fn get_stats(&self, id: ScanId) -> Result<Option<NetworkStats>> {
        Ok(self
            .get_complete(id)
            .await?
            .and_then(|detail| analytics::network_stats(&detail.networks)))
    }

    /// The scan list as of the last refresh, newest first.
    pub fn scans(&self) -> Vec<Scan> {
        self.state().scans.clone()
    }

    pub fn recent_scans(&self, count: usize) -> Vec<Scan> {
        self.state().scans.iter().take(count).cloned().collect()
    }

    pub fn complete_scans(&self) -> Vec<ScanDetail> {
        self.state().complete.iter().cloned().collect()
    }

    /// Dashboard figures. Scan totals come from the full list; network and
    /// issue figures from the cached complete scans.
    pub fn dashboard(&self) -> DashboardSummary {
        let state = self.state();
        let complete: Vec<ScanDetail> = state.complete.iter().cloned().collect();

        let mut summary = analytics::dashboard_summary(&complete);
        summary.total_scans = state.scans.len();
        summary.last_scan_at = state.scans.iter().map(|s| s.created_at).max();
        summary
    }

    pub fn time_series(&self, points: usize) -> Vec<SeriesPoint> {
        let state = self.state();
        let complete: Vec<ScanDetail> = state.complete.iter().cloned().collect();
        analytics::time_series(&complete, points)
    }
}
