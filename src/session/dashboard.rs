//! Cached dashboard statistics keyed by the session refresh epoch.

use tracing::debug;

use super::controller::SessionController;
use crate::api::DashboardStats;
use crate::error::ExecutionError;

/// Fetches dashboard statistics, re-fetching only after the dataset changed.
pub struct DashboardFeed {
    controller: SessionController,
    fetched_epoch: Option<u64>,
    stats: Option<DashboardStats>,
}

impl DashboardFeed {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            fetched_epoch: None,
            stats: None,
        }
    }

    /// Returns true if the cached stats predate the current refresh epoch.
    pub fn is_stale(&self) -> bool {
        self.fetched_epoch != Some(self.controller.snapshot().refresh_epoch)
    }

    /// Returns current statistics, fetching them if stale.
    pub async fn stats(&mut self) -> Result<&DashboardStats, ExecutionError> {
        let epoch = self.controller.snapshot().refresh_epoch;
        if self.fetched_epoch != Some(epoch) || self.stats.is_none() {
            debug!(epoch, "fetching dashboard stats");
            let fresh = self.controller.dashboard().await?;
            self.fetched_epoch = Some(epoch);
            self.stats = Some(fresh);
        }
        self.stats
            .as_ref()
            .ok_or_else(|| ExecutionError::unknown("Dashboard statistics unavailable"))
    }

    /// Drops the cache so the next read fetches again. Called when the
    /// backend comes back, since the data may have changed meanwhile.
    pub fn invalidate(&mut self) {
        self.fetched_epoch = None;
    }
}
