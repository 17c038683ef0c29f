//! Shared fixtures.

use std::sync::Arc;
use std::time::Duration;

use cfdi_lab::api::LabApi;
use cfdi_lab::connectivity::{self, ConnectivityState, MonitorHandle};
use cfdi_lab::persistence::PreferenceStore;
use cfdi_lab::query::QueryExecutor;
use cfdi_lab::session::SessionController;
use cfdi_lab::transport::{MockTransport, Transport};

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// A controller wired to a live monitor over `mock`.
pub struct Lab {
    pub mock: Arc<MockTransport>,
    pub monitor: MonitorHandle,
    pub controller: SessionController,
}

impl Lab {
    pub async fn start(mock: MockTransport, prefs: Arc<dyn PreferenceStore>) -> Self {
        let mock = Arc::new(mock);
        let api = LabApi::new(Arc::clone(&mock) as Arc<dyn Transport>);
        let monitor = connectivity::start(api.clone(), POLL_INTERVAL, |_| {});
        let controller =
            SessionController::restore(QueryExecutor::new(api), monitor.subscribe(), prefs).await;
        Self {
            mock,
            monitor,
            controller,
        }
    }

    /// Waits until the monitor reports `state`.
    pub async fn wait_for(&self, state: ConnectivityState) {
        self.monitor
            .subscribe()
            .wait_for(|s| *s == state)
            .await
            .unwrap();
    }
}
