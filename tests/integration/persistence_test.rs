//! Preference storage across sessions.

use std::sync::Arc;

use cfdi_lab::connectivity::ConnectivityState;
use cfdi_lab::persistence::{PreferenceStore, StateDb};
use cfdi_lab::session::{ActiveView, VIEW_PREFERENCE_KEY};
use cfdi_lab::transport::MockTransport;
use tempfile::tempdir;

use super::common::Lab;

#[tokio::test]
async fn test_active_view_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let db = StateDb::open(&path).await.unwrap();
        let lab = Lab::start(MockTransport::lab_fixture(), Arc::new(db)).await;
        lab.wait_for(ConnectivityState::Online).await;
        lab.controller.set_view(ActiveView::Dashboard).await;
    }

    let db = StateDb::open(&path).await.unwrap();
    assert_eq!(
        db.get(VIEW_PREFERENCE_KEY).await.unwrap().as_deref(),
        Some("dashboard")
    );

    let lab = Lab::start(MockTransport::lab_fixture(), Arc::new(db)).await;
    assert_eq!(lab.controller.snapshot().active_view, ActiveView::Dashboard);
}

#[tokio::test]
async fn test_unknown_saved_view_falls_back_to_default() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");

    let db = StateDb::open(&path).await.unwrap();
    db.set(VIEW_PREFERENCE_KEY, "reports").await.unwrap();

    let lab = Lab::start(MockTransport::lab_fixture(), Arc::new(db)).await;
    assert_eq!(lab.controller.snapshot().active_view, ActiveView::Learning);
}

#[tokio::test]
async fn test_fresh_database_uses_default_view() {
    let dir = tempdir().unwrap();
    let db = StateDb::open(&dir.path().join("nested").join("state.db"))
        .await
        .unwrap();

    let lab = Lab::start(MockTransport::lab_fixture(), Arc::new(db)).await;
    assert_eq!(lab.controller.snapshot().active_view, ActiveView::default());
}
