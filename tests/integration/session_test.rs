//! Session controller behavior against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use cfdi_lab::api::{endpoints, SeedScale, Value};
use cfdi_lab::connectivity::ConnectivityState;
use cfdi_lab::error::ErrorKind;
use cfdi_lab::persistence::MemoryPreferenceStore;
use cfdi_lab::query::OFFLINE_MESSAGE;
use cfdi_lab::session::{RunOutcome, SeedOutcome, SEED_FOLLOW_UP_SQL};
use cfdi_lab::transport::{Method, MockTransport, Reply};
use serde_json::json;

use super::common::Lab;

async fn online_lab() -> Lab {
    let lab = Lab::start(
        MockTransport::lab_fixture(),
        Arc::new(MemoryPreferenceStore::new()),
    )
    .await;
    lab.wait_for(ConnectivityState::Online).await;
    lab
}

#[tokio::test(start_paused = true)]
async fn test_offline_query_never_reaches_backend() {
    let mock = MockTransport::lab_fixture();
    mock.set_offline(true);
    let lab = Lab::start(mock, Arc::new(MemoryPreferenceStore::new())).await;
    lab.wait_for(ConnectivityState::Offline).await;

    let outcome = lab.controller.run_query("SELECT 1").await;

    assert_eq!(outcome, RunOutcome::Blocked);
    assert!(lab.mock.executed_sql().is_empty());
    let state = lab.controller.snapshot();
    let err = state.current_error.expect("blocked query records an error");
    assert_eq!(err.message(), OFFLINE_MESSAGE);
    assert!(!state.is_executing);
}

#[tokio::test(start_paused = true)]
async fn test_successful_query_replaces_result() {
    let lab = online_lab().await;

    let outcome = lab
        .controller
        .run_query("SELECT * FROM cfdi_comprobantes LIMIT 3")
        .await;

    assert_eq!(outcome, RunOutcome::Succeeded);
    let state = lab.controller.snapshot();
    assert!(state.current_error.is_none());
    assert!(!state.is_executing);
    assert_eq!(state.current_result.row_count, 3);
    assert_eq!(
        state.current_result.columns,
        vec!["uuid", "serie", "folio", "total", "estatus_sat"]
    );
    assert_eq!(
        state.current_result.value(0, "uuid"),
        &Value::String("6F1A2C3D-0001".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_statement_keeps_previous_rows() {
    let lab = online_lab().await;
    lab.controller.run_query("SELECT * FROM cfdi_comprobantes").await;

    let outcome = lab.controller.run_query("DELETE FROM cfdi_comprobantes").await;

    let RunOutcome::Failed(err) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(err.kind(), ErrorKind::ServerError);
    let state = lab.controller.snapshot();
    assert_eq!(state.current_result.row_count, 3);
    assert_eq!(state.current_error, Some(err));
}

#[tokio::test(start_paused = true)]
async fn test_seed_refreshes_count_once() {
    let lab = online_lab().await;
    let epoch = lab.controller.snapshot().refresh_epoch;

    let outcome = lab.controller.seed_and_refresh(SeedScale::Large).await;

    assert!(matches!(
        outcome,
        SeedOutcome::Seeded {
            follow_up: RunOutcome::Succeeded,
            ..
        }
    ));
    assert_eq!(lab.mock.call_count(endpoints::SEED), 1);
    assert_eq!(lab.mock.executed_sql(), vec![SEED_FOLLOW_UP_SQL.to_string()]);

    let state = lab.controller.snapshot();
    assert_eq!(state.refresh_epoch, epoch + 1);
    assert_eq!(
        state.current_result.value(0, "total_comprobantes"),
        &Value::Int(10_000)
    );
}

#[tokio::test(start_paused = true)]
async fn test_newer_query_supersedes_slow_one() {
    let mock = MockTransport::lab_fixture();
    mock.once_delayed(
        Method::Post,
        endpoints::RUN,
        Reply::Json(json!({
            "columns": ["stale"],
            "rows": [{"stale": 1}],
            "row_count": 1,
            "elapsed_ms": 5
        })),
        Duration::from_secs(3),
    );
    let lab = Lab::start(mock, Arc::new(MemoryPreferenceStore::new())).await;
    lab.wait_for(ConnectivityState::Online).await;

    let slow = {
        let controller = lab.controller.clone();
        tokio::spawn(async move { controller.run_query("SELECT 'slow'").await })
    };
    lab.controller
        .subscribe()
        .wait_for(|s| s.is_executing)
        .await
        .unwrap();

    let fast = lab.controller.run_query("SELECT * FROM cfdi_comprobantes").await;

    assert_eq!(fast, RunOutcome::Succeeded);
    assert_eq!(slow.await.unwrap(), RunOutcome::Superseded);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let state = lab.controller.snapshot();
    assert_eq!(state.current_result.row_count, 3);
    assert!(!state.current_result.columns.contains(&"stale".to_string()));
    assert!(!state.is_executing);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_after_backend_returns() {
    let mock = MockTransport::lab_fixture();
    mock.set_offline(true);
    let lab = Lab::start(mock, Arc::new(MemoryPreferenceStore::new())).await;
    lab.wait_for(ConnectivityState::Offline).await;
    assert_eq!(lab.controller.run_query("SELECT 1").await, RunOutcome::Blocked);

    lab.mock.set_offline(false);
    lab.monitor.probe_now();
    lab.wait_for(ConnectivityState::Online).await;

    let outcome = lab.controller.run_query("SELECT * FROM cfdi_comprobantes").await;
    assert_eq!(outcome, RunOutcome::Succeeded);
    assert!(lab.controller.snapshot().current_error.is_none());
}
