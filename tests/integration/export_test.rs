//! CSV export of live query results.

use std::sync::Arc;

use cfdi_lab::connectivity::ConnectivityState;
use cfdi_lab::export;
use cfdi_lab::persistence::MemoryPreferenceStore;
use cfdi_lab::transport::MockTransport;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use super::common::Lab;

#[tokio::test(start_paused = true)]
async fn test_export_query_result_to_file() {
    let lab = Lab::start(
        MockTransport::lab_fixture(),
        Arc::new(MemoryPreferenceStore::new()),
    )
    .await;
    lab.wait_for(ConnectivityState::Online).await;
    lab.controller.run_query("SELECT * FROM cfdi_comprobantes").await;

    let state = lab.controller.snapshot();
    let artifact = export::export(&state.current_result).expect("rows to export");
    assert!(artifact.file_name.starts_with("results_"));
    assert!(artifact.file_name.ends_with(".csv"));

    let dir = tempdir().unwrap();
    let path = artifact.write_to(dir.path()).unwrap();
    let written = std::fs::read_to_string(path).unwrap();

    assert_eq!(
        written,
        "uuid,serie,folio,total,estatus_sat\n\
         6F1A2C3D-0001,F,1001,1160,Vigente\n\
         6F1A2C3D-0002,F,1002,2320.5,Cancelado\n\
         6F1A2C3D-0003,,1003,87,Vigente"
    );
}

#[tokio::test(start_paused = true)]
async fn test_nothing_to_export_before_first_query() {
    let lab = Lab::start(
        MockTransport::lab_fixture(),
        Arc::new(MemoryPreferenceStore::new()),
    )
    .await;

    assert!(export::export(&lab.controller.snapshot().current_result).is_none());
}
