//! End-to-end shell sessions over scripted input.

use std::sync::Arc;
use std::time::Duration;

use cfdi_lab::api::{endpoints, LabApi};
use cfdi_lab::config::Environment;
use cfdi_lab::connectivity;
use cfdi_lab::persistence::MemoryPreferenceStore;
use cfdi_lab::query::QueryExecutor;
use cfdi_lab::session::SessionController;
use cfdi_lab::shell::{Shell, ShellOptions};
use cfdi_lab::transport::{Method, MockTransport, Reply, Transport};
use serde_json::json;
use tempfile::tempdir;
use tokio::io::{AsyncWriteExt, BufReader};

use super::common::POLL_INTERVAL;

fn lab_shell(mock: Arc<MockTransport>, options: ShellOptions) -> Shell {
    let api = LabApi::new(Arc::clone(&mock) as Arc<dyn Transport>);
    let monitor = connectivity::start(api.clone(), POLL_INTERVAL, |_| {});
    let controller = SessionController::new(
        QueryExecutor::new(api),
        monitor.subscribe(),
        Arc::new(MemoryPreferenceStore::new()),
    );

    Shell::new(controller, monitor, options)
}

async fn run_session(mock: Arc<MockTransport>, options: ShellOptions, script: &str) -> String {
    let mut shell = lab_shell(mock, options);
    let mut output = Vec::new();
    shell.run(script.as_bytes(), &mut output).await.unwrap();
    String::from_utf8(output).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_query_renders_grid() {
    let mock = Arc::new(MockTransport::lab_fixture());

    let output = run_session(
        Arc::clone(&mock),
        ShellOptions::default(),
        "SELECT uuid, total FROM cfdi_comprobantes\n",
    )
    .await;

    assert!(output.contains("[BACKEND ONLINE]"), "{output}");
    assert!(output.contains("Learning Hub"), "{output}");
    assert!(output.contains("6F1A2C3D-0001"), "{output}");
    assert!(output.contains("(3 rows,"), "{output}");
    assert_eq!(
        mock.executed_sql(),
        vec!["SELECT uuid, total FROM cfdi_comprobantes".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_offline_backend_shows_overlay() {
    let mock = Arc::new(MockTransport::lab_fixture());
    mock.set_offline(true);

    let output = run_session(
        Arc::clone(&mock),
        ShellOptions::default(),
        "SELECT 1\n/quit\nSELECT 2\n",
    )
    .await;

    assert!(output.contains("[BACKEND OFFLINE]"), "{output}");
    assert!(output.contains("Backend Connection Failed"), "{output}");
    assert!(output.contains("uvicorn"), "{output}");
    assert!(output.contains("Cannot execute query"), "{output}");
    assert!(mock.executed_sql().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_production_overlay_omits_local_hint() {
    let mock = Arc::new(MockTransport::lab_fixture());
    mock.set_offline(true);
    let options = ShellOptions {
        environment: Environment::Production,
        ..ShellOptions::default()
    };

    let output = run_session(mock, options, "").await;

    assert!(output.contains("Backend Connection Failed"), "{output}");
    assert!(!output.contains("uvicorn"), "{output}");
}

#[tokio::test(start_paused = true)]
async fn test_quit_stops_reading() {
    let mock = Arc::new(MockTransport::lab_fixture());

    run_session(
        Arc::clone(&mock),
        ShellOptions::default(),
        "SELECT 1\n/quit\nSELECT 2\n",
    )
    .await;

    assert_eq!(mock.executed_sql(), vec!["SELECT 1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_export_writes_csv() {
    let dir = tempdir().unwrap();
    let mock = Arc::new(MockTransport::lab_fixture());
    let options = ShellOptions {
        export_dir: dir.path().to_path_buf(),
        ..ShellOptions::default()
    };

    let output = run_session(
        mock,
        options,
        "/export\nSELECT * FROM cfdi_comprobantes\n/export\n",
    )
    .await;

    assert!(output.contains("Nothing to export"), "{output}");
    assert!(output.contains("Exported 3 rows to"), "{output}");

    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let csv = std::fs::read_to_string(&files[0]).unwrap();
    assert!(csv.starts_with("uuid,serie,folio,total,estatus_sat\n"));
}

#[tokio::test(start_paused = true)]
async fn test_seed_then_dashboard() {
    let mock = Arc::new(MockTransport::lab_fixture());

    let output = run_session(
        Arc::clone(&mock),
        ShellOptions::default(),
        "/dashboard\n/seed medium\n",
    )
    .await;

    assert!(output.contains("Seeded medium dataset."), "{output}");
    assert!(output.contains("2000"), "{output}");
    assert_eq!(mock.call_count(endpoints::SEED), 1);
    assert_eq!(mock.call_count(endpoints::DASHBOARD), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_command_is_reported() {
    let output = run_session(
        Arc::new(MockTransport::lab_fixture()),
        ShellOptions::default(),
        "/frobnicate\n",
    )
    .await;

    assert!(output.contains("Unknown command: /frobnicate"), "{output}");
}

#[tokio::test(start_paused = true)]
async fn test_running_statement_does_not_block_input() {
    let mock = Arc::new(MockTransport::lab_fixture());
    mock.once_delayed(
        Method::Post,
        endpoints::RUN,
        Reply::Json(json!({
            "columns": ["stale"],
            "rows": [{"stale": 1}],
            "row_count": 1,
            "elapsed_ms": 1
        })),
        Duration::from_secs(6),
    );
    let mut shell = lab_shell(Arc::clone(&mock), ShellOptions::default());

    let (mut client, server) = tokio::io::duplex(1024);
    let typist = async move {
        client.write_all(b"SELECT 'slow'\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        client.write_all(b"/status\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        client
            .write_all(b"SELECT * FROM cfdi_comprobantes\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    };
    let mut output = Vec::new();
    let (result, ()) = tokio::join!(shell.run(BufReader::new(server), &mut output), typist);
    result.unwrap();
    let output = String::from_utf8(output).unwrap();

    let executing = output.find("Executing:     yes").expect(&output);
    let superseded = output.find("Query superseded by a newer one.").expect(&output);
    let grid = output.find("(3 rows,").expect(&output);
    assert!(executing < superseded && superseded < grid, "{output}");
    assert!(!output.contains("stale"), "{output}");
    assert_eq!(mock.executed_sql().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_refreshes_dashboard() {
    let mock = Arc::new(MockTransport::lab_fixture());
    let mut shell = lab_shell(Arc::clone(&mock), ShellOptions::default());

    let backend = Arc::clone(&mock);
    let (mut client, server) = tokio::io::duplex(1024);
    let typist = async move {
        client.write_all(b"/dashboard\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        backend.set_offline(true);
        // The next scheduled probe, at t = 10, sees the outage.
        tokio::time::sleep(Duration::from_secs(10)).await;
        backend.set_offline(false);
        client.write_all(b"/retry\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        client.write_all(b"/dashboard\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    };
    let mut output = Vec::new();
    let (result, ()) = tokio::join!(shell.run(BufReader::new(server), &mut output), typist);
    result.unwrap();
    let output = String::from_utf8(output).unwrap();

    assert!(output.contains("[BACKEND OFFLINE]"), "{output}");
    assert_eq!(output.matches("[BACKEND ONLINE]").count(), 2, "{output}");
    // Initial fetch, then one fresh fetch after reconnecting; the last
    // /dashboard is served from the refreshed cache.
    assert_eq!(mock.call_count(endpoints::DASHBOARD), 2);
}
