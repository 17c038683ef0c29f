//! cfdi-lab - an interactive SQL lab client for the CFDI playground backend.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use cfdi_lab::api::LabApi;
use cfdi_lab::cli::Cli;
use cfdi_lab::config::Config;
use cfdi_lab::connectivity::{self, ConnectivityState};
use cfdi_lab::error::Result;
use cfdi_lab::logging::{self, LogTarget};
use cfdi_lab::persistence::{MemoryPreferenceStore, PreferenceStore, StateDb};
use cfdi_lab::query::QueryExecutor;
use cfdi_lab::session::SessionController;
use cfdi_lab::shell::{self, Shell, ShellOptions};
use cfdi_lab::transport::{HttpTransport, MockTransport, Transport};
use tokio::io::BufReader;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let target = if cli.is_one_shot() {
        LogTarget::Stderr
    } else {
        LogTarget::File
    };
    logging::init(target);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

/// Returns the process exit code.
async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    // Precedence: CLI arguments, then environment, then config file.
    cli.apply_to(&mut config);
    config.apply_env_defaults();

    let settings = config.api.resolve(config.environment)?;
    if let Some(warning) = &settings.warning {
        eprintln!("Warning: {warning}");
    }

    let transport: Arc<dyn Transport> = if cli.mock_backend {
        info!("Using the in-memory sample backend");
        Arc::new(MockTransport::lab_fixture())
    } else {
        Arc::new(HttpTransport::new(
            settings.base_url.clone(),
            settings.timeout,
        )?)
    };
    let api = LabApi::new(transport);

    let monitor = connectivity::start(api.clone(), settings.health_interval, |state| {
        debug!("Connectivity callback: {}", state);
    });
    let prefs = open_preferences(&config).await;
    let controller =
        SessionController::restore(QueryExecutor::new(api), monitor.subscribe(), prefs).await;

    if let Some(sql) = &cli.exec {
        let mut rx = monitor.subscribe();
        let _ = rx.wait_for(|s| *s != ConnectivityState::Checking).await;
        let (text, ok) = shell::run_statement(&controller, sql, cli.export.as_deref()).await;
        println!("{text}");
        monitor.cancel();
        return Ok(if ok { 0 } else { 1 });
    }

    let options = ShellOptions {
        export_dir: cli.export.clone().unwrap_or_else(|| PathBuf::from(".")),
        environment: config.environment,
        prompt: std::io::stdin().is_terminal(),
    };
    let mut shell = Shell::new(controller, monitor, options);
    let mut stdout = tokio::io::stdout();
    shell
        .run(BufReader::new(tokio::io::stdin()), &mut stdout)
        .await?;

    Ok(0)
}

/// Opens the state database, falling back to in-memory preferences.
async fn open_preferences(config: &Config) -> Arc<dyn PreferenceStore> {
    let path = match config.state_db.clone().map(Ok).unwrap_or_else(StateDb::default_path) {
        Ok(path) => path,
        Err(e) => {
            warn!("{}; preferences will not be saved", e);
            return Arc::new(MemoryPreferenceStore::new());
        }
    };

    match StateDb::open(&path).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            warn!("{}; preferences will not be saved", e);
            Arc::new(MemoryPreferenceStore::new())
        }
    }
}
