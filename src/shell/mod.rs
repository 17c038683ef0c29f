//! Line-oriented interactive shell.
//!
//! Reads one command per line, drives the session controller, and prints
//! results as text. A running statement does not block input: the read loop
//! keeps accepting commands and reporting connectivity changes, and a new
//! statement replaces the running one.

pub mod command;
pub mod render;

pub use command::{Command, CommandRouter, HELP_TEXT};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::Environment;
use crate::connectivity::{ConnectivityState, MonitorHandle};
use crate::error::{LabError, Result};
use crate::export;
use crate::session::{ActiveView, DashboardFeed, RunOutcome, SeedOutcome, SessionController};

const PROMPT: &str = "cfdi-lab> ";
const SUPERSEDED: &str = "Query superseded by a newer one.";

/// The statement the shell is waiting on.
type InFlight = Pin<Box<dyn Future<Output = RunOutcome>>>;

/// Presentation settings for the shell.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Directory `/export` writes to when none is given.
    pub export_dir: PathBuf,
    pub environment: Environment,
    /// Print a prompt before each line (interactive terminals only).
    pub prompt: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("."),
            environment: Environment::default(),
            prompt: false,
        }
    }
}

/// Whether the read loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Interactive session over a line-based input and a text output.
pub struct Shell {
    controller: SessionController,
    monitor: MonitorHandle,
    dashboard: DashboardFeed,
    options: ShellOptions,
    in_flight: Option<InFlight>,
}

impl Shell {
    pub fn new(controller: SessionController, monitor: MonitorHandle, options: ShellOptions) -> Self {
        let dashboard = DashboardFeed::new(controller.clone());
        Self {
            controller,
            monitor,
            dashboard,
            options,
            in_flight: None,
        }
    }

    /// Runs until `/quit` or end of input.
    ///
    /// Input is not read until the first health probe has settled. At end of
    /// input a running statement is allowed to finish.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut connectivity = self.monitor.subscribe();
        emit(
            output,
            &format!(
                "cfdi-lab {} - {}",
                env!("CARGO_PKG_VERSION"),
                self.controller.base_url()
            ),
        )
        .await?;

        // Ignore the error: it only means the monitor is gone.
        let _ = connectivity
            .wait_for(|s| *s != ConnectivityState::Checking)
            .await;
        let state = *connectivity.borrow_and_update();
        info!("Shell started with backend {}", state);

        let view = self.controller.snapshot().active_view;
        let mut out = vec![render::render_badge(state)];
        self.show_view(view, &mut out).await;
        emit_all(output, out).await?;

        let mut lines = input.lines();
        let mut input_open = true;
        loop {
            if !input_open && self.in_flight.is_none() {
                break;
            }
            if self.options.prompt && input_open && self.in_flight.is_none() {
                write_raw(output, PROMPT).await?;
            }

            tokio::select! {
                biased;

                Ok(()) = connectivity.changed() => {
                    let state = *connectivity.borrow_and_update();
                    let mut out = Vec::new();
                    self.on_connectivity(state, &mut out).await;
                    emit_all(output, out).await?;
                }
                outcome = settle(&mut self.in_flight) => {
                    let text = self.render_outcome(&outcome);
                    emit(output, &text).await?;
                }
                line = lines.next_line(), if input_open => {
                    let line = line.map_err(|e| LabError::io(format!("Failed to read input: {e}")))?;
                    match line {
                        Some(line) => {
                            let mut out = Vec::new();
                            let flow = self.handle(CommandRouter::parse(&line), &mut out).await;
                            emit_all(output, out).await?;
                            if flow == Flow::Quit {
                                break;
                            }
                        }
                        None => {
                            debug!("End of input");
                            input_open = false;
                        }
                    }
                }
            }
        }

        // Dropping a running statement cancels it.
        self.in_flight = None;
        self.monitor.cancel();
        Ok(())
    }

    /// Executes one command, appending its output lines to `out`.
    ///
    /// Statements and table previews are only started here; their result is
    /// printed by the read loop once they settle.
    pub async fn handle(&mut self, command: Command, out: &mut Vec<String>) -> Flow {
        match command {
            Command::Empty => {}
            Command::Sql(sql) => {
                let controller = self.controller.clone();
                self.start(Box::pin(async move { controller.run_query(&sql).await }), out);
            }
            Command::View(None) => {
                let view = self.controller.snapshot().active_view;
                out.push(format!("Current view: {} ({})", view.title(), view));
            }
            Command::View(Some(view)) => {
                self.controller.set_view(view).await;
                self.show_view(view, out).await;
            }
            Command::Table(name) => {
                let controller = self.controller.clone();
                self.start(Box::pin(async move { controller.select_table(&name).await }), out);
            }
            Command::Seed(scale) => self.seed(scale, out).await,
            Command::Browse(query) => match self.controller.browse_comprobantes(&query).await {
                Ok(page) => out.push(render::render_result(&page)),
                Err(e) => out.push(render::render_error(&e)),
            },
            Command::Export(dir) => {
                if self.in_flight.is_some() {
                    out.push("A query is still running; exporting the previous result.".to_string());
                }
                let dir = dir.unwrap_or_else(|| self.options.export_dir.clone());
                out.push(self.export_current(&dir));
            }
            Command::Status => out.push(self.status()),
            Command::Retry => {
                self.monitor.probe_now();
                out.push("Retrying connection...".to_string());
            }
            Command::Help => out.push(HELP_TEXT.to_string()),
            Command::Quit => {
                self.in_flight = None;
                return Flow::Quit;
            }
            Command::Invalid(message) => out.push(message),
            Command::Unknown(cmd) => out.push(format!(
                "Unknown command: {cmd}. Type /help for available commands."
            )),
        }
        Flow::Continue
    }

    /// Makes `query` the running statement, dropping any previous one.
    fn start(&mut self, query: InFlight, out: &mut Vec<String>) {
        if self.in_flight.replace(query).is_some() {
            debug!("Replacing the running statement");
            out.push(SUPERSEDED.to_string());
        }
    }

    async fn seed(&mut self, scale: crate::api::SeedScale, out: &mut Vec<String>) {
        match self.controller.seed_and_refresh(scale).await {
            SeedOutcome::Blocked => out.push(format!(
                "Seeding is unavailable while the backend is {}.",
                self.controller.connectivity()
            )),
            SeedOutcome::Seeded { ack, follow_up } => {
                out.push(
                    ack.message
                        .unwrap_or_else(|| format!("Seeded {scale} dataset.")),
                );
                out.push(self.render_outcome(&follow_up));
                if self.controller.snapshot().active_view == ActiveView::Dashboard {
                    self.show_view(ActiveView::Dashboard, out).await;
                }
            }
            SeedOutcome::Failed(e) => out.push(render::render_error(&e)),
        }
    }

    async fn show_view(&mut self, view: ActiveView, out: &mut Vec<String>) {
        match self.controller.connectivity() {
            ConnectivityState::Offline => {
                out.push(render::render_offline_overlay(
                    self.controller.base_url(),
                    self.options.environment,
                ));
                return;
            }
            ConnectivityState::Checking if view != ActiveView::Learning => {
                out.push(render::render_badge(ConnectivityState::Checking));
                return;
            }
            _ => {}
        }

        match view {
            ActiveView::Tables => match self.controller.list_tables().await {
                Ok(catalog) => out.push(render::render_catalog(&catalog)),
                Err(e) => out.push(render::render_error(&e)),
            },
            ActiveView::Dashboard => match self.dashboard.stats().await {
                Ok(stats) => out.push(render::render_dashboard(stats)),
                Err(e) => out.push(render::render_error(&e)),
            },
            ActiveView::Learning => out.push(render::render_learning()),
        }
    }

    fn render_outcome(&self, outcome: &RunOutcome) -> String {
        match outcome {
            RunOutcome::Superseded => SUPERSEDED.to_string(),
            _ => render::render_display(self.controller.snapshot().display()),
        }
    }

    fn export_current(&self, dir: &Path) -> String {
        let state = self.controller.snapshot();
        let Some(artifact) = export::export(&state.current_result) else {
            return "Nothing to export. Run a query first.".to_string();
        };
        match artifact.write_to(dir) {
            Ok(path) => format!(
                "Exported {} rows to {}",
                state.current_result.row_count,
                path.display()
            ),
            Err(e) => format!("ERROR: {e}"),
        }
    }

    fn status(&self) -> String {
        let state = self.controller.snapshot();
        let mut lines = vec![
            render::render_badge(self.controller.connectivity()),
            format!("API:           {}", self.controller.base_url()),
            format!("View:          {}", state.active_view.title()),
            format!(
                "Last result:   {} rows, {} ms",
                state.current_result.row_count, state.current_result.elapsed_ms
            ),
            format!(
                "Executing:     {}",
                if state.is_executing { "yes" } else { "no" }
            ),
            format!("Refresh epoch: {}", state.refresh_epoch),
        ];
        if let Some(err) = &state.current_error {
            lines.push(format!("Last error:    {}", err.message()));
        }
        lines.join("\n")
    }

    /// Reports a connectivity transition. Coming back online re-renders the
    /// active view with fresh data.
    async fn on_connectivity(&mut self, state: ConnectivityState, out: &mut Vec<String>) {
        out.push(render::render_badge(state));
        match state {
            ConnectivityState::Offline => out.push(render::render_offline_overlay(
                self.controller.base_url(),
                self.options.environment,
            )),
            ConnectivityState::Online => {
                self.dashboard.invalidate();
                let view = self.controller.snapshot().active_view;
                self.show_view(view, out).await;
            }
            ConnectivityState::Checking => {}
        }
    }
}

/// Runs a single statement and renders the outcome.
///
/// Returns the text to print and whether the statement succeeded. When
/// `export_dir` is given a successful non-empty result is also saved as CSV.
pub async fn run_statement(
    controller: &SessionController,
    sql: &str,
    export_dir: Option<&Path>,
) -> (String, bool) {
    let outcome = controller.run_query(sql).await;
    let state = controller.snapshot();
    let mut out = vec![render::render_display(state.display())];
    let ok = outcome == RunOutcome::Succeeded;

    if let (true, Some(dir)) = (ok, export_dir) {
        match export::export(&state.current_result).map(|a| a.write_to(dir)) {
            Some(Ok(path)) => out.push(format!("Exported to {}", path.display())),
            Some(Err(e)) => {
                out.push(format!("ERROR: {e}"));
                return (out.join("\n"), false);
            }
            None => out.push("Nothing to export.".to_string()),
        }
    }

    (out.join("\n"), ok)
}

/// Waits for the running statement, if any, and clears the slot.
async fn settle(slot: &mut Option<InFlight>) -> RunOutcome {
    match slot.as_mut() {
        Some(query) => {
            let outcome = query.await;
            *slot = None;
            outcome
        }
        None => std::future::pending().await,
    }
}

async fn emit<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    write_raw(output, text).await?;
    write_raw(output, "\n").await
}

async fn emit_all<W: AsyncWrite + Unpin>(output: &mut W, lines: Vec<String>) -> Result<()> {
    for line in lines {
        emit(output, &line).await?;
    }
    Ok(())
}

async fn write_raw<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output
        .write_all(text.as_bytes())
        .await
        .map_err(|e| LabError::io(format!("Failed to write output: {e}")))?;
    output
        .flush()
        .await
        .map_err(|e| LabError::io(format!("Failed to write output: {e}")))
}
