//! Session controller: gates user actions on connectivity and owns the
//! session state.
//!
//! At most one query is in flight. Starting a query cancels the previous
//! one; each dispatch carries a sequence number and only the current
//! sequence may settle into the state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{ActiveView, SessionState};
use crate::api::{ComprobanteQuery, DashboardStats, QueryResult, SeedAck, SeedScale, TableCatalog};
use crate::connectivity::ConnectivityState;
use crate::error::ExecutionError;
use crate::persistence::PreferenceStore;
use crate::query::{preview_statement, QueryExecutor, OFFLINE_MESSAGE};

/// Preference key holding the last active view.
pub const VIEW_PREFERENCE_KEY: &str = "activeView";

/// Statement issued after a successful seed.
pub const SEED_FOLLOW_UP_SQL: &str =
    "SELECT count(*) as total_comprobantes FROM cfdi_comprobantes;";

pub const SELECT_TABLE_OFFLINE_MESSAGE: &str = "Backend is offline. Cannot select table.";
const READ_OFFLINE_MESSAGE: &str = "Backend is offline.";

/// How a query request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Refused by the connectivity gate; no request was made.
    Blocked,
    /// The result replaced the current one.
    Succeeded,
    /// The error was recorded; the previous result is retained.
    Failed(ExecutionError),
    /// A newer request started before this one settled.
    Superseded,
}

/// How a seed request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedOutcome {
    /// Not online; nothing happened.
    Blocked,
    /// Seeded; `follow_up` is the outcome of the count query.
    Seeded { ack: SeedAck, follow_up: RunOutcome },
    Failed(ExecutionError),
}

#[derive(Default)]
struct Flight {
    seq: u64,
    cancel: Option<CancellationToken>,
}

struct Inner {
    executor: QueryExecutor,
    connectivity: watch::Receiver<ConnectivityState>,
    prefs: Arc<dyn PreferenceStore>,
    state: watch::Sender<SessionState>,
    flight: Mutex<Flight>,
}

impl Inner {
    fn flight(&self) -> MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Coordinates queries, seeding, and view changes for one session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Creates a controller with the default initial state.
    pub fn new(
        executor: QueryExecutor,
        connectivity: watch::Receiver<ConnectivityState>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self::with_state(executor, connectivity, prefs, SessionState::default())
    }

    /// Creates a controller whose active view is restored from `prefs`.
    ///
    /// Unknown or unreadable values leave the default view in place.
    pub async fn restore(
        executor: QueryExecutor,
        connectivity: watch::Receiver<ConnectivityState>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Self {
        let view = match prefs.get(VIEW_PREFERENCE_KEY).await {
            Ok(Some(saved)) => ActiveView::parse(&saved).unwrap_or_else(|| {
                debug!("Ignoring unknown saved view '{}'", saved);
                ActiveView::default()
            }),
            Ok(None) => ActiveView::default(),
            Err(e) => {
                warn!("Failed to read saved view: {}", e);
                ActiveView::default()
            }
        };
        Self::with_state(executor, connectivity, prefs, SessionState::with_view(view))
    }

    fn with_state(
        executor: QueryExecutor,
        connectivity: watch::Receiver<ConnectivityState>,
        prefs: Arc<dyn PreferenceStore>,
        initial: SessionState,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                executor,
                connectivity,
                prefs,
                state,
                flight: Mutex::new(Flight::default()),
            }),
        }
    }

    /// Returns a receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Returns the backend base address.
    pub fn base_url(&self) -> &str {
        self.inner.executor.api().base_url()
    }

    /// Returns the live connectivity state.
    pub fn connectivity(&self) -> ConnectivityState {
        *self.inner.connectivity.borrow()
    }

    fn is_online(&self) -> bool {
        self.connectivity().is_online()
    }

    /// Switches the active view and persists it.
    pub async fn set_view(&self, view: ActiveView) {
        self.inner.state.send_modify(|s| s.active_view = view);
        if let Err(e) = self.inner.prefs.set(VIEW_PREFERENCE_KEY, view.as_str()).await {
            warn!("Failed to save active view: {}", e);
        }
    }

    /// Runs a statement and records its outcome in the session state.
    pub async fn run_query(&self, sql: &str) -> RunOutcome {
        if !self.is_online() {
            self.block(OFFLINE_MESSAGE);
            return RunOutcome::Blocked;
        }
        self.dispatch(sql).await
    }

    /// Previews the first rows of a table.
    pub async fn select_table(&self, table: &str) -> RunOutcome {
        if !self.is_online() {
            self.block(SELECT_TABLE_OFFLINE_MESSAGE);
            return RunOutcome::Blocked;
        }
        self.dispatch(&preview_statement(table)).await
    }

    /// Regenerates the dataset, then bumps the refresh epoch and re-runs the
    /// document count.
    pub async fn seed_and_refresh(&self, scale: SeedScale) -> SeedOutcome {
        if !self.is_online() {
            warn!("Ignoring seed request while backend is {}", self.connectivity());
            return SeedOutcome::Blocked;
        }

        info!("Seeding {} dataset", scale);
        match self.inner.executor.api().seed(scale).await {
            Ok(ack) => {
                self.inner.state.send_modify(|s| s.refresh_epoch += 1);
                let follow_up = self.run_query(SEED_FOLLOW_UP_SQL).await;
                SeedOutcome::Seeded { ack, follow_up }
            }
            Err(e) => {
                warn!("Seed failed: {}", e);
                self.inner
                    .state
                    .send_modify(|s| s.current_error = Some(e.clone()));
                SeedOutcome::Failed(e)
            }
        }
    }

    /// Loads the table catalog.
    pub async fn list_tables(&self) -> Result<TableCatalog, ExecutionError> {
        self.gate_read()?;
        self.inner.executor.api().tables().await
    }

    /// Loads the dashboard aggregates.
    pub async fn dashboard(&self) -> Result<DashboardStats, ExecutionError> {
        self.gate_read()?;
        self.inner.executor.api().dashboard().await
    }

    /// Loads one page of documents as a table.
    pub async fn browse_comprobantes(
        &self,
        query: &ComprobanteQuery,
    ) -> Result<QueryResult, ExecutionError> {
        self.gate_read()?;
        let records = self.inner.executor.api().comprobantes(query).await?;
        Ok(QueryResult::from_records(&records))
    }

    fn gate_read(&self) -> Result<(), ExecutionError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(ExecutionError::offline(READ_OFFLINE_MESSAGE))
        }
    }

    fn block(&self, message: &str) {
        debug!("Blocked while backend is {}", self.connectivity());
        let err = ExecutionError::offline(message);
        self.inner
            .state
            .send_modify(|s| s.current_error = Some(err));
    }

    async fn dispatch(&self, sql: &str) -> RunOutcome {
        let (seq, token) = self.begin_flight();
        let mut guard = FlightGuard {
            inner: &self.inner,
            seq,
            armed: true,
        };

        let outcome = tokio::select! {
            biased;

            _ = token.cancelled() => None,
            result = self.inner.executor.execute(sql, self.connectivity()) => Some(result),
        };

        let Some(result) = outcome else {
            debug!(seq, "query superseded before settling");
            guard.armed = false;
            return RunOutcome::Superseded;
        };

        guard.armed = false;
        self.settle(seq, result)
    }

    fn begin_flight(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let seq = {
            let mut flight = self.inner.flight();
            if let Some(previous) = flight.cancel.replace(token.clone()) {
                previous.cancel();
            }
            flight.seq += 1;
            flight.seq
        };
        self.inner.state.send_modify(|s| {
            s.is_executing = true;
            s.current_error = None;
        });
        (seq, token)
    }

    fn settle(&self, seq: u64, result: Result<QueryResult, ExecutionError>) -> RunOutcome {
        let mut flight = self.inner.flight();
        if flight.seq != seq {
            debug!(seq, current = flight.seq, "discarding stale query result");
            return RunOutcome::Superseded;
        }
        flight.cancel = None;

        let outcome = match &result {
            Ok(_) => RunOutcome::Succeeded,
            Err(e) => RunOutcome::Failed(e.clone()),
        };
        self.inner.state.send_modify(|s| {
            match result {
                Ok(r) => {
                    s.current_result = r;
                    s.current_error = None;
                }
                Err(e) => s.current_error = Some(e),
            }
            s.is_executing = false;
        });
        outcome
    }
}

/// Clears `is_executing` if a dispatch future is dropped before settling.
struct FlightGuard<'a> {
    inner: &'a Inner,
    seq: u64,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut flight = self.inner.flight();
        if flight.seq == self.seq {
            flight.cancel = None;
            self.inner.state.send_modify(|s| s.is_executing = false);
        }
    }
}
