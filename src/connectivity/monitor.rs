//! Periodic health polling.
//!
//! The monitor task ticks on a fixed interval and spawns one probe per tick.
//! Each probe carries a sequence number; a probe's result is applied only if
//! no newer probe has settled first and the monitor has not been cancelled.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ConnectivityState;
use crate::api::LabApi;

type ChangeCallback = Box<dyn Fn(ConnectivityState) + Send + Sync>;

struct Shared {
    state: watch::Sender<ConnectivityState>,
    /// Highest sequence number whose result has been applied.
    settled: Mutex<u64>,
    cancel: CancellationToken,
    wake: Notify,
    on_change: ChangeCallback,
}

impl Shared {
    fn settled(&self) -> MutexGuard<'_, u64> {
        self.settled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a probe outcome. Returns false if the result was discarded.
    fn settle(&self, seq: u64, online: bool) -> bool {
        let next = if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        };

        let changed = {
            let mut settled = self.settled();
            if self.cancel.is_cancelled() {
                debug!(seq, "discarding probe result after cancellation");
                return false;
            }
            if seq <= *settled {
                debug!(seq, latest = *settled, "discarding stale probe result");
                return false;
            }
            *settled = seq;

            self.state.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            })
        };

        // The callback runs unlocked so it may cancel the monitor.
        if changed {
            info!("Backend connectivity changed to {}", next);
            (self.on_change)(next);
        }
        true
    }
}

/// Handle to a running monitor. Dropping it cancels the monitor.
pub struct MonitorHandle {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Returns the current connectivity state.
    pub fn state(&self) -> ConnectivityState {
        *self.shared.state.borrow()
    }

    /// Returns a receiver that observes every transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.shared.state.subscribe()
    }

    /// Probes immediately instead of waiting for the next tick.
    pub fn probe_now(&self) {
        self.shared.wake.notify_one();
    }

    /// Stops future probes and discards the results of in-flight ones.
    pub fn cancel(&self) {
        // Taking the ledger lock orders this against any settle in progress.
        let _settled = self.shared.settled();
        self.shared.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel();
        self.task.abort();
    }
}

/// Starts polling the backend health endpoint.
///
/// The state starts as `Checking`, the first probe is sent immediately, and
/// later probes follow every `interval`. `on_change` runs on every actual
/// transition. Must be called from within a tokio runtime.
pub fn start<F>(api: LabApi, interval: Duration, on_change: F) -> MonitorHandle
where
    F: Fn(ConnectivityState) + Send + Sync + 'static,
{
    let (state, _) = watch::channel(ConnectivityState::Checking);
    let shared = Arc::new(Shared {
        state,
        settled: Mutex::new(0),
        cancel: CancellationToken::new(),
        wake: Notify::new(),
        on_change: Box::new(on_change),
    });

    info!(
        "Connectivity monitor started for {} (every {:?})",
        api.base_url(),
        interval
    );
    let task = tokio::spawn(run(Arc::clone(&shared), api, interval));

    MonitorHandle { shared, task }
}

async fn run(shared: Arc<Shared>, api: LabApi, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq = 0u64;

    loop {
        tokio::select! {
            biased;

            _ = shared.cancel.cancelled() => break,
            _ = ticker.tick() => {}
            _ = shared.wake.notified() => ticker.reset(),
        }

        seq += 1;
        spawn_probe(Arc::clone(&shared), api.clone(), seq);
    }

    debug!("Connectivity monitor stopped");
}

fn spawn_probe(shared: Arc<Shared>, api: LabApi, seq: u64) {
    tokio::spawn(async move {
        let outcome = tokio::select! {
            biased;

            _ = shared.cancel.cancelled() => return,
            outcome = api.health() => outcome,
        };
        if let Err(e) = &outcome {
            debug!(seq, kind = %e.kind(), "health probe failed: {}", e);
        }
        shared.settle(seq, outcome.is_ok());
    });
}
