//! Backend connectivity tracking.
//!
//! A background monitor probes the health endpoint on a fixed interval and
//! publishes a tri-state signal that gates user actions.

mod monitor;

pub use monitor::{start, MonitorHandle};

use std::fmt;

/// Whether the backend is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectivityState {
    /// No probe has settled yet.
    #[default]
    Checking,
    /// The last settled probe succeeded.
    Online,
    /// The last settled probe failed.
    Offline,
}

impl ConnectivityState {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    /// Badge text shown next to the view selector.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Checking => "CONNECTING...",
            Self::Online => "BACKEND ONLINE",
            Self::Offline => "BACKEND OFFLINE",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Checking => "checking",
            Self::Online => "online",
            Self::Offline => "offline",
        })
    }
}
