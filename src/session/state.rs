//! Observable session state.

use std::fmt;

use crate::api::QueryResult;
use crate::error::ExecutionError;

/// The center-panel view the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActiveView {
    /// Schema browser and seeding.
    Tables,
    /// Aggregate statistics.
    Dashboard,
    /// Guided examples.
    #[default]
    Learning,
}

impl ActiveView {
    pub const ALL: [ActiveView; 3] = [Self::Tables, Self::Dashboard, Self::Learning];

    /// Returns the persisted form of the view.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::Dashboard => "dashboard",
            Self::Learning => "learning",
        }
    }

    /// Parses a persisted view. Only exact lowercase names are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    /// Returns the heading shown for the view.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Tables => "Data Browser",
            Self::Dashboard => "Dashboard",
            Self::Learning => "Learning Hub",
        }
    }
}

impl fmt::Display for ActiveView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the presentation layer needs to draw the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub active_view: ActiveView,
    /// Last successful result. Kept across failures.
    pub current_result: QueryResult,
    pub current_error: Option<ExecutionError>,
    /// True while exactly one query is in flight.
    pub is_executing: bool,
    /// Incremented once per successful seed.
    pub refresh_epoch: u64,
}

/// What the results panel shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultDisplay<'a> {
    Error(&'a ExecutionError),
    Empty,
    Rows(&'a QueryResult),
}

impl SessionState {
    /// Returns the initial state with the given view.
    pub fn with_view(active_view: ActiveView) -> Self {
        Self {
            active_view,
            ..Self::default()
        }
    }

    /// Resolves what to present. An error masks the retained result.
    ///
    /// A result with columns but no rows is still shown as a grid.
    pub fn display(&self) -> ResultDisplay<'_> {
        if let Some(err) = &self.current_error {
            ResultDisplay::Error(err)
        } else if self.current_result.columns.is_empty() {
            ResultDisplay::Empty
        } else {
            ResultDisplay::Rows(&self.current_result)
        }
    }
}
