//! Session state and the controller that mutates it.

pub mod controller;
pub mod dashboard;
pub mod state;

pub use controller::{
    RunOutcome, SeedOutcome, SessionController, SEED_FOLLOW_UP_SQL, VIEW_PREFERENCE_KEY,
};
pub use dashboard::DashboardFeed;
pub use state::{ActiveView, ResultDisplay, SessionState};
