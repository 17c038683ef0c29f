//! cfdi-lab - an interactive SQL lab client for the CFDI playground backend.
//!
//! This library exposes the core modules for use in integration tests.

pub mod api;
pub mod cli;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod export;
pub mod logging;
pub mod persistence;
pub mod query;
pub mod session;
pub mod shell;
pub mod transport;
