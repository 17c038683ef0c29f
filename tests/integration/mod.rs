//! Integration tests for cfdi-lab.

pub mod common;
pub mod export_test;
pub mod persistence_test;
pub mod session_test;
pub mod shell_test;
