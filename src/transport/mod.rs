//! Transport layer for talking to the lab backend.
//!
//! Provides a trait-based interface so the HTTP client can be swapped for an
//! in-memory double in tests and in `--mock-backend` mode. Every request is
//! bounded by a deadline and every failure is classified into an
//! [`ExecutionError`].

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::{MockTransport, Reply};

use crate::error::ExecutionError;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Message used for every request that hits the deadline.
pub const TIMEOUT_MESSAGE: &str = "Request timed out. Is the backend running?";

/// HTTP method of a backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A single request against the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Endpoint path, starting with `/`.
    pub path: String,
    /// Query string parameters (GET endpoints).
    pub query: Vec<(String, String)>,
    /// JSON body (POST endpoints).
    pub body: Option<Value>,
}

impl Request {
    /// Creates a GET request with no body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Appends query string parameters.
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

/// Trait defining the interface for backend transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the decoded JSON body.
    async fn send(&self, request: Request) -> Result<Value, ExecutionError>;

    /// Returns the configured base address, used in error messages.
    fn base_url(&self) -> &str;
}

/// Runs `request` under a deadline.
///
/// On expiry the request future is dropped, which cancels it, and a
/// `Timeout` error is returned. The timer belongs to the returned future, so
/// it is released on every exit path.
pub async fn with_deadline<F>(deadline: Duration, request: F) -> Result<Value, ExecutionError>
where
    F: Future<Output = Result<Value, ExecutionError>>,
{
    match tokio::time::timeout(deadline, request).await {
        Ok(result) => result,
        Err(_) => Err(ExecutionError::timeout(TIMEOUT_MESSAGE)),
    }
}
