//! HTTP transport backed by reqwest.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{with_deadline, Method, Request, Transport};
use crate::error::{ExecutionError, LabError, Result};

/// Transport that talks to the backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl HttpTransport {
    /// Creates a transport for the given base address and request deadline.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        // The deadline is enforced by `with_deadline`, not by the client.
        let client = Client::builder()
            .build()
            .map_err(|e| LabError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            timeout,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn dispatch(&self, request: &Request) -> std::result::Result<Value, ExecutionError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            // An unreadable error body falls back to the status line.
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutionError::server(error_message(status, &body)));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        decode_body(&body)
    }

    /// Maps a reqwest failure onto the error taxonomy.
    fn classify(&self, e: reqwest::Error) -> ExecutionError {
        if e.is_timeout() {
            ExecutionError::timeout(super::TIMEOUT_MESSAGE)
        } else if e.is_connect() || e.is_request() {
            ExecutionError::unreachable(format!(
                "Backend unavailable. Check if the API is running at {}",
                self.base_url
            ))
        } else {
            ExecutionError::unknown(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> std::result::Result<Value, ExecutionError> {
        let start = Instant::now();
        let result = with_deadline(self.timeout, self.dispatch(&request)).await;

        debug!(
            method = request.method.as_str(),
            path = %request.path,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "backend request settled"
        );

        result
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Builds the user-facing message for a non-success response.
///
/// A JSON body with a string `detail` field is surfaced verbatim; anything
/// else falls back to the status line.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| match status.canonical_reason() {
            Some(reason) => format!("Error {}: {}", status.as_u16(), reason),
            None => format!("Error {}", status.as_u16()),
        })
}

/// Decodes a success body. Empty bodies decode to `null`.
pub(crate) fn decode_body(body: &str) -> std::result::Result<Value, ExecutionError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| ExecutionError::unknown(format!("Failed to parse response: {e}")))
}
