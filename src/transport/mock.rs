//! In-memory transport for tests and offline demos.
//!
//! Replies are scripted per `(method, path)`: one-shot replies are consumed in
//! order, then the route's standing reply is used. Every request is recorded.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{Method, Request, Transport};
use crate::api::endpoints;
use crate::error::ExecutionError;

type Handler = Arc<dyn Fn(&Request) -> Result<Value, ExecutionError> + Send + Sync>;

/// A scripted reply.
#[derive(Clone)]
pub enum Reply {
    /// Respond with this JSON body.
    Json(Value),
    /// Fail with this error.
    Error(ExecutionError),
    /// Compute the response from the request.
    Handler(Handler),
}

impl Reply {
    /// Creates a reply computed from the request.
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&Request) -> Result<Value, ExecutionError> + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(f))
    }

    fn resolve(&self, request: &Request) -> Result<Value, ExecutionError> {
        match self {
            Self::Json(value) => Ok(value.clone()),
            Self::Error(err) => Err(err.clone()),
            Self::Handler(f) => f(request),
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

#[derive(Default)]
struct Route {
    queued: VecDeque<(Reply, Duration)>,
    standing: Option<(Reply, Duration)>,
}

/// A transport that returns scripted replies.
pub struct MockTransport {
    base_url: String,
    routes: Mutex<HashMap<(Method, String), Route>>,
    calls: Mutex<Vec<Request>>,
    offline: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Creates a mock with no routes.
    pub fn new() -> Self {
        Self {
            base_url: "mock://lab".to_string(),
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Sets the standing reply for a route.
    pub fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.on_delayed(method, path, reply, Duration::ZERO)
    }

    /// Sets the standing reply for a route, delivered after `delay`.
    pub fn on_delayed(&self, method: Method, path: &str, reply: Reply, delay: Duration) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .standing = Some((reply, delay));
        self
    }

    /// Queues a one-shot reply for a route.
    pub fn once(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.once_delayed(method, path, reply, Duration::ZERO)
    }

    /// Queues a one-shot reply for a route, delivered after `delay`.
    pub fn once_delayed(
        &self,
        method: Method,
        path: &str,
        reply: Reply,
        delay: Duration,
    ) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .queued
            .push_back((reply, delay));
        self
    }

    /// When offline, every request fails as unreachable (after being recorded).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns all requests received so far.
    pub fn calls(&self) -> Vec<Request> {
        lock(&self.calls).clone()
    }

    /// Returns how many requests hit the given path.
    pub fn call_count(&self, path: &str) -> usize {
        lock(&self.calls).iter().filter(|r| r.path == path).count()
    }

    /// Returns the SQL of every `/playground/run` request, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|r| r.path == endpoints::RUN)
            .filter_map(|r| r.body.as_ref()?.get("sql")?.as_str().map(String::from))
            .collect()
    }

    fn next_reply(&self, request: &Request) -> Option<(Reply, Duration)> {
        let mut routes = lock(&self.routes);
        let route = routes.get_mut(&(request.method, request.path.clone()))?;
        route.queued.pop_front().or_else(|| route.standing.clone())
    }

    /// A mock that behaves like a small seeded lab backend.
    pub fn lab_fixture() -> Self {
        let mock = Self::new();
        let seeded = Arc::new(AtomicU64::new(50));

        mock.on(Method::Get, endpoints::HEALTH, Reply::Json(json!({"status": "ok"})));

        let counter = Arc::clone(&seeded);
        mock.on(
            Method::Post,
            endpoints::SEED,
            Reply::handler(move |request| {
                let scale = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("scale"))
                    .and_then(Value::as_str)
                    .unwrap_or("small")
                    .to_string();
                let count = match scale.as_str() {
                    "small" => 200,
                    "medium" => 2000,
                    "large" => 10_000,
                    _ => 50,
                };
                counter.store(count, Ordering::SeqCst);
                Ok(json!({"status": "success", "message": format!("Seeded {scale} dataset.")}))
            }),
        );

        let counter = Arc::clone(&seeded);
        mock.on(
            Method::Post,
            endpoints::RUN,
            Reply::handler(move |request| {
                let sql = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("sql"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_lowercase();
                if sql.contains("count(") {
                    return Ok(json!({
                        "columns": ["total_comprobantes"],
                        "rows": [{"total_comprobantes": counter.load(Ordering::SeqCst)}],
                        "row_count": 1,
                        "elapsed_ms": 0.42
                    }));
                }
                if !sql.trim_start().starts_with("select") {
                    return Err(ExecutionError::server(
                        "Only SELECT queries are allowed in this playground.",
                    ));
                }
                Ok(json!({
                    "columns": ["uuid", "serie", "folio", "total", "estatus_sat"],
                    "rows": [
                        {"uuid": "6F1A2C3D-0001", "serie": "F", "folio": "1001", "total": 1160.0, "estatus_sat": "Vigente"},
                        {"uuid": "6F1A2C3D-0002", "serie": "F", "folio": "1002", "total": 2320.5, "estatus_sat": "Cancelado"},
                        {"uuid": "6F1A2C3D-0003", "serie": null, "folio": "1003", "total": 87.0, "estatus_sat": "Vigente"}
                    ],
                    "row_count": 3,
                    "elapsed_ms": 1.7
                }))
            }),
        );

        mock.on(
            Method::Get,
            endpoints::TABLES,
            Reply::Json(json!({
                "cfdi_comprobantes": [
                    {"name": "id", "type": "INTEGER", "nullable": false, "primary_key": 1, "default": null},
                    {"name": "uuid", "type": "VARCHAR(36)", "nullable": false, "primary_key": 0, "default": null},
                    {"name": "total", "type": "FLOAT", "nullable": true, "primary_key": 0, "default": null}
                ],
                "cfdi_emisores": [
                    {"name": "id", "type": "INTEGER", "nullable": false, "primary_key": 1, "default": null},
                    {"name": "rfc", "type": "VARCHAR(13)", "nullable": false, "primary_key": 0, "default": null},
                    {"name": "nombre", "type": "VARCHAR", "nullable": true, "primary_key": 0, "default": null}
                ]
            })),
        );

        let counter = seeded;
        mock.on(
            Method::Get,
            endpoints::DASHBOARD,
            Reply::handler(move |_| {
                let total = counter.load(Ordering::SeqCst);
                Ok(json!({
                    "kpis": {"total_docs": total, "total_amount": total as f64 * 1234.56, "vigentes": total * 9 / 10},
                    "top_emisores": [
                        {"name": "Comercializadora del Norte", "value": 845_210.75},
                        {"name": "Servicios Integrales MX", "value": 512_004.1}
                    ]
                }))
            }),
        );

        mock.on(
            Method::Get,
            endpoints::COMPROBANTES,
            Reply::Json(json!([
                {"uuid": "6F1A2C3D-0001", "total": 1160.0, "estatus_sat": "Vigente", "moneda": "MXN", "metodo_pago": "PUE"},
                {"uuid": "6F1A2C3D-0002", "total": 2320.5, "estatus_sat": "Cancelado", "moneda": "MXN", "metodo_pago": "PPD"}
            ])),
        );

        mock
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Value, ExecutionError> {
        lock(&self.calls).push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(ExecutionError::unreachable(format!(
                "Backend unavailable. Check if the API is running at {}",
                self.base_url
            )));
        }

        let Some((reply, delay)) = self.next_reply(&request) else {
            return Err(ExecutionError::server("Error 404: Not Found"));
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply.resolve(&request)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
