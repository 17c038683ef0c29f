//! Typed client for the lab backend endpoints.
//!
//! Wraps a [`Transport`] and decodes each endpoint's payload into the types
//! in [`types`].

pub mod types;

pub use types::{
    ColumnSchema, ComprobanteQuery, DashboardStats, Kpis, NamedAmount, QueryResult, Row,
    SeedAck, SeedScale, TableCatalog, Value,
};

use crate::error::ExecutionError;
use crate::transport::{Request, Transport};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

/// Endpoint paths exposed by the backend.
pub mod endpoints {
    pub const HEALTH: &str = "/health";
    pub const SEED: &str = "/seed";
    pub const RUN: &str = "/playground/run";
    pub const TABLES: &str = "/playground/tables";
    pub const DASHBOARD: &str = "/dashboard";
    pub const COMPROBANTES: &str = "/comprobantes";
}

/// Client for the backend API.
#[derive(Clone)]
pub struct LabApi {
    transport: Arc<dyn Transport>,
}

impl LabApi {
    /// Creates a client over the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Returns the configured base address.
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Probes the health endpoint. Any successful response counts.
    pub async fn health(&self) -> Result<(), ExecutionError> {
        self.transport
            .send(Request::get(endpoints::HEALTH))
            .await
            .map(|_| ())
    }

    /// Regenerates the dataset at the given scale.
    pub async fn seed(&self, scale: SeedScale) -> Result<SeedAck, ExecutionError> {
        let value = self
            .transport
            .send(Request::post(endpoints::SEED, json!({ "scale": scale.as_str() })))
            .await?;
        // The acknowledgement is informational; an odd shape is not a failure.
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Executes a statement and returns the tabular result.
    pub async fn run(&self, sql: &str) -> Result<QueryResult, ExecutionError> {
        let value = self
            .transport
            .send(Request::post(endpoints::RUN, json!({ "sql": sql })))
            .await?;
        decode(value, "query")
    }

    /// Lists tables and their columns.
    pub async fn tables(&self) -> Result<TableCatalog, ExecutionError> {
        let value = self.transport.send(Request::get(endpoints::TABLES)).await?;
        if value.is_null() {
            return Ok(TableCatalog::new());
        }
        decode(value, "schema")
    }

    /// Fetches the dashboard aggregates.
    pub async fn dashboard(&self) -> Result<DashboardStats, ExecutionError> {
        let value = self.transport.send(Request::get(endpoints::DASHBOARD)).await?;
        decode(value, "dashboard")
    }

    /// Fetches one page of documents.
    pub async fn comprobantes(
        &self,
        query: &ComprobanteQuery,
    ) -> Result<Vec<serde_json::Value>, ExecutionError> {
        let request = Request::get(endpoints::COMPROBANTES).with_query(query.to_pairs());
        let value = self.transport.send(request).await?;
        decode(value, "listing")
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value, what: &str) -> Result<T, ExecutionError> {
    serde_json::from_value(value)
        .map_err(|e| ExecutionError::unknown(format!("Malformed {what} response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::{Method, MockTransport, Reply};

    fn api_with(mock: &Arc<MockTransport>) -> LabApi {
        LabApi::new(Arc::clone(mock) as Arc<dyn Transport>)
    }

    #[tokio::test]
    async fn test_run_posts_raw_statement() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            Method::Post,
            endpoints::RUN,
            Reply::Json(json!({"columns": ["n"], "rows": [{"n": 1}], "row_count": 1, "elapsed_ms": 2})),
        );
        let api = api_with(&mock);

        let result = api.run("SELECT 1 AS n").await.unwrap();

        assert_eq!(result.row_count, 1);
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body, Some(json!({"sql": "SELECT 1 AS n"})));
    }

    #[tokio::test]
    async fn test_run_malformed_response_is_unknown() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Post, endpoints::RUN, Reply::Json(json!({"columns": "nope"})));

        let err = api_with(&mock).run("SELECT 1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.message().starts_with("Malformed query response"));
    }

    #[tokio::test]
    async fn test_seed_sends_scale() {
        let mock = Arc::new(MockTransport::lab_fixture());
        let ack = api_with(&mock).seed(SeedScale::Large).await.unwrap();

        assert_eq!(ack.status.as_deref(), Some("success"));
        assert_eq!(mock.calls()[0].body, Some(json!({"scale": "large"})));
    }

    #[tokio::test]
    async fn test_comprobantes_sends_query_pairs() {
        let mock = Arc::new(MockTransport::lab_fixture());
        let query = ComprobanteQuery {
            skip: 20,
            limit: 10,
            q: Some("F-1".to_string()),
        };
        let page = api_with(&mock).comprobantes(&query).await.unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(mock.calls()[0].query, query.to_pairs());
    }

    #[tokio::test]
    async fn test_empty_table_listing() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Get, endpoints::TABLES, Reply::Json(json!({})));
        assert!(api_with(&mock).tables().await.unwrap().is_empty());
    }
}
