//! Statement execution against the backend.

use std::time::Instant;

use tracing::{debug, info};

use crate::api::{LabApi, QueryResult};
use crate::connectivity::ConnectivityState;
use crate::error::ExecutionError;

/// Row cap for table previews.
pub const PREVIEW_LIMIT: u32 = 100;

/// Message for statements refused because the backend is offline.
pub const OFFLINE_MESSAGE: &str = "Backend is offline. Cannot execute query.";

/// Submits statements to the backend and normalizes the responses.
#[derive(Clone)]
pub struct QueryExecutor {
    api: LabApi,
}

impl QueryExecutor {
    /// Creates a new query executor.
    pub fn new(api: LabApi) -> Self {
        Self { api }
    }

    /// Returns the underlying API client.
    pub fn api(&self) -> &LabApi {
        &self.api
    }

    /// Executes a statement.
    ///
    /// When `connectivity` is `Offline` no request is made and the offline
    /// error is returned, so callers see the same error shape as a failed
    /// round trip.
    pub async fn execute(
        &self,
        sql: &str,
        connectivity: ConnectivityState,
    ) -> Result<QueryResult, ExecutionError> {
        if connectivity == ConnectivityState::Offline {
            debug!("Refusing to execute while offline");
            return Err(ExecutionError::offline(OFFLINE_MESSAGE));
        }

        let start = Instant::now();
        let result = self.api.run(sql).await;

        match &result {
            Ok(r) => info!(
                rows = r.row_count,
                server_ms = r.elapsed_ms,
                round_trip_ms = start.elapsed().as_millis() as u64,
                "Query executed"
            ),
            Err(e) => info!(kind = %e.kind(), "Query failed: {}", e),
        }

        result
    }

    /// Executes a bounded `SELECT *` over the given table.
    pub async fn preview_table(
        &self,
        table: &str,
        connectivity: ConnectivityState,
    ) -> Result<QueryResult, ExecutionError> {
        self.execute(&preview_statement(table), connectivity).await
    }
}

/// Builds the preview statement for a table.
pub fn preview_statement(table: &str) -> String {
    format!(
        "SELECT * FROM {} LIMIT {}",
        quote_identifier(table),
        PREVIEW_LIMIT
    )
}

/// Returns `name` unchanged if it is a plain (optionally dot-qualified)
/// identifier, otherwise a double-quoted identifier with embedded quotes
/// doubled.
pub fn quote_identifier(name: &str) -> String {
    if !name.is_empty() && name.split('.').all(is_plain_identifier) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn is_plain_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::endpoints;
    use crate::error::ErrorKind;
    use crate::transport::{Method, MockTransport, Reply, Transport};
    use serde_json::json;
    use std::sync::Arc;

    fn executor_with(mock: &Arc<MockTransport>) -> QueryExecutor {
        QueryExecutor::new(LabApi::new(Arc::clone(mock) as Arc<dyn Transport>))
    }

    #[tokio::test]
    async fn test_offline_rejects_without_transport_call() {
        let mock = Arc::new(MockTransport::lab_fixture());
        let executor = executor_with(&mock);

        let err = executor
            .execute("SELECT 1", ConnectivityState::Offline)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);
        assert_eq!(err.message(), OFFLINE_MESSAGE);
        assert!(err.is_offline_block());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_online_dispatches_exactly_one_request() {
        let mock = Arc::new(MockTransport::lab_fixture());
        let executor = executor_with(&mock);

        let result = executor
            .execute("SELECT * FROM cfdi_comprobantes", ConnectivityState::Online)
            .await
            .unwrap();

        assert_eq!(result.row_count, 3);
        assert_eq!(result.elapsed_ms, 1);
        assert_eq!(
            mock.executed_sql(),
            vec!["SELECT * FROM cfdi_comprobantes".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_counts_default_to_zero() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            Method::Post,
            endpoints::RUN,
            Reply::Json(json!({"columns": ["a"], "rows": [{"a": 1}]})),
        );

        let result = executor_with(&mock)
            .execute("SELECT 1 AS a", ConnectivityState::Online)
            .await
            .unwrap();

        assert_eq!(result.row_count, 0);
        assert_eq!(result.elapsed_ms, 0);
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_passes_through() {
        let mock = Arc::new(MockTransport::lab_fixture());
        let err = executor_with(&mock)
            .execute("DROP TABLE cfdi_comprobantes", ConnectivityState::Online)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert_eq!(
            err.message(),
            "Only SELECT queries are allowed in this playground."
        );
    }

    #[tokio::test]
    async fn test_preview_table_uses_bounded_select() {
        let mock = Arc::new(MockTransport::lab_fixture());
        executor_with(&mock)
            .preview_table("cfdi_emisores", ConnectivityState::Online)
            .await
            .unwrap();

        assert_eq!(
            mock.executed_sql(),
            vec!["SELECT * FROM cfdi_emisores LIMIT 100".to_string()]
        );
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("cfdi_conceptos"), "cfdi_conceptos");
        assert_eq!(quote_identifier("main.pagos"), "main.pagos");
        assert_eq!(quote_identifier("my table"), "\"my table\"");
        assert_eq!(
            quote_identifier("x; DROP TABLE y--"),
            "\"x; DROP TABLE y--\""
        );
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_identifier("1abc"), "\"1abc\"");
        assert_eq!(quote_identifier(""), "\"\"");
    }
}
