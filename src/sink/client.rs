use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::config::SinkConfig;
use super::sanitize_dataset_name;
use super::transport::{SinkTransport, TokenRequest, TransportResponse};
use super::types::{CreateDatasetRequest, CreateDatasetResponse, PushRowsRequest};
use crate::config::SINK_SCOPE;
use crate::error::SinkError;
use crate::formats::RowRecord;
use crate::schema::DetectedSchema;

enum Method<'a> {
    Post(&'a Value),
    Delete,
}

/// Authenticated client for the push-dataset API.
///
/// The bearer token is cached for the lifetime of the client and never shared
/// between clients. Build one client per job.
pub struct SinkClient {
    config: SinkConfig,
    transport: Arc<dyn SinkTransport>,
    token: RwLock<Option<String>>,
}

impl SinkClient {
    pub fn new(config: SinkConfig, transport: Arc<dyn SinkTransport>) -> Self {
        Self {
            config,
            transport,
            token: RwLock::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    /// Return the cached token, fetching one first if none is cached
    pub async fn authenticate(&self) -> Result<String, SinkError> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut cached = self.token.write().await;
        // Another caller may have filled the cache while we waited
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        if !self.config.is_enabled() {
            return Err(SinkError::Auth("sink credentials are not configured".to_string()));
        }

        let request = TokenRequest {
            url: self.config.token_url(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            scope: SINK_SCOPE.to_string(),
        };
        let token = self.transport.fetch_token(&request).await?;
        debug!("Acquired sink access token");
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token so the next call re-authenticates
    pub async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// Create a push dataset with a single `table` matching `schema`.
    ///
    /// `name` is sanitized first. Returns the dataset id.
    pub async fn create_push_dataset(
        &self,
        name: &str,
        table: &str,
        schema: &DetectedSchema,
    ) -> Result<String, SinkError> {
        let name = sanitize_dataset_name(name);
        let body = serde_json::to_value(CreateDatasetRequest::push(&name, table, schema))
            .map_err(|e| SinkError::UnexpectedResponse(e.to_string()))?;
        let url = format!("{}/datasets", self.config.api_url());

        let response = self.send(&url, Method::Post(&body)).await?;
        let created: CreateDatasetResponse = serde_json::from_str(&response.body)
            .map_err(|e| SinkError::UnexpectedResponse(format!("dataset creation: {}", e)))?;
        let dataset_id = created.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            SinkError::UnexpectedResponse("dataset creation returned no id".to_string())
        })?;

        info!(dataset_id = %dataset_id, name = %name, "Created sink dataset");
        Ok(dataset_id)
    }

    /// Push one batch of rows. Values are sent as the raw strings read from
    /// the file.
    pub async fn push_rows(
        &self,
        dataset_id: &str,
        table: &str,
        rows: &[RowRecord],
    ) -> Result<(), SinkError> {
        if rows.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_value(PushRowsRequest { rows })
            .map_err(|e| SinkError::UnexpectedResponse(e.to_string()))?;
        self.send(&self.rows_url(dataset_id, table), Method::Post(&body))
            .await?;
        debug!(dataset_id, rows = rows.len(), "Pushed batch");
        Ok(())
    }

    /// Remove every row from a table of a push dataset
    pub async fn clear_table(&self, dataset_id: &str, table: &str) -> Result<(), SinkError> {
        self.send(&self.rows_url(dataset_id, table), Method::Delete)
            .await?;
        info!(dataset_id, table, "Cleared sink table");
        Ok(())
    }

    fn rows_url(&self, dataset_id: &str, table: &str) -> String {
        format!(
            "{}/datasets/{}/tables/{}/rows",
            self.config.api_url(),
            dataset_id,
            table
        )
    }

    /// Send an authorized request. A 401 drops the cached token and retries
    /// once with a fresh one; any other non-2xx is an API error.
    async fn send(&self, url: &str, method: Method<'_>) -> Result<TransportResponse, SinkError> {
        let token = self.authenticate().await?;
        let response = self.dispatch(url, &method, &token).await?;

        let response = if response.is_unauthorized() {
            warn!(url, "Sink rejected token, re-authenticating");
            self.invalidate_token().await;
            let token = self.authenticate().await?;
            let retried = self.dispatch(url, &method, &token).await?;
            if retried.is_unauthorized() {
                return Err(SinkError::Auth(format!(
                    "request rejected after re-authentication: {}",
                    retried.body
                )));
            }
            retried
        } else {
            response
        };

        if !response.is_success() {
            return Err(SinkError::Api {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }

    async fn dispatch(
        &self,
        url: &str,
        method: &Method<'_>,
        token: &str,
    ) -> Result<TransportResponse, SinkError> {
        match method {
            Method::Post(body) => self.transport.post_json(url, token, body).await,
            Method::Delete => self.transport.delete(url, token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DetectedType;
    use crate::sink::config::SinkConfigBuilder;
    use crate::sink::testing::{Call, RecordingTransport};
    use serde_json::json;

    fn config() -> SinkConfig {
        SinkConfigBuilder::default()
            .client_id("id")
            .client_secret("secret")
            .workspace_id("ws")
            .api_base_url("http://sink.test/v1.0")
            .build()
            .unwrap()
    }

    fn client(transport: &Arc<RecordingTransport>) -> SinkClient {
        SinkClient::new(config(), transport.clone())
    }

    fn rows(n: usize) -> Vec<RowRecord> {
        (0..n)
            .map(|i| RowRecord::from([("n".to_string(), i.to_string())]))
            .collect()
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let transport = Arc::new(RecordingTransport::new());
        let client = client(&transport);

        assert_eq!(client.authenticate().await.unwrap(), "token-1");
        assert_eq!(client.authenticate().await.unwrap(), "token-1");
        assert_eq!(transport.tokens_issued(), 1);
    }

    #[tokio::test]
    async fn test_clients_do_not_share_tokens() {
        let transport = Arc::new(RecordingTransport::new());

        let first = client(&transport).authenticate().await.unwrap();
        let second = client(&transport).authenticate().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(transport.tokens_issued(), 2);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_auth() {
        let transport = Arc::new(RecordingTransport::new());
        let config = SinkConfigBuilder::default()
            .client_id("")
            .client_secret("")
            .build()
            .unwrap();
        let client = SinkClient::new(config, transport.clone());

        let schema = DetectedSchema::from([("a".to_string(), DetectedType::String)]);
        let err = client
            .create_push_dataset("ds", "Data", &schema)
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Auth(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let transport = Arc::new(RecordingTransport::rejecting_credentials());
        let err = client(&transport).authenticate().await.unwrap_err();
        assert!(matches!(err, SinkError::Auth(_)));
    }

    #[tokio::test]
    async fn test_create_push_dataset() {
        let transport = Arc::new(RecordingTransport::new());
        let schema = DetectedSchema::from([
            ("id".to_string(), DetectedType::Integer),
            ("price".to_string(), DetectedType::Double),
        ]);

        let id = client(&transport)
            .create_push_dataset("jane_Sales_1", "Data", &schema)
            .await
            .unwrap();
        assert_eq!(id, "ds-123");

        let calls = transport.calls();
        assert_eq!(calls[0], Call::Token);
        assert_eq!(
            calls[1],
            Call::Post {
                url: "http://sink.test/v1.0/groups/ws/datasets".to_string(),
                bearer: "token-1".to_string(),
                body: json!({
                    "name": "jane_Sales_1",
                    "tables": [{"name": "Data", "columns": [
                        {"name": "id", "dataType": "Int64"},
                        {"name": "price", "dataType": "Double"}
                    ]}],
                    "defaultMode": "Push"
                }),
            }
        );
    }

    #[tokio::test]
    async fn test_create_push_dataset_sanitizes_name() {
        let transport = Arc::new(RecordingTransport::new());
        client(&transport)
            .create_push_dataset(" Jane's Salon #1 ", "Data", &DetectedSchema::new())
            .await
            .unwrap();

        match &transport.calls()[1] {
            Call::Post { body, .. } => assert_eq!(body["name"], "Janes_Salon_1"),
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_dataset_api_error() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond_with(400, "bad schema");

        let err = client(&transport)
            .create_push_dataset("ds", "Data", &DetectedSchema::new())
            .await
            .unwrap_err();
        match err {
            SinkError::Api { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad schema");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_dataset_without_id() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond_with(201, "{}");

        let err = client(&transport)
            .create_push_dataset("ds", "Data", &DetectedSchema::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_push_retries_once() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond_with(401, "expired");

        client(&transport)
            .push_rows("ds-1", "Data", &rows(2))
            .await
            .unwrap();

        assert_eq!(transport.tokens_issued(), 2);
        let bearers: Vec<_> = transport
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Post { bearer, .. } => Some(bearer),
                _ => None,
            })
            .collect();
        assert_eq!(bearers, vec!["token-1", "token-2"]);
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_auth_error() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond_with(401, "expired").respond_with(401, "still no");

        let err = client(&transport)
            .push_rows("ds-1", "Data", &rows(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Auth(_)));
        assert_eq!(transport.pushed_batches().len(), 2);
    }

    #[tokio::test]
    async fn test_push_rows_url_and_body() {
        let transport = Arc::new(RecordingTransport::new());
        client(&transport)
            .push_rows("ds-1", "Data", &rows(2))
            .await
            .unwrap();

        let calls = transport.calls();
        match &calls[1] {
            Call::Post { url, body, .. } => {
                assert_eq!(url, "http://sink.test/v1.0/groups/ws/datasets/ds-1/tables/Data/rows");
                assert_eq!(body, &json!({"rows": [{"n": "0"}, {"n": "1"}]}));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let transport = Arc::new(RecordingTransport::new());
        client(&transport).push_rows("ds-1", "Data", &[]).await.unwrap();
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_clear_table() {
        let transport = Arc::new(RecordingTransport::new());
        client(&transport).clear_table("ds-1", "Data").await.unwrap();

        assert_eq!(
            transport.calls()[1],
            Call::Delete {
                url: "http://sink.test/v1.0/groups/ws/datasets/ds-1/tables/Data/rows".to_string(),
                bearer: "token-1".to_string(),
            }
        );
    }
}
