//! HTTP layer under the sink client
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::SINK_REQUEST_TIMEOUT;
use crate::error::SinkError;
use crate::sink::types::TokenResponse;

/// Client-credentials token request
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

/// Status and raw body of a sink response
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Raw requests the sink protocol is built from.
///
/// Implementations report non-2xx answers as a [`TransportResponse`], not as
/// an error; only failures to get an answer at all are errors.
#[async_trait]
pub trait SinkTransport: Send + Sync {
    /// Exchange client credentials for a bearer token
    async fn fetch_token(&self, request: &TokenRequest) -> Result<String, SinkError>;

    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> Result<TransportResponse, SinkError>;

    async fn delete(&self, url: &str, bearer: &str) -> Result<TransportResponse, SinkError>;
}

/// [`SinkTransport`] over `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tabular-ingest/", env!("CARGO_PKG_VERSION")))
            .timeout(SINK_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    async fn into_response(response: reqwest::Response) -> Result<TransportResponse, SinkError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl SinkTransport for HttpTransport {
    async fn fetch_token(&self, request: &TokenRequest) -> Result<String, SinkError> {
        let response = self
            .client
            .post(&request.url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", request.client_id.as_str()),
                ("client_secret", request.client_secret.as_str()),
                ("scope", request.scope.as_str()),
            ])
            .send()
            .await?;

        let response = Self::into_response(response).await?;
        if !response.is_success() {
            return Err(SinkError::Auth(format!(
                "token endpoint returned {}: {}",
                response.status, response.body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| SinkError::UnexpectedResponse(format!("token response: {}", e)))?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SinkError::Auth("token response has no access_token".to_string()))
    }

    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> Result<TransportResponse, SinkError> {
        debug!(url, "POST");
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await?;
        Self::into_response(response).await
    }

    async fn delete(&self, url: &str, bearer: &str) -> Result<TransportResponse, SinkError> {
        debug!(url, "DELETE");
        let response = self.client.delete(url).bearer_auth(bearer).send().await?;
        Self::into_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_classification() {
        let ok = TransportResponse {
            status: 202,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!ok.is_unauthorized());

        let denied = TransportResponse {
            status: 401,
            body: "expired".to_string(),
        };
        assert!(!denied.is_success());
        assert!(denied.is_unauthorized());

        let redirect = TransportResponse {
            status: 302,
            body: String::new(),
        };
        assert!(!redirect.is_success());
    }
}
