//! Recording transport used by sink and orchestrator tests
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::transport::{SinkTransport, TokenRequest, TransportResponse};
use crate::error::SinkError;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Token,
    Post {
        url: String,
        bearer: String,
        body: Value,
    },
    Delete {
        url: String,
        bearer: String,
    },
}

/// Answers every request successfully unless a response was queued with
/// [`RecordingTransport::respond_with`]; queued responses are used first, in
/// order.
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    queued: Mutex<VecDeque<TransportResponse>>,
    tokens_issued: AtomicUsize,
    reject_credentials: bool,
    dataset_id: String,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
            tokens_issued: AtomicUsize::new(0),
            reject_credentials: false,
            dataset_id: "ds-123".to_string(),
        }
    }

    /// Token endpoint refuses every request
    pub fn rejecting_credentials() -> Self {
        Self {
            reject_credentials: true,
            ..Self::new()
        }
    }

    pub fn respond_with(&self, status: u16, body: &str) -> &Self {
        self.queued.lock().unwrap().push_back(TransportResponse {
            status,
            body: body.to_string(),
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Bodies of every row push, in call order
    pub fn pushed_batches(&self) -> Vec<Vec<Value>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Post { url, body, .. } if url.ends_with("/rows") => {
                    body["rows"].as_array().cloned()
                }
                _ => None,
            })
            .collect()
    }

    pub fn tokens_issued(&self) -> usize {
        self.tokens_issued.load(Ordering::SeqCst)
    }

    fn next_response(&self, default: TransportResponse) -> TransportResponse {
        self.queued.lock().unwrap().pop_front().unwrap_or(default)
    }
}

#[async_trait]
impl SinkTransport for RecordingTransport {
    async fn fetch_token(&self, _request: &TokenRequest) -> Result<String, SinkError> {
        self.calls.lock().unwrap().push(Call::Token);
        if self.reject_credentials {
            return Err(SinkError::Auth("invalid_client".to_string()));
        }
        let n = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{n}"))
    }

    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> Result<TransportResponse, SinkError> {
        self.calls.lock().unwrap().push(Call::Post {
            url: url.to_string(),
            bearer: bearer.to_string(),
            body: body.clone(),
        });

        let default = if url.ends_with("/datasets") {
            TransportResponse {
                status: 201,
                body: json!({ "id": self.dataset_id }).to_string(),
            }
        } else {
            TransportResponse {
                status: 200,
                body: String::new(),
            }
        };
        Ok(self.next_response(default))
    }

    async fn delete(&self, url: &str, bearer: &str) -> Result<TransportResponse, SinkError> {
        self.calls.lock().unwrap().push(Call::Delete {
            url: url.to_string(),
            bearer: bearer.to_string(),
        });
        Ok(self.next_response(TransportResponse {
            status: 200,
            body: String::new(),
        }))
    }
}
