//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::endpoint::SourceEndpoint;
use crate::retry::{ApiClient, RetryPolicy};
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(ApiResponse::new(status, body.to_string())));
    }

    pub fn push_status(&self, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(ApiResponse::new(status, "")));
    }

    pub fn push_network_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Network(message.to_string())));
    }

    pub fn push_connect_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Connect(message.to_string())));
    }

    pub fn push_request_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Request(message.to_string())));
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// `METHOD url` for each recorded call, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| format!("{} {}", c.method, c.url))
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted response".into())))
    }
}

pub const BASE: &str = "https://api.test/notify-api";

/// Collection url for the `erp`/`orders` endpoint used throughout the tests.
pub const MANIFESTS: &str = "https://api.test/notify-api/tenants/local/installations/local/environments/local/source-systems/erp/source-entities/orders/manifests";

pub fn endpoint() -> SourceEndpoint {
    SourceEndpoint::new(BASE, "erp", "orders").unwrap()
}

/// Client over `mock` with one instant retry.
pub fn client(mock: &Arc<MockTransport>) -> ApiClient {
    ApiClient::new(mock.clone(), RetryPolicy::new(1, Duration::ZERO))
}

/// Server-side manifest object as the API returns it.
pub fn manifest_json(id: &str, state: &str, created: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "state": state,
        "created": created,
        "modified": created,
        "format": "csv",
        "batch": null,
        "columns": null,
        "compression": null,
        "delim": ",",
        "fullscanned": null,
        "skiph": null
    })
}
