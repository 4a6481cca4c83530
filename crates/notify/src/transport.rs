//! Raw HTTP access to the manifest API.
//!
//! A [`Transport`] performs exactly one request and reports whatever status
//! the server answered with. Retrying is layered on top by
//! [`ApiClient`](crate::retry::ApiClient), so every endpoint shares one policy.

use std::time::Duration;

use serde::de::DeserializeOwned;

/// Errors that can occur while talking to the manifest API.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established; the request never left.
    #[error("connect error: {0}")]
    Connect(String),

    /// The request may have reached the server but no response arrived
    /// (read timeout, reset mid-exchange).
    #[error("network error: {0}")]
    Network(String),

    /// The request could not be built or serialized locally.
    #[error("invalid request: {0}")]
    Request(String),

    /// The server answered with a status that is not retried.
    #[error("manifest API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Every retry was spent; carries the last status (if any) and body or
    /// network error text.
    #[error("giving up after {attempts} attempts (last status: {}): {detail}", describe_status(.status))]
    RetriesExhausted {
        attempts: u32,
        status: Option<u16>,
        detail: String,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

fn describe_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl TransportError {
    /// HTTP status of the last response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::RetriesExhausted { status, .. } => *status,
            _ => None,
        }
    }

    /// The server answer carried by this error, when one was received.
    pub fn response(&self) -> Option<ApiResponse> {
        match self {
            TransportError::Status { status, body } => Some(ApiResponse::new(*status, body.clone())),
            TransportError::RetriesExhausted {
                status: Some(status),
                detail,
                ..
            } => Some(ApiResponse::new(*status, detail.clone())),
            _ => None,
        }
    }
}

/// One request against the manifest API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, in whole seconds.
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Single-attempt request execution.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send the request once. Non-2xx statuses are returned as `Ok`; only
    /// failures without a response are errors.
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport with basic auth and JSON content type.
pub struct HttpTransport {
    api_key: String,
    api_key_secret: String,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_key", &self.api_key)
            .field("api_key_secret", &"<redacted>")
            .finish()
    }
}

impl HttpTransport {
    pub fn new(
        api_key: impl Into<String>,
        api_key_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            api_key_secret: api_key_secret.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .basic_auth(&self.api_key, Some(&self.api_key_secret))
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        if let Some(body) = &request.body {
            let payload = serde_json::to_string(body).map_err(|e| {
                TransportError::Request(format!("failed to serialize request body: {e}"))
            })?;
            builder = builder.body(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status,
            "manifest API call completed"
        );

        Ok(ApiResponse {
            status,
            body,
            retry_after,
        })
    }
}

fn classify_send_error(e: reqwest::Error) -> TransportError {
    if e.is_builder() {
        TransportError::Request(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Only the delta-seconds form is honored; HTTP dates fall back to backoff.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
