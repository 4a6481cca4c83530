//! Retry policy and the retrying API client.
//!
//! [`ApiClient`] decorates any [`Transport`] with a [`RetryPolicy`]. Transient
//! statuses and lost responses are retried with exponential backoff only for
//! idempotent methods; a POST is never repeated once it may have reached the
//! server. Connection failures are retried for every method. Every other
//! non-2xx status fails immediately.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tracing::warn;

use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

/// Statuses treated as transient for every call.
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Methods that may be repeated after the server could have seen them.
pub const IDEMPOTENT_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
    Method::TRACE,
];

/// Upper bound for any single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// When and how long to wait before repeating a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub total: u32,
    /// Delay before retry `n` (0-based) is `backoff_factor * 2^n`.
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
    pub status_forcelist: Vec<u16>,
    /// Methods retried on transient statuses and lost responses.
    pub allowed_methods: Vec<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn new(total: u32, backoff_factor: Duration) -> Self {
        Self {
            total,
            backoff_factor,
            max_backoff: MAX_BACKOFF,
            status_forcelist: RETRY_STATUSES.to_vec(),
            allowed_methods: IDEMPOTENT_METHODS.to_vec(),
        }
    }

    /// Same policy with `status` also treated as transient.
    pub fn with_status(mut self, status: u16) -> Self {
        if !self.status_forcelist.contains(&status) {
            self.status_forcelist.push(status);
        }
        self
    }

    /// Search calls also retry 401, which the API returns transiently while
    /// credentials propagate.
    pub fn for_search(&self) -> Self {
        self.clone().with_status(401)
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Exponential backoff for the given 0-based retry number.
    pub fn backoff(&self, retry: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(retry);
        self.backoff_factor
            .checked_mul(multiplier)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// `Retry-After` on 429/503 overrides the computed backoff.
    fn delay_for(&self, retry: u32, response: Option<&ApiResponse>) -> Duration {
        match response {
            Some(r) if matches!(r.status, 429 | 503) && r.retry_after.is_some() => r
                .retry_after
                .unwrap_or_default()
                .min(self.max_backoff),
            _ => self.backoff(retry),
        }
    }
}

/// Manifest API client: a transport plus the default retry policy.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("policy", &self.policy).finish()
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issue a request under the default policy.
    pub async fn call(
        &self,
        method: Method,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, TransportError> {
        let request = ApiRequest {
            method,
            url: url.into(),
            body,
        };
        self.execute(&request, &self.policy).await
    }

    /// Issue a request under an explicit policy.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        policy: &RetryPolicy,
    ) -> Result<ApiResponse, TransportError> {
        let mut retry: u32 = 0;
        let idempotent = policy.allows_method(&request.method);

        loop {
            let (status, detail, delay) = match self.transport.execute(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) if idempotent && policy.is_retryable(response.status) => {
                    let delay = policy.delay_for(retry, Some(&response));
                    (Some(response.status), response.body, delay)
                }
                Ok(response) => {
                    return Err(TransportError::Status {
                        status: response.status,
                        body: response.body,
                    })
                }
                Err(TransportError::Connect(message)) => {
                    (None, message, policy.delay_for(retry, None))
                }
                Err(TransportError::Network(message)) if idempotent => {
                    (None, message, policy.delay_for(retry, None))
                }
                Err(e) => return Err(e),
            };

            if retry >= policy.total {
                return Err(TransportError::RetriesExhausted {
                    attempts: retry + 1,
                    status,
                    detail,
                });
            }

            warn!(
                method = %request.method,
                url = %request.url,
                status = ?status,
                attempt = retry + 1,
                delay_ms = delay.as_millis() as u64,
                "transient manifest API failure, retrying"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
