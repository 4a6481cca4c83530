//! Client-side manifest orchestration for the ADE notify API.
//!
//! This crate provides:
//! - `Transport` trait with a reqwest-backed implementation
//! - `ApiClient` applying a shared retry/backoff policy to every call
//! - `Manifest` handle wrapping create/fetch/notify/entry operations
//! - Manifest search ordered by creation time and batch number parsing
//! - `Notifier` routing incoming files to manifests and bulk notifying

pub mod batch;
pub mod endpoint;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod retry;
pub mod search;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use batch::{parse_batch, BatchParseError};
pub use endpoint::SourceEndpoint;
pub use error::{ManifestFailure, NotifierError};
pub use manifest::{Manifest, ManifestOptions};
pub use orchestrator::{IngestOutcome, Notifier, NotifyReport};
pub use retry::{ApiClient, RetryPolicy};
pub use search::search_manifests;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, TransportError};
pub use types::{ManifestEntry, ManifestRecord, ManifestState};
