//! Error type shared by the manifest handle, search and orchestration.

use ade_core::ConfigError;

use crate::transport::TransportError;

/// A manifest that could not be fetched or notified during a bulk notify.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFailure {
    pub manifest_id: String,
    pub error: String,
}

/// Errors surfaced to callers of the notifier.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    /// An id-bound operation ran before the handle was created or fetched.
    #[error("manifest id is not set: create or fetch a manifest before calling {operation}")]
    MissingId { operation: &'static str },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered 2xx with a body that is not the expected JSON.
    #[error("unexpected response body from {url}: {message}")]
    Decode { url: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Some open manifests could not be notified; all were attempted.
    #[error("failed to notify {} of {total} open manifests for source '{source_id}'", .failures.len())]
    BulkNotify {
        source_id: String,
        total: usize,
        notified: Vec<String>,
        failures: Vec<ManifestFailure>,
    },
}

impl NotifierError {
    /// True for ordering mistakes in the caller rather than remote failures.
    pub fn is_precondition(&self) -> bool {
        matches!(self, NotifierError::MissingId { .. })
    }
}
