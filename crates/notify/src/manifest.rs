//! Stateful handle for one remote manifest.
//!
//! A [`Manifest`] separates what the caller may change (the
//! [`ManifestOptions`] used to build the create request) from what only the
//! server decides (the [`ManifestRecord`] snapshot with id, state and
//! timestamps). The snapshot is whatever the last create or fetch returned;
//! `notify` and entry writes do not refresh it.
//!
//! ```text
//! UNCREATED --create--> OPEN --notify--> NOTIFIED
//! ```
//!
//! Transition legality is the server's call. The handle only insists on a
//! known id before fetch, entry listing and notify.

use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info};

use ade_core::ManifestParameters;

use crate::endpoint::SourceEndpoint;
use crate::error::NotifierError;
use crate::retry::ApiClient;
use crate::transport::ApiResponse;
use crate::types::{ManifestEntry, ManifestRecord, ManifestState};

/// Request-construction fields; serialized as the create body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManifestOptions {
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delim: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fullscanned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skiph: Option<i64>,
}

impl ManifestOptions {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }
}

impl From<&ManifestParameters> for ManifestOptions {
    fn from(params: &ManifestParameters) -> Self {
        Self {
            format: params.format.clone(),
            batch: None,
            columns: params.columns.clone(),
            compression: params.compression.clone(),
            delim: params.delim.clone(),
            fullscanned: params.fullscanned,
            skiph: params.skiph,
        }
    }
}

/// Proxy for one manifest resource of a source entity.
#[derive(Debug)]
pub struct Manifest {
    client: ApiClient,
    endpoint: SourceEndpoint,
    /// Mutable until `create`; overwritten from the server afterwards.
    pub options: ManifestOptions,
    id: Option<String>,
    record: Option<ManifestRecord>,
    entries: Option<Vec<serde_json::Value>>,
    latest_response: Option<ApiResponse>,
}

impl Manifest {
    pub fn new(client: ApiClient, endpoint: SourceEndpoint, options: ManifestOptions) -> Self {
        Self {
            client,
            endpoint,
            options,
            id: None,
            record: None,
            entries: None,
            latest_response: None,
        }
    }

    /// Handle seeded with a data source's format parameters.
    pub fn for_source(
        client: ApiClient,
        endpoint: SourceEndpoint,
        params: &ManifestParameters,
    ) -> Self {
        Self::new(client, endpoint, ManifestOptions::from(params))
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Last-known server state; `None` until created or fetched.
    pub fn state(&self) -> Option<ManifestState> {
        self.record.as_ref().map(|r| r.state)
    }

    pub fn created(&self) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.created.as_deref())
    }

    pub fn modified(&self) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.modified.as_deref())
    }

    pub fn format(&self) -> &str {
        &self.options.format
    }

    pub fn record(&self) -> Option<&ManifestRecord> {
        self.record.as_ref()
    }

    /// Raw entry objects cached by the last `fetch_manifest_entries`.
    pub fn entries(&self) -> Option<&[serde_json::Value]> {
        self.entries.as_deref()
    }

    pub fn endpoint(&self) -> &SourceEndpoint {
        &self.endpoint
    }

    pub fn latest_response(&self) -> Option<&ApiResponse> {
        self.latest_response.as_ref()
    }

    /// POST the options to the collection and adopt the created manifest.
    pub async fn create(&mut self) -> Result<&ManifestRecord, NotifierError> {
        let url = self.endpoint.manifests();
        let body = serde_json::to_value(&self.options).map_err(|e| NotifierError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let response = self.send(Method::POST, &url, Some(body)).await?;
        let record = decode::<ManifestRecord>(&url, &response)?;
        info!(
            manifest_id = %record.id,
            source_system = %self.endpoint.source_system(),
            source_entity = %self.endpoint.source_entity(),
            "manifest created"
        );
        Ok(self.adopt(record))
    }

    /// Refresh from the server, adopting `id` first when given.
    pub async fn fetch_manifest(
        &mut self,
        id: Option<&str>,
    ) -> Result<&ManifestRecord, NotifierError> {
        if let Some(id) = id {
            self.id = Some(id.to_string());
        }
        let id = self.require_id("fetch_manifest")?;

        let url = self.endpoint.manifest(&id);
        let response = self.send(Method::GET, &url, None).await?;
        let record = decode::<ManifestRecord>(&url, &response)?;
        debug!(manifest_id = %record.id, state = %record.state, "manifest fetched");
        Ok(self.adopt(record))
    }

    /// Load and cache the entry list of the current manifest.
    ///
    /// Entries are kept as the server sent them; only the list shape is
    /// checked, so odd fields on a single entry never block counting.
    pub async fn fetch_manifest_entries(
        &mut self,
    ) -> Result<&[serde_json::Value], NotifierError> {
        let id = self.require_id("fetch_manifest_entries")?;

        let url = self.endpoint.entries(&id);
        let response = self.send(Method::GET, &url, None).await?;
        let entries = decode::<Vec<serde_json::Value>>(&url, &response)?;
        debug!(manifest_id = %id, count = entries.len(), "manifest entries fetched");
        Ok(self.entries.insert(entries).as_slice())
    }

    /// Seal the manifest for downstream pickup.
    ///
    /// Local state is not refreshed; call `fetch_manifest` to observe
    /// `NOTIFIED`.
    pub async fn notify(&mut self, id: Option<&str>) -> Result<(), NotifierError> {
        if let Some(id) = id {
            self.id = Some(id.to_string());
        }
        let id = self.require_id("notify")?;

        let url = self.endpoint.notify(&id);
        self.send(Method::POST, &url, None).await?;
        info!(manifest_id = %id, "manifest notified");
        Ok(())
    }

    /// Create the manifest unless an id is already known; returns the id.
    pub async fn ensure_created(&mut self) -> Result<String, NotifierError> {
        if let Some(id) = &self.id {
            return Ok(id.clone());
        }
        let record = self.create().await?;
        Ok(record.id.clone())
    }

    /// Append one entry, creating the manifest first if needed.
    pub async fn add_entry(
        &mut self,
        source_file: &str,
        batch: Option<i64>,
        content_length: Option<u64>,
    ) -> Result<(), NotifierError> {
        let id = self.ensure_created().await?;

        let entry = ManifestEntry::new(source_file)
            .with_batch(batch)
            .with_content_length(content_length);
        let url = self.endpoint.entries(&id);
        let body = serde_json::to_value(&entry).map_err(|e| NotifierError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;

        self.send(Method::POST, &url, Some(body)).await?;
        debug!(manifest_id = %id, source_file, batch = ?batch, "manifest entry added");
        Ok(())
    }

    /// Upsert entries by `source_file`, creating the manifest first if needed.
    pub async fn add_entries(&mut self, entries: &[ManifestEntry]) -> Result<(), NotifierError> {
        let id = self.ensure_created().await?;

        let url = self.endpoint.entries(&id);
        let body = serde_json::to_value(entries).map_err(|e| NotifierError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;

        self.send(Method::PUT, &url, Some(body)).await?;
        debug!(manifest_id = %id, count = entries.len(), "manifest entries upserted");
        Ok(())
    }

    fn require_id(&self, operation: &'static str) -> Result<String, NotifierError> {
        self.id
            .clone()
            .ok_or(NotifierError::MissingId { operation })
    }

    fn adopt(&mut self, record: ManifestRecord) -> &ManifestRecord {
        if let Some(format) = &record.format {
            self.options.format = format.clone();
        }
        self.options.batch = record.batch;
        self.options.columns = record.columns.clone();
        self.options.compression = record.compression.clone();
        self.options.delim = record.delim.clone();
        self.options.fullscanned = record.fullscanned;
        self.options.skiph = record.skiph;
        self.id = Some(record.id.clone());
        self.record.insert(record)
    }

    async fn send(
        &mut self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, NotifierError> {
        match self.client.call(method, url, body).await {
            Ok(response) => {
                self.latest_response = Some(response.clone());
                Ok(response)
            }
            Err(e) => {
                if let Some(response) = e.response() {
                    self.latest_response = Some(response);
                }
                Err(e.into())
            }
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    url: &str,
    response: &ApiResponse,
) -> Result<T, NotifierError> {
    response.json::<T>().map_err(|e| NotifierError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
