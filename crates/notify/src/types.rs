//! Wire types of the manifest API.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a manifest as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ManifestState {
    Open,
    Notified,
    Failed,
    Archived,
    /// Any state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ManifestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestState::Open => "OPEN",
            ManifestState::Notified => "NOTIFIED",
            ManifestState::Failed => "FAILED",
            ManifestState::Archived => "ARCHIVED",
            ManifestState::Unknown => "UNKNOWN",
        }
    }

    /// Parse an optional search filter: blank input means "no filter".
    pub fn parse_filter(input: &str) -> Result<Option<Self>, String> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        input.parse().map(Some)
    }
}

impl fmt::Display for ManifestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManifestState {
    type Err = String;

    /// Case-insensitive; `UNKNOWN` is not a valid filter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Ok(ManifestState::Open),
            "NOTIFIED" => Ok(ManifestState::Notified),
            "FAILED" => Ok(ManifestState::Failed),
            "ARCHIVED" => Ok(ManifestState::Archived),
            other => Err(format!(
                "unsupported manifest state '{other}' (expected OPEN, NOTIFIED, FAILED or ARCHIVED)"
            )),
        }
    }
}

/// Manifest object returned by create, fetch and search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub id: String,
    #[serde(default = "unknown_state")]
    pub state: ManifestState,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub batch: Option<i64>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub delim: Option<String>,
    #[serde(default)]
    pub fullscanned: Option<bool>,
    #[serde(default)]
    pub skiph: Option<i64>,
}

fn unknown_state() -> ManifestState {
    ManifestState::Unknown
}

impl ManifestRecord {
    /// Creation time, if the server sent a parseable timestamp.
    ///
    /// Accepts RFC 3339 and offset-less ISO 8601 (read as UTC).
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created.as_deref().and_then(parse_timestamp)
    }

    /// Ascending creation order. Parseable timestamps compare by instant;
    /// the raw string breaks ties and orders unparseable values.
    pub fn creation_order(a: &Self, b: &Self) -> Ordering {
        (a.created_at(), a.created.as_deref()).cmp(&(b.created_at(), b.created.as_deref()))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// One file reference inside a manifest. `source_file` is the upsert key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
}

impl ManifestEntry {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            batch: None,
            content_length: None,
        }
    }

    pub fn with_batch(mut self, batch: Option<i64>) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_content_length(mut self, content_length: Option<u64>) -> Self {
        self.content_length = content_length;
        self
    }
}
