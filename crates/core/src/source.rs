//! Data-source descriptors: which source system/entity a file belongs to and
//! how its manifests are shaped.
//!
//! Descriptors are loaded from a JSON array (or YAML list) and validated
//! eagerly, so a malformed descriptor fails before any API call is made.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Capacity applied when a descriptor does not mention `max_files_in_manifest`.
pub const DEFAULT_MAX_FILES_IN_MANIFEST: u64 = 1000;

fn default_max_files() -> Option<u64> {
    Some(DEFAULT_MAX_FILES_IN_MANIFEST)
}

/// One configured ingestion source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    #[serde(default)]
    pub id: String,
    pub attributes: SourceAttributes,
    #[serde(alias = "manifestParameters")]
    pub manifest_parameters: ManifestParameters,
}

/// Routing and manifest lifecycle settings of a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttributes {
    #[serde(rename = "ade_source_system", alias = "sourceSystem", alias = "source_system", default)]
    pub source_system: String,
    #[serde(rename = "ade_source_entity", alias = "sourceEntity", alias = "source_entity", default)]
    pub source_entity: String,
    /// Pattern whose capturing groups, concatenated, form the batch number.
    #[serde(default, alias = "batchFromFilePathRegex")]
    pub batch_from_file_path_regex: Option<String>,
    #[serde(default, alias = "pathReplace")]
    pub path_replace: Option<String>,
    #[serde(default, alias = "pathReplaceWith")]
    pub path_replace_with: Option<String>,
    /// Notify the manifest right after its single entry has been added.
    #[serde(default, alias = "singleFileManifest", deserialize_with = "lenient_bool")]
    pub single_file_manifest: bool,
    /// `None` disables the capacity check (explicit `null` in the descriptor).
    #[serde(default = "default_max_files", alias = "maxFilesInManifest")]
    pub max_files_in_manifest: Option<u64>,
}

/// Format parameters copied onto every manifest created for a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestParameters {
    #[serde(default)]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullscanned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skiph: Option<i64>,
}

/// Accepts `true`/`false` as booleans or strings; `null` reads as false.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(false),
        Some(BoolOrString::Bool(b)) => Ok(b),
        Some(BoolOrString::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected boolean for single_file_manifest, got '{other}'"
            ))),
        },
    }
}

impl DataSourceConfig {
    /// Parse and validate a single JSON descriptor.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let source: Self = serde_json::from_str(json)?;
        source.validate()?;
        Ok(source)
    }

    /// Check everything the orchestrator relies on before touching the API.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = |field| ConfigError::MissingField {
            source_id: self.id.clone(),
            field,
        };

        if self.id.trim().is_empty() {
            return Err(missing("id"));
        }
        if self.attributes.source_system.trim().is_empty() {
            return Err(missing("ade_source_system"));
        }
        if self.attributes.source_entity.trim().is_empty() {
            return Err(missing("ade_source_entity"));
        }
        if self.manifest_parameters.format.trim().is_empty() {
            return Err(missing("format"));
        }

        match (&self.attributes.path_replace, &self.attributes.path_replace_with) {
            (Some(from), Some(_)) if from.is_empty() => {
                return Err(ConfigError::InvalidValue {
                    source_id: self.id.clone(),
                    message: "path_replace must not be empty".to_string(),
                });
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::InvalidPathReplace(self.id.clone()));
            }
            _ => {}
        }

        if let Some(pattern) = &self.attributes.batch_from_file_path_regex {
            regex::Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                source_id: self.id.clone(),
                message: e.to_string(),
            })?;
        }

        if self.attributes.max_files_in_manifest == Some(0) {
            return Err(ConfigError::InvalidValue {
                source_id: self.id.clone(),
                message: "max_files_in_manifest must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn source_system(&self) -> &str {
        &self.attributes.source_system
    }

    pub fn source_entity(&self) -> &str {
        &self.attributes.source_entity
    }

    pub fn batch_pattern(&self) -> Option<&str> {
        self.attributes.batch_from_file_path_regex.as_deref()
    }

    pub fn max_files_in_manifest(&self) -> Option<u64> {
        self.attributes.max_files_in_manifest
    }

    pub fn single_file_manifest(&self) -> bool {
        self.attributes.single_file_manifest
    }

    /// Path stored in the manifest entry for `file_url`.
    ///
    /// Every occurrence of `path_replace` is substituted; without a complete
    /// replace pair the url is used verbatim.
    pub fn entry_path(&self, file_url: &str) -> String {
        match (&self.attributes.path_replace, &self.attributes.path_replace_with) {
            (Some(from), Some(to)) if !from.is_empty() => file_url.replace(from.as_str(), to),
            _ => file_url.to_string(),
        }
    }
}

// ── Catalog ───────────────────────────────────────────────────

/// All descriptors from one configuration file, validated.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Vec<DataSourceConfig>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<DataSourceConfig>) -> Result<Self, ConfigError> {
        for source in &sources {
            source.validate()?;
        }
        Ok(Self { sources })
    }

    /// Load descriptors from a `.json`, `.yml` or `.yaml` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yml" || e == "yaml");

        let sources: Vec<DataSourceConfig> = if is_yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        let catalog = Self::new(sources)?;
        info!(path = %path.display(), count = catalog.len(), "loaded data sources");
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Result<&DataSourceConfig, ConfigError> {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ConfigError::SourceNotFound(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataSourceConfig> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
