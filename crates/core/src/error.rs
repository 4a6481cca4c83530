use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating notifier configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("data source '{source_id}': missing required field '{field}'")]
    MissingField {
        source_id: String,
        field: &'static str,
    },

    #[error("data source '{0}': path_replace and path_replace_with must be set together")]
    InvalidPathReplace(String),

    #[error("data source '{source_id}': invalid batch pattern: {message}")]
    InvalidPattern { source_id: String, message: String },

    #[error("data source '{source_id}': {message}")]
    InvalidValue { source_id: String, message: String },

    #[error("data source not found: {0}")]
    SourceNotFound(String),

    #[error("missing required setting: {0}")]
    MissingEnv(&'static str),
}
