use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

const DEFAULT_SOURCES_FILE: &str = "config/sources.json";

// ── Notifier config ───────────────────────────────────────────

/// Connection settings for the remote manifest API plus retry tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub base_url: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_key_secret: String,
    pub sources_file: PathBuf,
    pub http_timeout_secs: u64,
    pub retry_total: u32,
    pub retry_backoff_secs: u64,
}

impl NotifierConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ADE_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = env_or("ADE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, ConfigError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let base_url = profiled_env_opt(p, "NOTIFY_API_BASE_URL")
            .ok_or(ConfigError::MissingEnv("NOTIFY_API_BASE_URL"))?;
        let api_key = profiled_env_opt(p, "NOTIFY_API_KEY")
            .ok_or(ConfigError::MissingEnv("NOTIFY_API_KEY"))?;
        let api_key_secret = profiled_env_opt(p, "NOTIFY_API_KEY_SECRET")
            .ok_or(ConfigError::MissingEnv("NOTIFY_API_KEY_SECRET"))?;
        Ok(Self::tuned(p, base_url, api_key, api_key_secret))
    }

    /// Credentials supplied directly (e.g. from command-line flags); the
    /// optional keys still come from the environment of the active profile.
    pub fn with_credentials(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_key_secret: impl Into<String>,
    ) -> Self {
        let profile = env_or("ADE_PROFILE", "").to_uppercase();
        Self::tuned(&profile, base_url.into(), api_key.into(), api_key_secret.into())
    }

    fn tuned(p: &str, base_url: String, api_key: String, api_key_secret: String) -> Self {
        Self {
            profile: p.to_string(),
            base_url,
            api_key,
            api_key_secret,
            sources_file: PathBuf::from(profiled_env_or(
                p,
                "NOTIFY_SOURCES_FILE",
                DEFAULT_SOURCES_FILE,
            )),
            http_timeout_secs: profiled_env_u64(p, "NOTIFY_HTTP_TIMEOUT_SECS", 30),
            retry_total: profiled_env_u32(p, "NOTIFY_RETRY_TOTAL", 3),
            retry_backoff_secs: profiled_env_u64(p, "NOTIFY_RETRY_BACKOFF_SECS", 2),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  api:     base_url={}, key={}", self.base_url, redact(&self.api_key));
        tracing::info!("  sources: file={}", self.sources_file.display());
        tracing::info!(
            "  http:    timeout={}s, retries={}, backoff={}s",
            self.http_timeout_secs,
            self.retry_total,
            self.retry_backoff_secs
        );
    }
}

/// Keep the first four characters of a credential, mask the rest.
fn redact(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{visible}****")
}
