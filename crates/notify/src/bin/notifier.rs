//! ade-notifier: route source files into manifests and notify them.
//!
//! Subcommands:
//! - `add`: add one file to the right open manifest of a data source
//! - `notify`: notify every open manifest of a data source
//! - `search`: list manifests of a data source as JSON

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use ade_core::config::load_dotenv;
use ade_core::{NotifierConfig, SourceCatalog};
use ade_notify::{ManifestState, Notifier};

// ── CLI ─────────────────────────────────────────────────────────────

/// Manifest orchestration client for the ADE notify API.
#[derive(Parser, Debug)]
#[command(name = "ade-notifier", version, about)]
struct Cli {
    /// Path to the data source descriptor file (JSON or YAML).
    #[arg(long)]
    sources: Option<PathBuf>,

    /// Notify API base URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Notify API key.
    #[arg(long)]
    api_key: Option<String>,

    /// Notify API key secret.
    #[arg(long)]
    api_key_secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a file to a manifest of the given data source.
    Add {
        /// Data source id.
        #[arg(long)]
        source: String,

        /// Source file URL.
        #[arg(long)]
        file: String,

        /// File size in bytes, stored on the entry.
        #[arg(long)]
        content_length: Option<u64>,
    },

    /// Notify all open manifests of the given data source.
    Notify {
        /// Data source id.
        #[arg(long)]
        source: String,
    },

    /// List manifests of the given data source.
    Search {
        /// Data source id.
        #[arg(long)]
        source: String,

        /// OPEN, NOTIFIED, FAILED or ARCHIVED; empty lists all.
        #[arg(long, default_value = "OPEN")]
        state: String,
    },
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    config.log_summary();

    let catalog = SourceCatalog::load(&config.sources_file)
        .with_context(|| format!("failed to load data sources from {}", config.sources_file.display()))?;
    let notifier = Notifier::from_config(&config).context("failed to build notify API client")?;

    match cli.command {
        Command::Add {
            source,
            file,
            content_length,
        } => {
            let source = catalog.get(&source)?;
            let outcome = notifier
                .route_file(&file, content_length, source)
                .await
                .with_context(|| format!("failed to add {file} to a manifest"))?;
            info!(manifest_id = %outcome.manifest_id, created = outcome.created, "file routed");
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Notify { source } => {
            let source = catalog.get(&source)?;
            let report = notifier
                .notify_open_manifests(source)
                .await
                .with_context(|| format!("failed to notify manifests of {}", source.id))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Search { source, state } => {
            let source = catalog.get(&source)?;
            let state = ManifestState::parse_filter(&state).map_err(anyhow::Error::msg)?;
            let manifests = notifier
                .search(source, state)
                .await
                .with_context(|| format!("failed to search manifests of {}", source.id))?;
            println!("{}", serde_json::to_string_pretty(&manifests)?);
        }
    }

    Ok(())
}

/// Command-line values win; anything missing falls back to the profiled
/// environment.
fn resolve_config(cli: &Cli) -> Result<NotifierConfig> {
    let mut config = match (&cli.base_url, &cli.api_key, &cli.api_key_secret) {
        (Some(base_url), Some(api_key), Some(secret)) => {
            NotifierConfig::with_credentials(base_url, api_key, secret)
        }
        _ => NotifierConfig::from_env().context("incomplete notify API configuration")?,
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(api_key) = &cli.api_key {
        config.api_key = api_key.clone();
    }
    if let Some(secret) = &cli.api_key_secret {
        config.api_key_secret = secret.clone();
    }
    if let Some(sources) = &cli.sources {
        config.sources_file = sources.clone();
    }
    Ok(config)
}
