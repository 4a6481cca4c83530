//! Routes incoming files to manifests and seals open manifests.
//!
//! Each call is request-scoped: nothing is cached between calls and the
//! remote API stays the only source of truth. The search-then-act sequence
//! is not atomic, so two concurrent calls for the same source may both
//! append to the same latest manifest or both create a new one. Callers that
//! need strict ordering must serialize ingestion per source.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use ade_core::{DataSourceConfig, NotifierConfig};

use crate::batch::parse_batch;
use crate::endpoint::SourceEndpoint;
use crate::error::{ManifestFailure, NotifierError};
use crate::manifest::Manifest;
use crate::retry::{ApiClient, RetryPolicy};
use crate::search::{manifest_ids, search_manifests};
use crate::transport::HttpTransport;
use crate::types::{ManifestRecord, ManifestState};

/// What `route_file_to_manifest` did with one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub manifest_id: String,
    /// A new manifest was created for this file.
    pub created: bool,
    pub entry_path: String,
    pub batch: Option<i64>,
    /// Set when a batch pattern is configured but did not yield a number.
    pub batch_warning: Option<String>,
    /// Present when the source seals a manifest after every file.
    pub notified: Option<NotifyReport>,
}

/// Result of `notify_open_manifests`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifyReport {
    pub source_id: String,
    /// Notified manifest ids, in creation order.
    pub notified: Vec<String>,
    /// Set when there was nothing to notify.
    pub warning: Option<String>,
}

/// Entry point for manifest operations against one manifest API.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: ApiClient,
    base_url: String,
}

impl Notifier {
    pub fn new(client: ApiClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// HTTP-backed notifier using the configured credentials and retry tuning.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifierError> {
        let transport = HttpTransport::new(
            config.api_key.clone(),
            config.api_key_secret.clone(),
            config.http_timeout(),
        )?;
        let policy = RetryPolicy::new(config.retry_total, config.retry_backoff());
        Ok(Self::new(
            ApiClient::new(Arc::new(transport), policy),
            config.base_url.clone(),
        ))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn endpoint(&self, source: &DataSourceConfig) -> Result<SourceEndpoint, NotifierError> {
        Ok(SourceEndpoint::new(
            &self.base_url,
            source.source_system(),
            source.source_entity(),
        )?)
    }

    /// Fresh handle seeded with the source's format parameters.
    pub fn manifest_for(&self, source: &DataSourceConfig) -> Result<Manifest, NotifierError> {
        Ok(Manifest::for_source(
            self.client.clone(),
            self.endpoint(source)?,
            &source.manifest_parameters,
        ))
    }

    /// Manifests of the source in creation order.
    pub async fn search(
        &self,
        source: &DataSourceConfig,
        state: Option<ManifestState>,
    ) -> Result<Vec<ManifestRecord>, NotifierError> {
        search_manifests(&self.client, &self.endpoint(source)?, state).await
    }

    /// Add `file_url` to the right open manifest of `source`.
    pub async fn route_file_to_manifest(
        &self,
        file_url: &str,
        source: &DataSourceConfig,
    ) -> Result<IngestOutcome, NotifierError> {
        self.route_file(file_url, None, source).await
    }

    /// Same as [`route_file_to_manifest`](Self::route_file_to_manifest), also
    /// recording the file size on the entry.
    pub async fn route_file(
        &self,
        file_url: &str,
        content_length: Option<u64>,
        source: &DataSourceConfig,
    ) -> Result<IngestOutcome, NotifierError> {
        source.validate()?;

        let open = self.search(source, Some(ManifestState::Open)).await?;
        let open_ids = manifest_ids(&open);
        info!(source = %source.id, open_manifests = ?open_ids, "open manifests");

        let (mut manifest, created) = self.select_manifest(source, &open_ids).await?;

        let entry_path = source.entry_path(file_url);

        let (batch, batch_warning) = match source.batch_pattern() {
            Some(pattern) => match parse_batch(file_url, pattern) {
                Ok(batch) => {
                    info!(source = %source.id, batch, "batch parsed");
                    (Some(batch), None)
                }
                Err(e) => {
                    warn!(source = %source.id, file_url, error = %e, "batch parsing failed");
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        manifest.add_entry(&entry_path, batch, content_length).await?;
        let manifest_id = manifest.ensure_created().await?;
        info!(source = %source.id, manifest_id = %manifest_id, entry = %entry_path, "added entry");

        let notified = if source.single_file_manifest() {
            info!(source = %source.id, "single file manifest, notifying open manifests");
            Some(self.notify_open_manifests(source).await?)
        } else {
            None
        };

        Ok(IngestOutcome {
            manifest_id,
            created,
            entry_path,
            batch,
            batch_warning,
            notified,
        })
    }

    /// Pick the manifest for the next entry: reuse the most recently created
    /// open manifest unless it is full, otherwise create one.
    async fn select_manifest(
        &self,
        source: &DataSourceConfig,
        open_ids: &[String],
    ) -> Result<(Manifest, bool), NotifierError> {
        let mut manifest = self.manifest_for(source)?;

        let Some(latest) = open_ids.last() else {
            manifest.create().await?;
            info!(source = %source.id, manifest_id = ?manifest.id(), "manifest created");
            return Ok((manifest, true));
        };

        manifest.fetch_manifest(Some(latest.as_str())).await?;

        if let Some(limit) = source.max_files_in_manifest() {
            let count = manifest.fetch_manifest_entries().await?.len() as u64;
            if count >= limit {
                info!(
                    source = %source.id,
                    manifest_id = %latest,
                    entries = count,
                    limit,
                    "open manifest is full, creating a new one"
                );
                let mut fresh = self.manifest_for(source)?;
                fresh.create().await?;
                info!(source = %source.id, manifest_id = ?fresh.id(), "manifest created");
                return Ok((fresh, true));
            }
        }

        info!(source = %source.id, manifest_id = %latest, "using open manifest");
        Ok((manifest, false))
    }

    /// Notify every open manifest of `source`, oldest first.
    ///
    /// Finding none is a warning, not an error. A failing manifest does not
    /// stop the others; after all were attempted the failures are returned
    /// as [`NotifierError::BulkNotify`].
    pub async fn notify_open_manifests(
        &self,
        source: &DataSourceConfig,
    ) -> Result<NotifyReport, NotifierError> {
        let open = self.search(source, Some(ManifestState::Open)).await?;

        if open.is_empty() {
            let message = format!(
                "open manifests for source {} not found when attempting to notify",
                source.id
            );
            warn!(source = %source.id, "{message}");
            return Ok(NotifyReport {
                source_id: source.id.clone(),
                notified: Vec::new(),
                warning: Some(message),
            });
        }

        let mut manifest = self.manifest_for(source)?;
        let mut notified = Vec::with_capacity(open.len());
        let mut failures = Vec::new();

        for id in manifest_ids(&open) {
            let result = match manifest.fetch_manifest(Some(id.as_str())).await {
                Ok(_) => manifest.notify(None).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    info!(source = %source.id, manifest_id = %id, "notified manifest");
                    notified.push(id);
                }
                Err(e) => {
                    error!(source = %source.id, manifest_id = %id, error = %e, "notify failed");
                    failures.push(ManifestFailure {
                        manifest_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(NotifierError::BulkNotify {
                source_id: source.id.clone(),
                total: open.len(),
                notified,
                failures,
            });
        }

        Ok(NotifyReport {
            source_id: source.id.clone(),
            notified,
            warning: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{client, manifest_json, MockTransport, BASE, MANIFESTS};

    fn source(extra: serde_json::Value) -> DataSourceConfig {
        let mut attributes = serde_json::json!({
            "ade_source_system": "erp",
            "ade_source_entity": "orders",
        });
        if let (Some(base), Some(extra)) = (attributes.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(serde_json::json!({
            "id": "orders",
            "attributes": attributes,
            "manifest_parameters": { "format": "csv", "delim": "," }
        }))
        .unwrap()
    }

    fn notifier(mock: &Arc<MockTransport>) -> Notifier {
        Notifier::new(client(mock), BASE)
    }

    fn entries(n: usize) -> serde_json::Value {
        serde_json::Value::Array(
            (0..n)
                .map(|i| serde_json::json!({"sourceFile": format!("f{i}.csv")}))
                .collect(),
        )
    }

    #[tokio::test]
    async fn no_open_manifest_creates_one() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, serde_json::json!([]));
        mock.push_json(201, manifest_json("new", "OPEN", "2024-01-01T00:00:00Z"));
        mock.push_status(201);

        let outcome = notifier(&mock)
            .route_file_to_manifest("s3://raw/a.csv", &source(serde_json::json!({})))
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.manifest_id, "new");
        assert_eq!(
            mock.call_log(),
            vec![
                format!("GET {MANIFESTS}?state=OPEN"),
                format!("POST {MANIFESTS}"),
                format!("POST {MANIFESTS}/new/entries"),
            ]
        );
        // Create body carries the source's format parameters.
        assert_eq!(
            mock.calls()[1].body,
            Some(serde_json::json!({"format": "csv", "delim": ","}))
        );
    }

    #[tokio::test]
    async fn reuses_latest_open_manifest_below_limit() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            serde_json::json!([
                manifest_json("newer", "OPEN", "2024-02-01T00:00:00Z"),
                manifest_json("older", "OPEN", "2024-01-01T00:00:00Z"),
            ]),
        );
        mock.push_json(200, manifest_json("newer", "OPEN", "2024-02-01T00:00:00Z"));
        mock.push_json(200, entries(2));
        mock.push_status(201);

        let outcome = notifier(&mock)
            .route_file_to_manifest(
                "s3://raw/b.csv",
                &source(serde_json::json!({"max_files_in_manifest": 3})),
            )
            .await
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.manifest_id, "newer");
        assert_eq!(
            mock.call_log()[1..],
            [
                format!("GET {MANIFESTS}/newer"),
                format!("GET {MANIFESTS}/newer/entries"),
                format!("POST {MANIFESTS}/newer/entries"),
            ]
        );
    }

    #[tokio::test]
    async fn full_manifest_at_exact_limit_rolls_over() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            serde_json::json!([manifest_json("full", "OPEN", "2024-01-01T00:00:00Z")]),
        );
        mock.push_json(200, manifest_json("full", "OPEN", "2024-01-01T00:00:00Z"));
        mock.push_json(200, entries(3));
        mock.push_json(201, manifest_json("next", "OPEN", "2024-01-02T00:00:00Z"));
        mock.push_status(201);

        let outcome = notifier(&mock)
            .route_file_to_manifest(
                "s3://raw/c.csv",
                &source(serde_json::json!({"max_files_in_manifest": 3})),
            )
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.manifest_id, "next");
        assert_eq!(mock.call_log()[3], format!("POST {MANIFESTS}"));
        assert_eq!(mock.call_log()[4], format!("POST {MANIFESTS}/next/entries"));
    }

    #[tokio::test]
    async fn no_limit_skips_entry_count() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            serde_json::json!([manifest_json("m", "OPEN", "2024-01-01T00:00:00Z")]),
        );
        mock.push_json(200, manifest_json("m", "OPEN", "2024-01-01T00:00:00Z"));
        mock.push_status(201);

        let outcome = notifier(&mock)
            .route_file_to_manifest(
                "s3://raw/d.csv",
                &source(serde_json::json!({"max_files_in_manifest": null})),
            )
            .await
            .unwrap();

        assert_eq!(outcome.manifest_id, "m");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn path_rewrite_and_batch_from_incoming_url() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, serde_json::json!([]));
        mock.push_json(201, manifest_json("m", "OPEN", "2024-01-01T00:00:00Z"));
        mock.push_status(201);

        let src = source(serde_json::json!({
            "path_replace": "s3://raw/",
            "path_replace_with": "s3://clean/",
            "batch_from_file_path_regex": "raw/(\\d{4})(\\d{2})(\\d{2})"
        }));
        let outcome = notifier(&mock)
            .route_file_to_manifest("s3://raw/20240102/a.csv", &src)
            .await
            .unwrap();

        assert_eq!(outcome.entry_path, "s3://clean/20240102/a.csv");
        assert_eq!(outcome.batch, Some(20240102));
        assert_eq!(
            mock.calls()[2].body,
            Some(serde_json::json!({"sourceFile": "s3://clean/20240102/a.csv", "batch": 20240102}))
        );
    }

    #[tokio::test]
    async fn batch_failure_is_a_warning() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, serde_json::json!([]));
        mock.push_json(201, manifest_json("m", "OPEN", "2024-01-01T00:00:00Z"));
        mock.push_status(201);

        let src = source(serde_json::json!({"batch_from_file_path_regex": "(\\d+)"}));
        let outcome = notifier(&mock)
            .route_file_to_manifest("nomatch.csv", &src)
            .await
            .unwrap();

        assert_eq!(outcome.batch, None);
        assert!(outcome.batch_warning.unwrap().contains("did not match"));
        assert_eq!(
            mock.calls()[2].body,
            Some(serde_json::json!({"sourceFile": "nomatch.csv"}))
        );
    }

    #[tokio::test]
    async fn single_file_manifest_notifies_after_entry() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, serde_json::json!([]));
        mock.push_json(201, manifest_json("m", "OPEN", "2024-01-01T00:00:00Z"));
        mock.push_status(201);
        mock.push_json(
            200,
            serde_json::json!([manifest_json("m", "OPEN", "2024-01-01T00:00:00Z")]),
        );
        mock.push_json(200, manifest_json("m", "OPEN", "2024-01-01T00:00:00Z"));
        mock.push_status(200);

        let src = source(serde_json::json!({"single_file_manifest": true}));
        let outcome = notifier(&mock)
            .route_file_to_manifest("s3://raw/e.csv", &src)
            .await
            .unwrap();

        let report = outcome.notified.unwrap();
        assert_eq!(report.notified, vec!["m"]);
        assert_eq!(mock.call_log().last().unwrap(), &format!("POST {MANIFESTS}/m/notify"));
    }

    #[tokio::test]
    async fn search_failure_propagates() {
        let mock = Arc::new(MockTransport::new());
        mock.push_status(500);
        mock.push_status(500);

        let err = notifier(&mock)
            .route_file_to_manifest("a.csv", &source(serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifierError::Transport(_)));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn invalid_source_fails_before_any_call() {
        let mock = Arc::new(MockTransport::new());
        let src = source(serde_json::json!({"path_replace": "s3://raw/"}));

        let err = notifier(&mock)
            .route_file_to_manifest("a.csv", &src)
            .await
            .unwrap_err();
        assert!(matches!(err, NotifierError::Config(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn notify_with_nothing_open_warns() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, serde_json::json!([]));

        let report = notifier(&mock)
            .notify_open_manifests(&source(serde_json::json!({})))
            .await
            .unwrap();

        assert!(report.notified.is_empty());
        assert!(report.warning.is_some());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn notify_attempts_all_and_reports_failures() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            serde_json::json!([
                manifest_json("b", "OPEN", "2024-02-01T00:00:00Z"),
                manifest_json("a", "OPEN", "2024-01-01T00:00:00Z"),
            ]),
        );
        // "a" is first by creation time and its fetch is rejected.
        mock.push_status(404);
        mock.push_json(200, manifest_json("b", "OPEN", "2024-02-01T00:00:00Z"));
        mock.push_status(200);

        let err = notifier(&mock)
            .notify_open_manifests(&source(serde_json::json!({})))
            .await
            .unwrap_err();

        match err {
            NotifierError::BulkNotify {
                total,
                notified,
                failures,
                ..
            } => {
                assert_eq!(total, 2);
                assert_eq!(notified, vec!["b"]);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].manifest_id, "a");
            }
            other => panic!("expected BulkNotify, got: {other:?}"),
        }
        assert_eq!(mock.call_log()[3], format!("POST {MANIFESTS}/b/notify"));
    }
}
