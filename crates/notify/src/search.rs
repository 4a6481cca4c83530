//! Manifest search for one source entity.

use reqwest::Method;
use tracing::debug;

use crate::endpoint::SourceEndpoint;
use crate::error::NotifierError;
use crate::retry::ApiClient;
use crate::transport::ApiRequest;
use crate::types::{ManifestRecord, ManifestState};

/// List manifests of the endpoint's source entity, optionally by state.
///
/// Results are sorted ascending by creation time, so the last element is the
/// most recently created manifest. Callers rely on that ordering.
pub async fn search_manifests(
    client: &ApiClient,
    endpoint: &SourceEndpoint,
    state: Option<ManifestState>,
) -> Result<Vec<ManifestRecord>, NotifierError> {
    let request = ApiRequest {
        method: Method::GET,
        url: endpoint.search(state),
        body: None,
    };
    let response = client
        .execute(&request, &client.policy().for_search())
        .await?;

    let mut manifests: Vec<ManifestRecord> =
        response.json().map_err(|e| NotifierError::Decode {
            url: request.url.clone(),
            message: e.to_string(),
        })?;
    manifests.sort_by(ManifestRecord::creation_order);

    debug!(
        source_system = %endpoint.source_system(),
        source_entity = %endpoint.source_entity(),
        state = ?state,
        count = manifests.len(),
        "manifest search completed"
    );
    Ok(manifests)
}

/// Ids of `manifests`, preserving order.
pub fn manifest_ids(manifests: &[ManifestRecord]) -> Vec<String> {
    manifests.iter().map(|m| m.id.clone()).collect()
}
