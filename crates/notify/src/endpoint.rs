//! URL layout of the manifest API for one source entity.

use url::Url;

use crate::transport::TransportError;
use crate::types::ManifestState;

/// Fixed tenant/installation/environment prefix of the notify API.
const SCOPE_SEGMENTS: [&str; 6] = [
    "tenants",
    "local",
    "installations",
    "local",
    "environments",
    "local",
];

/// Builds request URLs under
/// `{base}/tenants/local/installations/local/environments/local/source-systems/{sys}/source-entities/{entity}`.
///
/// Path segments are percent-encoded, so system and entity names may
/// contain spaces or slashes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEndpoint {
    collection: Url,
    source_system: String,
    source_entity: String,
}

impl SourceEndpoint {
    pub fn new(
        base_url: &str,
        source_system: &str,
        source_entity: &str,
    ) -> Result<Self, TransportError> {
        let mut collection = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{base_url}: {e}")))?;

        collection
            .path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(format!("{base_url}: cannot be a base URL")))?
            .pop_if_empty()
            .extend(SCOPE_SEGMENTS)
            .extend([
                "source-systems",
                source_system,
                "source-entities",
                source_entity,
                "manifests",
            ]);

        Ok(Self {
            collection,
            source_system: source_system.to_string(),
            source_entity: source_entity.to_string(),
        })
    }

    pub fn source_system(&self) -> &str {
        &self.source_system
    }

    pub fn source_entity(&self) -> &str {
        &self.source_entity
    }

    /// `GET`/`POST .../manifests`
    pub fn manifests(&self) -> String {
        self.collection.to_string()
    }

    /// `GET .../manifests?state=STATE`; no filter when `state` is `None`.
    pub fn search(&self, state: Option<ManifestState>) -> String {
        let mut url = self.collection.clone();
        if let Some(state) = state {
            url.query_pairs_mut().append_pair("state", state.as_str());
        }
        url.to_string()
    }

    /// `GET .../manifests/{id}`
    pub fn manifest(&self, id: &str) -> String {
        self.child(&[id])
    }

    /// `GET`/`POST`/`PUT .../manifests/{id}/entries`
    pub fn entries(&self, id: &str) -> String {
        self.child(&[id, "entries"])
    }

    /// `POST .../manifests/{id}/notify`
    pub fn notify(&self, id: &str) -> String {
        self.child(&[id, "notify"])
    }

    fn child(&self, segments: &[&str]) -> String {
        let mut url = self.collection.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MANIFESTS;

    #[test]
    fn collection_url() {
        let ep = SourceEndpoint::new("https://api.test/notify-api", "erp", "orders").unwrap();
        assert_eq!(ep.manifests(), MANIFESTS);
    }

    #[test]
    fn trailing_slash_in_base() {
        let ep = SourceEndpoint::new("https://api.test/notify-api/", "erp", "orders").unwrap();
        assert_eq!(ep.manifests(), MANIFESTS);
    }

    #[test]
    fn resource_urls() {
        let ep = SourceEndpoint::new("https://api.test/notify-api", "erp", "orders").unwrap();
        assert_eq!(ep.manifest("m-1"), format!("{MANIFESTS}/m-1"));
        assert_eq!(ep.entries("m-1"), format!("{MANIFESTS}/m-1/entries"));
        assert_eq!(ep.notify("m-1"), format!("{MANIFESTS}/m-1/notify"));
    }

    #[test]
    fn search_state_filter() {
        let ep = SourceEndpoint::new("https://api.test/notify-api", "erp", "orders").unwrap();
        assert_eq!(
            ep.search(Some(ManifestState::Open)),
            format!("{MANIFESTS}?state=OPEN")
        );
        assert_eq!(ep.search(None), MANIFESTS);
    }

    #[test]
    fn segments_are_encoded() {
        let ep = SourceEndpoint::new("https://api.test", "my sys", "a/b").unwrap();
        assert!(ep
            .manifests()
            .ends_with("/source-systems/my%20sys/source-entities/a%2Fb/manifests"));
    }

    #[test]
    fn invalid_base_rejected() {
        assert!(matches!(
            SourceEndpoint::new("not a url", "s", "e"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(matches!(
            SourceEndpoint::new("mailto:ops@example.com", "s", "e"),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
