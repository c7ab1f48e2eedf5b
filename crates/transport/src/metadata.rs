//! Instance metadata server client.
//!
//! On Cloud Run and GCE the metadata server mints audience-bound identity
//! tokens and reports the instance's network identity. Every request must
//! carry `Metadata-Flavor: Google`.

use reqwest::Method;
use tracing::warn;

use crate::identity::IdentityError;
use crate::{HttpClient, SecretToken};

/// Default metadata server root.
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

/// Event source used when the host's network identity cannot be determined.
pub const UNKNOWN_SOURCE: &str = "unknown";

const FLAVOR_HEADER: &str = "metadata-flavor";

/// Client for the instance metadata server.
#[derive(Debug, Clone)]
pub struct MetadataServer {
    http: HttpClient,
    base_url: String,
}

impl MetadataServer {
    /// Creates a client for the default metadata server.
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, DEFAULT_METADATA_URL)
    }

    /// Creates a client for a metadata server at `base_url`.
    pub fn with_base_url(http: HttpClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// Mints an identity token whose audience is `audience`.
    pub async fn identity_token(&self, audience: &str) -> Result<SecretToken, IdentityError> {
        let raw = self
            .get(
                "instance/service-accounts/default/identity",
                &[("audience", audience), ("format", "full")],
            )
            .await?;
        let token = SecretToken::new(raw);
        if token.is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(token)
    }

    /// The primary internal IP address of this instance.
    pub async fn internal_ip(&self) -> Result<String, IdentityError> {
        let ip = self.get("instance/network-interfaces/0/ip", &[]).await?;
        let ip = ip.trim();
        if ip.is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(ip.to_string())
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String, IdentityError> {
        let request = self
            .http
            .request(Method::GET, format!("{}/{path}", self.base_url))
            .header(FLAVOR_HEADER, "Google")
            .query(query);
        let response = self.http.send("metadata", request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Derives the event `source` attribute from the host's network identity.
///
/// Never fails: if the identity cannot be determined the sentinel
/// [`UNKNOWN_SOURCE`] is returned and a warning is logged.
pub async fn resolve_source(metadata: &MetadataServer) -> String {
    match metadata.internal_ip().await {
        Ok(ip) => format!("https://{ip}"),
        Err(error) => {
            warn!(%error, "failed to determine internal IP, falling back to unknown source");
            UNKNOWN_SOURCE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpConfig;
    use httpmock::prelude::*;

    fn metadata(server: &MockServer) -> MetadataServer {
        MetadataServer::with_base_url(HttpConfig::default().build().unwrap(), server.base_url())
    }

    #[tokio::test]
    async fn source_is_derived_from_internal_ip() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/instance/network-interfaces/0/ip")
                .header("metadata-flavor", "Google");
            then.status(200).body("10.8.0.4\n");
        });

        assert_eq!(resolve_source(&metadata(&server)).await, "https://10.8.0.4");
    }

    #[tokio::test]
    async fn source_falls_back_to_unknown() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/instance/network-interfaces/0/ip");
            then.status(404);
        });

        assert_eq!(resolve_source(&metadata(&server)).await, UNKNOWN_SOURCE);
    }

    #[tokio::test]
    async fn identity_tokens_are_audience_bound() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/instance/service-accounts/default/identity")
                .query_param("audience", "https://ingress.example.com");
            then.status(200).body("eyJhbGciOi.jwt");
        });

        let token = metadata(&server)
            .identity_token("https://ingress.example.com")
            .await
            .unwrap();
        assert_eq!(token.expose(), "eyJhbGciOi.jwt");
        mock.assert_calls(1);
    }
}
