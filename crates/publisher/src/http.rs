//! CloudEvents binary-mode delivery over HTTP.
//!
//! Attributes and extensions travel as `ce-*` headers, the payload as the
//! request body. Requests carry an identity token whose audience is the
//! ingress URI.

use std::sync::Arc;

use async_trait::async_trait;
use events::{binding, CloudEvent};
use reqwest::{Method, Url};
use tracing::warn;
use transport::{HttpClient, IdentityTokenSource};

use crate::{Outcome, Transport};

/// Posts envelopes to one ingress endpoint.
pub struct HttpTransport {
    http: HttpClient,
    ingress: Url,
    identity: Arc<dyn IdentityTokenSource>,
}

impl HttpTransport {
    pub fn new(http: HttpClient, ingress: Url, identity: Arc<dyn IdentityTokenSource>) -> Self {
        Self {
            http,
            ingress,
            identity,
        }
    }

    pub fn ingress(&self) -> &Url {
        &self.ingress
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, event: &CloudEvent) -> Outcome {
        let headers = match binding::to_binary_headers(event) {
            Ok(headers) => headers,
            Err(error) => return Outcome::Undelivered(error.to_string()),
        };
        let token = match self.identity.identity_token(self.ingress.as_str()).await {
            Ok(token) => token,
            Err(error) => {
                warn!(%error, "no identity token for ingress");
                return Outcome::Undelivered(error.to_string());
            }
        };

        let mut request = self
            .http
            .request(Method::POST, self.ingress.clone())
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .body(event.data.clone());
        for (name, value) in headers {
            request = request.header(name, value);
        }

        match self.http.send("publish event", request).await {
            Ok(response) if response.status().is_success() => Outcome::Ack,
            Ok(response) => Outcome::Nack {
                status: response.status().as_u16(),
            },
            Err(error) => Outcome::Undelivered(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use events::{ExtensionValue, Extensions};
    use httpmock::prelude::*;
    use transport::{HttpConfig, SecretToken, StaticIdentity};

    use super::*;

    fn transport(server: &MockServer, token: &str) -> HttpTransport {
        HttpTransport::new(
            HttpConfig::default().build().unwrap(),
            Url::parse(&server.url("/ingest")).unwrap(),
            Arc::new(StaticIdentity::new(SecretToken::new(token))),
        )
    }

    fn event() -> CloudEvent {
        let mut extensions = Extensions::new();
        extensions.insert("repo".into(), ExtensionValue::from("infra"));
        CloudEvent::new(
            "https://10.0.0.7",
            "dev.chainguard.github.workflow_run",
            "chainguard-dev/infra",
            extensions,
            br#"{"when":"2024-05-01T12:00:00Z","body":{}}"#.to_vec(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_binary_mode_with_identity() {
        let server = MockServer::start();
        let event = event();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/ingest")
                .header("authorization", "Bearer id-token")
                .header("ce-specversion", "1.0")
                .header("ce-id", event.id.as_str())
                .header("ce-type", "dev.chainguard.github.workflow_run")
                .header("ce-source", "https://10.0.0.7")
                .header("ce-subject", "chainguard-dev/infra")
                .header("ce-repo", "infra")
                .header("content-type", "application/json")
                .body(r#"{"when":"2024-05-01T12:00:00Z","body":{}}"#);
            then.status(202);
        });

        assert_eq!(transport(&server, "id-token").send(&event).await, Outcome::Ack);
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn refusal_is_a_nack() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ingest");
            then.status(429);
        });
        assert_eq!(
            transport(&server, "id-token").send(&event()).await,
            Outcome::Nack { status: 429 }
        );
    }

    #[tokio::test]
    async fn missing_identity_is_undelivered() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/ingest");
            then.status(200);
        });
        let outcome = transport(&server, "").send(&event()).await;
        assert!(matches!(outcome, Outcome::Undelivered(_)));
        mock.assert_calls(0);
    }
}
