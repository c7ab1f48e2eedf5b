//! Token-exchange client.
//!
//! The exchange trades an identity token for a GitHub installation token whose
//! permissions are decided by a named trust policy:
//!
//! ```text
//! GET {endpoint}/sts/exchange?scope=<org[/repo]>&identity=<policy>
//! Authorization: Bearer <identity token>
//! → 200 {"token": "ghs_..."}
//! ```
//!
//! Tokens are revoked against GitHub itself with
//! `DELETE {github api}/installation/token`, which answers `204 No Content`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;
use transport::{HttpClient, IdentityTokenSource, SecretToken};

use crate::{CredentialError, CredentialScope};

/// The public token-exchange service.
pub const DEFAULT_OCTO_STS_ENDPOINT: &str = "https://octo-sts.dev";

/// Exchanges and revokes scoped GitHub tokens.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Mints a token for `scope` under its policy.
    async fn exchange(&self, scope: &CredentialScope) -> Result<SecretToken, CredentialError>;

    /// Revokes a token previously returned by [`TokenExchange::exchange`].
    async fn revoke(&self, token: &SecretToken) -> Result<(), CredentialError>;
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    token: String,
}

/// [`TokenExchange`] over HTTP against an octo-sts compatible service.
pub struct OctoSts {
    http: HttpClient,
    endpoint: String,
    github_api: String,
    identity: Arc<dyn IdentityTokenSource>,
}

impl OctoSts {
    /// Creates an exchange client.
    ///
    /// `identity` supplies the token presented to the exchange; its audience is
    /// the exchange endpoint's host name.
    pub fn new(
        http: HttpClient,
        endpoint: impl Into<String>,
        github_api: impl Into<String>,
        identity: Arc<dyn IdentityTokenSource>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            github_api: github_api.into().trim_end_matches('/').to_string(),
            identity,
        }
    }

    fn audience(&self) -> String {
        reqwest::Url::parse(&self.endpoint)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.endpoint.clone())
    }
}

#[async_trait]
impl TokenExchange for OctoSts {
    async fn exchange(&self, scope: &CredentialScope) -> Result<SecretToken, CredentialError> {
        let scope_str = scope.scope_string();
        let identity = self
            .identity
            .identity_token(&self.audience())
            .await
            .map_err(|e| CredentialError::Identity(e.to_string()))?;

        debug!(scope = %scope_str, policy = %scope.policy, "exchanging identity for GitHub token");
        let request = self
            .http
            .request(Method::GET, format!("{}/sts/exchange", self.endpoint))
            .query(&[("scope", scope_str.as_str()), ("identity", scope.policy.as_str())])
            .header(reqwest::header::AUTHORIZATION, identity.bearer());
        let exchange_error = |message: String| CredentialError::Exchange {
            scope: scope_str.clone(),
            message,
        };

        let response = self
            .http
            .send("token exchange", request)
            .await
            .map_err(|e| exchange_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CredentialError::ExchangeStatus {
                scope: scope_str.clone(),
                status: status.as_u16(),
            });
        }
        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| exchange_error(e.to_string()))?;

        let token = SecretToken::new(body.token);
        if token.is_empty() {
            return Err(exchange_error("response carried an empty token".to_string()));
        }
        Ok(token)
    }

    async fn revoke(&self, token: &SecretToken) -> Result<(), CredentialError> {
        let request = self
            .http
            .request(Method::DELETE, format!("{}/installation/token", self.github_api))
            .header(reqwest::header::AUTHORIZATION, token.bearer());
        let response = self
            .http
            .send("token revocation", request)
            .await
            .map_err(|e| CredentialError::Revoke(e.to_string()))?;
        if response.status() != StatusCode::NO_CONTENT {
            return Err(CredentialError::RevokeStatus(response.status().as_u16()));
        }
        // The token was revoked!
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::{OrgName, PolicyName, RepoName};
    use httpmock::prelude::*;
    use transport::{HttpConfig, StaticIdentity};

    fn octo_sts(server: &MockServer) -> OctoSts {
        OctoSts::new(
            HttpConfig::default().build().unwrap(),
            server.url("/"),
            server.base_url(),
            Arc::new(StaticIdentity::new(SecretToken::new("id-token"))),
        )
    }

    fn scope(repo: Option<&str>) -> CredentialScope {
        CredentialScope::new(
            OrgName::new("chainguard-dev").unwrap(),
            repo.and_then(RepoName::new),
            PolicyName::new("ci-labeler").unwrap(),
        )
    }

    #[tokio::test]
    async fn exchange_presents_identity_and_scope() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/sts/exchange")
                .query_param("scope", "chainguard-dev/infra")
                .query_param("identity", "ci-labeler")
                .header("authorization", "Bearer id-token");
            then.status(200).json_body(serde_json::json!({"token": "ghs_scoped"}));
        });

        let token = octo_sts(&server).exchange(&scope(Some("infra"))).await.unwrap();
        assert_eq!(token.expose(), "ghs_scoped");
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn org_only_scope_omits_repo() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/sts/exchange")
                .query_param("scope", "chainguard-dev");
            then.status(200).json_body(serde_json::json!({"token": "ghs_org"}));
        });

        octo_sts(&server).exchange(&scope(None)).await.unwrap();
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn exchange_rejection_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/sts/exchange");
            then.status(403).body("policy does not match");
        });

        let err = octo_sts(&server).exchange(&scope(Some("infra"))).await.unwrap_err();
        assert_eq!(
            err,
            CredentialError::ExchangeStatus {
                scope: "chainguard-dev/infra".into(),
                status: 403
            }
        );
    }

    #[tokio::test]
    async fn revoke_expects_no_content() {
        let server = MockServer::start();
        let mut revoked = server.mock(|when, then| {
            when.method(DELETE)
                .path("/installation/token")
                .header("authorization", "Bearer ghs_scoped");
            then.status(204);
        });

        let sts = octo_sts(&server);
        sts.revoke(&SecretToken::new("ghs_scoped")).await.unwrap();
        revoked.assert_calls(1);
        revoked.delete();

        server.mock(|when, then| {
            when.method(DELETE).path("/installation/token");
            then.status(200);
        });
        let err = sts.revoke(&SecretToken::new("ghs_scoped")).await.unwrap_err();
        assert_eq!(err, CredentialError::RevokeStatus(200));
    }
}
