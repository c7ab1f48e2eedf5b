//! Scoped, lazily acquired, guaranteed-revoked GitHub credentials.
//!
//! A [`CredentialBroker`] holds at most one token for one scope. The token is
//! exchanged on first use, shared by every later caller, and revoked exactly
//! once when the broker is closed. Revocation runs detached from the caller,
//! so a handler that times out or is cancelled mid-close still releases its
//! token. A broker dropped without an explicit close schedules revocation on
//! the current runtime as a last resort.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use events::{OrgName, PolicyName, RepoName};
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};
use transport::{detached, SecretToken};

use crate::{CredentialError, TokenExchange};

// ---------------------------------------------------------------------------
// CredentialScope
// ---------------------------------------------------------------------------

/// What a token is valid for: an organisation, optionally narrowed to one
/// repository, under a named trust policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialScope {
    pub org: OrgName,
    pub repo: Option<RepoName>,
    pub policy: PolicyName,
}

impl CredentialScope {
    pub fn new(org: OrgName, repo: Option<RepoName>, policy: PolicyName) -> Self {
        Self { org, repo, policy }
    }

    /// `org` or `org/repo`, as understood by the token exchange.
    pub fn scope_string(&self) -> String {
        match &self.repo {
            Some(repo) => format!("{}/{}", self.org, repo),
            None => self.org.to_string(),
        }
    }
}

impl std::fmt::Display for CredentialScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.scope_string(), self.policy)
    }
}

// ---------------------------------------------------------------------------
// CredentialBroker
// ---------------------------------------------------------------------------

/// Owns the single token of one scope for the lifetime of one client.
pub struct CredentialBroker {
    scope: CredentialScope,
    exchange: Arc<dyn TokenExchange>,
    token: OnceCell<Result<SecretToken, CredentialError>>,
    revoked: AtomicBool,
}

impl CredentialBroker {
    /// Creates a broker. No network traffic happens until [`Self::acquire`].
    pub fn new(scope: CredentialScope, exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            scope,
            exchange,
            token: OnceCell::new(),
            revoked: AtomicBool::new(false),
        }
    }

    pub fn scope(&self) -> &CredentialScope {
        &self.scope
    }

    /// Returns the scope's token, exchanging for it on the first call.
    ///
    /// Concurrent first callers wait on the same exchange. The outcome is
    /// memoised either way: a failed exchange is not retried, every caller
    /// receives the same error.
    pub async fn acquire(&self) -> Result<SecretToken, CredentialError> {
        self.token
            .get_or_init(|| async {
                debug!(scope = %self.scope, "acquiring scoped GitHub token");
                let result = self.exchange.exchange(&self.scope).await;
                if let Err(error) = &result {
                    warn!(scope = %self.scope, %error, "token exchange failed");
                }
                result
            })
            .await
            .clone()
    }

    /// `true` once a token has been successfully obtained.
    pub fn is_fetched(&self) -> bool {
        matches!(self.token.get(), Some(Ok(_)))
    }

    /// Revokes the token, if one was fetched and not yet revoked.
    ///
    /// The revocation request runs on its own task: cancelling the returned
    /// future does not stop it. Failures are logged and returned but leave the
    /// broker closed; there is no second attempt.
    pub async fn revoke(&self) -> Result<(), CredentialError> {
        let Some(Ok(token)) = self.token.get() else {
            return Ok(());
        };
        if self.revoked.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let exchange = self.exchange.clone();
        let token = token.clone();
        let scope = self.scope.clone();
        let outcome = detached(async move {
            let result = exchange.revoke(&token).await;
            match &result {
                Ok(()) => debug!(scope = %scope, "revoked scoped GitHub token"),
                Err(error) => error!(scope = %scope, %error, "failed to revoke GitHub token"),
            }
            result
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(join) => Err(CredentialError::Revoke(join.to_string())),
        }
    }
}

impl Drop for CredentialBroker {
    fn drop(&mut self) {
        let Some(Ok(token)) = self.token.get() else {
            return;
        };
        if self.revoked.swap(true, Ordering::SeqCst) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(scope = %self.scope, "client dropped outside a runtime; token left to expire");
            return;
        };
        warn!(scope = %self.scope, "client dropped without close; revoking in background");
        let exchange = self.exchange.clone();
        let token = token.clone();
        let scope = self.scope.clone();
        runtime.spawn(async move {
            if let Err(error) = exchange.revoke(&token).await {
                error!(scope = %scope, %error, "failed to revoke GitHub token");
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// In-memory exchange that counts calls and can be slowed down or failed.
    #[derive(Default)]
    pub(crate) struct FakeExchange {
        pub exchanges: AtomicUsize,
        pub revokes: Mutex<Vec<String>>,
        pub fail_exchange: bool,
        pub delay: Duration,
    }

    #[async_trait]
    impl TokenExchange for FakeExchange {
        async fn exchange(&self, scope: &CredentialScope) -> Result<SecretToken, CredentialError> {
            let n = self.exchanges.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail_exchange {
                return Err(CredentialError::ExchangeStatus {
                    scope: scope.scope_string(),
                    status: 403,
                });
            }
            Ok(SecretToken::new(format!("ghs_{n}")))
        }

        async fn revoke(&self, token: &SecretToken) -> Result<(), CredentialError> {
            tokio::time::sleep(self.delay).await;
            self.revokes
                .lock()
                .unwrap()
                .push(token.expose().to_string());
            Ok(())
        }
    }

    pub(crate) fn scope() -> CredentialScope {
        CredentialScope::new(
            OrgName::new("chainguard-dev").unwrap(),
            RepoName::new("infra"),
            PolicyName::new("ci-labeler").unwrap(),
        )
    }

    #[test]
    fn scope_string_includes_repo_when_present() {
        assert_eq!(scope().scope_string(), "chainguard-dev/infra");
        let org_only = CredentialScope { repo: None, ..scope() };
        assert_eq!(org_only.scope_string(), "chainguard-dev");
    }

    #[tokio::test]
    async fn concurrent_acquires_exchange_once() {
        let exchange = Arc::new(FakeExchange {
            delay: Duration::from_millis(10),
            ..Default::default()
        });
        let broker = CredentialBroker::new(scope(), exchange.clone());

        let (a, b, c) = tokio::join!(broker.acquire(), broker.acquire(), broker.acquire());
        assert_eq!(a.unwrap().expose(), "ghs_0");
        assert_eq!(b.unwrap().expose(), "ghs_0");
        assert_eq!(c.unwrap().expose(), "ghs_0");
        assert_eq!(exchange.exchanges.load(Ordering::SeqCst), 1);
        assert!(broker.is_fetched());

        broker.revoke().await.unwrap();
    }

    #[tokio::test]
    async fn failed_exchange_is_shared_and_not_retried() {
        let exchange = Arc::new(FakeExchange {
            fail_exchange: true,
            ..Default::default()
        });
        let broker = CredentialBroker::new(scope(), exchange.clone());

        let first = broker.acquire().await.unwrap_err();
        let second = broker.acquire().await.unwrap_err();
        assert_eq!(first, second);
        assert_eq!(exchange.exchanges.load(Ordering::SeqCst), 1);
        assert!(!broker.is_fetched());

        // Nothing was fetched, so nothing is revoked.
        broker.revoke().await.unwrap();
        assert!(exchange.revokes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn revoke_without_acquire_makes_no_call() {
        let exchange = Arc::new(FakeExchange::default());
        let broker = CredentialBroker::new(scope(), exchange.clone());
        broker.revoke().await.unwrap();
        drop(broker);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(exchange.exchanges.load(Ordering::SeqCst), 0);
        assert!(exchange.revokes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let exchange = Arc::new(FakeExchange::default());
        let broker = CredentialBroker::new(scope(), exchange.clone());
        broker.acquire().await.unwrap();

        broker.revoke().await.unwrap();
        broker.revoke().await.unwrap();
        drop(broker);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*exchange.revokes.lock().unwrap(), vec!["ghs_0".to_string()]);
    }

    #[tokio::test]
    async fn revoke_survives_caller_cancellation() {
        let exchange = Arc::new(FakeExchange {
            delay: Duration::from_millis(30),
            ..Default::default()
        });
        let broker = CredentialBroker::new(scope(), exchange.clone());
        broker.acquire().await.unwrap();

        let cancelled = tokio::time::timeout(Duration::from_millis(1), broker.revoke()).await;
        assert!(cancelled.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*exchange.revokes.lock().unwrap(), vec!["ghs_0".to_string()]);
    }

    #[tokio::test]
    async fn dropped_broker_revokes_in_background() {
        let exchange = Arc::new(FakeExchange::default());
        let broker = CredentialBroker::new(scope(), exchange.clone());
        broker.acquire().await.unwrap();
        drop(broker);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*exchange.revokes.lock().unwrap(), vec!["ghs_0".to_string()]);
    }
}
