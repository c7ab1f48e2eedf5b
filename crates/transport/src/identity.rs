//! Sources of identity tokens presented to the token-exchange service and to
//! the event ingress.
//!
//! Which source is used is a deployment decision made once at startup:
//! [`StaticIdentity`] for a token supplied through configuration, or
//! [`MetadataIdentity`] for tokens minted by the instance metadata server.
//! There is no implicit fallback from one to the other.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::{MetadataServer, SecretToken};

/// How long a minted identity token is reused. Tokens are valid for an hour.
const IDENTITY_TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

/// An identity token could not be obtained.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The request to the token source failed in transport.
    #[error("identity request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The token source answered with a non-success status.
    #[error("metadata path '{path}' returned status {status}")]
    Status {
        /// Metadata path that was requested.
        path: String,
        /// HTTP status returned.
        status: u16,
    },

    /// The token source returned an empty value.
    #[error("identity source returned an empty value")]
    Empty,
}

/// Produces identity tokens bound to an audience.
#[async_trait]
pub trait IdentityTokenSource: Send + Sync {
    /// Returns a token whose audience is `audience`.
    async fn identity_token(&self, audience: &str) -> Result<SecretToken, IdentityError>;
}

// ---------------------------------------------------------------------------

/// A fixed token supplied through configuration; the audience is not checked.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    token: SecretToken,
}

impl StaticIdentity {
    /// Wraps a configured token.
    pub fn new(token: SecretToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl IdentityTokenSource for StaticIdentity {
    async fn identity_token(&self, _audience: &str) -> Result<SecretToken, IdentityError> {
        if self.token.is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(self.token.clone())
    }
}

// ---------------------------------------------------------------------------

/// Tokens minted by the metadata server, cached per audience.
#[derive(Debug)]
pub struct MetadataIdentity {
    metadata: MetadataServer,
    cache: Mutex<HashMap<String, (SecretToken, Instant)>>,
}

impl MetadataIdentity {
    /// Creates a caching source over `metadata`.
    pub fn new(metadata: MetadataServer) -> Self {
        Self {
            metadata,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, audience: &str) -> Option<SecretToken> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(audience)
            .filter(|(_, minted)| minted.elapsed() < IDENTITY_TOKEN_TTL)
            .map(|(token, _)| token.clone())
    }
}

#[async_trait]
impl IdentityTokenSource for MetadataIdentity {
    async fn identity_token(&self, audience: &str) -> Result<SecretToken, IdentityError> {
        if let Some(token) = self.cached(audience) {
            return Ok(token);
        }

        debug!(audience, "minting identity token");
        let token = self.metadata.identity_token(audience).await?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(audience.to_string(), (token.clone(), Instant::now()));
        Ok(token)
    }
}
