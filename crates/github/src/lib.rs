//! GitHub adapter for event handlers.
//!
//! Handlers act on GitHub through a [`GitHubClient`] that is scoped to one
//! `(org, repo, policy)` triple and backed by a [`CredentialBroker`]. The
//! broker exchanges the process identity for a short-lived GitHub token at
//! most once, lazily on first use, and revokes it when the client is closed.
//!
//! ```text
//! handler ──▶ GitHubClientFactory::client(scope)
//!               └─ GitHubClient ──▶ CredentialBroker ──▶ TokenExchange (OctoSts)
//!                     │                  acquire() once / revoke() on close
//!                     └─ GitHub REST (labels, comments, runs, pulls)
//! ```
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All GitHub REST details (headers, status expectations,
//! pagination, redirects) and token-exchange wire details live here. Domain
//! types come from the [`events`] crate.
//!
//! ## Credential lifetime
//!
//! Every client must be released on every exit path. Call
//! [`GitHubClient::close`] to revoke and observe the outcome; a client dropped
//! without being closed revokes its token on a background task instead.

pub mod client;
pub mod credentials;
pub mod errors;
pub mod octosts;
pub mod pagination;

pub use client::{GitHubClient, GitHubClientFactory, DEFAULT_GITHUB_API};
pub use credentials::{CredentialBroker, CredentialScope};
pub use errors::{CredentialError, GitHubError};
pub use octosts::{OctoSts, TokenExchange, DEFAULT_OCTO_STS_ENDPOINT};
