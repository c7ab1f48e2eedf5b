//! Error types for credential handling and GitHub API calls.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// A scoped credential could not be acquired or revoked.
///
/// `Clone` because one acquisition outcome is shared by every caller of
/// [`crate::CredentialBroker::acquire`], failures included.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No identity token was available to present to the exchange.
    #[error("identity token unavailable: {0}")]
    Identity(String),

    /// The exchange request failed in transport or returned an unusable body.
    #[error("token exchange for '{scope}' failed: {message}")]
    Exchange {
        /// The `org` or `org/repo` scope requested.
        scope: String,
        /// Description of the failure.
        message: String,
    },

    /// The exchange service refused the request.
    #[error("token exchange for '{scope}' returned status {status}")]
    ExchangeStatus {
        /// The `org` or `org/repo` scope requested.
        scope: String,
        /// HTTP status returned.
        status: u16,
    },

    /// The revocation request failed in transport or did not complete.
    #[error("revoking token failed: {0}")]
    Revoke(String),

    /// The revocation endpoint answered with something other than 204.
    #[error("revoking token returned status {0}, expected 204")]
    RevokeStatus(u16),
}

// ---------------------------------------------------------------------------
// GitHub API
// ---------------------------------------------------------------------------

/// A GitHub action failed.
///
/// Errors are returned verbatim to the handler; callers decide whether to retry.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The client's credential could not be acquired.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The request did not complete.
    #[error("{operation} request failed: {source}")]
    Transport {
        /// What the client was doing.
        operation: &'static str,
        /// The underlying transport error.
        source: reqwest::Error,
    },

    /// GitHub answered with an unexpected status.
    #[error("{operation} returned status {status}: {body}")]
    Status {
        /// What the client was doing.
        operation: &'static str,
        /// HTTP status returned.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("failed to decode {operation} response: {source}")]
    Decode {
        /// What the client was doing.
        operation: &'static str,
        /// The underlying decode error.
        source: reqwest::Error,
    },

    /// Workflow run logs are no longer available (404 or 410 at the log location).
    ///
    /// Expected for old runs and not worth retrying.
    #[error("logs expired")]
    LogsExpired,

    /// The entity handed to the client lacks a field needed to address it.
    #[error("{0} is missing")]
    MissingField(&'static str),

    /// A request URL could not be built.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// No open pull request matches a workflow run's head branch and commit.
    #[error("no matching pull request found for {branch}@{sha}")]
    PullRequestNotFound {
        /// The run's head branch.
        branch: String,
        /// The run's head commit.
        sha: String,
    },
}
