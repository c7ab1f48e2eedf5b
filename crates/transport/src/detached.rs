//! An execution scope decoupled from the caller's cancellation.
//!
//! In async Rust a caller cancels work by dropping its future. Cleanup and
//! delivery steps that must finish regardless (credential revocation, event
//! publication retries) run through [`detached`]: the work is moved onto its
//! own runtime task, so dropping the awaiting future only stops the waiting,
//! never the work.

use std::future::Future;

use thiserror::Error;

/// The detached task ended without producing a value.
#[derive(Debug, Error)]
#[error("detached task did not complete: {0}")]
pub struct DetachedError(String);

/// Runs `work` on its own task and waits for its output.
///
/// Must be called from within a Tokio runtime.
pub async fn detached<F>(work: F) -> Result<F::Output, DetachedError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|join| DetachedError(join.to_string()))
}
