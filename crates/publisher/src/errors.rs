//! Error types for event publication.

use events::EnvelopeError;
use thiserror::Error;
use transport::DetachedError;

/// An event could not be published.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The payload is not a JSON document.
    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// The envelope could not be built (bad extension name or header value).
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Every attempt was rejected or failed to reach the endpoint.
    #[error("failed to deliver event {event_id} after {attempts} attempt(s): {reason}")]
    Delivery {
        event_id: String,
        attempts: u32,
        reason: String,
    },

    /// The delivery task itself died.
    #[error(transparent)]
    Detached(#[from] DetachedError),
}
