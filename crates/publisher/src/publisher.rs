//! The reliable publisher.

use std::sync::Arc;

use events::{binding, CloudEvent, EventId, Extensions, Timestamp, Wrapper};
use serde_json::value::RawValue;
use tracing::{debug, error, info, warn};
use transport::detached;

use crate::{Backoff, Outcome, PublishError, Transport};

/// Publishes events from one logical source.
#[derive(Clone)]
pub struct Publisher {
    source: String,
    transport: Arc<dyn Transport>,
    backoff: Backoff,
}

impl Publisher {
    /// `source` is stamped on every envelope, typically from
    /// [`transport::resolve_source`].
    pub fn new(source: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            source: source.into(),
            transport,
            backoff: Backoff::DEFAULT,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Publishes `data` as an event of `event_type` about `subject`.
    ///
    /// The JSON `data` is wrapped as `{"when": <now>, "body": <data>}`, given a
    /// fresh id and the current time, and `extensions` are attached as
    /// envelope attributes. Delivery keeps going if the returned future is
    /// dropped; awaiting it reports whether the event was accepted.
    pub async fn publish(
        &self,
        data: &[u8],
        event_type: &str,
        subject: &str,
        extensions: Extensions,
    ) -> Result<EventId, PublishError> {
        let body = wrap(data)?;
        let event = CloudEvent::new(self.source.clone(), event_type, subject, extensions, body)?;
        // Surface unsendable attributes now rather than as failed attempts.
        binding::to_binary_headers(&event)?;

        info!(
            "event.id" = %event.id,
            "event.type" = event_type,
            subject,
            extensions = ?event.extensions,
            "publishing event"
        );
        debug!(data = %String::from_utf8_lossy(data), "event data");

        let id = event.id.clone();
        detached(deliver(self.transport.clone(), self.backoff, event)).await??;
        Ok(id)
    }
}

fn wrap(data: &[u8]) -> Result<Vec<u8>, PublishError> {
    let body: &RawValue = serde_json::from_slice(data).map_err(PublishError::InvalidPayload)?;
    let wrapper = Wrapper {
        when: Some(Timestamp::now().as_datetime()),
        body,
    };
    serde_json::to_vec(&wrapper).map_err(PublishError::InvalidPayload)
}

/// Tries `event` until it is acknowledged, refused for good, or out of attempts.
async fn deliver(
    transport: Arc<dyn Transport>,
    backoff: Backoff,
    event: CloudEvent,
) -> Result<(), PublishError> {
    let mut reason = String::new();
    let mut attempts = 0;

    for attempt in 1..=backoff.max_attempts {
        if let Some(delay) = backoff.delay_before(attempt) {
            tokio::time::sleep(delay).await;
        }
        attempts = attempt;

        let outcome = transport.send(&event).await;
        match &outcome {
            Outcome::Ack => {
                debug!("event.id" = %event.id, attempt, "event delivered");
                return Ok(());
            }
            Outcome::Nack { status } => {
                warn!("event.id" = %event.id, attempt, status, "event refused");
                reason = format!("refused with status {status}");
            }
            Outcome::Undelivered(cause) => {
                warn!("event.id" = %event.id, attempt, %cause, "event undelivered");
                reason = format!("undelivered: {cause}");
            }
        }
        if !outcome.is_retryable() {
            break;
        }
    }

    error!("event.id" = %event.id, attempts, %reason, "failed to deliver event");
    Err(PublishError::Delivery {
        event_id: event.id.to_string(),
        attempts,
        reason,
    })
}
