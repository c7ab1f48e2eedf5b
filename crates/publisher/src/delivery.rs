//! The delivery seam.

use async_trait::async_trait;
use events::CloudEvent;

/// The result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The receiver accepted the event.
    Ack,
    /// The receiver answered but refused the event.
    Nack { status: u16 },
    /// The event never reached a receiver.
    Undelivered(String),
}

impl Outcome {
    /// Whether another attempt could succeed.
    ///
    /// Undelivered attempts are always retried; refusals only for statuses that
    /// signal a transient condition.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ack => false,
            Self::Nack { status } => matches!(status, 404 | 413 | 425 | 429 | 502 | 503 | 504),
            Self::Undelivered(_) => true,
        }
    }
}

/// Sends one envelope once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, event: &CloudEvent) -> Outcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        for status in [404, 413, 425, 429, 502, 503, 504] {
            assert!(Outcome::Nack { status }.is_retryable(), "{status}");
        }
        for status in [400, 401, 403, 409, 500] {
            assert!(!Outcome::Nack { status }.is_retryable(), "{status}");
        }
        assert!(Outcome::Undelivered("connection refused".into()).is_retryable());
        assert!(!Outcome::Ack.is_retryable());
    }
}
