//! Per-event metadata handed to handlers.

use events::{CloudEvent, EventId, ExtensionValue, Extensions, Timestamp};

/// Envelope attributes of the event being handled.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    pub id: EventId,
    pub event_type: String,
    pub source: String,
    pub subject: Option<String>,
    /// Envelope `time` attribute.
    pub time: Option<Timestamp>,
    /// When the producer observed the occurrence, from the payload wrapper.
    pub observed: Option<Timestamp>,
    pub extensions: Extensions,
}

impl EventContext {
    /// Captures the attributes of `event`. The payload is not retained.
    pub fn from_event(event: &CloudEvent, observed: Option<Timestamp>) -> Self {
        Self {
            id: event.id.clone(),
            event_type: event.event_type.clone(),
            source: event.source.clone(),
            subject: event.subject.clone(),
            time: event.time,
            observed,
            extensions: event.extensions.clone(),
        }
    }

    pub fn extension(&self, name: &str) -> Option<&ExtensionValue> {
        self.extensions.get(name)
    }
}
