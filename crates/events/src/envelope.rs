//! The CloudEvents envelope and the closed set of GitHub event kinds.
//!
//! A [`CloudEvent`] is created by a producer, consumed once by a receiver and
//! never mutated in between. Its `type` attribute is the dispatch key: the
//! router maps it onto an [`EventKind`], and the kind decides which schema the
//! opaque `data` is decoded with.

use crate::identifiers::EventId;
use crate::types::{is_valid_attribute_name, Extensions, Timestamp};
use crate::EnvelopeError;

/// The only CloudEvents `specversion` this workspace produces or accepts.
pub const SPEC_VERSION: &str = "1.0";

/// Media type of the JSON payload wrapper.
pub const APPLICATION_JSON: &str = "application/json";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// An event notification in CloudEvents 1.0 shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudEvent {
    /// Unique identifier of this envelope.
    pub id: EventId,
    /// URI-reference identifying the producer.
    pub source: String,
    /// Dispatch key; determines the schema of [`CloudEvent::data`].
    pub event_type: String,
    /// The entity the event is about (e.g. a repository or run URL).
    pub subject: Option<String>,
    /// When the occurrence happened.
    pub time: Option<Timestamp>,
    /// Media type of [`CloudEvent::data`].
    pub data_content_type: Option<String>,
    /// Extension attributes, carried as first-class transport attributes.
    pub extensions: Extensions,
    /// The opaque payload.
    pub data: Vec<u8>,
}

impl CloudEvent {
    /// Creates an envelope with a fresh random id and the current time.
    ///
    /// Extension names are validated here so that an illegal envelope can
    /// never be constructed by a producer.
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        subject: impl Into<String>,
        extensions: Extensions,
        data: Vec<u8>,
    ) -> Result<Self, EnvelopeError> {
        if let Some(bad) = extensions.keys().find(|k| !is_valid_attribute_name(k)) {
            return Err(EnvelopeError::InvalidExtensionName(bad.clone()));
        }
        Ok(Self {
            id: EventId::new_random(),
            source: source.into(),
            event_type: event_type.into(),
            subject: Some(subject.into()),
            time: Some(Timestamp::now()),
            data_content_type: Some(APPLICATION_JSON.to_string()),
            extensions,
            data,
        })
    }

    /// Returns the `subject` attribute, or an empty string when absent.
    pub fn subject_or_empty(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// The closed set of GitHub event kinds a bot can register handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// `pull_request` webhook events.
    PullRequest,
    /// `workflow_run` webhook events.
    WorkflowRun,
    /// `check_run` webhook events.
    CheckRun,
}

impl EventKind {
    /// Every supported kind.
    pub const ALL: [EventKind; 3] = [Self::PullRequest, Self::WorkflowRun, Self::CheckRun];

    /// The envelope `type` attribute carried by events of this kind.
    pub fn type_key(self) -> &'static str {
        match self {
            Self::PullRequest => "dev.chainguard.github.pull_request",
            Self::WorkflowRun => "dev.chainguard.github.workflow_run",
            Self::CheckRun => "dev.chainguard.github.check_run",
        }
    }

    /// Maps an envelope `type` onto a kind; `None` for types no handler can serve.
    pub fn from_type_key(event_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_key() == event_type)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_key())
    }
}
