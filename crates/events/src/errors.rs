//! Error types for envelope handling, payload decoding and batch framing.
//!
//! Component-level errors (credential acquisition, GitHub API failures,
//! publication failures) are defined in their respective crates. The errors
//! here describe malformed *data*: they are fatal to the single envelope or
//! batch being processed and never to the process.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Envelope errors
// ---------------------------------------------------------------------------

/// An inbound request could not be understood as a CloudEvent, or an outbound
/// envelope would violate the CloudEvents attribute rules.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// A required context attribute (`id`, `source`, `type`, `specversion`) is absent.
    #[error("missing required attribute '{0}'")]
    MissingAttribute(&'static str),

    /// The envelope declares a `specversion` other than 1.0.
    #[error("unsupported specversion '{0}'")]
    UnsupportedSpecVersion(String),

    /// The `time` attribute is not an RFC 3339 timestamp.
    #[error("invalid time attribute '{0}'")]
    InvalidTime(String),

    /// An extension name contains characters other than lowercase letters and digits.
    #[error("invalid extension attribute name '{0}'")]
    InvalidExtensionName(String),

    /// A header value is not valid visible ASCII.
    #[error("attribute '{0}' is not valid header text")]
    InvalidHeaderValue(String),

    /// A structured-mode body is not a valid CloudEvents JSON object.
    #[error("malformed structured event: {0}")]
    Structured(#[from] serde_json::Error),

    /// A structured-mode `data_base64` member is not valid base64.
    #[error("invalid data_base64: {0}")]
    Base64(String),
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Which of the two payload decode steps failed.
///
/// Both steps produce the same error kind; the stage exists for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// Decoding the envelope data into the event's wire schema.
    Payload,
    /// Re-decoding the nested subject entity into its rich model type.
    Subject,
}

impl std::fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payload => f.write_str("payload"),
            Self::Subject => f.write_str("subject"),
        }
    }
}

/// The data of a registered event type did not match its schema.
#[derive(Debug, Error)]
#[error("failed to decode {stage} of '{event_type}' event: {source}")]
pub struct DecodeError {
    /// The envelope `type` whose schema was applied.
    pub event_type: String,
    /// The decode step that failed.
    pub stage: DecodeStage,
    /// The underlying JSON error.
    pub source: serde_json::Error,
}

// ---------------------------------------------------------------------------
// Framing errors
// ---------------------------------------------------------------------------

/// A record in a batch could not be serialised; no partial output is produced.
#[derive(Debug, Error)]
#[error("failed to serialise record {index} to JSON: {source}")]
pub struct FrameError {
    /// Zero-based position of the offending record.
    pub index: usize,
    /// The underlying JSON error.
    pub source: serde_json::Error,
}
