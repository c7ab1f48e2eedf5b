//! Event domain for the GitHub event bots.
//!
//! This crate contains every data shape that flows between the receiver, the
//! router, the GitHub adapter and the publisher: the CloudEvents envelope,
//! newtype identifiers, the GitHub wire schemas carried inside event payloads,
//! the richer GitHub model types handlers act on, and the error taxonomy for
//! envelope and payload decoding.
//!
//! ## Architectural Layer
//!
//! **Domain.** This crate has no I/O dependencies. It defines *what* travels
//! over the wire; the `listener`, `github` and `publisher` crates define *how*
//! it is received, acted upon and delivered.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`EventId`, `OrgName`, `PullRequestNumber`, etc.) |
//! | [`types`] | Shared value types (`Timestamp`, `ExtensionValue`) |
//! | [`envelope`] | [`CloudEvent`] envelope and the closed set of [`EventKind`]s |
//! | [`binding`] | CloudEvents HTTP binding (binary and structured mode) |
//! | [`schemas`] | Wire schemas of GitHub events and the two-step payload decode |
//! | [`model`] | Rich GitHub entities consumed by the action client |
//! | [`ndjson`] | Newline-delimited JSON batch framing |
//! | [`errors`] | Envelope, decode and framing errors |

pub mod binding;
pub mod envelope;
pub mod errors;
pub mod identifiers;
pub mod model;
pub mod ndjson;
pub mod schemas;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use envelope::{CloudEvent, EventKind, SPEC_VERSION};
pub use errors::{DecodeError, DecodeStage, EnvelopeError, FrameError};
pub use identifiers::{
    BotName, CheckRunId, CommentId, EventId, OrgName, PolicyName, PullRequestNumber, RepoName,
    WorkflowRunId,
};
pub use model::{CheckRun, IssueComment, PullRequest, WorkflowRun};
pub use ndjson::to_ndjson;
pub use schemas::{
    decode_payload, restructure, CheckRunEvent, PullRequestEvent, WorkflowRunEvent, Wrapper,
};
pub use types::{ExtensionValue, Extensions, Timestamp};
