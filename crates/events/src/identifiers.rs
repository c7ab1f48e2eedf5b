//! Newtype domain identifiers.
//!
//! Every concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`WorkflowRunId`] with a [`PullRequestNumber`] even though both are `u64`
//! under the hood. All newtypes serialise transparently as their inner value so
//! they can sit directly inside GitHub payload types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitHub-assigned integers).
// Generates: struct (Copy, Default 0), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: GitHub-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// The repository-scoped number of a pull request (also its issue number).
    PullRequestNumber
}

u64_id! {
    /// GitHub's identifier of one workflow run.
    WorkflowRunId
}

u64_id! {
    /// GitHub's identifier of one check run.
    CheckRunId
}

u64_id! {
    /// GitHub's identifier of an issue or pull-request comment.
    CommentId
}

// ---------------------------------------------------------------------------
// Identifiers: envelope
// ---------------------------------------------------------------------------

string_id! {
    /// The unique identifier of a CloudEvent envelope.
    ///
    /// Producers in this workspace generate UUIDv4 values via
    /// [`EventId::new_random`]; inbound envelopes may carry any non-empty id.
    EventId
}

impl EventId {
    /// Generates a fresh random identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (configuration / GitHub names)
// ---------------------------------------------------------------------------

string_id! {
    /// A GitHub organisation or user login that owns repositories.
    OrgName
}

string_id! {
    /// A repository name, without the owner prefix.
    RepoName
}

string_id! {
    /// The name of a token-exchange trust policy (e.g. `"ci-labeler"`).
    ///
    /// The policy decides which permissions the exchanged GitHub token carries.
    PolicyName
}

string_id! {
    /// The name a bot signs its comments with.
    ///
    /// Used to build the hidden marker that makes comment upserts idempotent.
    BotName
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_ids_are_rejected() {
        assert!(OrgName::new("").is_none());
        assert_eq!(
            OrgName::new("chainguard-dev").map(|o| o.to_string()),
            Some("chainguard-dev".into())
        );
    }

    #[test]
    fn ids_serialise_as_their_inner_value() {
        let number = PullRequestNumber::new(42);
        assert_eq!(serde_json::to_string(&number).unwrap(), "42");

        let policy: PolicyName = serde_json::from_str("\"ci-labeler\"").unwrap();
        assert_eq!(policy.as_str(), "ci-labeler");
    }

    #[test]
    fn random_event_ids_differ() {
        assert_ne!(EventId::new_random(), EventId::new_random());
    }
}
