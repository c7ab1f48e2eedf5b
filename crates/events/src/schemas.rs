//! Wire schemas of the GitHub events carried inside CloudEvent payloads.
//!
//! These mirror the subset of the GitHub webhook payloads that the event
//! ingestion pipeline records. Every scalar is nullable on the wire, so every
//! scalar here is an `Option`. Handlers receive the event body in this shape
//! together with the nested subject entity re-derived into its richer
//! [`crate::model`] type by [`restructure`].
//!
//! Payloads arrive wrapped as `{"when": <time>, "body": <event>}`; the
//! capitalised spellings `When`/`Body` are accepted as well.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{CloudEvent, DecodeError, DecodeStage};

// ---------------------------------------------------------------------------
// Decode steps
// ---------------------------------------------------------------------------

/// The payload wrapper every published event body is enclosed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wrapper<T> {
    /// When the producer observed the occurrence.
    #[serde(default, alias = "When")]
    pub when: Option<DateTime<Utc>>,
    /// The event body.
    #[serde(alias = "Body")]
    pub body: T,
}

/// Decodes the envelope data into the wrapper of the schema `T`.
pub fn decode_payload<T: DeserializeOwned>(event: &CloudEvent) -> Result<Wrapper<T>, DecodeError> {
    serde_json::from_slice(&event.data).map_err(|source| DecodeError {
        event_type: event.event_type.clone(),
        stage: DecodeStage::Payload,
        source,
    })
}

/// Re-derives a richer type from a wire value by a structural JSON round trip.
///
/// The two shapes are compatible but not identical: fields present on only one
/// side are ignored or defaulted, and only a value of the wrong type (such as a
/// negative id) fails.
pub fn restructure<S, T>(event_type: &str, source: &S) -> Result<T, DecodeError>
where
    S: Serialize,
    T: DeserializeOwned,
{
    serde_json::to_value(source)
        .and_then(serde_json::from_value)
        .map_err(|source| DecodeError {
            event_type: event_type.to_string(),
            stage: DecodeStage::Subject,
            source,
        })
}

// ---------------------------------------------------------------------------
// Shared entities
// ---------------------------------------------------------------------------

/// A GitHub account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub login: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// A GitHub organisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Organization {
    pub login: Option<String>,
}

/// A repository reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    #[serde(alias = "Owner")]
    pub owner: Option<User>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub full_name: Option<String>,
}

/// One side (base or head) of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestBranch {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub sha: Option<String>,
    pub repo: Option<Repository>,
    pub user: Option<User>,
}

/// A label attached to an issue or pull request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

/// A pull request as recorded in `pull_request` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    pub number: Option<i64>,
    pub state: Option<String>,
    pub title: Option<String>,

    pub base: PullRequestBranch,
    pub head: PullRequestBranch,

    pub labels: Vec<Label>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,

    pub mergeable: Option<bool>,
    pub mergeable_state: Option<String>,
    pub merged_by: Option<User>,
    pub merge_commit_sha: Option<String>,

    pub additions: Option<i64>,
    pub deletions: Option<i64>,
    pub changed_files: Option<i64>,
}

/// A `pull_request` webhook event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestEvent {
    /// `opened`, `labeled`, `synchronize`, etc.
    pub action: Option<String>,
    pub sender: Option<User>,
    pub assignee: Option<User>,
    pub repository: Option<Repository>,

    pub pull_request: PullRequest,

    // Populated when action is synchronize.
    pub before: Option<String>,
    pub after: Option<String>,
}

// ---------------------------------------------------------------------------
// Workflow runs
// ---------------------------------------------------------------------------

/// A workflow definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workflow {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub state: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single run of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowRun {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub node_id: Option<String>,
    pub head_branch: Option<String>,
    pub head_sha: Option<String>,
    pub run_number: Option<i64>,
    pub run_attempt: Option<i64>,
    pub event: Option<String>,
    pub display_title: Option<String>,
    pub status: Option<String>,
    /// `success`, `failure`, `cancelled`, etc.
    pub conclusion: Option<String>,
    pub workflow_id: Option<i64>,
    pub check_suite_id: Option<i64>,
    pub url: Option<String>,
    pub html_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub run_started_at: Option<DateTime<Utc>>,
    pub jobs_url: Option<String>,
    pub logs_url: Option<String>,
    pub artifacts_url: Option<String>,
    pub cancel_url: Option<String>,
    pub rerun_url: Option<String>,
    pub workflow_url: Option<String>,
    pub repository: Option<Repository>,
}

/// A `workflow_run` webhook event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowRunEvent {
    /// `requested`, `in_progress`, `completed`.
    pub action: Option<String>,
    pub workflow: Option<Workflow>,
    pub workflow_run: WorkflowRun,
    pub organization: Option<Organization>,
    pub repository: Option<Repository>,
    pub sender: Option<User>,
}

// ---------------------------------------------------------------------------
// Check runs
// ---------------------------------------------------------------------------

/// The check suite a check run belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSuite {
    pub id: Option<i64>,
    pub head_branch: Option<String>,
    pub head_sha: Option<String>,
}

/// The GitHub App that created a check run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    pub slug: Option<String>,
    pub name: Option<String>,
}

/// A minimal branch pointer inside a check run's pull request references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub sha: Option<String>,
}

/// A pull request a check run is associated with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestRef {
    pub number: Option<i64>,
    pub head: Option<BranchRef>,
    pub base: Option<BranchRef>,
}

/// A check run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckRun {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub head_sha: Option<String>,
    pub external_id: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub url: Option<String>,
    pub html_url: Option<String>,
    pub details_url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub check_suite: Option<CheckSuite>,
    pub app: Option<App>,
    pub pull_requests: Vec<PullRequestRef>,
}

/// A `check_run` webhook event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckRunEvent {
    /// `created`, `completed`, `rerequested`, `requested_action`.
    pub action: Option<String>,
    pub check_run: CheckRun,
    pub repository: Option<Repository>,
    pub organization: Option<Organization>,
    pub sender: Option<User>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model;
    use crate::Extensions;
    use serde_json::json;

    fn envelope(data: serde_json::Value) -> CloudEvent {
        CloudEvent::new(
            "test",
            "dev.chainguard.github.pull_request",
            "s",
            Extensions::new(),
            serde_json::to_vec(&data).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn wrapper_accepts_both_spellings() {
        let lower: Wrapper<PullRequestEvent> = decode_payload(&envelope(json!({
            "when": "2024-01-01T00:00:00Z",
            "body": {"action": "opened"}
        })))
        .unwrap();
        let upper: Wrapper<PullRequestEvent> = decode_payload(&envelope(json!({
            "When": "2024-01-01T00:00:00Z",
            "Body": {"action": "opened"}
        })))
        .unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.body.action.as_deref(), Some("opened"));
    }

    #[test]
    fn payload_decode_failure_names_the_stage() {
        let err = decode_payload::<PullRequestEvent>(&envelope(json!({"when": 5}))).unwrap_err();
        assert_eq!(err.stage, DecodeStage::Payload);
        assert_eq!(err.event_type, "dev.chainguard.github.pull_request");
    }

    #[test]
    fn restructure_tolerates_extra_and_missing_fields() {
        let wire: PullRequest = serde_json::from_value(json!({
            "number": 7,
            "title": "Bump deps",
            "base": {
                "ref": "main",
                "sha": "aaa",
                "repo": {"name": "infra", "owner": {"login": "chainguard-dev"}}
            },
            "head": {"ref": "bump", "sha": "bbb"},
            "labels": [{"name": "automated"}],
            "node_id": "ignored-by-wire-schema"
        }))
        .unwrap();

        let pr: model::PullRequest = restructure("t", &wire).unwrap();
        assert_eq!(pr.number.as_u64(), 7);
        assert_eq!(pr.head.sha, "bbb");
        assert!(pr.has_label("automated"));
        assert_eq!(pr.repository().map(|r| r.name.as_str()), Some("infra"));
        assert!(pr.merged_by.is_none());
    }

    #[test]
    fn restructure_of_an_empty_subject_yields_empty_fields() {
        let pr: model::PullRequest = restructure("t", &PullRequest::default()).unwrap();
        assert_eq!(pr.number.as_u64(), 0);
        assert!(pr.head.sha.is_empty());
        assert!(pr.repository().is_none());
    }

    #[test]
    fn restructure_fails_on_a_value_of_the_wrong_type() {
        let wire: PullRequest = serde_json::from_value(json!({"number": -3})).unwrap();
        let err = restructure::<_, model::PullRequest>("t", &wire).unwrap_err();
        assert_eq!(err.stage, DecodeStage::Subject);
    }
}
