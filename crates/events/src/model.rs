//! Rich GitHub entities consumed by the action client.
//!
//! These are the types handlers pass back into `github::GitHubClient`. They
//! are re-derived from the nullable [`crate::schemas`] wire types, so every
//! field tolerates being absent or `null`: addressing fields (numbers, ids,
//! owner and repository names, head SHAs) fall back to their empty value and
//! the client refuses to act on an empty one. Unknown fields are ignored so
//! that the same types also decode GitHub REST responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::identifiers::{CheckRunId, CommentId, PullRequestNumber, WorkflowRunId};

/// A GitHub account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "nullable")]
    pub login: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// A repository with its owning account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default, deserialize_with = "nullable")]
    pub owner: User,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Repository {
    /// Login of the owning organisation or user.
    pub fn owner_login(&self) -> &str {
        &self.owner.login
    }
}

/// One side (base or head) of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref", default, deserialize_with = "nullable")]
    pub git_ref: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sha: String,
    #[serde(default)]
    pub repo: Option<Repository>,
    #[serde(default)]
    pub user: Option<User>,
}

/// A label attached to an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

// ---------------------------------------------------------------------------

/// A pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub number: PullRequestNumber,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub base: Branch,
    #[serde(default, deserialize_with = "nullable")]
    pub head: Branch,
    /// Current labels. The action client keeps this in step with its own
    /// label mutations so repeated calls observe their effect.
    #[serde(default, deserialize_with = "nullable")]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub mergeable_state: Option<String>,
    #[serde(default)]
    pub merged_by: Option<User>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
    #[serde(default)]
    pub changed_files: Option<u64>,
}

impl PullRequest {
    /// The repository the pull request targets.
    pub fn repository(&self) -> Option<&Repository> {
        self.base.repo.as_ref()
    }

    /// Returns `true` if a label with exactly this name is attached.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }
}

// ---------------------------------------------------------------------------

/// A single run of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    #[serde(default, deserialize_with = "nullable")]
    pub id: WorkflowRunId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub head_branch: String,
    #[serde(default, deserialize_with = "nullable")]
    pub head_sha: String,
    #[serde(default)]
    pub run_number: Option<u64>,
    #[serde(default)]
    pub run_attempt: Option<u64>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<u64>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub logs_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repository: Option<Repository>,
}

impl WorkflowRun {
    /// Returns `true` once the run has finished with the given conclusion.
    pub fn concluded(&self, conclusion: &str) -> bool {
        self.status.as_deref() == Some("completed")
            && self.conclusion.as_deref() == Some(conclusion)
    }
}

// ---------------------------------------------------------------------------

/// The check suite a check run belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSuite {
    #[serde(default, deserialize_with = "nullable")]
    pub id: u64,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub head_sha: Option<String>,
}

/// The GitHub App that created a check run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A branch pointer inside [`PullRequestRef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref", default, deserialize_with = "nullable")]
    pub git_ref: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sha: String,
}

/// A pull request a check run is associated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    #[serde(default, deserialize_with = "nullable")]
    pub number: PullRequestNumber,
    #[serde(default)]
    pub head: Option<BranchRef>,
    #[serde(default)]
    pub base: Option<BranchRef>,
}

/// A check run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRun {
    #[serde(default, deserialize_with = "nullable")]
    pub id: CheckRunId,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub head_sha: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub details_url: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check_suite: Option<CheckSuite>,
    #[serde(default)]
    pub app: Option<App>,
    #[serde(default, deserialize_with = "nullable")]
    pub pull_requests: Vec<PullRequestRef>,
}

// ---------------------------------------------------------------------------

/// A comment on an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    #[serde(default, deserialize_with = "nullable")]
    pub id: CommentId,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Reads `null` as the type's empty value.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas;
    use serde_json::json;

    #[test]
    fn workflow_run_keeps_its_repository_through_restructure() {
        let wire: schemas::WorkflowRun = serde_json::from_value(json!({
            "id": 991,
            "head_branch": "fix-build",
            "head_sha": "c0ffee",
            "status": "completed",
            "conclusion": "failure",
            "repository": {"name": "infra", "owner": {"login": "chainguard-dev"}}
        }))
        .unwrap();
        let run: WorkflowRun = schemas::restructure("t", &wire).unwrap();
        assert_eq!(run.id.as_u64(), 991);
        assert!(run.concluded("failure"));
        assert!(!run.concluded("success"));
        assert_eq!(run.repository.as_ref().map(Repository::owner_login), Some("chainguard-dev"));
    }

    #[test]
    fn check_run_pull_request_refs_decode() {
        let wire: schemas::CheckRun = serde_json::from_value(json!({
            "id": 5,
            "name": "lint",
            "head_sha": "abc",
            "pull_requests": [{"number": 12, "head": {"ref": "feature", "sha": "abc"}}]
        }))
        .unwrap();
        let run: CheckRun = schemas::restructure("t", &wire).unwrap();
        assert_eq!(run.pull_requests[0].number.as_u64(), 12);
        assert!(run.pull_requests[0].base.is_none());
    }

    #[test]
    fn missing_addressing_fields_decode_as_empty() {
        let pr: PullRequest = serde_json::from_value(json!({
            "number": null,
            "base": {"ref": "main", "sha": null, "repo": {"name": "infra", "owner": null}},
            "labels": [{"name": null}],
        }))
        .unwrap();
        assert_eq!(pr.number.as_u64(), 0);
        assert_eq!(pr.base.sha, "");
        assert_eq!(pr.head, Branch::default());
        assert_eq!(pr.repository().map(Repository::owner_login), Some(""));
        assert_eq!(pr.labels, vec![Label { name: String::new() }]);

        let run: CheckRun = serde_json::from_value(json!({
            "id": 5,
            "name": null,
            "check_suite": {"id": null},
            "pull_requests": null,
        }))
        .unwrap();
        assert_eq!(run.name, "");
        assert_eq!(run.head_sha, "");
        assert_eq!(run.check_suite.map(|s| s.id), Some(0));
        assert!(run.pull_requests.is_empty());
    }
}
