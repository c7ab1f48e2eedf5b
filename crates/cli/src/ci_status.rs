//! The bundled CI status bot.
//!
//! When a workflow run completes, the bot finds the pull request it ran for,
//! flags failures with the `ci-failed` label and keeps one status comment up
//! to date. Pull-request events are only logged.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use events::model::Repository;
use events::{
    BotName, OrgName, PolicyName, PullRequest, PullRequestEvent, RepoName, WorkflowRun,
    WorkflowRunEvent,
};
use github::{CredentialScope, GitHubClient, GitHubClientFactory, GitHubError};
use listener::{
    Bot, EventContext, EventHandler, PullRequestHandler, RegistrationError, WorkflowRunHandler,
};
use tracing::{debug, info};

pub const CI_FAILED_LABEL: &str = "ci-failed";

pub struct CiStatusBot {
    github: GitHubClientFactory,
    name: BotName,
    policy: PolicyName,
}

impl CiStatusBot {
    pub fn new(github: GitHubClientFactory, name: BotName, policy: PolicyName) -> Self {
        Self { github, name, policy }
    }

    /// Registers the bot's handlers.
    pub fn into_bot(self) -> Result<Bot, RegistrationError> {
        let name = self.name.to_string();
        let this = Arc::new(self);
        Ok(Bot::builder(name)
            .with_handler(EventHandler::WorkflowRun(this.clone()))?
            .with_handler(EventHandler::PullRequest(this))?
            .build())
    }

    async fn report(
        &self,
        client: &GitHubClient,
        run: &WorkflowRun,
        repository: &Repository,
    ) -> anyhow::Result<()> {
        let number = match client.workflow_run_pull_request_number(run).await {
            Ok(number) => number,
            Err(GitHubError::PullRequestNotFound { branch, sha }) => {
                info!(%branch, %sha, "workflow run has no open pull request");
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };
        let mut pr = client.pull_request(repository, number).await?;
        let workflow = run.name.as_deref().unwrap_or("workflow");

        if run.concluded("success") {
            client.remove_label(&mut pr, CI_FAILED_LABEL).await?;
            let body = format!("✅ `{workflow}` passed on {}.", short_sha(&run.head_sha));
            client.set_comment(&pr, &self.name, &body).await?;
            return Ok(());
        }

        client.add_label(&mut pr, CI_FAILED_LABEL).await?;
        let logs = match client.workflow_run_logs(run).await {
            Ok(archive) => format!("The log archive is {} bytes.", archive.len()),
            Err(GitHubError::LogsExpired) => "The logs have expired.".to_string(),
            Err(error) => return Err(error.into()),
        };
        let conclusion = run.conclusion.as_deref().unwrap_or("unknown");
        let body = format!(
            "❌ `{workflow}` finished with `{conclusion}` on {}. {logs}",
            short_sha(&run.head_sha)
        );
        client.set_comment(&pr, &self.name, &body).await?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowRunHandler for CiStatusBot {
    async fn handle(
        &self,
        ctx: EventContext,
        _event: WorkflowRunEvent,
        run: WorkflowRun,
    ) -> anyhow::Result<()> {
        if run.status.as_deref() != Some("completed") {
            debug!(run = %run.id, status = ?run.status, "workflow run still in progress");
            return Ok(());
        }
        let repository = run.repository.clone().context("workflow run has no repository")?;
        let org = OrgName::new(repository.owner_login()).context("repository has no owner")?;
        let repo = RepoName::new(repository.name.clone());
        let scope = CredentialScope::new(org, repo, self.policy.clone());
        info!("event.id" = %ctx.id, run = %run.id, scope = %scope, "reporting workflow run");

        let client = self.github.client(scope);
        let reported = self.report(&client, &run, &repository).await;
        // Release the token whether or not reporting worked.
        let closed = client.close().await;
        reported?;
        closed?;
        Ok(())
    }
}

#[async_trait]
impl PullRequestHandler for CiStatusBot {
    async fn handle(
        &self,
        ctx: EventContext,
        event: PullRequestEvent,
        pr: PullRequest,
    ) -> anyhow::Result<()> {
        let labels: Vec<&str> = pr.labels.iter().map(|l| l.name.as_str()).collect();
        info!(
            "event.id" = %ctx.id,
            action = event.action.as_deref().unwrap_or_default(),
            pr = %pr.number,
            ?labels,
            ci_failed = pr.has_label(CI_FAILED_LABEL),
            "pull request event"
        );
        Ok(())
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
