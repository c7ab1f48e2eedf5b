//! The scoped GitHub action client.

use std::sync::Arc;

use events::model::{Label, Repository};
use events::{BotName, IssueComment, PullRequest, PullRequestNumber, WorkflowRun};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};
use transport::HttpClient;

use crate::pagination::next_link;
use crate::{CredentialBroker, CredentialScope, GitHubError, TokenExchange};

/// The public GitHub REST endpoint.
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

// ---------------------------------------------------------------------------
// GitHubClientFactory
// ---------------------------------------------------------------------------

/// Creates one [`GitHubClient`] per handler invocation.
///
/// Holds only process-wide collaborators; every client it creates gets its own
/// credential broker, so tokens are never shared between invocations.
#[derive(Clone)]
pub struct GitHubClientFactory {
    http: HttpClient,
    api_base: Url,
    exchange: Arc<dyn TokenExchange>,
}

impl GitHubClientFactory {
    pub fn new(
        http: HttpClient,
        api_base: &str,
        exchange: Arc<dyn TokenExchange>,
    ) -> Result<Self, GitHubError> {
        let api_base =
            Url::parse(api_base).map_err(|e| GitHubError::InvalidUrl(format!("{api_base}: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(GitHubError::InvalidUrl(api_base.to_string()));
        }
        Ok(Self {
            http,
            api_base,
            exchange,
        })
    }

    /// A client whose token is limited to `scope`. No token is fetched yet.
    pub fn client(&self, scope: CredentialScope) -> GitHubClient {
        GitHubClient {
            http: self.http.clone(),
            api_base: self.api_base.clone(),
            broker: CredentialBroker::new(scope, self.exchange.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// GitHubClient
// ---------------------------------------------------------------------------

/// High-level, idempotent GitHub actions under one scoped credential.
///
/// Release the credential with [`GitHubClient::close`] on every exit path.
pub struct GitHubClient {
    http: HttpClient,
    api_base: Url,
    broker: CredentialBroker,
}

impl GitHubClient {
    pub fn scope(&self) -> &CredentialScope {
        self.broker.scope()
    }

    /// Revokes the client's token if one was fetched.
    ///
    /// Revocation completes even if the caller stops waiting for it.
    pub async fn close(self) -> Result<(), GitHubError> {
        if !self.broker.is_fetched() {
            debug!("no token was fetched, nothing to revoke");
            return Ok(());
        }
        self.broker.revoke().await?;
        Ok(())
    }

    // -- labels -------------------------------------------------------------

    /// Attaches `label` to the pull request unless it already carries it.
    ///
    /// `pr.labels` is updated on success, so a repeated call is a no-op.
    pub async fn add_label(&self, pr: &mut PullRequest, label: &str) -> Result<(), GitHubError> {
        if pr.has_label(label) {
            debug!(pr = %pr.number, label, "label already present, nothing to do");
            return Ok(());
        }
        let (owner, repo) = pr_repository(pr)?;
        let number = pr_number(pr)?;
        let url = self.url(&["repos", owner, repo, "issues", &number, "labels"])?;

        info!(pr = %pr.number, label, "adding label");
        let request = self.authed(Method::POST, url).await?.json(&json!({ "labels": [label] }));
        self.expect_status("add label", request, StatusCode::OK).await?;

        pr.labels.push(Label {
            name: label.to_string(),
        });
        Ok(())
    }

    /// Detaches `label` from the pull request if it carries it.
    pub async fn remove_label(&self, pr: &mut PullRequest, label: &str) -> Result<(), GitHubError> {
        if !pr.has_label(label) {
            debug!(pr = %pr.number, label, "label not present, nothing to do");
            return Ok(());
        }
        let (owner, repo) = pr_repository(pr)?;
        let number = pr_number(pr)?;
        let url = self.url(&["repos", owner, repo, "issues", &number, "labels", label])?;

        info!(pr = %pr.number, label, "removing label");
        let request = self.authed(Method::DELETE, url).await?;
        self.expect_status("remove label", request, StatusCode::OK).await?;

        pr.labels.retain(|l| l.name != label);
        Ok(())
    }

    // -- comments -----------------------------------------------------------

    /// Creates or replaces the single comment `bot` owns on the pull request.
    ///
    /// The comment carries a hidden `<!-- bot:NAME -->` marker; the first
    /// existing comment containing it is edited in place, otherwise a new one
    /// is posted.
    pub async fn set_comment(
        &self,
        pr: &PullRequest,
        bot: &BotName,
        content: &str,
    ) -> Result<(), GitHubError> {
        let (owner, repo) = pr_repository(pr)?;
        let number = pr_number(pr)?;
        let marker = comment_marker(bot);
        let body = format!("{marker}\n\n{content}");

        let mut list_url = self.url(&["repos", owner, repo, "issues", &number, "comments"])?;
        list_url.query_pairs_mut().append_pair("per_page", "100");
        let comments: Vec<IssueComment> = self.list_all("list comments", list_url).await?;

        let existing = comments
            .iter()
            .find(|c| c.body.as_deref().is_some_and(|b| b.contains(&marker)));
        match existing {
            Some(comment) => {
                let id = comment.id.to_string();
                let url = self.url(&["repos", owner, repo, "issues", "comments", &id])?;
                info!(pr = %pr.number, comment = %comment.id, bot = %bot, "editing bot comment");
                let request = self.authed(Method::PATCH, url).await?.json(&json!({ "body": body }));
                self.expect_status("edit comment", request, StatusCode::OK).await?;
            }
            None => {
                let url = self.url(&["repos", owner, repo, "issues", &number, "comments"])?;
                info!(pr = %pr.number, bot = %bot, "creating bot comment");
                let request = self.authed(Method::POST, url).await?.json(&json!({ "body": body }));
                self.expect_status("create comment", request, StatusCode::CREATED).await?;
            }
        }
        Ok(())
    }

    // -- workflow runs ------------------------------------------------------

    /// Downloads the log archive of a workflow run.
    ///
    /// GitHub answers with a redirect to short-lived storage. A 404 or 410
    /// there means the logs have aged out and yields
    /// [`GitHubError::LogsExpired`].
    pub async fn workflow_run_logs(&self, run: &WorkflowRun) -> Result<Vec<u8>, GitHubError> {
        let (owner, repo) = run_repository(run)?;
        let id = match run.id.as_u64() {
            0 => return Err(GitHubError::MissingField("workflow run id")),
            id => id.to_string(),
        };
        let url = self.url(&["repos", owner, repo, "actions", "runs", &id, "logs"])?;

        let request = self.authed(Method::GET, url).await?;
        let redirect = self.expect_status("workflow run logs", request, StatusCode::FOUND).await?;
        let location = redirect
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(GitHubError::MissingField("workflow run logs location"))?;
        let location = Url::parse(location).map_err(|e| GitHubError::InvalidUrl(e.to_string()))?;

        // The location is pre-signed; the GitHub token is not sent there.
        let response = self
            .http
            .send("download logs", self.http.request(Method::GET, location))
            .await
            .map_err(|source| GitHubError::Transport {
                operation: "download logs",
                source,
            })?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND | StatusCode::GONE => return Err(GitHubError::LogsExpired),
            status => {
                return Err(GitHubError::Status {
                    operation: "download logs",
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                })
            }
        }
        let bytes = response.bytes().await.map_err(|source| GitHubError::Transport {
            operation: "download logs",
            source,
        })?;
        Ok(bytes.to_vec())
    }

    /// Finds the open pull request a workflow run was triggered for.
    ///
    /// Lists open pull requests whose head is the run's branch, page by page
    /// until GitHub reports no further page, and matches on head commit.
    pub async fn workflow_run_pull_request_number(
        &self,
        run: &WorkflowRun,
    ) -> Result<PullRequestNumber, GitHubError> {
        let (owner, repo) = run_repository(run)?;
        let branch = present(&run.head_branch, "workflow run head branch")?;
        present(&run.head_sha, "workflow run head sha")?;
        let mut url = self.url(&["repos", owner, repo, "pulls"])?;
        url.query_pairs_mut()
            .append_pair("state", "open")
            .append_pair("head", &format!("{owner}:{branch}"))
            .append_pair("per_page", "10");

        let mut next = Some(url);
        while let Some(page_url) = next.take() {
            let request = self.authed(Method::GET, page_url).await?;
            let response = self.expect_status("list pull requests", request, StatusCode::OK).await?;
            next = next_page(&response)?;
            let pulls: Vec<PullRequest> = decode("list pull requests", response).await?;
            if let Some(pr) = pulls.iter().find(|pr| pr.head.sha == run.head_sha) {
                return Ok(pr.number);
            }
        }
        Err(GitHubError::PullRequestNotFound {
            branch: run.head_branch.clone(),
            sha: run.head_sha.clone(),
        })
    }

    /// Fetches one pull request.
    pub async fn pull_request(
        &self,
        repository: &Repository,
        number: PullRequestNumber,
    ) -> Result<PullRequest, GitHubError> {
        let (owner, repo) = repository_path(repository)?;
        let number = number.to_string();
        let url = self.url(&["repos", owner, repo, "pulls", &number])?;
        let request = self.authed(Method::GET, url).await?;
        let response = self.expect_status("get pull request", request, StatusCode::OK).await?;
        decode("get pull request", response).await
    }

    // -- plumbing -----------------------------------------------------------

    fn url(&self, segments: &[&str]) -> Result<Url, GitHubError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| GitHubError::InvalidUrl(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authed(&self, method: Method, url: Url) -> Result<RequestBuilder, GitHubError> {
        let token = self.broker.acquire().await?;
        Ok(self
            .http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(API_VERSION_HEADER, API_VERSION))
    }

    /// Sends `request` and fails unless GitHub answers with `expected`.
    async fn expect_status(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> Result<Response, GitHubError> {
        let response = self
            .http
            .send(operation, request)
            .await
            .map_err(|source| GitHubError::Transport { operation, source })?;
        if response.status() != expected {
            return Err(GitHubError::Status {
                operation,
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        first: Url,
    ) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let request = self.authed(Method::GET, url).await?;
            let response = self.expect_status(operation, request, StatusCode::OK).await?;
            next = next_page(&response)?;
            items.extend(decode::<Vec<T>>(operation, response).await?);
        }
        Ok(items)
    }
}

/// The hidden marker identifying comments owned by `bot`.
pub fn comment_marker(bot: &BotName) -> String {
    format!("<!-- bot:{bot} -->")
}

fn pr_repository(pr: &PullRequest) -> Result<(&str, &str), GitHubError> {
    let repo = pr
        .repository()
        .ok_or(GitHubError::MissingField("pull request base repository"))?;
    repository_path(repo)
}

fn run_repository(run: &WorkflowRun) -> Result<(&str, &str), GitHubError> {
    let repo = run
        .repository
        .as_ref()
        .ok_or(GitHubError::MissingField("workflow run repository"))?;
    repository_path(repo)
}

fn repository_path(repo: &Repository) -> Result<(&str, &str), GitHubError> {
    Ok((
        present(repo.owner_login(), "repository owner login")?,
        present(&repo.name, "repository name")?,
    ))
}

fn pr_number(pr: &PullRequest) -> Result<String, GitHubError> {
    match pr.number.as_u64() {
        0 => Err(GitHubError::MissingField("pull request number")),
        n => Ok(n.to_string()),
    }
}

/// Decoded entities default absent fields to empty; those cannot address anything.
fn present<'a>(value: &'a str, field: &'static str) -> Result<&'a str, GitHubError> {
    if value.is_empty() {
        return Err(GitHubError::MissingField(field));
    }
    Ok(value)
}

fn next_page(response: &Response) -> Result<Option<Url>, GitHubError> {
    next_link(response.headers())
        .map(|link| Url::parse(&link).map_err(|e| GitHubError::InvalidUrl(format!("{link}: {e}"))))
        .transpose()
}

async fn decode<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, GitHubError> {
    response
        .json()
        .await
        .map_err(|source| GitHubError::Decode { operation, source })
}
