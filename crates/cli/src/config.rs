//! Command-line and environment configuration.
//!
//! Every flag can also be set through the environment variable named in its
//! `env` attribute, which is how the services are configured when deployed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use github::{DEFAULT_GITHUB_API, DEFAULT_OCTO_STS_ENDPOINT};
use publisher::Backoff;
use transport::{
    HttpClient, HttpConfig, IdentityTokenSource, MetadataIdentity, MetadataServer, SecretToken,
    StaticIdentity,
};

#[derive(Debug, Parser)]
#[command(name = "github-event-bots", version, about = "GitHub event bots and event plumbing")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Timeout applied to every outbound HTTP request.
    #[arg(
        long,
        env = "HTTP_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = parse_positive_u64,
        global = true
    )]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the CI status bot.
    Serve(ServeArgs),
    /// Record every received event under the log path.
    Record(RecordArgs),
    /// Publish a JSON payload as an event.
    Publish(PublishArgs),
    /// Convert a JSON array to newline-delimited JSON on stdout.
    Frame(FrameArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "OCTO_STS_ENDPOINT", default_value = DEFAULT_OCTO_STS_ENDPOINT)]
    pub octo_sts_endpoint: String,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API)]
    pub github_api_url: String,

    /// Name the bot signs its comments with.
    #[arg(long, env = "BOT_NAME", default_value = "ci-status")]
    pub bot_name: String,

    /// Token-exchange trust policy for the bot's GitHub tokens.
    #[arg(long, env = "OCTO_STS_POLICY", default_value = "ci-status")]
    pub policy: String,

    #[command(flatten)]
    pub identity: IdentityArgs,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Root directory events are written below.
    #[arg(long, env = "LOG_PATH")]
    pub log_path: PathBuf,
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    #[arg(long, env = "EVENT_INGRESS_URI")]
    pub ingress_uri: String,

    /// Event `type` attribute.
    #[arg(long = "type")]
    pub event_type: String,

    /// Event `subject` attribute.
    #[arg(long, default_value = "")]
    pub subject: String,

    /// Extension attribute as `name=value`; repeatable.
    #[arg(long = "ext", value_parser = parse_extension)]
    pub extensions: Vec<(String, String)>,

    /// Delivery attempts, including the first.
    #[arg(
        long,
        env = "PUBLISH_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Wait before the first retry; doubles for every retry after it.
    #[arg(
        long,
        env = "PUBLISH_INITIAL_BACKOFF_MS",
        default_value_t = 10,
        value_parser = parse_positive_u64
    )]
    pub initial_backoff_ms: u64,

    #[command(flatten)]
    pub identity: IdentityArgs,

    /// File holding the JSON payload.
    pub payload: PathBuf,
}

impl PublishArgs {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(Duration::from_millis(self.initial_backoff_ms), self.max_attempts)
    }
}

#[derive(Debug, Args)]
pub struct FrameArgs {
    /// File holding a JSON array of records.
    pub input: PathBuf,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Where identity tokens for the token exchange and the ingress come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IdentitySource {
    /// Audience-bound tokens from the instance metadata server.
    Metadata,
    /// A fixed token from `WIP_TOKEN`.
    Env,
}

#[derive(Debug, Args)]
pub struct IdentityArgs {
    #[arg(long, env = "IDENTITY_SOURCE", value_enum, default_value_t = IdentitySource::Metadata)]
    pub identity_source: IdentitySource,

    #[arg(long, env = "WIP_TOKEN", hide_env_values = true)]
    pub wip_token: Option<String>,
}

impl IdentityArgs {
    /// Builds the configured source. There is no fallback between sources.
    pub fn build(&self, metadata: MetadataServer) -> anyhow::Result<Arc<dyn IdentityTokenSource>> {
        match self.identity_source {
            IdentitySource::Metadata => Ok(Arc::new(MetadataIdentity::new(metadata))),
            IdentitySource::Env => {
                let token = self
                    .wip_token
                    .as_deref()
                    .map(SecretToken::new)
                    .filter(|t| !t.is_empty())
                    .context("IDENTITY_SOURCE=env requires WIP_TOKEN")?;
                Ok(Arc::new(StaticIdentity::new(token)))
            }
        }
    }
}

// ---------------------------------------------------------------------------

impl Cli {
    /// The one HTTP client every component shares.
    pub fn http_client(&self) -> anyhow::Result<HttpClient> {
        let config = HttpConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            ..HttpConfig::default()
        };
        let config = self
            .command
            .service_hosts()
            .into_iter()
            .fold(config, |config, (host, label)| config.with_bucket(host, label));
        config.build().context("failed to build HTTP client")
    }
}

impl Command {
    /// Hosts of the configured endpoints, with the label their requests log under.
    fn service_hosts(&self) -> Vec<(String, &'static str)> {
        let endpoints = match self {
            Command::Serve(args) => vec![
                (args.github_api_url.as_str(), "github"),
                (args.octo_sts_endpoint.as_str(), "octosts"),
            ],
            Command::Publish(args) => vec![(args.ingress_uri.as_str(), "ingress")],
            Command::Record(_) | Command::Frame(_) => Vec::new(),
        };
        endpoints
            .into_iter()
            .filter_map(|(url, label)| {
                let host = reqwest::Url::parse(url).ok()?.host_str()?.to_string();
                Some((host, label))
            })
            .collect()
    }
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_extension(value: &str) -> Result<(String, String), String> {
    let (name, value) = value
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{value}'"))?;
    if name.is_empty() {
        return Err("extension name must not be empty".to_string());
    }
    Ok((name.to_string(), value.to_string()))
}
