//! Event bot CLI entry point.
//!
//! This binary is the composition root for the workspace. Responsibilities:
//!
//! 1. **Parse configuration**: flags and their environment variables, see
//!    [`config`].
//! 2. **Wire observability**: JSON logs plus optional OTLP span export, see
//!    [`telemetry`].
//! 3. **Construct infrastructure**: one shared HTTP client injected into the
//!    token exchange, the GitHub client factory and the publisher transport.
//! 4. **Run the selected subcommand**:
//!    - `serve` receives events for the bundled CI status bot.
//!    - `record` receives events and writes them below the log path.
//!    - `publish` sends one JSON payload as an event.
//!    - `frame` converts a JSON array to newline-delimited JSON.

mod ci_status;
mod config;
mod telemetry;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use events::{BotName, ExtensionValue, Extensions, PolicyName};
use github::{GitHubClientFactory, OctoSts};
use listener::{EventReceiver, Recorder};
use publisher::{HttpTransport, Publisher};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::info;
use transport::{resolve_source, HttpClient, MetadataServer};

use crate::ci_status::CiStatusBot;
use crate::config::{Cli, Command, FrameArgs, PublishArgs, RecordArgs, ServeArgs};
use crate::telemetry::Telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = Telemetry::init()?;

    let result = run(cli).await;
    if let Err(error) = &result {
        tracing::error!(error = ?error, "command failed");
    }
    telemetry.shutdown();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let http = cli.http_client()?;
    match cli.command {
        Command::Serve(args) => serve(http, args).await,
        Command::Record(args) => record(args).await,
        Command::Publish(args) => publish(http, args).await,
        Command::Frame(args) => frame(&args).await,
    }
}

async fn serve(http: HttpClient, args: ServeArgs) -> anyhow::Result<()> {
    let identity = args.identity.build(MetadataServer::new(http.clone()))?;
    let exchange = OctoSts::new(
        http.clone(),
        args.octo_sts_endpoint.as_str(),
        args.github_api_url.as_str(),
        identity,
    );
    let github = GitHubClientFactory::new(http, &args.github_api_url, Arc::new(exchange))?;

    let name = BotName::new(args.bot_name).context("BOT_NAME must not be empty")?;
    let policy = PolicyName::new(args.policy).context("OCTO_STS_POLICY must not be empty")?;
    let bot = CiStatusBot::new(github, name, policy).into_bot()?;
    info!(bot = bot.name(), kinds = ?bot.kinds().collect::<Vec<_>>(), "starting bot");

    listen(args.port, Arc::new(bot)).await
}

async fn record(args: RecordArgs) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&args.log_path)
        .await
        .with_context(|| format!("failed to create {}", args.log_path.display()))?;
    let recorder = Recorder::new(args.log_path);
    info!(root = %recorder.root().display(), "starting recorder");

    listen(args.port, Arc::new(recorder)).await
}

async fn listen(port: u16, receiver: Arc<dyn EventReceiver>) -> anyhow::Result<()> {
    let socket = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    listener::serve(socket, receiver, shutdown_signal())
        .await
        .context("event server failed")
}

async fn publish(http: HttpClient, args: PublishArgs) -> anyhow::Result<()> {
    let ingress = reqwest::Url::parse(&args.ingress_uri)
        .with_context(|| format!("invalid EVENT_INGRESS_URI '{}'", args.ingress_uri))?;
    let metadata = MetadataServer::new(http.clone());
    let source = resolve_source(&metadata).await;
    let identity = args.identity.build(metadata)?;
    let backoff = args.backoff();

    let data = read(&args.payload).await?;
    let extensions: Extensions = args
        .extensions
        .into_iter()
        .map(|(name, value)| (name, ExtensionValue::String(value)))
        .collect();

    let transport = HttpTransport::new(http, ingress, identity);
    info!(
        ingress = %transport.ingress(),
        %source,
        attempts = backoff.max_attempts,
        "publishing payload"
    );
    let id = Publisher::new(source, Arc::new(transport))
        .with_backoff(backoff)
        .publish(&data, &args.event_type, &args.subject, extensions)
        .await?;
    println!("{id}");
    Ok(())
}

async fn frame(args: &FrameArgs) -> anyhow::Result<()> {
    let framed = frame_file(&args.input).await?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&framed).await?;
    stdout.flush().await?;
    Ok(())
}

async fn frame_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    let input = read(path).await?;
    let records: Vec<serde_json::Value> = serde_json::from_slice(&input)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;
    Ok(events::to_ndjson(&records)?)
}

async fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutting down");
}
