//! The event router.
//!
//! Handlers are registered against a closed set of event kinds. Each kind
//! fixes the wire schema its payload is decoded into and the richer subject
//! entity derived from it, so a handler only ever runs with fully decoded,
//! correctly typed arguments:
//!
//! | Kind | Wire body | Subject |
//! |------|-----------|---------|
//! | [`EventKind::PullRequest`] | [`PullRequestEvent`] | [`PullRequest`] |
//! | [`EventKind::WorkflowRun`] | [`WorkflowRunEvent`] | [`WorkflowRun`] |
//! | [`EventKind::CheckRun`] | [`CheckRunEvent`] | [`CheckRun`] |
//!
//! The table is built once by [`BotBuilder`] and read-only afterwards.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use events::{
    decode_payload, restructure, CheckRun, CheckRunEvent, CloudEvent, DecodeError, EventKind,
    PullRequest, PullRequestEvent, Timestamp, WorkflowRun, WorkflowRunEvent, Wrapper,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

use crate::EventContext;

// ---------------------------------------------------------------------------
// Handler traits
// ---------------------------------------------------------------------------

/// Handles `pull_request` events.
#[async_trait]
pub trait PullRequestHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: EventContext,
        event: PullRequestEvent,
        pull_request: PullRequest,
    ) -> anyhow::Result<()>;
}

/// Handles `workflow_run` events.
#[async_trait]
pub trait WorkflowRunHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: EventContext,
        event: WorkflowRunEvent,
        run: WorkflowRun,
    ) -> anyhow::Result<()>;
}

/// Handles `check_run` events.
#[async_trait]
pub trait CheckRunHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: EventContext,
        event: CheckRunEvent,
        check_run: CheckRun,
    ) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> PullRequestHandler for F
where
    F: Fn(EventContext, PullRequestEvent, PullRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(
        &self,
        ctx: EventContext,
        event: PullRequestEvent,
        pull_request: PullRequest,
    ) -> anyhow::Result<()> {
        (self)(ctx, event, pull_request).await
    }
}

#[async_trait]
impl<F, Fut> WorkflowRunHandler for F
where
    F: Fn(EventContext, WorkflowRunEvent, WorkflowRun) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(
        &self,
        ctx: EventContext,
        event: WorkflowRunEvent,
        run: WorkflowRun,
    ) -> anyhow::Result<()> {
        (self)(ctx, event, run).await
    }
}

#[async_trait]
impl<F, Fut> CheckRunHandler for F
where
    F: Fn(EventContext, CheckRunEvent, CheckRun) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(
        &self,
        ctx: EventContext,
        event: CheckRunEvent,
        check_run: CheckRun,
    ) -> anyhow::Result<()> {
        (self)(ctx, event, check_run).await
    }
}

// ---------------------------------------------------------------------------
// EventHandler
// ---------------------------------------------------------------------------

/// A handler for exactly one event kind.
#[derive(Clone)]
pub enum EventHandler {
    PullRequest(Arc<dyn PullRequestHandler>),
    WorkflowRun(Arc<dyn WorkflowRunHandler>),
    CheckRun(Arc<dyn CheckRunHandler>),
}

impl EventHandler {
    pub fn pull_request(handler: impl PullRequestHandler + 'static) -> Self {
        Self::PullRequest(Arc::new(handler))
    }

    pub fn workflow_run(handler: impl WorkflowRunHandler + 'static) -> Self {
        Self::WorkflowRun(Arc::new(handler))
    }

    pub fn check_run(handler: impl CheckRunHandler + 'static) -> Self {
        Self::CheckRun(Arc::new(handler))
    }

    /// The event kind this handler serves.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PullRequest(_) => EventKind::PullRequest,
            Self::WorkflowRun(_) => EventKind::WorkflowRun,
            Self::CheckRun(_) => EventKind::CheckRun,
        }
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EventHandler").field(&self.kind()).finish()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A handler table could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A second handler was registered for a kind that already has one.
    #[error("a handler for '{0}' is already registered")]
    Duplicate(EventKind),
}

/// Dispatching an envelope failed.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload or its subject entity did not decode into the kind's schema.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The handler returned an error; it is carried unchanged.
    #[error(transparent)]
    Handler(anyhow::Error),
}

/// What happened to a successfully dispatched envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The registered handler ran and succeeded.
    Handled(EventKind),
    /// No handler is registered for the envelope's type.
    Ignored,
}

// ---------------------------------------------------------------------------
// BotBuilder / Bot
// ---------------------------------------------------------------------------

/// Collects handler registrations; duplicates are rejected immediately.
#[derive(Debug)]
pub struct BotBuilder {
    name: String,
    handlers: HashMap<EventKind, EventHandler>,
}

impl BotBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for its kind.
    pub fn with_handler(mut self, handler: EventHandler) -> Result<Self, RegistrationError> {
        let kind = handler.kind();
        if self.handlers.contains_key(&kind) {
            return Err(RegistrationError::Duplicate(kind));
        }
        self.handlers.insert(kind, handler);
        Ok(self)
    }

    pub fn build(self) -> Bot {
        Bot {
            name: self.name,
            handlers: self.handlers,
        }
    }
}

/// A named set of handlers, immutable once built.
#[derive(Debug)]
pub struct Bot {
    name: String,
    handlers: HashMap<EventKind, EventHandler>,
}

impl Bot {
    pub fn builder(name: impl Into<String>) -> BotBuilder {
        BotBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kinds with a registered handler.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.handlers.keys().copied()
    }

    /// Decodes `event` for its kind and runs the registered handler once.
    ///
    /// An event whose type has no handler is logged and acknowledged.
    pub async fn dispatch(&self, event: CloudEvent) -> Result<Dispatch, DispatchError> {
        let span = info_span!(
            "dispatch",
            bot = %self.name,
            "event.id" = %event.id,
            "event.type" = %event.event_type,
        );
        self.dispatch_inner(event).instrument(span).await
    }

    async fn dispatch_inner(&self, event: CloudEvent) -> Result<Dispatch, DispatchError> {
        let handler = EventKind::from_type_key(&event.event_type)
            .and_then(|kind| self.handlers.get(&kind));
        let Some(handler) = handler else {
            info!(
                subject = event.subject_or_empty(),
                "no handler registered for event type, ignoring"
            );
            return Ok(Dispatch::Ignored);
        };
        debug!(bytes = event.data.len(), "dispatching event");

        match handler {
            EventHandler::PullRequest(h) => {
                let (ctx, body) = decode::<PullRequestEvent>(&event)?;
                let subject: PullRequest = restructure(&event.event_type, &body.pull_request)?;
                h.handle(ctx, body, subject).await.map_err(DispatchError::Handler)?;
            }
            EventHandler::WorkflowRun(h) => {
                let (ctx, body) = decode::<WorkflowRunEvent>(&event)?;
                let subject: WorkflowRun = restructure(&event.event_type, &body.workflow_run)?;
                h.handle(ctx, body, subject).await.map_err(DispatchError::Handler)?;
            }
            EventHandler::CheckRun(h) => {
                let (ctx, body) = decode::<CheckRunEvent>(&event)?;
                let subject: CheckRun = restructure(&event.event_type, &body.check_run)?;
                h.handle(ctx, body, subject).await.map_err(DispatchError::Handler)?;
            }
        }
        Ok(Dispatch::Handled(handler.kind()))
    }
}

fn decode<T: DeserializeOwned>(event: &CloudEvent) -> Result<(EventContext, T), DecodeError> {
    let Wrapper { when, body } = decode_payload::<T>(event)?;
    let ctx = EventContext::from_event(event, when.map(Timestamp::from_utc));
    Ok((ctx, body))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use events::{DecodeStage, ExtensionValue, Extensions};
    use serde_json::{json, Value};

    use super::*;

    fn envelope(kind_key: &str, data: Value) -> CloudEvent {
        let mut extensions = Extensions::new();
        extensions.insert("delivery".into(), ExtensionValue::from("d-1"));
        CloudEvent::new(
            "https://10.0.0.7",
            kind_key,
            "chainguard-dev/infra",
            extensions,
            serde_json::to_vec(&data).unwrap(),
        )
        .unwrap()
    }

    fn pull_request_payload() -> Value {
        json!({
            "when": "2024-05-01T12:00:00Z",
            "body": {
                "action": "labeled",
                "pull_request": {
                    "number": 7,
                    "base": {"ref": "main", "sha": "base",
                             "repo": {"name": "infra", "owner": {"login": "chainguard-dev"}}},
                    "head": {"ref": "fix-build", "sha": "c0ffee"},
                    "labels": [{"name": "ci-failed"}]
                }
            }
        })
    }

    fn workflow_run_payload() -> Value {
        json!({
            "When": "2024-05-01T12:00:00Z",
            "Body": {
                "action": "completed",
                "workflow_run": {
                    "id": 991,
                    "head_branch": "fix-build",
                    "head_sha": "c0ffee",
                    "status": "completed",
                    "conclusion": "failure"
                }
            }
        })
    }

    #[derive(Default)]
    struct Calls {
        pull_requests: AtomicUsize,
        workflow_runs: AtomicUsize,
        check_runs: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    fn counting_bot(calls: Arc<Calls>) -> Bot {
        let pr_calls = calls.clone();
        let run_calls = calls.clone();
        let check_calls = calls;
        Bot::builder("test-bot")
            .with_handler(EventHandler::pull_request(
                move |ctx: EventContext, event: PullRequestEvent, pr: PullRequest| {
                    let calls = pr_calls.clone();
                    async move {
                        calls.pull_requests.fetch_add(1, Ordering::SeqCst);
                        calls.seen.lock().unwrap().push(format!(
                            "{} {} #{} {}",
                            ctx.event_type,
                            event.action.unwrap_or_default(),
                            pr.number,
                            pr.has_label("ci-failed")
                        ));
                        anyhow::Ok(())
                    }
                },
            ))
            .unwrap()
            .with_handler(EventHandler::workflow_run(
                move |_ctx: EventContext, _event: WorkflowRunEvent, run: WorkflowRun| {
                    let calls = run_calls.clone();
                    async move {
                        calls.workflow_runs.fetch_add(1, Ordering::SeqCst);
                        calls.seen.lock().unwrap().push(format!("run {}", run.id));
                        anyhow::Ok(())
                    }
                },
            ))
            .unwrap()
            .with_handler(EventHandler::check_run(
                move |_ctx: EventContext, _event: CheckRunEvent, _check: CheckRun| {
                    let calls = check_calls.clone();
                    async move {
                        calls.check_runs.fetch_add(1, Ordering::SeqCst);
                        anyhow::Ok(())
                    }
                },
            ))
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn registered_kind_invokes_its_handler_once() {
        let calls = Arc::new(Calls::default());
        let bot = counting_bot(calls.clone());

        let outcome = bot
            .dispatch(envelope(EventKind::PullRequest.type_key(), pull_request_payload()))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Handled(EventKind::PullRequest));
        assert_eq!(calls.pull_requests.load(Ordering::SeqCst), 1);
        assert_eq!(calls.workflow_runs.load(Ordering::SeqCst), 0);
        assert_eq!(calls.check_runs.load(Ordering::SeqCst), 0);
        assert_eq!(
            *calls.seen.lock().unwrap(),
            vec!["dev.chainguard.github.pull_request labeled #7 true".to_string()]
        );
    }

    #[tokio::test]
    async fn capitalised_wrapper_fields_decode() {
        let calls = Arc::new(Calls::default());
        let bot = counting_bot(calls.clone());

        bot.dispatch(envelope(EventKind::WorkflowRun.type_key(), workflow_run_payload()))
            .await
            .unwrap();
        assert_eq!(*calls.seen.lock().unwrap(), vec!["run 991".to_string()]);
    }

    #[tokio::test]
    async fn unknown_type_is_acknowledged_without_calling_handlers() {
        let calls = Arc::new(Calls::default());
        let bot = counting_bot(calls.clone());

        let outcome = bot
            .dispatch(envelope("dev.chainguard.github.issues", json!({"body": {}})))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Ignored);
        assert_eq!(calls.pull_requests.load(Ordering::SeqCst), 0);
        assert_eq!(calls.workflow_runs.load(Ordering::SeqCst), 0);
        assert_eq!(calls.check_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn kind_without_registration_is_ignored() {
        let bot = Bot::builder("empty").build();
        let outcome = bot
            .dispatch(envelope(EventKind::CheckRun.type_key(), json!({"body": {}})))
            .await
            .unwrap();
        assert_eq!(outcome, Dispatch::Ignored);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_decode_error() {
        let calls = Arc::new(Calls::default());
        let bot = counting_bot(calls.clone());

        let mut event = envelope(EventKind::PullRequest.type_key(), json!({}));
        event.data = b"not json".to_vec();
        let err = bot.dispatch(event).await.unwrap_err();

        match err {
            DispatchError::Decode(e) => assert_eq!(e.stage, DecodeStage::Payload),
            other => panic!("expected decode error, got {other:?}"),
        }
        assert_eq!(calls.pull_requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subject_with_removed_fields_still_reaches_the_handler() {
        let calls = Arc::new(Calls::default());
        let bot = counting_bot(calls.clone());

        let check_run = json!({"body": {"check_run": {
            "id": 5,
            "head_sha": "c0ffee",
            "check_suite": {"head_branch": "main"},
            "pull_requests": [{"number": 12, "head": {"ref": "feature"}}]
        }}});
        let pull_request = json!({"body": {"action": "opened", "pull_request": {
            "number": 7,
            "base": {"ref": "main", "repo": {"name": "infra"}},
            "labels": [{"name": null}]
        }}});
        let workflow_run = json!({"body": {"workflow_run": {"id": 991}}});

        for (kind, payload) in [
            (EventKind::CheckRun, check_run),
            (EventKind::PullRequest, pull_request),
            (EventKind::WorkflowRun, workflow_run),
        ] {
            let outcome = bot.dispatch(envelope(kind.type_key(), payload)).await.unwrap();
            assert_eq!(outcome, Dispatch::Handled(kind));
        }

        assert_eq!(calls.check_runs.load(Ordering::SeqCst), 1);
        assert_eq!(calls.pull_requests.load(Ordering::SeqCst), 1);
        assert_eq!(calls.workflow_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subject_of_the_wrong_shape_is_a_subject_error() {
        let calls = Arc::new(Calls::default());
        let bot = counting_bot(calls.clone());

        // Valid for the signed wire schema, but a run id is never negative.
        let payload = json!({"body": {"workflow_run": {"id": -1, "head_branch": "main"}}});
        let err = bot
            .dispatch(envelope(EventKind::WorkflowRun.type_key(), payload))
            .await
            .unwrap_err();

        match err {
            DispatchError::Decode(e) => assert_eq!(e.stage, DecodeStage::Subject),
            other => panic!("expected decode error, got {other:?}"),
        }
        assert_eq!(calls.workflow_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_error_is_propagated_unchanged() {
        let bot = Bot::builder("failing")
            .with_handler(EventHandler::pull_request(
                |_ctx: EventContext, _event: PullRequestEvent, _pr: PullRequest| async {
                    Err::<(), _>(anyhow::anyhow!("github said no"))
                },
            ))
            .unwrap()
            .build();

        let err = bot
            .dispatch(envelope(EventKind::PullRequest.type_key(), pull_request_payload()))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Handler(_)));
        assert_eq!(err.to_string(), "github said no");
    }

    #[tokio::test]
    async fn context_carries_envelope_attributes() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let bot = Bot::builder("ctx")
            .with_handler(EventHandler::pull_request(
                move |ctx: EventContext, _event: PullRequestEvent, _pr: PullRequest| {
                    let sink = sink.clone();
                    async move {
                        *sink.lock().unwrap() = Some(ctx);
                        anyhow::Ok(())
                    }
                },
            ))
            .unwrap()
            .build();

        let event = envelope(EventKind::PullRequest.type_key(), pull_request_payload());
        let id = event.id.clone();
        bot.dispatch(event).await.unwrap();

        let ctx = seen.lock().unwrap().take().unwrap();
        assert_eq!(ctx.id, id);
        assert_eq!(ctx.source, "https://10.0.0.7");
        assert_eq!(ctx.subject.as_deref(), Some("chainguard-dev/infra"));
        assert_eq!(ctx.extension("delivery"), Some(&ExtensionValue::from("d-1")));
        assert_eq!(ctx.observed, Timestamp::parse_rfc3339("2024-05-01T12:00:00Z"));
    }

    #[test]
    fn duplicate_registration_fails_fast() {
        let noop =
            |_ctx: EventContext, _event: CheckRunEvent, _check: CheckRun| async { anyhow::Ok(()) };
        let err = Bot::builder("dup")
            .with_handler(EventHandler::check_run(noop))
            .unwrap()
            .with_handler(EventHandler::check_run(noop))
            .unwrap_err();
        assert_eq!(err, RegistrationError::Duplicate(EventKind::CheckRun));
    }
}
