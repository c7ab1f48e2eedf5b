//! The CloudEvents HTTP receiver.
//!
//! # Endpoints
//!
//! - `POST /` - accepts one CloudEvent in binary or structured mode
//! - `GET /health` - returns 200 if the server is running
//!
//! # Status mapping
//!
//! | Outcome | Status |
//! |---------|--------|
//! | Envelope accepted (including unknown types) | 200 |
//! | Envelope malformed | 400 |
//! | Decode or handler failure | 500, so the sender redelivers |

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use events::{binding, CloudEvent, EnvelopeError};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::{Bot, DispatchError, RecordError, Recorder};

// ---------------------------------------------------------------------------
// EventReceiver
// ---------------------------------------------------------------------------

/// Something that consumes decoded envelopes.
#[async_trait]
pub trait EventReceiver: Send + Sync {
    async fn receive(&self, event: CloudEvent) -> Result<(), ReceiveError>;
}

/// A receiver rejected an envelope.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

#[async_trait]
impl EventReceiver for Bot {
    async fn receive(&self, event: CloudEvent) -> Result<(), ReceiveError> {
        self.dispatch(event).await?;
        Ok(())
    }
}

#[async_trait]
impl EventReceiver for Recorder {
    async fn receive(&self, event: CloudEvent) -> Result<(), ReceiveError> {
        self.record(&event).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Builds the axum Router with all endpoints.
pub fn router(receiver: Arc<dyn EventReceiver>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/", post(receive_handler))
        .route("/health", get(health_handler))
        .with_state(receiver)
}

/// Serves `receiver` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    receiver: Arc<dyn EventReceiver>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening for events");
    }
    axum::serve(listener, router(receiver))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

async fn receive_handler(
    State(receiver): State<Arc<dyn EventReceiver>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event = match parse_envelope(&headers, body) {
        Ok(event) => event,
        Err(error) => {
            warn!(%error, "rejecting malformed event");
            return (StatusCode::BAD_REQUEST, error.to_string()).into_response();
        }
    };

    let id = event.id.clone();
    let event_type = event.event_type.clone();
    match receiver.receive(event).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => {
            error!("event.id" = %id, "event.type" = %event_type, %error, "failed to handle event");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}

fn parse_envelope(headers: &HeaderMap, body: Bytes) -> Result<CloudEvent, EnvelopeError> {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if binding::is_structured(content_type) {
        return binding::from_structured(&body);
    }
    let pairs = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)));
    binding::from_binary(pairs, body.to_vec())
}
