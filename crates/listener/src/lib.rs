//! Inbound event infrastructure.
//!
//! Receives CloudEvents over HTTP and hands each one to an [`EventReceiver`]:
//!
//! - [`Bot`]: the event router. Decodes the payload of every registered
//!   event kind into its wire schema plus the richer subject entity, and
//!   invokes the one handler registered for that kind. Unknown types are
//!   acknowledged without being handled.
//!
//! - [`Recorder`]: persists the raw payload of every event under a
//!   deterministic `<root>/<type>/<id>` path for later batch ingestion.
//!
//! ## Deployment Scenarios
//!
//! | Scenario | Receiver | Notes |
//! |----------|----------|-------|
//! | GitHub automation bot | [`Bot`] | One handler per event kind |
//! | Event recording sidecar | [`Recorder`] | Writes under the shared log path |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP binding, routing and file layout live here. The
//! [`events`] crate supplies the envelope and the typed payloads; handlers
//! bring their own GitHub access.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`context`] | [`EventContext`] passed to every handler |
//! | [`router`] | Handler traits, [`EventHandler`], [`BotBuilder`] and [`Bot`] |
//! | [`recorder`] | [`Recorder`] |
//! | [`server`] | axum router, [`EventReceiver`], status mapping |

pub mod context;
pub mod recorder;
pub mod router;
pub mod server;

pub use context::EventContext;
pub use recorder::{RecordError, Recorder};
pub use router::{
    Bot, BotBuilder, CheckRunHandler, Dispatch, DispatchError, EventHandler, PullRequestHandler,
    RegistrationError, WorkflowRunHandler,
};
pub use server::{router as http_router, serve, EventReceiver, ReceiveError};
