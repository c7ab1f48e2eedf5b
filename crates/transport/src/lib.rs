//! Shared HTTP transport infrastructure.
//!
//! Every outbound HTTP call in the workspace (token exchange, GitHub REST,
//! event publication, instance metadata) goes through an [`HttpClient`] built
//! once at process start from an [`HttpConfig`] and injected into the
//! collaborators that need it. There is no process-global transport state.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate knows nothing about events or GitHub
//! resources; it supplies the plumbing the adapter crates share.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`client`] | [`HttpConfig`] and the instrumented [`HttpClient`] |
//! | [`detached`] | Execution scope that survives caller cancellation |
//! | [`identity`] | [`IdentityTokenSource`] and its static / metadata implementations |
//! | [`metadata`] | Instance metadata server client (identity tokens, internal IP) |
//! | [`secret`] | [`SecretToken`], a bearer token that never prints itself |

pub mod client;
pub mod detached;
pub mod identity;
pub mod metadata;
pub mod secret;

pub use client::{HttpClient, HttpConfig};
pub use detached::{detached, DetachedError};
pub use identity::{IdentityError, IdentityTokenSource, MetadataIdentity, StaticIdentity};
pub use metadata::{resolve_source, MetadataServer, UNKNOWN_SOURCE};
pub use secret::SecretToken;
