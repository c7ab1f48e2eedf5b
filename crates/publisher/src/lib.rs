//! Reliable outbound event publication.
//!
//! A [`Publisher`] wraps a payload in a CloudEvent and delivers it through a
//! [`Transport`] with bounded exponential backoff. Delivery runs detached from
//! the caller: once started it completes, or exhausts its attempts, even if the
//! request that triggered it is cancelled.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Producers see only [`Publisher::publish`] and a single
//! [`PublishError`]; the acknowledged / rejected / undelivered distinction is
//! logged here and not surfaced.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`backoff`] | [`Backoff`] delay schedule |
//! | [`delivery`] | [`Transport`] trait and [`Outcome`] |
//! | [`errors`] | [`PublishError`] |
//! | [`http`] | [`HttpTransport`], CloudEvents binary mode over HTTP |
//! | [`publisher`] | [`Publisher`] and the delivery loop |

pub mod backoff;
pub mod delivery;
pub mod errors;
pub mod http;
pub mod publisher;

pub use backoff::Backoff;
pub use delivery::{Outcome, Transport};
pub use errors::PublishError;
pub use http::HttpTransport;
pub use publisher::Publisher;
