//! FastPay backend: Firebase Realtime Database to Postgres sync.
//!
//! The [`domain`] holds the fetcher, reconciler and orchestrator behind
//! ports; [`outbound`] supplies the Firebase and Diesel adapters;
//! [`inbound`] exposes sync status and triggers over HTTP.

pub mod cli;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod wiring;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
