//! Inbound adapters that translate external requests into domain calls.
//!
//! HTTP handlers live under [`http`]; the sync CLIs under `src/bin` drive the
//! domain directly.

pub mod http;
