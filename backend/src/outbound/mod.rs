//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **firebase**: reqwest client for the Realtime Database REST API
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod firebase;
pub mod persistence;
