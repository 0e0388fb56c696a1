//! HTTP inbound adapter exposing the sync endpoints.

pub mod envelope;
pub mod error;
pub mod health;
pub mod state;
pub mod sync;

pub use error::ApiResult;
