//! Port for the external tree-structured store (Firebase Realtime Database).
//!
//! Paths are slash-separated keys relative to the database root, for example
//! `fastpay/d1/messages`. The source is constructed once per process and
//! shared by reference; it holds no per-device state.

use async_trait::async_trait;
use serde_json::Value;

use super::define_port_error;

define_port_error! {
    /// Errors raised by tree-store adapters.
    pub enum FirebaseTreeSourceError {
        /// The store is not configured for this process.
        Unavailable { message: String } => "firebase store unavailable: {message}",
        /// The request could not be delivered.
        Transport { message: String } => "firebase transport failed: {message}",
        /// The request exceeded its deadline.
        Timeout { message: String } => "firebase request timed out: {message}",
        /// The store answered with a non-success status.
        Status { message: String } => "firebase rejected request: {message}",
        /// The response body was not valid JSON.
        Decode { message: String } => "firebase payload decode failed: {message}",
    }
}

/// Read and delete access to the tree store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FirebaseTreeSource: Send + Sync {
    /// Read the value at `path`; `None` when nothing is stored there.
    async fn read(&self, path: &str) -> Result<Option<Value>, FirebaseTreeSourceError>;

    /// List the immediate child keys of `path` without their values.
    async fn child_keys(&self, path: &str) -> Result<Vec<String>, FirebaseTreeSourceError>;

    /// Remove the value at `path`.
    async fn delete(&self, path: &str) -> Result<(), FirebaseTreeSourceError>;
}

/// Stand-in used when no database URL is configured.
///
/// Every call fails with [`FirebaseTreeSourceError::Unavailable`], which the
/// fetcher reports as a transport error and callers soft-fail on.
#[derive(Debug, Clone)]
pub struct UnavailableFirebaseTreeSource {
    reason: String,
}

impl UnavailableFirebaseTreeSource {
    /// Create a source that reports `reason` on every call.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl FirebaseTreeSource for UnavailableFirebaseTreeSource {
    async fn read(&self, _path: &str) -> Result<Option<Value>, FirebaseTreeSourceError> {
        Err(FirebaseTreeSourceError::unavailable(self.reason.as_str()))
    }

    async fn child_keys(&self, _path: &str) -> Result<Vec<String>, FirebaseTreeSourceError> {
        Err(FirebaseTreeSourceError::unavailable(self.reason.as_str()))
    }

    async fn delete(&self, _path: &str) -> Result<(), FirebaseTreeSourceError> {
        Err(FirebaseTreeSourceError::unavailable(self.reason.as_str()))
    }
}
