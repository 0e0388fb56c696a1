//! Port for the sync audit log.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{NewSyncLog, SyncLogCompletion, SyncLogEntry, SyncLogId};

define_port_error! {
    /// Errors raised by sync log adapters.
    pub enum SyncLogRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "sync log connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "sync log query failed: {message}",
    }
}

/// Audit log persistence. Entries are written at start and completed once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    /// Store a `running` entry.
    async fn start(&self, entry: &NewSyncLog) -> Result<SyncLogId, SyncLogRepositoryError>;

    /// Record completion fields for `id`.
    async fn complete(
        &self,
        id: SyncLogId,
        completion: &SyncLogCompletion,
    ) -> Result<(), SyncLogRepositoryError>;

    /// Load one entry.
    async fn find(&self, id: SyncLogId) -> Result<Option<SyncLogEntry>, SyncLogRepositoryError>;
}
