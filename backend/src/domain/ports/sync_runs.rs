//! Driving port for triggering audited sync runs.

use async_trait::async_trait;

use crate::domain::{DeviceId, DeviceSyncResult, Error, SyncLogEntry, SyncLogId, SyncRun};

/// Sync runs exposed to inbound adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncRunPort: Send + Sync {
    /// Hard sync one device under an audit log entry.
    ///
    /// Never fails: reconciliation problems are described in the result and
    /// audit log write failures leave `log_id` empty.
    async fn hard_sync_device(
        &self,
        device_id: &DeviceId,
        update_existing: bool,
    ) -> SyncRun<DeviceSyncResult>;

    /// Load one audit log entry.
    async fn find_log(&self, id: SyncLogId) -> Result<Option<SyncLogEntry>, Error>;
}
