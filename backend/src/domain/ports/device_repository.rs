//! Port for device rows and their sync bookkeeping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::define_port_error;
use crate::domain::{Device, DeviceId, DeviceProfile, SyncStatus};

define_port_error! {
    /// Errors raised by device repository adapters.
    pub enum DeviceRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "device repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "device repository query failed: {message}",
    }
}

/// What the device-info write of a sync pass did to the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceProfileWrite {
    /// The device did not exist and was inserted.
    pub created: bool,
    /// The device existed and its profile was overwritten.
    pub updated: bool,
}

/// Final bookkeeping written after reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcomeUpdate {
    pub status: SyncStatus,
    pub error_message: Option<String>,
    /// Set on success; refreshes `last_sync_at` and `last_hard_sync_at`.
    pub synced_at: Option<DateTime<Utc>>,
    pub messages_synced_at: Option<DateTime<Utc>>,
    pub notifications_synced_at: Option<DateTime<Utc>>,
    pub contacts_synced_at: Option<DateTime<Utc>>,
    pub metadata: Value,
}

/// Manual status override requested through the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatusUpdate {
    pub status: SyncStatus,
    pub error_message: Option<String>,
    /// Written to `last_sync_at`.
    pub at: DateTime<Utc>,
}

/// Persistence operations for devices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Load one device.
    async fn find(&self, device_id: &DeviceId) -> Result<Option<Device>, DeviceRepositoryError>;

    /// Identifiers of every locally known device.
    async fn list_ids(&self) -> Result<Vec<DeviceId>, DeviceRepositoryError>;

    /// Start a sync pass in one transaction.
    ///
    /// Inserts the device from `profile` when absent. When present, marks it
    /// syncing with the error cleared and, if `update_existing`, overlays the
    /// profile via [`Device::apply_profile`].
    async fn begin_sync(
        &self,
        device_id: &DeviceId,
        profile: &DeviceProfile,
        update_existing: bool,
    ) -> Result<DeviceProfileWrite, DeviceRepositoryError>;

    /// Write the outcome of a completed pass.
    async fn record_sync_outcome(
        &self,
        device_id: &DeviceId,
        outcome: &SyncOutcomeUpdate,
    ) -> Result<(), DeviceRepositoryError>;

    /// Force `sync_failed` with `message`; returns `false` when the device
    /// does not exist.
    async fn mark_sync_failed(
        &self,
        device_id: &DeviceId,
        message: &str,
    ) -> Result<bool, DeviceRepositoryError>;

    /// Apply a manual status override and return the updated device.
    async fn update_sync_status(
        &self,
        device_id: &DeviceId,
        update: &SyncStatusUpdate,
    ) -> Result<Option<Device>, DeviceRepositoryError>;
}
