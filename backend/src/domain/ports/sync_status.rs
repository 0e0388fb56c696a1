//! Driving port for reading and overriding device sync status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Device, DeviceId, Error, SyncStatus};

/// Sync-status fields exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeviceSyncStatusView {
    #[schema(example = "d1")]
    pub device_id: String,
    pub sync_status: SyncStatus,
    pub sync_error_message: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_hard_sync_at: Option<DateTime<Utc>>,
    pub messages_last_synced_at: Option<DateTime<Utc>>,
    pub notifications_last_synced_at: Option<DateTime<Utc>>,
    pub contacts_last_synced_at: Option<DateTime<Utc>>,
}

impl From<&Device> for DeviceSyncStatusView {
    fn from(device: &Device) -> Self {
        let sync = &device.sync;
        Self {
            device_id: device.device_id.to_string(),
            sync_status: sync.status,
            sync_error_message: sync.error_message.clone(),
            last_sync_at: sync.last_sync_at,
            last_hard_sync_at: sync.last_hard_sync_at,
            messages_last_synced_at: sync.messages_last_synced_at,
            notifications_last_synced_at: sync.notifications_last_synced_at,
            contacts_last_synced_at: sync.contacts_last_synced_at,
        }
    }
}

/// Manual override request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSyncStatusRequest {
    pub device_id: DeviceId,
    pub status: SyncStatus,
    pub error_message: Option<String>,
}

/// Read and override sync status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceSyncStatusPort: Send + Sync {
    /// Current status for one device.
    async fn status(&self, device_id: &DeviceId) -> Result<DeviceSyncStatusView, Error>;

    /// Apply an override and return the new status.
    async fn update_status(
        &self,
        request: UpdateSyncStatusRequest,
    ) -> Result<DeviceSyncStatusView, Error>;
}
