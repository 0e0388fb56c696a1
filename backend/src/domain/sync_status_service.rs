//! Sync-status reads and manual overrides for single devices.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::info;

use super::ports::{
    DeviceRepository, DeviceSyncStatusPort, DeviceSyncStatusView, SyncStatusUpdate,
    UpdateSyncStatusRequest,
};
use super::sync_service::map_device_error;
use super::{DeviceId, Error};

/// Implements [`DeviceSyncStatusPort`] over the device repository.
#[derive(Clone)]
pub struct SyncStatusService {
    devices: Arc<dyn DeviceRepository>,
    clock: Arc<dyn Clock>,
}

impl SyncStatusService {
    pub fn new(devices: Arc<dyn DeviceRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { devices, clock }
    }
}

fn device_not_found(device_id: &DeviceId) -> Error {
    Error::not_found(format!("device {device_id} not found"))
        .with_details(serde_json::json!({ "deviceId": device_id.as_str() }))
}

#[async_trait]
impl DeviceSyncStatusPort for SyncStatusService {
    async fn status(&self, device_id: &DeviceId) -> Result<DeviceSyncStatusView, Error> {
        let device = self
            .devices
            .find(device_id)
            .await
            .map_err(map_device_error)?
            .ok_or_else(|| device_not_found(device_id))?;
        Ok(DeviceSyncStatusView::from(&device))
    }

    async fn update_status(
        &self,
        request: UpdateSyncStatusRequest,
    ) -> Result<DeviceSyncStatusView, Error> {
        let update = SyncStatusUpdate {
            status: request.status,
            error_message: request.error_message,
            at: self.clock.utc(),
        };
        let device = self
            .devices
            .update_sync_status(&request.device_id, &update)
            .await
            .map_err(map_device_error)?
            .ok_or_else(|| device_not_found(&request.device_id))?;
        info!(device_id = %request.device_id, status = %update.status, "sync status overridden");
        Ok(DeviceSyncStatusView::from(&device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{DeviceRepositoryError, MockDeviceRepository};
    use crate::domain::{ErrorCode, SyncStatus};
    use crate::test_support::{InMemoryStore, MutableClock};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use serde_json::json;

    fn clock() -> Arc<MutableClock> {
        Arc::new(MutableClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0)
                .single()
                .expect("valid timestamp"),
        ))
    }

    fn d1() -> DeviceId {
        DeviceId::new("d1").expect("valid id")
    }

    #[rstest]
    #[tokio::test]
    async fn override_sets_status_and_timestamp() {
        let store = Arc::new(InMemoryStore::new());
        let info = json!({ "name": "A" });
        store.insert_device(crate::domain::Device::from_profile(
            d1(),
            &crate::domain::DeviceProfile::from_device_info(info.as_object().expect("object")),
        ));
        let clock = clock();
        let service = SyncStatusService::new(store.clone(), clock.clone());

        let view = service
            .update_status(UpdateSyncStatusRequest {
                device_id: d1(),
                status: SyncStatus::OutOfSync,
                error_message: Some("manual".to_owned()),
            })
            .await
            .expect("update succeeds");

        assert_eq!(view.sync_status, SyncStatus::OutOfSync);
        assert_eq!(view.sync_error_message.as_deref(), Some("manual"));
        assert_eq!(view.last_sync_at, Some(clock.utc()));
        assert_eq!(service.status(&d1()).await.expect("status"), view);
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_device_is_not_found() {
        let service = SyncStatusService::new(Arc::new(InMemoryStore::new()), clock());
        let err = service.status(&d1()).await.expect_err("missing");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[rstest]
    #[case(DeviceRepositoryError::connection("down"), ErrorCode::ServiceUnavailable)]
    #[case(DeviceRepositoryError::query("bad sql"), ErrorCode::InternalError)]
    #[tokio::test]
    async fn repository_errors_are_mapped(
        #[case] failure: DeviceRepositoryError,
        #[case] expected: ErrorCode,
    ) {
        let mut devices = MockDeviceRepository::new();
        devices
            .expect_find()
            .return_once(move |_| Err(failure));
        let service = SyncStatusService::new(Arc::new(devices), clock());

        let err = service.status(&d1()).await.expect_err("repository failure");

        assert_eq!(err.code(), expected);
    }
}
