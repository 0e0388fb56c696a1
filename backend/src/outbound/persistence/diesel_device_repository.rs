//! PostgreSQL-backed `DeviceRepository` implementation using Diesel ORM.
//!
//! Starting a pass reads and rewrites the row inside one transaction so the
//! profile overlay is computed by [`Device::apply_profile`] rather than in SQL.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::ports::{
    DeviceProfileWrite, DeviceRepository, DeviceRepositoryError, SyncOutcomeUpdate,
    SyncStatusUpdate,
};
use crate::domain::{Device, DeviceId, DeviceProfile, DeviceSyncState, SyncStatus};

use super::diesel_helpers;
use super::models::{DeviceOutcomeChangeset, DeviceRow, DeviceWrite};
use super::pool::{DbPool, PoolError};
use super::schema::devices;

/// Diesel-backed implementation of the `DeviceRepository` port.
#[derive(Clone)]
pub struct DieselDeviceRepository {
    pool: DbPool,
}

impl DieselDeviceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DeviceRepositoryError {
    diesel_helpers::map_pool_error(error, DeviceRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> DeviceRepositoryError {
    diesel_helpers::map_diesel_error(
        error,
        DeviceRepositoryError::query,
        DeviceRepositoryError::connection,
    )
}

fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn row_to_device(row: DeviceRow) -> Result<Device, DeviceRepositoryError> {
    let device_id = DeviceId::from_tree_key(row.device_id.as_str()).map_err(|err| {
        DeviceRepositoryError::query(format!("stored device id '{}': {err}", row.device_id))
    })?;
    let status = row.sync_status.parse().unwrap_or_else(|_| {
        warn!(
            value = %row.sync_status,
            device_id = %row.device_id,
            "unrecognised sync_status value, defaulting to never_synced"
        );
        SyncStatus::NeverSynced
    });

    Ok(Device {
        device_id,
        name: row.name,
        model: row.model,
        phone: row.phone,
        code: row.code,
        is_active: row.is_active,
        last_seen: row.last_seen,
        battery_percentage: row.battery_percentage,
        current_phone: row.current_phone,
        current_identifier: row.current_identifier,
        time: row.time,
        bankcard: row.bankcard,
        system_info: json_object(row.system_info),
        sync: DeviceSyncState {
            status,
            last_sync_at: row.last_sync_at,
            last_hard_sync_at: row.last_hard_sync_at,
            messages_last_synced_at: row.messages_last_synced_at,
            notifications_last_synced_at: row.notifications_last_synced_at,
            contacts_last_synced_at: row.contacts_last_synced_at,
            error_message: row.sync_error_message,
            metadata: row.sync_metadata,
        },
    })
}

fn device_write(device: &Device) -> DeviceWrite<'_> {
    DeviceWrite {
        device_id: device.device_id.as_str(),
        name: device.name.as_deref(),
        model: device.model.as_deref(),
        phone: device.phone.as_deref(),
        code: device.code.as_deref(),
        is_active: device.is_active,
        last_seen: device.last_seen,
        battery_percentage: device.battery_percentage,
        current_phone: device.current_phone.as_deref(),
        current_identifier: device.current_identifier.as_deref(),
        time: device.time,
        bankcard: &device.bankcard,
        system_info: Value::Object(device.system_info.clone()),
        sync_status: device.sync.status.as_str(),
        sync_error_message: device.sync.error_message.as_deref(),
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl DeviceRepository for DieselDeviceRepository {
    async fn find(&self, device_id: &DeviceId) -> Result<Option<Device>, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<DeviceRow> = devices::table
            .filter(devices::device_id.eq(device_id.as_str()))
            .select(DeviceRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_device).transpose()
    }

    async fn list_ids(&self) -> Result<Vec<DeviceId>, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let raw: Vec<String> = devices::table
            .select(devices::device_id)
            .order_by(devices::device_id)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(raw
            .into_iter()
            .filter_map(|id| match DeviceId::from_tree_key(id.as_str()) {
                Ok(device_id) => Some(device_id),
                Err(err) => {
                    warn!(device_id = %id, error = %err, "skipping unusable stored device id");
                    None
                }
            })
            .collect())
    }

    async fn begin_sync(
        &self,
        device_id: &DeviceId,
        profile: &DeviceProfile,
        update_existing: bool,
    ) -> Result<DeviceProfileWrite, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let key = device_id.as_str();

        conn.transaction(|conn| {
            async move {
                let existing: Option<DeviceRow> = devices::table
                    .filter(devices::device_id.eq(key))
                    .select(DeviceRow::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;

                let Some(row) = existing else {
                    let device = Device::from_profile(device_id.clone(), profile);
                    diesel::insert_into(devices::table)
                        .values(&device_write(&device))
                        .execute(conn)
                        .await?;
                    return Ok(DeviceProfileWrite {
                        created: true,
                        updated: false,
                    });
                };

                let mut device = row_to_device(row)
                    .map_err(|err| diesel::result::Error::DeserializationError(Box::new(err)))?;
                device.mark_syncing();
                if update_existing {
                    device.apply_profile(profile);
                }
                diesel::update(devices::table.filter(devices::device_id.eq(key)))
                    .set(&device_write(&device))
                    .execute(conn)
                    .await?;

                Ok(DeviceProfileWrite {
                    created: false,
                    updated: update_existing,
                })
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn record_sync_outcome(
        &self,
        device_id: &DeviceId,
        outcome: &SyncOutcomeUpdate,
    ) -> Result<(), DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let changeset = DeviceOutcomeChangeset {
            sync_status: outcome.status.as_str(),
            sync_error_message: Some(outcome.error_message.as_deref()),
            last_sync_at: outcome.synced_at,
            last_hard_sync_at: outcome.synced_at,
            messages_last_synced_at: outcome.messages_synced_at,
            notifications_last_synced_at: outcome.notifications_synced_at,
            contacts_last_synced_at: outcome.contacts_synced_at,
            sync_metadata: &outcome.metadata,
            updated_at: Utc::now(),
        };

        diesel::update(devices::table.filter(devices::device_id.eq(device_id.as_str())))
            .set(&changeset)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn mark_sync_failed(
        &self,
        device_id: &DeviceId,
        message: &str,
    ) -> Result<bool, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let affected = diesel::update(devices::table.filter(devices::device_id.eq(device_id.as_str())))
            .set((
                devices::sync_status.eq(SyncStatus::SyncFailed.as_str()),
                devices::sync_error_message.eq(message),
                devices::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(affected > 0)
    }

    async fn update_sync_status(
        &self,
        device_id: &DeviceId,
        update: &SyncStatusUpdate,
    ) -> Result<Option<Device>, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<DeviceRow> =
            diesel::update(devices::table.filter(devices::device_id.eq(device_id.as_str())))
                .set((
                    devices::sync_status.eq(update.status.as_str()),
                    devices::sync_error_message.eq(update.error_message.as_deref()),
                    devices::last_sync_at.eq(update.at),
                    devices::updated_at.eq(Utc::now()),
                ))
                .returning(DeviceRow::as_returning())
                .get_result(&mut conn)
                .await
                .optional()
                .map_err(map_diesel_error)?;

        row.map(row_to_device).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn row(sync_status: &str) -> DeviceRow {
        DeviceRow {
            device_id: "d1".to_owned(),
            name: Some("Pixel".to_owned()),
            model: None,
            phone: None,
            code: None,
            is_active: true,
            last_seen: Some(10),
            battery_percentage: Some(55),
            current_phone: None,
            current_identifier: None,
            time: Some(10),
            bankcard: "BANKCARD".to_owned(),
            system_info: json!({ "os": "14" }),
            sync_status: sync_status.to_owned(),
            last_sync_at: None,
            last_hard_sync_at: None,
            messages_last_synced_at: None,
            notifications_last_synced_at: None,
            contacts_last_synced_at: None,
            sync_error_message: None,
            sync_metadata: json!({}),
        }
    }

    #[rstest]
    fn row_converts_to_domain_device() {
        let device = row_to_device(row("synced")).expect("valid row");
        assert_eq!(device.device_id.as_str(), "d1");
        assert_eq!(device.sync.status, SyncStatus::Synced);
        assert_eq!(device.system_info.get("os"), Some(&json!("14")));
    }

    #[rstest]
    fn unknown_status_defaults_to_never_synced() {
        let device = row_to_device(row("paused")).expect("valid row");
        assert_eq!(device.sync.status, SyncStatus::NeverSynced);
    }

    #[rstest]
    fn non_object_system_info_reads_as_empty() {
        let mut raw = row("synced");
        raw.system_info = json!("corrupt");
        let device = row_to_device(raw).expect("valid row");
        assert!(device.system_info.is_empty());
    }

    #[rstest]
    fn write_mirrors_the_device() {
        let device = row_to_device(row("syncing")).expect("valid row");
        let write = device_write(&device);
        assert_eq!(write.device_id, "d1");
        assert_eq!(write.sync_status, "syncing");
        assert_eq!(write.system_info, json!({ "os": "14" }));
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let mapped = map_pool_error(PoolError::checkout("refused"));
        assert_eq!(mapped, DeviceRepositoryError::connection("refused"));
    }
}
