//! In-memory implementation of every repository port.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::lock;
use crate::domain::ports::{
    ContactRepository, DeviceProfileWrite, DeviceRepository, DeviceRepositoryError,
    MessageRepository, NotificationRepository, RecordRepositoryError, SyncLogRepository,
    SyncLogRepositoryError, SyncOutcomeUpdate, SyncStatusUpdate, UpsertMode, UpsertOutcome,
};
use crate::domain::{
    ContactRecord, Device, DeviceId, DeviceProfile, MessageRecord, NewSyncLog, NotificationRecord,
    SyncLogCompletion, SyncLogEntry, SyncLogId, SyncStatus,
};

#[derive(Default)]
struct State {
    devices: BTreeMap<DeviceId, Device>,
    messages: BTreeMap<(DeviceId, i64), MessageRecord>,
    notifications: BTreeMap<(DeviceId, i64), NotificationRecord>,
    contacts: BTreeMap<(DeviceId, String), ContactRecord>,
    logs: Vec<SyncLogEntry>,
    failing_devices: HashSet<DeviceId>,
    failing_message_timestamps: HashSet<i64>,
    fail_device_listing: bool,
    fail_sync_logs: bool,
}

/// Shared relational store double.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

fn upsert_row<K: Ord, V>(
    rows: &mut BTreeMap<K, V>,
    key: K,
    value: V,
    mode: UpsertMode,
) -> UpsertOutcome {
    match (rows.contains_key(&key), mode) {
        (false, _) => {
            rows.insert(key, value);
            UpsertOutcome::Created
        }
        (true, UpsertMode::InsertOnly) => UpsertOutcome::Skipped,
        (true, UpsertMode::Overwrite) => {
            rows.insert(key, value);
            UpsertOutcome::Updated
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a device row.
    pub fn insert_device(&self, device: Device) {
        lock(&self.state)
            .devices
            .insert(device.device_id.clone(), device);
    }

    /// Make every device write for `device_id` fail with a query error.
    pub fn fail_device(&self, device_id: &DeviceId) {
        lock(&self.state).failing_devices.insert(device_id.clone());
    }

    /// Make message upserts at `timestamp` fail with a query error.
    pub fn fail_message(&self, timestamp: i64) {
        lock(&self.state).failing_message_timestamps.insert(timestamp);
    }

    /// Make `list_ids` fail with a connection error.
    pub fn fail_device_listing(&self) {
        lock(&self.state).fail_device_listing = true;
    }

    /// Make every audit log call fail with a connection error.
    pub fn fail_sync_logs(&self) {
        lock(&self.state).fail_sync_logs = true;
    }

    pub fn device(&self, device_id: &DeviceId) -> Option<Device> {
        lock(&self.state).devices.get(device_id).cloned()
    }

    pub fn messages(&self, device_id: &DeviceId) -> Vec<MessageRecord> {
        lock(&self.state)
            .messages
            .iter()
            .filter(|((owner, _), _)| owner == device_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn notifications(&self, device_id: &DeviceId) -> Vec<NotificationRecord> {
        lock(&self.state)
            .notifications
            .iter()
            .filter(|((owner, _), _)| owner == device_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn contacts(&self, device_id: &DeviceId) -> Vec<ContactRecord> {
        lock(&self.state)
            .contacts
            .iter()
            .filter(|((owner, _), _)| owner == device_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn logs(&self) -> Vec<SyncLogEntry> {
        lock(&self.state).logs.clone()
    }

    fn device_guard(state: &State, device_id: &DeviceId) -> Result<(), DeviceRepositoryError> {
        if state.failing_devices.contains(device_id) {
            Err(DeviceRepositoryError::query(format!(
                "scripted failure for {device_id}"
            )))
        } else {
            Ok(())
        }
    }

    fn log_guard(state: &State) -> Result<(), SyncLogRepositoryError> {
        if state.fail_sync_logs {
            Err(SyncLogRepositoryError::connection("scripted log failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceRepository for InMemoryStore {
    async fn find(&self, device_id: &DeviceId) -> Result<Option<Device>, DeviceRepositoryError> {
        Ok(self.device(device_id))
    }

    async fn list_ids(&self) -> Result<Vec<DeviceId>, DeviceRepositoryError> {
        let state = lock(&self.state);
        if state.fail_device_listing {
            return Err(DeviceRepositoryError::connection("scripted listing failure"));
        }
        Ok(state.devices.keys().cloned().collect())
    }

    async fn begin_sync(
        &self,
        device_id: &DeviceId,
        profile: &DeviceProfile,
        update_existing: bool,
    ) -> Result<DeviceProfileWrite, DeviceRepositoryError> {
        let mut state = lock(&self.state);
        Self::device_guard(&state, device_id)?;
        if !state.devices.contains_key(device_id) {
            state.devices.insert(
                device_id.clone(),
                Device::from_profile(device_id.clone(), profile),
            );
            return Ok(DeviceProfileWrite {
                created: true,
                updated: false,
            });
        }
        let Some(device) = state.devices.get_mut(device_id) else {
            return Ok(DeviceProfileWrite::default());
        };
        device.mark_syncing();
        if update_existing {
            device.apply_profile(profile);
        }
        Ok(DeviceProfileWrite {
            created: false,
            updated: update_existing,
        })
    }

    async fn record_sync_outcome(
        &self,
        device_id: &DeviceId,
        outcome: &SyncOutcomeUpdate,
    ) -> Result<(), DeviceRepositoryError> {
        let mut state = lock(&self.state);
        Self::device_guard(&state, device_id)?;
        if let Some(device) = state.devices.get_mut(device_id) {
            let sync = &mut device.sync;
            sync.status = outcome.status;
            sync.error_message.clone_from(&outcome.error_message);
            if let Some(at) = outcome.synced_at {
                sync.last_sync_at = Some(at);
                sync.last_hard_sync_at = Some(at);
            }
            sync.messages_last_synced_at = outcome.messages_synced_at.or(sync.messages_last_synced_at);
            sync.notifications_last_synced_at = outcome
                .notifications_synced_at
                .or(sync.notifications_last_synced_at);
            sync.contacts_last_synced_at = outcome.contacts_synced_at.or(sync.contacts_last_synced_at);
            sync.metadata = outcome.metadata.clone();
        }
        Ok(())
    }

    async fn mark_sync_failed(
        &self,
        device_id: &DeviceId,
        message: &str,
    ) -> Result<bool, DeviceRepositoryError> {
        let mut state = lock(&self.state);
        Ok(match state.devices.get_mut(device_id) {
            Some(device) => {
                device.sync.status = SyncStatus::SyncFailed;
                device.sync.error_message = Some(message.to_owned());
                true
            }
            None => false,
        })
    }

    async fn update_sync_status(
        &self,
        device_id: &DeviceId,
        update: &SyncStatusUpdate,
    ) -> Result<Option<Device>, DeviceRepositoryError> {
        let mut state = lock(&self.state);
        Ok(state.devices.get_mut(device_id).map(|device| {
            device.sync.status = update.status;
            device.sync.error_message.clone_from(&update.error_message);
            device.sync.last_sync_at = Some(update.at);
            device.clone()
        }))
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &MessageRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError> {
        let mut state = lock(&self.state);
        if state.failing_message_timestamps.contains(&record.timestamp) {
            return Err(RecordRepositoryError::query(format!(
                "scripted failure for message {}",
                record.timestamp
            )));
        }
        let key = (device_id.clone(), record.timestamp);
        Ok(upsert_row(&mut state.messages, key, record.clone(), mode))
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &NotificationRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError> {
        let mut state = lock(&self.state);
        let key = (device_id.clone(), record.timestamp);
        Ok(upsert_row(&mut state.notifications, key, record.clone(), mode))
    }
}

#[async_trait]
impl ContactRepository for InMemoryStore {
    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &ContactRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError> {
        let mut state = lock(&self.state);
        let key = (device_id.clone(), record.phone_number.clone());
        Ok(upsert_row(&mut state.contacts, key, record.clone(), mode))
    }
}

#[async_trait]
impl SyncLogRepository for InMemoryStore {
    async fn start(&self, entry: &NewSyncLog) -> Result<SyncLogId, SyncLogRepositoryError> {
        let mut state = lock(&self.state);
        Self::log_guard(&state)?;
        let id = SyncLogId(i64::try_from(state.logs.len()).unwrap_or(i64::MAX) + 1);
        state.logs.push(SyncLogEntry::started(id, entry));
        Ok(id)
    }

    async fn complete(
        &self,
        id: SyncLogId,
        completion: &SyncLogCompletion,
    ) -> Result<(), SyncLogRepositoryError> {
        let mut state = lock(&self.state);
        Self::log_guard(&state)?;
        match state.logs.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.complete(completion);
                Ok(())
            }
            None => Err(SyncLogRepositoryError::query(format!("no sync log {id}"))),
        }
    }

    async fn find(&self, id: SyncLogId) -> Result<Option<SyncLogEntry>, SyncLogRepositoryError> {
        let state = lock(&self.state);
        Self::log_guard(&state)?;
        Ok(state.logs.iter().find(|entry| entry.id == id).cloned())
    }
}
