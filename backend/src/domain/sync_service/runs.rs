//! Audited runs: each sync entry point wrapped in a sync log entry.
//!
//! The log entry is opened as `running` before any work and completed once.
//! Log write failures are logged and leave the run itself untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::warn;

use super::{FirebaseSyncService, map_device_error};
use crate::domain::ports::{SyncLogRepositoryError, SyncRunPort};
use crate::domain::{
    DeviceId, DeviceSyncResult, Error, FleetMessageSyncResult, FleetSyncResult,
    MessageSyncResult, NewSyncLog, RunPayload, SyncLogCompletion, SyncLogCounts, SyncLogEntry,
    SyncLogId, SyncLogStatus, SyncRun, SyncType,
};

fn run_info(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect()
}

fn joined_errors(errors: &[String]) -> Option<String> {
    (!errors.is_empty()).then(|| errors.join("; "))
}

fn error_details(errors: &[String]) -> Value {
    if errors.is_empty() {
        json!({})
    } else {
        json!({ "errors": errors })
    }
}

fn map_log_error(error: SyncLogRepositoryError) -> Error {
    match error {
        SyncLogRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("sync log unavailable: {message}"))
        }
        SyncLogRepositoryError::Query { message } => {
            Error::internal(format!("sync log error: {message}"))
        }
    }
}

impl FirebaseSyncService {
    async fn open_log(
        &self,
        sync_type: SyncType,
        device_id: Option<&DeviceId>,
        additional_info: Map<String, Value>,
    ) -> Option<SyncLogId> {
        let entry = NewSyncLog {
            sync_type,
            device_id: device_id.cloned(),
            started_at: self.clock.utc(),
            additional_info,
        };
        match self.sync_logs.start(&entry).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(sync_type = %sync_type, error = %err, "sync log not opened");
                None
            }
        }
    }

    async fn close_log(&self, id: Option<SyncLogId>, completion: &SyncLogCompletion) {
        let Some(id) = id else {
            return;
        };
        if let Err(err) = self.sync_logs.complete(id, completion).await {
            warn!(log_id = %id, error = %err, "sync log not completed");
        }
    }

    fn elapsed_seconds(&self, started: DateTime<Utc>) -> f64 {
        let elapsed = self.clock.utc() - started;
        elapsed.num_milliseconds() as f64 / 1000.0
    }

    async fn finish_failed(
        &self,
        log_id: Option<SyncLogId>,
        started: DateTime<Utc>,
        message: &str,
    ) -> f64 {
        let duration = self.elapsed_seconds(started);
        let mut completion = SyncLogCompletion::bare(SyncLogStatus::Failed, self.clock.utc());
        completion.error_message = Some(message.to_owned());
        completion.duration_seconds = Some(duration);
        self.close_log(log_id, &completion).await;
        duration
    }

    async fn finish_dry_run<T>(
        &self,
        log_id: Option<SyncLogId>,
        started: DateTime<Utc>,
        devices: Vec<DeviceId>,
        record_device_count: bool,
    ) -> SyncRun<T> {
        let mut completion = SyncLogCompletion::bare(SyncLogStatus::Completed, self.clock.utc());
        if record_device_count {
            completion.counts.devices_processed = devices.len() as u64;
        }
        self.close_log(log_id, &completion).await;
        SyncRun {
            log_id,
            duration_seconds: self.elapsed_seconds(started),
            payload: RunPayload::DryRun { devices },
        }
    }

    async fn stored_device(&self, device_id: &DeviceId) -> Option<DeviceId> {
        match self.devices.find(device_id).await {
            Ok(found) => found.map(|device| device.device_id),
            Err(err) => {
                warn!(device_id = %device_id, error = %err, "device lookup for sync log failed");
                None
            }
        }
    }

    async fn local_device_ids(&self) -> Vec<DeviceId> {
        self.devices.list_ids().await.unwrap_or_else(|err| {
            warn!(error = %err, "listing local devices failed");
            Vec::new()
        })
    }

    /// Audited single-device hard sync.
    pub async fn run_hard_sync_device(
        &self,
        device_id: &DeviceId,
        update_existing: bool,
        dry_run: bool,
    ) -> SyncRun<DeviceSyncResult> {
        let started = self.clock.utc();
        let info = run_info(&[
            ("device_id", json!(device_id.as_str())),
            ("update_existing", json!(update_existing)),
            ("dry_run", json!(dry_run)),
        ]);
        let log_id = self
            .open_log(SyncType::HardSyncSingleDevice, None, info)
            .await;
        if dry_run {
            return self
                .finish_dry_run(log_id, started, vec![device_id.clone()], false)
                .await;
        }

        let result = self.sync_device(device_id, update_existing).await;
        let duration = self.elapsed_seconds(started);
        let report = &result.report;
        let succeeded = result.succeeded();

        let mut completion =
            SyncLogCompletion::bare(SyncLogStatus::for_device(succeeded), self.clock.utc());
        completion.device_id = self.stored_device(device_id).await;
        completion.counts = SyncLogCounts {
            devices_processed: 1,
            devices_succeeded: u64::from(succeeded),
            devices_failed: u64::from(!succeeded),
            messages_fetched: report.messages.fetched,
            messages_created: report.messages.written(),
            messages_skipped: report.messages.skipped,
            messages_deleted_from_firebase: 0,
        };
        completion.error_message = joined_errors(&report.errors);
        completion.error_details = error_details(&report.errors);
        completion.duration_seconds = Some(duration);
        completion.additional_info = run_info(&[
            ("device_created", json!(report.device_created)),
            ("device_updated", json!(report.device_updated)),
            ("notifications_fetched", json!(report.notifications.fetched)),
            ("notifications_created", json!(report.notifications.created)),
            ("notifications_updated", json!(report.notifications.updated)),
            ("contacts_fetched", json!(report.contacts.fetched)),
            ("contacts_created", json!(report.contacts.created)),
            ("contacts_updated", json!(report.contacts.updated)),
        ]);
        self.close_log(log_id, &completion).await;

        SyncRun {
            log_id,
            duration_seconds: duration,
            payload: RunPayload::Completed { result },
        }
    }

    /// Audited fleet-wide hard sync.
    pub async fn run_hard_sync_fleet(
        &self,
        update_existing: bool,
        dry_run: bool,
    ) -> SyncRun<FleetSyncResult> {
        let started = self.clock.utc();
        let info = run_info(&[
            ("device_id", Value::Null),
            ("update_existing", json!(update_existing)),
            ("dry_run", json!(dry_run)),
        ]);
        let log_id = self.open_log(SyncType::HardSyncAllDevices, None, info).await;
        if dry_run {
            let devices = self.local_device_ids().await;
            return self.finish_dry_run(log_id, started, devices, true).await;
        }

        let fleet = self.sync_all_devices(update_existing).await;
        let duration = self.elapsed_seconds(started);

        let mut completion = SyncLogCompletion::bare(
            SyncLogStatus::for_fleet(fleet.devices_synced, fleet.devices_failed),
            self.clock.utc(),
        );
        completion.counts = SyncLogCounts {
            devices_processed: fleet.total_devices_processed,
            devices_succeeded: fleet.devices_synced,
            devices_failed: fleet.devices_failed,
            messages_fetched: fleet.results.iter().map(|r| r.report.messages.fetched).sum(),
            messages_created: fleet.messages_created + fleet.messages_updated,
            messages_skipped: fleet.results.iter().map(|r| r.report.messages.skipped).sum(),
            messages_deleted_from_firebase: 0,
        };
        completion.error_message = joined_errors(&fleet.errors);
        completion.error_details = json!({
            "errors": fleet.errors,
            "device_results": serde_json::to_value(&fleet.results).unwrap_or_default(),
        });
        completion.duration_seconds = Some(duration);
        completion.additional_info = run_info(&[
            ("total_notifications_created", json!(fleet.notifications_created)),
            ("total_notifications_updated", json!(fleet.notifications_updated)),
            ("total_contacts_created", json!(fleet.contacts_created)),
            ("total_contacts_updated", json!(fleet.contacts_updated)),
        ]);
        self.close_log(log_id, &completion).await;

        SyncRun {
            log_id,
            duration_seconds: duration,
            payload: RunPayload::Completed { result: fleet },
        }
    }

    /// Audited message-only sync for one stored device.
    ///
    /// # Errors
    /// Returns a `not_found` [`Error`] reading `Device {id} not found` when
    /// the device is not stored locally, after completing the log as failed.
    pub async fn run_message_sync_device(
        &self,
        device_id: &DeviceId,
        keep_latest: usize,
        dry_run: bool,
    ) -> Result<SyncRun<MessageSyncResult>, Error> {
        let started = self.clock.utc();
        let info = run_info(&[
            ("device_id", json!(device_id.as_str())),
            ("keep_latest", json!(keep_latest)),
            ("dry_run", json!(dry_run)),
        ]);

        let stored = match self.devices.find(device_id).await {
            Ok(stored) => stored,
            Err(err) => {
                let err = map_device_error(err);
                let log_id = self.open_log(SyncType::SingleDevice, None, info).await;
                let message = format!("Error syncing device {device_id}: {}", err.message());
                self.finish_failed(log_id, started, &message).await;
                return Err(err);
            }
        };
        if stored.is_none() {
            let log_id = self.open_log(SyncType::SingleDevice, None, info).await;
            let message = format!("Device {device_id} not found");
            self.finish_failed(log_id, started, &message).await;
            return Err(Error::not_found(message));
        }

        let log_id = self
            .open_log(SyncType::SingleDevice, Some(device_id), info)
            .await;
        if dry_run {
            return Ok(self
                .finish_dry_run(log_id, started, vec![device_id.clone()], false)
                .await);
        }

        let result = match self.sync_messages(device_id, keep_latest).await {
            Ok(result) => result,
            Err(err) => {
                let message = format!("Error syncing device {device_id}: {}", err.message());
                self.finish_failed(log_id, started, &message).await;
                return Err(err);
            }
        };
        let duration = self.elapsed_seconds(started);
        let succeeded = result.succeeded();

        let mut completion =
            SyncLogCompletion::bare(SyncLogStatus::for_device(succeeded), self.clock.utc());
        completion.device_id = Some(device_id.clone());
        completion.counts = SyncLogCounts {
            devices_processed: 1,
            devices_succeeded: u64::from(succeeded),
            devices_failed: u64::from(!succeeded),
            messages_fetched: result.messages_fetched,
            messages_created: result.messages_created,
            messages_skipped: result.messages_skipped,
            messages_deleted_from_firebase: result.messages_deleted_from_firebase,
        };
        completion.error_message = joined_errors(&result.errors);
        completion.error_details = error_details(&result.errors);
        completion.duration_seconds = Some(duration);
        self.close_log(log_id, &completion).await;

        Ok(SyncRun {
            log_id,
            duration_seconds: duration,
            payload: RunPayload::Completed { result },
        })
    }

    /// Audited message-only sync for every stored device.
    pub async fn run_message_sync_fleet(
        &self,
        keep_latest: usize,
        dry_run: bool,
    ) -> SyncRun<FleetMessageSyncResult> {
        let started = self.clock.utc();
        let info = run_info(&[
            ("device_id", Value::Null),
            ("keep_latest", json!(keep_latest)),
            ("dry_run", json!(dry_run)),
        ]);
        let log_id = self.open_log(SyncType::AllDevices, None, info).await;
        if dry_run {
            let devices = self.local_device_ids().await;
            return self.finish_dry_run(log_id, started, devices, true).await;
        }

        let fleet = self.sync_all_messages(keep_latest).await;
        let duration = self.elapsed_seconds(started);

        let mut completion = SyncLogCompletion::bare(
            SyncLogStatus::for_fleet(fleet.devices_synced, fleet.devices_failed),
            self.clock.utc(),
        );
        completion.counts = SyncLogCounts {
            devices_processed: fleet.total_devices,
            devices_succeeded: fleet.devices_synced,
            devices_failed: fleet.devices_failed,
            messages_fetched: fleet.results.iter().map(|r| r.messages_fetched).sum(),
            messages_created: fleet.total_messages_created,
            messages_skipped: fleet.total_messages_skipped,
            messages_deleted_from_firebase: fleet
                .results
                .iter()
                .map(|r| r.messages_deleted_from_firebase)
                .sum(),
        };
        completion.error_message = joined_errors(&fleet.errors);
        completion.error_details = json!({
            "errors": fleet.errors,
            "device_results": serde_json::to_value(&fleet.results).unwrap_or_default(),
        });
        completion.duration_seconds = Some(duration);
        self.close_log(log_id, &completion).await;

        SyncRun {
            log_id,
            duration_seconds: duration,
            payload: RunPayload::Completed { result: fleet },
        }
    }
}

#[async_trait]
impl SyncRunPort for FirebaseSyncService {
    async fn hard_sync_device(
        &self,
        device_id: &DeviceId,
        update_existing: bool,
    ) -> SyncRun<DeviceSyncResult> {
        self.run_hard_sync_device(device_id, update_existing, false)
            .await
    }

    async fn find_log(&self, id: SyncLogId) -> Result<Option<SyncLogEntry>, Error> {
        self.sync_logs.find(id).await.map_err(map_log_error)
    }
}
