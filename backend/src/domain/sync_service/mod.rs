//! Sync Orchestrator: per-device and fleet-wide reconciliation.
//!
//! Devices are processed one after another on the calling task. A device's
//! failure is recorded against that device and never stops a fleet run.

use std::collections::BTreeSet;
use std::sync::Arc;

use mockable::Clock;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use super::fetcher::{ExternalDataFetcher, ResourceKind};
use super::ports::{
    ContactRepository, DeviceRepository, DeviceRepositoryError, FirebaseTreeSource,
    MessageRepository, NotificationRepository, SyncLogRepository, SyncOutcomeUpdate, UpsertMode,
};
use super::reconciler::{ReconcilerPorts, RecordReconciler};
use super::{
    DeviceId, DeviceSyncResult, Error, FleetMessageSyncResult, FleetSyncResult,
    MessageSyncResult, ReconcileReport, SyncStatus,
};

mod runs;
#[cfg(test)]
mod tests;

/// Upper bound on the error text stored on a device row.
pub const MAX_SYNC_ERROR_CHARS: usize = 500;

/// Everything the orchestrator talks to.
#[derive(Clone)]
pub struct FirebaseSyncPorts {
    pub tree: Arc<dyn FirebaseTreeSource>,
    pub devices: Arc<dyn DeviceRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub contacts: Arc<dyn ContactRepository>,
    pub sync_logs: Arc<dyn SyncLogRepository>,
}

/// Orchestrates reconciliation and status write-back.
#[derive(Clone)]
pub struct FirebaseSyncService {
    reconciler: RecordReconciler,
    devices: Arc<dyn DeviceRepository>,
    sync_logs: Arc<dyn SyncLogRepository>,
    clock: Arc<dyn Clock>,
}

/// Join errors with `"; "` and cap the result at [`MAX_SYNC_ERROR_CHARS`].
///
/// # Examples
/// ```
/// use fastpay_backend::domain::sync_service::summarize_errors;
///
/// let errors = vec!["a".repeat(400), "b".repeat(400)];
/// assert_eq!(summarize_errors(&errors).chars().count(), 500);
/// ```
#[must_use]
pub fn summarize_errors(errors: &[String]) -> String {
    errors.join("; ").chars().take(MAX_SYNC_ERROR_CHARS).collect()
}

fn sync_metadata(report: &ReconcileReport) -> Value {
    json!({
        "last_sync_messages_count": report.messages.fetched,
        "last_sync_notifications_count": report.notifications.fetched,
        "last_sync_contacts_count": report.contacts.fetched,
        "last_sync_messages_created": report.messages.created,
        "last_sync_messages_updated": report.messages.updated,
        "last_sync_notifications_created": report.notifications.created,
        "last_sync_notifications_updated": report.notifications.updated,
        "last_sync_contacts_created": report.contacts.created,
        "last_sync_contacts_updated": report.contacts.updated,
    })
}

pub(crate) fn map_device_error(error: DeviceRepositoryError) -> Error {
    match error {
        DeviceRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("device repository unavailable: {message}"))
        }
        DeviceRepositoryError::Query { message } => {
            Error::internal(format!("device repository error: {message}"))
        }
    }
}

impl FirebaseSyncService {
    /// Wire the service from its ports and a clock.
    pub fn new(ports: FirebaseSyncPorts, clock: Arc<dyn Clock>) -> Self {
        let reconciler = RecordReconciler::new(
            ExternalDataFetcher::new(ports.tree),
            ReconcilerPorts {
                devices: ports.devices.clone(),
                messages: ports.messages,
                notifications: ports.notifications,
                contacts: ports.contacts,
            },
        );
        Self {
            reconciler,
            devices: ports.devices,
            sync_logs: ports.sync_logs,
            clock,
        }
    }

    fn fetcher(&self) -> &ExternalDataFetcher {
        self.reconciler.fetcher()
    }

    /// Hard sync one device and write its status back.
    pub async fn sync_device(
        &self,
        device_id: &DeviceId,
        update_existing: bool,
    ) -> DeviceSyncResult {
        info!(device_id = %device_id, update_existing, "hard sync started");
        let mut report = self.reconciler.reconcile(device_id, update_existing).await;
        let status = self.write_back(&mut report).await;
        DeviceSyncResult { report, status }
    }

    async fn write_back(&self, report: &mut ReconcileReport) -> SyncStatus {
        let now = self.clock.utc();
        let device_id = report.device_id.clone();

        if report.device_written {
            let succeeded = report.errors.is_empty();
            let outcome = SyncOutcomeUpdate {
                status: if succeeded {
                    SyncStatus::Synced
                } else {
                    SyncStatus::SyncFailed
                },
                error_message: (!succeeded).then(|| summarize_errors(&report.errors)),
                synced_at: succeeded.then_some(now),
                messages_synced_at: (report.messages.fetched > 0).then_some(now),
                notifications_synced_at: (report.notifications.fetched > 0).then_some(now),
                contacts_synced_at: (report.contacts.fetched > 0).then_some(now),
                metadata: sync_metadata(report),
            };
            match self.devices.record_sync_outcome(&device_id, &outcome).await {
                Ok(()) => return outcome.status,
                Err(err) => {
                    error!(device_id = %device_id, error = %err, "status write-back failed");
                    report.errors.push(format!("Hard sync failed: {err}"));
                }
            }
        }

        let message = summarize_errors(&report.errors);
        match self.devices.mark_sync_failed(&device_id, &message).await {
            Ok(true) => {}
            Ok(false) => debug!(device_id = %device_id, "device not stored locally"),
            Err(err) => {
                error!(device_id = %device_id, error = %err, "could not mark device failed");
            }
        }
        SyncStatus::SyncFailed
    }

    /// Local device ids united with those discoverable in the tree store.
    async fn device_universe(&self) -> (BTreeSet<DeviceId>, Vec<String>) {
        let mut errors = Vec::new();
        let mut ids: BTreeSet<DeviceId> = match self.devices.list_ids().await {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => {
                error!(error = %err, "listing local devices failed");
                errors.push(format!("Hard sync all devices failed: {err}"));
                BTreeSet::new()
            }
        };
        ids.extend(self.fetcher().discover_device_ids().await);
        (ids, errors)
    }

    /// Hard sync every known device in identifier order.
    pub async fn sync_all_devices(&self, update_existing: bool) -> FleetSyncResult {
        let (ids, listing_errors) = self.device_universe().await;
        info!(devices = ids.len(), update_existing, "fleet hard sync started");

        let mut fleet = FleetSyncResult::default();
        for device_id in &ids {
            fleet.absorb(self.sync_device(device_id, update_existing).await);
        }
        fleet.errors.extend(listing_errors);

        info!(
            processed = fleet.total_devices_processed,
            synced = fleet.devices_synced,
            failed = fleet.devices_failed,
            "fleet hard sync finished"
        );
        fleet
    }

    /// Insert new messages for a stored device, then prune the remote list.
    ///
    /// # Errors
    /// Returns [`Error`] with code `not_found` when the device is not stored
    /// locally, or a repository-derived error when the lookup itself fails.
    pub async fn sync_messages(
        &self,
        device_id: &DeviceId,
        keep_latest: usize,
    ) -> Result<MessageSyncResult, Error> {
        if self
            .devices
            .find(device_id)
            .await
            .map_err(map_device_error)?
            .is_none()
        {
            return Err(Error::not_found(format!(
                "Device {device_id} not found in local database"
            )));
        }

        let mut result = MessageSyncResult::new(device_id.clone());
        let entries = self
            .fetcher()
            .fetch_or_empty(device_id, ResourceKind::Messages)
            .await;
        result.messages_fetched = entries.len() as u64;
        if entries.is_empty() {
            info!(device_id = %device_id, "no remote messages");
            return Ok(result);
        }

        let pass = self
            .reconciler
            .reconcile_entries(device_id, ResourceKind::Messages, &entries, UpsertMode::InsertOnly)
            .await;
        result.messages_created = pass.counts.created;
        result.messages_skipped = pass.counts.skipped;
        result.errors.extend(pass.errors);

        match self.fetcher().prune_messages(device_id, keep_latest).await {
            Ok(Some(pruned)) => {
                result.firebase_cleaned = true;
                result.messages_deleted_from_firebase = pruned.deleted as u64;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(device_id = %device_id, error = %err, "remote prune failed");
                result.errors.push(format!("Error cleaning Firebase: {err}"));
            }
        }

        info!(
            device_id = %device_id,
            fetched = result.messages_fetched,
            created = result.messages_created,
            cleaned = result.firebase_cleaned,
            "message sync finished"
        );
        Ok(result)
    }

    /// Message-only sync for every locally stored device.
    pub async fn sync_all_messages(&self, keep_latest: usize) -> FleetMessageSyncResult {
        let mut fleet = FleetMessageSyncResult::default();
        let ids = match self.devices.list_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                error!(error = %err, "listing local devices failed");
                fleet.errors.push(format!("Message sync failed: {err}"));
                return fleet;
            }
        };

        fleet.total_devices = ids.len() as u64;
        for device_id in &ids {
            match self.sync_messages(device_id, keep_latest).await {
                Ok(result) => fleet.absorb(result),
                Err(err) => fleet.absorb_failure(device_id, err.message()),
            }
        }
        fleet
    }
}
