//! Record Reconciler: upserts fetched tree entries into local rows.
//!
//! Device info is reconciled first and inside one repository transaction;
//! messages, notifications and contacts follow with one write per entry. A
//! failing entry is reported against its key and never aborts the pass.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use super::fetcher::{Entries, ExternalDataFetcher, FetchOutcome, ResourceKind};
use super::ports::{
    ContactRepository, DeviceRepository, MessageRepository, NotificationRepository,
    RecordRepositoryError, UpsertMode, UpsertOutcome,
};
use super::{
    ContactRecord, DeviceId, DeviceProfile, FirebaseEntry, KindCounts, MessageRecord,
    NotificationRecord, ReconcileReport, parse_timestamp_key,
};


/// Repositories written by the reconciler.
#[derive(Clone)]
pub struct ReconcilerPorts {
    pub devices: Arc<dyn DeviceRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub contacts: Arc<dyn ContactRepository>,
}

/// A child entry resolved into its typed record.
#[derive(Debug, Clone, PartialEq)]
enum ChildRecord {
    Message(MessageRecord),
    Notification(NotificationRecord),
    Contact(ContactRecord),
}

impl ChildRecord {
    /// Resolve one raw entry of `kind`.
    ///
    /// `Ok(None)` marks an unrecognised shape, `Err` a malformed key.
    fn parse(kind: ResourceKind, key: &str, value: &Value) -> Result<Option<Self>, String> {
        let entry = FirebaseEntry::classify(value);
        let record = match kind {
            ResourceKind::Messages => {
                MessageRecord::from_entry(parse_timestamp_key(key)?, entry).map(Self::Message)
            }
            ResourceKind::Notifications => {
                NotificationRecord::from_entry(parse_timestamp_key(key)?, entry)
                    .map(Self::Notification)
            }
            ResourceKind::Contacts => Some(Self::Contact(ContactRecord::from_entry(key, entry))),
            ResourceKind::DeviceInfo => None,
        };
        Ok(record)
    }
}

/// Counters and errors gathered for one resource kind.
#[derive(Debug, Default)]
pub struct KindPass {
    pub counts: KindCounts,
    pub errors: Vec<String>,
}

/// Reconciles one device at a time against the tree store.
#[derive(Clone)]
pub struct RecordReconciler {
    fetcher: ExternalDataFetcher,
    ports: ReconcilerPorts,
}

impl RecordReconciler {
    /// Build a reconciler over `fetcher` and the local repositories.
    pub fn new(fetcher: ExternalDataFetcher, ports: ReconcilerPorts) -> Self {
        Self { fetcher, ports }
    }

    /// Borrow the fetcher.
    pub fn fetcher(&self) -> &ExternalDataFetcher {
        &self.fetcher
    }

    /// Run a full reconciliation for `device_id`.
    ///
    /// Stops after the device-info phase when no device info is found or the
    /// device row cannot be written; child kinds are not touched then.
    pub async fn reconcile(&self, device_id: &DeviceId, update_existing: bool) -> ReconcileReport {
        let mut report = ReconcileReport::new(device_id.clone());

        let info = match self.fetcher.fetch(device_id, ResourceKind::DeviceInfo).await {
            FetchOutcome::Found(info) => info,
            outcome => {
                if let FetchOutcome::TransportError(detail) = &outcome {
                    warn!(device_id = %device_id, %detail, "device info unreachable");
                } else {
                    warn!(device_id = %device_id, "device info missing");
                }
                report
                    .errors
                    .push(format!("No device data found in Firebase for device {device_id}"));
                return report;
            }
        };

        let profile = DeviceProfile::from_device_info(&info);
        match self
            .ports
            .devices
            .begin_sync(device_id, &profile, update_existing)
            .await
        {
            Ok(write) => {
                report.device_created = write.created;
                report.device_updated = write.updated;
                report.device_written = true;
            }
            Err(err) => {
                error!(
                    device_id = %device_id,
                    error_kind = err.kind(),
                    error = %err,
                    "device write failed"
                );
                report.errors.push(format!("Hard sync failed: {err}"));
                return report;
            }
        }

        let mode = UpsertMode::from_update_existing(update_existing);
        for kind in [
            ResourceKind::Messages,
            ResourceKind::Notifications,
            ResourceKind::Contacts,
        ] {
            let entries = self.fetcher.fetch_or_empty(device_id, kind).await;
            let pass = self.reconcile_entries(device_id, kind, &entries, mode).await;
            report.errors.extend(pass.errors);
            match kind {
                ResourceKind::Messages => report.messages = pass.counts,
                ResourceKind::Notifications => report.notifications = pass.counts,
                ResourceKind::Contacts => report.contacts = pass.counts,
                ResourceKind::DeviceInfo => {}
            }
        }

        info!(
            device_id = %device_id,
            device_created = report.device_created,
            messages_created = report.messages.created,
            notifications_created = report.notifications.created,
            contacts_created = report.contacts.created,
            errors = report.errors.len(),
            "device reconciled"
        );
        report
    }

    /// Upsert already fetched entries of one child kind.
    pub async fn reconcile_entries(
        &self,
        device_id: &DeviceId,
        kind: ResourceKind,
        entries: &Entries,
        mode: UpsertMode,
    ) -> KindPass {
        let mut pass = KindPass::default();
        pass.counts.fetched = entries.len() as u64;

        for (key, value) in entries {
            let record = match ChildRecord::parse(kind, key, value) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    pass.counts.skipped += 1;
                    continue;
                }
                Err(detail) => {
                    error!(
                        device_id = %device_id,
                        kind = kind.label(),
                        %key,
                        %detail,
                        "entry rejected"
                    );
                    pass.errors
                        .push(format!("Error processing {} {key}: {detail}", kind.label()));
                    pass.counts.skipped += 1;
                    continue;
                }
            };

            match self.upsert(device_id, &record, mode).await {
                Ok(UpsertOutcome::Created) => pass.counts.created += 1,
                Ok(UpsertOutcome::Updated) => pass.counts.updated += 1,
                Ok(UpsertOutcome::Skipped) => pass.counts.skipped += 1,
                Err(err) => {
                    error!(
                        device_id = %device_id,
                        kind = kind.label(),
                        %key,
                        error_kind = err.kind(),
                        error = %err,
                        "entry write failed"
                    );
                    pass.errors
                        .push(format!("Error processing {} {key}: {err}", kind.label()));
                    pass.counts.skipped += 1;
                }
            }
        }
        pass
    }

    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &ChildRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError> {
        match record {
            ChildRecord::Message(message) => {
                self.ports.messages.upsert(device_id, message, mode).await
            }
            ChildRecord::Notification(notification) => {
                self.ports
                    .notifications
                    .upsert(device_id, notification, mode)
                    .await
            }
            ChildRecord::Contact(contact) => {
                self.ports.contacts.upsert(device_id, contact, mode).await
            }
        }
    }
}
