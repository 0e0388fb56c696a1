//! Result types reported by reconciliation and sync runs.
//!
//! These are plain data: the orchestrator fills them and the inbound adapters
//! serialise them unchanged.

use serde::Serialize;
use utoipa::ToSchema;

use super::{DeviceId, SyncLogId, SyncStatus};

/// Per-kind counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct KindCounts {
    pub fetched: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
}

impl KindCounts {
    /// Rows written by the pass.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.created + self.updated
    }
}

/// Outcome of reconciling one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    pub device_id: DeviceId,
    pub device_created: bool,
    pub device_updated: bool,
    /// The device row was inserted or marked syncing by this pass.
    pub device_written: bool,
    pub messages: KindCounts,
    pub notifications: KindCounts,
    pub contacts: KindCounts,
    pub errors: Vec<String>,
}

impl ReconcileReport {
    /// Empty report for `device_id`.
    #[must_use]
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            device_created: false,
            device_updated: false,
            device_written: false,
            messages: KindCounts::default(),
            notifications: KindCounts::default(),
            contacts: KindCounts::default(),
            errors: Vec::new(),
        }
    }
}

/// Reconciliation report plus the status written back to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeviceSyncResult {
    #[serde(flatten)]
    pub report: ReconcileReport,
    pub status: SyncStatus,
}

impl DeviceSyncResult {
    /// Whether the pass finished without errors.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.report.errors.is_empty()
    }
}

/// Fleet-wide hard sync totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct FleetSyncResult {
    pub total_devices_processed: u64,
    pub devices_synced: u64,
    pub devices_failed: u64,
    pub messages_created: u64,
    pub messages_updated: u64,
    pub notifications_created: u64,
    pub notifications_updated: u64,
    pub contacts_created: u64,
    pub contacts_updated: u64,
    pub results: Vec<DeviceSyncResult>,
    /// `"{device_id}: {message}"` for every device-level error.
    pub errors: Vec<String>,
}

impl FleetSyncResult {
    /// Fold one device result into the totals.
    pub fn absorb(&mut self, result: DeviceSyncResult) {
        self.total_devices_processed += 1;
        if result.succeeded() {
            self.devices_synced += 1;
        } else {
            self.devices_failed += 1;
        }
        let report = &result.report;
        self.messages_created += report.messages.created;
        self.messages_updated += report.messages.updated;
        self.notifications_created += report.notifications.created;
        self.notifications_updated += report.notifications.updated;
        self.contacts_created += report.contacts.created;
        self.contacts_updated += report.contacts.updated;
        self.errors.extend(
            report
                .errors
                .iter()
                .map(|error| format!("{}: {error}", report.device_id)),
        );
        self.results.push(result);
    }
}

/// Outcome of a message-only sync for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MessageSyncResult {
    pub device_id: DeviceId,
    pub messages_fetched: u64,
    pub messages_created: u64,
    pub messages_skipped: u64,
    /// Remote pruning ran and succeeded.
    pub firebase_cleaned: bool,
    pub messages_deleted_from_firebase: u64,
    pub errors: Vec<String>,
}

impl MessageSyncResult {
    /// Empty result for `device_id`.
    #[must_use]
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            messages_fetched: 0,
            messages_created: 0,
            messages_skipped: 0,
            firebase_cleaned: false,
            messages_deleted_from_firebase: 0,
            errors: Vec::new(),
        }
    }

    /// Whether the pass finished without errors.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Fleet-wide message sync totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct FleetMessageSyncResult {
    pub total_devices: u64,
    pub devices_synced: u64,
    pub devices_failed: u64,
    pub total_messages_created: u64,
    pub total_messages_skipped: u64,
    pub results: Vec<MessageSyncResult>,
    pub errors: Vec<String>,
}

impl FleetMessageSyncResult {
    /// Fold one device result into the totals.
    pub fn absorb(&mut self, result: MessageSyncResult) {
        if result.succeeded() {
            self.devices_synced += 1;
        } else {
            self.devices_failed += 1;
        }
        self.total_messages_created += result.messages_created;
        self.total_messages_skipped += result.messages_skipped;
        self.errors.extend(
            result
                .errors
                .iter()
                .map(|error| format!("{}: {error}", result.device_id)),
        );
        self.results.push(result);
    }

    /// Record a device that could not be synced at all.
    pub fn absorb_failure(&mut self, device_id: &DeviceId, message: &str) {
        self.devices_failed += 1;
        self.errors.push(format!("{device_id}: {message}"));
    }
}

/// What an audited run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunPayload<T> {
    /// Nothing was written; `devices` lists what would have been synced.
    DryRun { devices: Vec<DeviceId> },
    /// The run executed.
    Completed { result: T },
}

/// An audited run: the log entry it wrote plus its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncRun<T> {
    /// `None` when the audit log could not be written.
    pub log_id: Option<SyncLogId>,
    pub duration_seconds: f64,
    #[serde(flatten)]
    pub payload: RunPayload<T>,
}

impl<T> SyncRun<T> {
    /// The executed result, if this was not a dry run.
    pub fn result(&self) -> Option<&T> {
        match &self.payload {
            RunPayload::Completed { result } => Some(result),
            RunPayload::DryRun { .. } => None,
        }
    }
}
