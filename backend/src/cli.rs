//! Shared plumbing for the sync command-line tools.
//!
//! Summaries are rendered as plain `key: value` lines so the binaries only
//! have to print them.

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use crate::domain::{
    DeviceId, DeviceSyncResult, FleetMessageSyncResult, FleetSyncResult, MessageSyncResult,
    RunPayload, SyncRun,
};

/// Errors listed in full before the rest are counted.
pub const ERROR_PREVIEW_LIMIT: usize = 5;

/// Banner printed before a dry run.
pub const DRY_RUN_BANNER: &str = "DRY RUN MODE - No changes will be made";

/// Install the JSON tracing subscriber used by every binary.
pub fn init_tracing() {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %error, "tracing init failed");
    }
}

/// `  Errors: N` followed by the first five and an overflow note.
///
/// # Examples
/// ```
/// use fastpay_backend::cli::error_lines;
///
/// let errors: Vec<String> = (1..=7).map(|n| format!("e{n}")).collect();
/// let lines = error_lines(&errors);
/// assert_eq!(lines.first().map(String::as_str), Some("  Errors: 7"));
/// assert_eq!(lines.last().map(String::as_str), Some("    ... and 2 more"));
/// ```
#[must_use]
pub fn error_lines(errors: &[String]) -> Vec<String> {
    if errors.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("  Errors: {}", errors.len())];
    lines.extend(
        errors
            .iter()
            .take(ERROR_PREVIEW_LIMIT)
            .map(|error| format!("    - {error}")),
    );
    if errors.len() > ERROR_PREVIEW_LIMIT {
        lines.push(format!(
            "    ... and {} more",
            errors.len() - ERROR_PREVIEW_LIMIT
        ));
    }
    lines
}

fn duration_line(seconds: f64) -> String {
    format!("  Duration: {seconds:.2} seconds")
}

fn dry_run_lines<T>(
    run: &SyncRun<T>,
    lines: impl FnOnce(&[DeviceId]) -> Vec<String>,
) -> Option<Vec<String>> {
    match &run.payload {
        RunPayload::DryRun { devices } => Some(lines(devices)),
        RunPayload::Completed { .. } => None,
    }
}

/// Summary of a single-device hard sync.
#[must_use]
pub fn hard_sync_device_summary(
    device_id: &DeviceId,
    update_existing: bool,
    run: &SyncRun<DeviceSyncResult>,
) -> Vec<String> {
    if let Some(lines) = dry_run_lines(run, |_| {
        vec![
            format!("  Would hard sync device: {device_id}"),
            format!("  Would update existing: {update_existing}"),
        ]
    }) {
        return lines;
    }
    let Some(result) = run.result() else {
        return Vec::new();
    };
    let report = &result.report;
    let device_change = if report.device_created {
        "Created"
    } else if report.device_updated {
        "Updated"
    } else {
        "No change"
    };
    let mut lines = vec![
        format!("Hard sync completed for device {device_id}:"),
        format!("  Device: {device_change}"),
        format!("  Status: {}", result.status),
    ];
    for (label, counts) in [
        ("Messages", &report.messages),
        ("Notifications", &report.notifications),
        ("Contacts", &report.contacts),
    ] {
        lines.push(format!("  {label} fetched: {}", counts.fetched));
        lines.push(format!("  {label} created: {}", counts.created));
        lines.push(format!("  {label} updated: {}", counts.updated));
        lines.push(format!("  {label} skipped: {}", counts.skipped));
    }
    lines.extend(error_lines(&report.errors));
    lines.push(duration_line(run.duration_seconds));
    lines
}

/// Summary of a fleet-wide hard sync.
#[must_use]
pub fn hard_sync_fleet_summary(
    update_existing: bool,
    run: &SyncRun<FleetSyncResult>,
) -> Vec<String> {
    if let Some(lines) = dry_run_lines(run, |devices| {
        vec![
            format!("  Would hard sync {} devices", devices.len()),
            format!("  Would update existing: {update_existing}"),
        ]
    }) {
        return lines;
    }
    let Some(fleet) = run.result() else {
        return Vec::new();
    };
    let mut lines = vec![
        "Hard sync completed for all devices:".to_owned(),
        format!("  Total devices processed: {}", fleet.total_devices_processed),
        format!("  Devices synced: {}", fleet.devices_synced),
        format!("  Devices failed: {}", fleet.devices_failed),
        format!("  Total messages created: {}", fleet.messages_created),
        format!("  Total messages updated: {}", fleet.messages_updated),
        format!("  Total notifications created: {}", fleet.notifications_created),
        format!("  Total notifications updated: {}", fleet.notifications_updated),
        format!("  Total contacts created: {}", fleet.contacts_created),
        format!("  Total contacts updated: {}", fleet.contacts_updated),
    ];
    lines.extend(error_lines(&fleet.errors));
    lines.push(duration_line(run.duration_seconds));
    lines
}

/// Summary of a single-device message sync.
#[must_use]
pub fn message_sync_device_summary(
    device_id: &DeviceId,
    keep_latest: usize,
    run: &SyncRun<MessageSyncResult>,
) -> Vec<String> {
    if let Some(lines) = dry_run_lines(run, |_| {
        vec![
            format!("  Would sync device: {device_id}"),
            format!("  Would keep latest: {keep_latest} messages"),
        ]
    }) {
        return lines;
    }
    let Some(result) = run.result() else {
        return Vec::new();
    };
    let mut lines = vec![
        format!("Sync completed for device {device_id}:"),
        format!("  Messages fetched: {}", result.messages_fetched),
        format!("  Messages created: {}", result.messages_created),
        format!("  Messages skipped: {}", result.messages_skipped),
        format!("  Firebase cleaned: {}", result.firebase_cleaned),
        format!(
            "  Messages deleted from Firebase: {}",
            result.messages_deleted_from_firebase
        ),
    ];
    lines.extend(error_lines(&result.errors));
    lines.push(duration_line(run.duration_seconds));
    lines
}

/// Summary of a fleet-wide message sync.
#[must_use]
pub fn message_sync_fleet_summary(
    keep_latest: usize,
    run: &SyncRun<FleetMessageSyncResult>,
) -> Vec<String> {
    if let Some(lines) = dry_run_lines(run, |devices| {
        vec![
            format!("  Would sync {} devices", devices.len()),
            format!("  Would keep latest: {keep_latest} messages per device"),
        ]
    }) {
        return lines;
    }
    let Some(fleet) = run.result() else {
        return Vec::new();
    };
    let mut lines = vec![
        "Sync completed for all devices:".to_owned(),
        format!("  Total devices: {}", fleet.total_devices),
        format!("  Devices synced: {}", fleet.devices_synced),
        format!("  Devices failed: {}", fleet.devices_failed),
        format!("  Total messages created: {}", fleet.total_messages_created),
        format!("  Total messages skipped: {}", fleet.total_messages_skipped),
    ];
    lines.extend(error_lines(&fleet.errors));
    lines.push(duration_line(run.duration_seconds));
    lines
}
