//! Orchestrator write-back, fleet isolation and audited runs.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::domain::{Device, DeviceProfile, SyncLogStatus, SyncType};
use crate::test_support::{InMemoryFirebaseTree, InMemoryStore, MutableClock};

struct Harness {
    tree: Arc<InMemoryFirebaseTree>,
    store: Arc<InMemoryStore>,
    clock: Arc<MutableClock>,
    service: FirebaseSyncService,
}

fn harness(root: Value) -> Harness {
    let tree = Arc::new(InMemoryFirebaseTree::new(root));
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(MutableClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
    ));
    let service = FirebaseSyncService::new(
        FirebaseSyncPorts {
            tree: tree.clone(),
            devices: store.clone(),
            messages: store.clone(),
            notifications: store.clone(),
            contacts: store.clone(),
            sync_logs: store.clone(),
        },
        clock.clone(),
    );
    Harness {
        tree,
        store,
        clock,
        service,
    }
}

fn id(raw: &str) -> DeviceId {
    DeviceId::new(raw).expect("valid id")
}

#[fixture]
fn d1() -> DeviceId {
    id("d1")
}

fn stored_device(raw: &str) -> Device {
    let info = json!({ "name": raw });
    Device::from_profile(
        id(raw),
        &DeviceProfile::from_device_info(info.as_object().expect("object")),
    )
}

#[rstest]
#[tokio::test]
async fn clean_pass_marks_device_synced(d1: DeviceId) {
    let h = harness(json!({
        "device": { "d1": { "name": "A" } },
        "message": { "d1": { "100": "received~+1~a" } },
    }));

    let result = h.service.sync_device(&d1, false).await;

    assert_eq!(result.status, SyncStatus::Synced);
    let device = h.store.device(&d1).expect("device stored");
    let now = h.clock.utc();
    assert_eq!(device.sync.status, SyncStatus::Synced);
    assert_eq!(device.sync.error_message, None);
    assert_eq!(device.sync.last_sync_at, Some(now));
    assert_eq!(device.sync.last_hard_sync_at, Some(now));
    assert_eq!(device.sync.messages_last_synced_at, Some(now));
    assert_eq!(device.sync.contacts_last_synced_at, None);
    assert_eq!(device.sync.metadata["last_sync_messages_count"], 1);
    assert_eq!(device.sync.metadata["last_sync_messages_created"], 1);
}

#[rstest]
#[tokio::test]
async fn errors_mark_device_failed_with_capped_message(d1: DeviceId) {
    let mut messages = serde_json::Map::new();
    for n in 0..40 {
        messages.insert(format!("bad-key-{n:02}-{}", "x".repeat(20)), json!("received~a~b"));
    }
    let h = harness(json!({
        "device": { "d1": { "name": "A" } },
        "message": { "d1": Value::Object(messages) },
    }));

    let result = h.service.sync_device(&d1, false).await;

    assert_eq!(result.status, SyncStatus::SyncFailed);
    assert_eq!(result.report.errors.len(), 40);
    let device = h.store.device(&d1).expect("device stored");
    let message = device.sync.error_message.expect("error stored");
    assert!(!message.is_empty());
    assert_eq!(message.chars().count(), MAX_SYNC_ERROR_CHARS);
    assert_eq!(device.sync.status, SyncStatus::SyncFailed);
    assert_eq!(device.sync.last_sync_at, None);
    assert_eq!(device.sync.metadata["last_sync_messages_count"], 40);
}

#[rstest]
#[tokio::test]
async fn existing_device_without_remote_data_is_marked_failed(d1: DeviceId) {
    let h = harness(json!({}));
    h.store.insert_device(stored_device("d1"));

    let result = h.service.sync_device(&d1, true).await;

    assert_eq!(result.status, SyncStatus::SyncFailed);
    let device = h.store.device(&d1).expect("device stored");
    assert_eq!(device.sync.status, SyncStatus::SyncFailed);
    assert_eq!(
        device.sync.error_message.as_deref(),
        Some("No device data found in Firebase for device d1")
    );
}

#[rstest]
#[tokio::test]
async fn fleet_isolates_a_failing_device() {
    let h = harness(json!({
        "device": {
            "d1": { "name": "A" },
            "d2": { "name": "B" },
        },
        "message": { "d1": { "100": "received~+1~a" } },
    }));
    h.store.fail_device(&id("d2"));

    let fleet = h.service.sync_all_devices(false).await;

    assert_eq!(fleet.total_devices_processed, 2);
    assert_eq!(fleet.devices_synced, 1);
    assert_eq!(fleet.devices_failed, 1);
    assert_eq!(fleet.messages_created, 1);
    assert_eq!(fleet.errors.len(), 1);
    assert!(fleet.errors[0].starts_with("d2: Hard sync failed"));
    assert_eq!(h.store.messages(&id("d1")).len(), 1);
}

#[rstest]
#[tokio::test]
async fn fleet_unites_local_and_discovered_devices() {
    let h = harness(json!({
        "fastpay": { "legacy": { "messages": { "1": "received~a~b" } } },
        "device": { "remote": { "name": "R" } },
    }));
    h.store.insert_device(stored_device("local"));

    let fleet = h.service.sync_all_devices(false).await;

    let processed: Vec<&str> = fleet
        .results
        .iter()
        .map(|r| r.report.device_id.as_str())
        .collect();
    assert_eq!(processed, vec!["legacy", "local", "remote"]);
    // "local" has no remote data.
    assert_eq!(fleet.devices_failed, 1);
}

#[rstest]
#[tokio::test]
async fn fleet_survives_local_listing_failure() {
    let h = harness(json!({ "device": { "d1": { "name": "A" } } }));
    h.store.fail_device_listing();

    let fleet = h.service.sync_all_devices(false).await;

    assert_eq!(fleet.devices_synced, 1);
    assert!(
        fleet
            .errors
            .iter()
            .any(|e| e.starts_with("Hard sync all devices failed"))
    );
}

#[rstest]
#[tokio::test]
async fn message_sync_inserts_then_prunes(d1: DeviceId) {
    let h = harness(json!({
        "fastpay": { "d1": { "messages": {
            "100": "received~+1~a", "200": "received~+1~b", "300": "received~+1~c",
        } } },
    }));
    h.store.insert_device(stored_device("d1"));

    let result = h
        .service
        .sync_messages(&d1, 2)
        .await
        .expect("device exists");

    assert_eq!(result.messages_fetched, 3);
    assert_eq!(result.messages_created, 3);
    assert!(result.firebase_cleaned);
    assert_eq!(result.messages_deleted_from_firebase, 1);
    assert_eq!(h.tree.deletions(), vec!["fastpay/d1/messages/100".to_owned()]);

    let again = h.service.sync_messages(&d1, 2).await.expect("device exists");
    assert_eq!(again.messages_created, 0);
    assert_eq!(again.messages_skipped, 2);
}

#[rstest]
#[tokio::test]
async fn message_sync_requires_local_device(d1: DeviceId) {
    let h = harness(json!({}));

    let err = h
        .service
        .sync_messages(&d1, 10)
        .await
        .expect_err("device missing");

    assert_eq!(err.code(), crate::domain::ErrorCode::NotFound);
    assert_eq!(err.message(), "Device d1 not found in local database");
}

#[rstest]
#[tokio::test]
async fn prune_failure_is_reported_not_raised(d1: DeviceId) {
    let h = harness(json!({
        "fastpay": { "d1": { "messages": { "100": "a~b~c", "200": "a~b~c" } } },
    }));
    h.store.insert_device(stored_device("d1"));
    h.tree.fail_prefix("fastpay/d1/messages/");

    let result = h.service.sync_messages(&d1, 1).await.expect("device exists");

    assert_eq!(result.messages_created, 2);
    assert!(!result.firebase_cleaned);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Error cleaning Firebase"));
}

#[rstest]
#[tokio::test]
async fn audited_hard_sync_completes_its_log(d1: DeviceId) {
    let h = harness(json!({
        "device": { "d1": { "name": "A" } },
        "message": { "d1": { "100": "a~b~c", "200": "a~b~c" } },
    }));

    let run = h.service.run_hard_sync_device(&d1, true, false).await;

    let log_id = run.log_id.expect("log written");
    let entry = h.store.logs().into_iter().find(|e| e.id == log_id).expect("entry");
    assert_eq!(entry.sync_type, SyncType::HardSyncSingleDevice);
    assert_eq!(entry.status, SyncLogStatus::Completed);
    assert_eq!(entry.device_id, Some(d1.clone()));
    assert_eq!(entry.counts.messages_created, 2);
    assert_eq!(entry.additional_info["update_existing"], json!(true));
    assert_eq!(entry.additional_info["device_created"], json!(true));
    assert!(entry.completed_at.is_some());
    assert!(run.result().is_some_and(DeviceSyncResult::succeeded));
}

#[rstest]
#[tokio::test]
async fn dry_run_writes_nothing_but_the_log() {
    let h = harness(json!({ "device": { "d1": { "name": "A" } } }));
    h.store.insert_device(stored_device("local"));

    let run = h.service.run_hard_sync_fleet(false, true).await;

    assert!(run.result().is_none());
    assert!(h.store.device(&id("d1")).is_none());
    let entry = &h.store.logs()[0];
    assert_eq!(entry.status, SyncLogStatus::Completed);
    assert_eq!(entry.counts.devices_processed, 1);
}

#[rstest]
#[tokio::test]
async fn fleet_log_is_partial_when_some_devices_fail() {
    let h = harness(json!({
        "device": { "d1": { "name": "A" }, "d2": { "name": "B" } },
    }));
    h.store.fail_device(&id("d2"));

    let run = h.service.run_hard_sync_fleet(false, false).await;

    let entry = &h.store.logs()[0];
    assert_eq!(entry.status, SyncLogStatus::Partial);
    assert_eq!(entry.counts.devices_failed, 1);
    assert_eq!(entry.error_details["device_results"].as_array().map(Vec::len), Some(2));
    assert_eq!(run.result().map(|f| f.devices_synced), Some(1));
}

#[rstest]
#[tokio::test]
async fn missing_device_fails_message_run(d1: DeviceId) {
    let h = harness(json!({}));

    let err = h
        .service
        .run_message_sync_device(&d1, 100, false)
        .await
        .expect_err("device missing");

    assert_eq!(err.message(), "Device d1 not found");
    let entry = &h.store.logs()[0];
    assert_eq!(entry.sync_type, SyncType::SingleDevice);
    assert_eq!(entry.status, SyncLogStatus::Failed);
    assert_eq!(entry.error_message.as_deref(), Some("Device d1 not found"));
}

#[rstest]
#[tokio::test]
async fn message_fleet_log_counts_remote_deletions() {
    let h = harness(json!({
        "message": {
            "d1": { "1": "a~b~c", "2": "a~b~c", "3": "a~b~c" },
            "d2": { "1": "a~b~c" },
        },
    }));
    h.store.insert_device(stored_device("d1"));
    h.store.insert_device(stored_device("d2"));

    let run = h.service.run_message_sync_fleet(1, false).await;

    let fleet = run.result().expect("executed");
    assert_eq!(fleet.total_devices, 2);
    assert_eq!(fleet.total_messages_created, 4);
    let entry = &h.store.logs()[0];
    assert_eq!(entry.sync_type, SyncType::AllDevices);
    assert_eq!(entry.counts.messages_deleted_from_firebase, 2);
    assert_eq!(entry.status, SyncLogStatus::Completed);
}

#[rstest]
#[tokio::test]
async fn message_log_counts_no_deletions_for_unprunable_paths(d1: DeviceId) {
    let h = harness(json!({
        "fastpay": { "testing": { "d1": { "messages": {
            "1": "a~b~c", "2": "a~b~c", "3": "a~b~c",
        } } } },
    }));
    h.store.insert_device(stored_device("d1"));

    let run = h
        .service
        .run_message_sync_device(&d1, 1, false)
        .await
        .expect("device stored");

    let result = run.result().expect("executed");
    assert_eq!(result.messages_fetched, 3);
    assert!(!result.firebase_cleaned);
    assert_eq!(result.messages_deleted_from_firebase, 0);
    let entry = &h.store.logs()[0];
    assert_eq!(entry.counts.messages_deleted_from_firebase, 0);
    assert_eq!(entry.counts.messages_fetched, 3);
}

#[rstest]
#[tokio::test]
async fn log_outage_does_not_stop_the_run(d1: DeviceId) {
    let h = harness(json!({ "device": { "d1": { "name": "A" } } }));
    h.store.fail_sync_logs();

    let run = h.service.run_hard_sync_device(&d1, false, false).await;

    assert_eq!(run.log_id, None);
    assert!(h.store.device(&d1).is_some());
}

#[rstest]
#[tokio::test]
async fn run_duration_follows_the_clock(d1: DeviceId) {
    let h = harness(json!({}));
    h.clock.advance_millis(1500);

    let run = h.service.run_hard_sync_device(&d1, false, true).await;

    assert!(run.duration_seconds >= 0.0);
    assert_eq!(h.store.logs()[0].started_at, h.clock.utc());
}

#[rstest]
fn summary_joins_with_semicolons() {
    let errors = vec!["one".to_owned(), "two".to_owned()];
    assert_eq!(summarize_errors(&errors), "one; two");
}
