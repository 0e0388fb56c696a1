//! End-to-end hard sync scenarios against the in-memory tree and store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fastpay_backend::domain::{
    DeviceId, FirebaseSyncPorts, FirebaseSyncService, KindCounts, SyncLogStatus, SyncStatus,
    SyncType,
};
use fastpay_backend::test_support::{InMemoryFirebaseTree, InMemoryStore, MutableClock};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

struct World {
    tree: Arc<InMemoryFirebaseTree>,
    store: Arc<InMemoryStore>,
    service: FirebaseSyncService,
}

fn world(root: Value) -> World {
    let tree = Arc::new(InMemoryFirebaseTree::new(root));
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(MutableClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
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
        clock,
    );
    World {
        tree,
        store,
        service,
    }
}

fn id(raw: &str) -> DeviceId {
    DeviceId::new(raw).expect("valid id")
}

#[fixture]
fn three_messages() -> Value {
    json!({
        "device": { "d1": { "name": "Pixel 8", "code": "A1" } },
        "message": { "d1": {
            "100": "received~+15550001~hello",
            "200": "sent~+15550002~on my way",
            "300": "received~+15550001~see you",
        } },
    })
}

#[rstest]
#[tokio::test]
async fn first_hard_sync_creates_every_message(three_messages: Value) {
    let w = world(three_messages);

    let run = w.service.run_hard_sync_device(&id("d1"), true, false).await;
    let result = run.result().expect("run executed");

    assert_eq!(
        result.report.messages,
        KindCounts {
            fetched: 3,
            created: 3,
            updated: 0,
            skipped: 0,
        }
    );
    assert_eq!(result.status, SyncStatus::Synced);
    assert!(result.report.device_created);
    assert_eq!(w.store.messages(&id("d1")).len(), 3);
    let device = w.store.device(&id("d1")).expect("device stored");
    assert_eq!(device.sync.status, SyncStatus::Synced);
}

#[rstest]
#[tokio::test]
async fn second_hard_sync_with_update_existing_updates_in_place(three_messages: Value) {
    let w = world(three_messages);
    w.service.run_hard_sync_device(&id("d1"), true, false).await;

    let run = w.service.run_hard_sync_device(&id("d1"), true, false).await;
    let result = run.result().expect("run executed");

    assert_eq!(result.report.messages.created, 0);
    assert_eq!(result.report.messages.updated, 3);
    assert!(result.report.device_updated);
    assert_eq!(w.store.messages(&id("d1")).len(), 3);
}

#[rstest]
#[tokio::test]
async fn second_hard_sync_without_update_existing_skips(three_messages: Value) {
    let w = world(three_messages);
    w.service.run_hard_sync_device(&id("d1"), false, false).await;

    let run = w.service.run_hard_sync_device(&id("d1"), false, false).await;
    let result = run.result().expect("run executed");

    assert_eq!(result.report.messages.skipped, 3);
    assert_eq!(result.report.messages.written(), 0);
}

#[rstest]
#[tokio::test]
async fn fleet_sync_isolates_a_device_whose_fetches_fail() {
    let w = world(json!({
        "device": {
            "d1": { "name": "Pixel 8" },
            "d2": { "name": "Galaxy" },
        },
        "message": { "d1": { "100": "received~+1~hi" } },
    }));
    w.tree.fail_segment("d2");

    let run = w.service.run_hard_sync_fleet(true, false).await;
    let fleet = run.result().expect("run executed");

    assert_eq!(fleet.devices_synced, 1);
    assert_eq!(fleet.devices_failed, 1);
    assert_eq!(w.store.messages(&id("d1")).len(), 1);
    assert!(fleet.errors.iter().all(|error| error.starts_with("d2: ")));

    let logs = w.store.logs();
    let log = logs.last().expect("log written");
    assert_eq!(log.sync_type, SyncType::HardSyncAllDevices);
    assert_eq!(log.status, SyncLogStatus::Partial);
}

#[rstest]
#[tokio::test]
async fn unavailable_store_soft_fails_the_device() {
    let w = world(json!({}));
    w.tree.fail_prefix("");

    let run = w.service.run_hard_sync_device(&id("d1"), true, false).await;
    let result = run.result().expect("run executed");

    assert_eq!(result.status, SyncStatus::SyncFailed);
    assert_eq!(
        result.report.errors,
        vec!["No device data found in Firebase for device d1".to_owned()]
    );
    assert_eq!(w.store.logs().len(), 1);
}

#[rstest]
#[tokio::test]
async fn message_sync_prunes_firebase_to_the_newest_entries(three_messages: Value) {
    let w = world(three_messages);
    w.service.run_hard_sync_device(&id("d1"), true, false).await;

    let run = w
        .service
        .run_message_sync_device(&id("d1"), 1, false)
        .await
        .expect("device is stored");
    let result = run.result().expect("run executed");

    assert!(result.firebase_cleaned);
    assert_eq!(result.messages_skipped, 3);
    assert_eq!(result.messages_deleted_from_firebase, 2);
    let remaining = w.tree.snapshot("message/d1").expect("newest entry kept");
    assert_eq!(
        remaining.as_object().map(|map| map.keys().cloned().collect::<Vec<_>>()),
        Some(vec!["300".to_owned()])
    );
}
