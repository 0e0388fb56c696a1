//! Internal Diesel row structs for the sync tables.
//!
//! These never leave the persistence layer; repositories convert them to
//! domain types.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::{contacts, devices, firebase_sync_logs, messages, notifications};

/// Row struct for reading from the devices table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = devices)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DeviceRow {
    pub device_id: String,
    pub name: Option<String>,
    pub model: Option<String>,
    pub phone: Option<String>,
    pub code: Option<String>,
    pub is_active: bool,
    pub last_seen: Option<i64>,
    pub battery_percentage: Option<i32>,
    pub current_phone: Option<String>,
    pub current_identifier: Option<String>,
    pub time: Option<i64>,
    pub bankcard: String,
    pub system_info: Value,
    pub sync_status: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_hard_sync_at: Option<DateTime<Utc>>,
    pub messages_last_synced_at: Option<DateTime<Utc>>,
    pub notifications_last_synced_at: Option<DateTime<Utc>>,
    pub contacts_last_synced_at: Option<DateTime<Utc>>,
    pub sync_error_message: Option<String>,
    pub sync_metadata: Value,
}

/// Full device write, used both for inserts and for rewriting a row after
/// the domain merged a profile into it.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = devices)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct DeviceWrite<'a> {
    pub device_id: &'a str,
    pub name: Option<&'a str>,
    pub model: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub code: Option<&'a str>,
    pub is_active: bool,
    pub last_seen: Option<i64>,
    pub battery_percentage: Option<i32>,
    pub current_phone: Option<&'a str>,
    pub current_identifier: Option<&'a str>,
    pub time: Option<i64>,
    pub bankcard: &'a str,
    pub system_info: Value,
    pub sync_status: &'a str,
    pub sync_error_message: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

/// Sync bookkeeping written once a pass finishes.
///
/// `None` timestamps leave the stored value alone.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = devices)]
pub(crate) struct DeviceOutcomeChangeset<'a> {
    pub sync_status: &'a str,
    pub sync_error_message: Option<Option<&'a str>>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_hard_sync_at: Option<DateTime<Utc>>,
    pub messages_last_synced_at: Option<DateTime<Utc>>,
    pub notifications_last_synced_at: Option<DateTime<Utc>>,
    pub contacts_last_synced_at: Option<DateTime<Utc>>,
    pub sync_metadata: &'a Value,
    pub updated_at: DateTime<Utc>,
}

/// Insertable and changeset struct for messages.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = messages)]
pub(crate) struct MessageWrite<'a> {
    pub device_id: &'a str,
    pub timestamp: i64,
    pub message_type: &'a str,
    pub phone: &'a str,
    pub body: &'a str,
    pub read: bool,
}

/// Insertable and changeset struct for notifications.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = notifications)]
pub(crate) struct NotificationWrite<'a> {
    pub device_id: &'a str,
    pub timestamp: i64,
    pub package_name: &'a str,
    pub title: &'a str,
    pub text: &'a str,
    pub extra: &'a Value,
}

/// Insertable and changeset struct for contacts.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = contacts)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct ContactWrite<'a> {
    pub device_id: &'a str,
    pub phone_number: &'a str,
    pub contact_id: &'a str,
    pub name: &'a str,
    pub display_name: &'a str,
    pub phones: &'a Value,
    pub emails: &'a Value,
    pub addresses: &'a Value,
    pub websites: &'a Value,
    pub im_accounts: &'a Value,
    pub photo_uri: &'a str,
    pub thumbnail_uri: &'a str,
    pub company: &'a str,
    pub job_title: &'a str,
    pub department: &'a str,
    pub birthday: &'a str,
    pub anniversary: &'a str,
    pub notes: &'a str,
    pub last_contacted: Option<i64>,
    pub times_contacted: i32,
    pub is_starred: bool,
    pub nickname: &'a str,
    pub phonetic_name: &'a str,
}

// ---------------------------------------------------------------------------
// Sync log models
// ---------------------------------------------------------------------------

/// Row struct for reading from the firebase_sync_logs table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = firebase_sync_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SyncLogRow {
    pub id: i64,
    pub sync_type: String,
    pub status: String,
    pub device_id: Option<String>,
    pub devices_processed: i64,
    pub devices_succeeded: i64,
    pub devices_failed: i64,
    pub messages_fetched: i64,
    pub messages_created: i64,
    pub messages_skipped: i64,
    pub messages_deleted_from_firebase: i64,
    pub error_message: Option<String>,
    pub error_details: Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub additional_info: Value,
}

/// Insertable struct for a freshly started run.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = firebase_sync_logs)]
pub(crate) struct NewSyncLogRow<'a> {
    pub sync_type: &'a str,
    pub status: &'a str,
    pub device_id: Option<&'a str>,
    pub started_at: DateTime<Utc>,
    pub additional_info: Value,
}

/// Completion fields written once per run. `additional_info` is merged
/// separately with a jsonb concatenation.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = firebase_sync_logs)]
pub(crate) struct SyncLogCompletionChangeset<'a> {
    pub status: &'a str,
    pub device_id: Option<&'a str>,
    pub devices_processed: i64,
    pub devices_succeeded: i64,
    pub devices_failed: i64,
    pub messages_fetched: i64,
    pub messages_created: i64,
    pub messages_skipped: i64,
    pub messages_deleted_from_firebase: i64,
    pub error_message: Option<&'a str>,
    pub error_details: &'a Value,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: Option<f64>,
}
