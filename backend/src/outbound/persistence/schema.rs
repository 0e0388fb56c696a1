//! Diesel table definitions for the sync tables.
//!
//! Must match `backend/migrations` exactly; `diesel print-schema` against a
//! migrated database regenerates them.

diesel::table! {
    /// One row per Android device, keyed by its tree-store identifier.
    devices (device_id) {
        device_id -> Varchar,
        name -> Nullable<Varchar>,
        model -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        code -> Nullable<Varchar>,
        is_active -> Bool,
        last_seen -> Nullable<Int8>,
        battery_percentage -> Nullable<Int4>,
        current_phone -> Nullable<Varchar>,
        current_identifier -> Nullable<Varchar>,
        time -> Nullable<Int8>,
        bankcard -> Varchar,
        system_info -> Jsonb,
        sync_status -> Varchar,
        last_sync_at -> Nullable<Timestamptz>,
        last_hard_sync_at -> Nullable<Timestamptz>,
        messages_last_synced_at -> Nullable<Timestamptz>,
        notifications_last_synced_at -> Nullable<Timestamptz>,
        contacts_last_synced_at -> Nullable<Timestamptz>,
        sync_error_message -> Nullable<Text>,
        sync_metadata -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// SMS messages, unique per `(device_id, timestamp)`.
    messages (id) {
        id -> Int8,
        device_id -> Varchar,
        timestamp -> Int8,
        message_type -> Varchar,
        phone -> Varchar,
        body -> Text,
        read -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// App notifications, unique per `(device_id, timestamp)`.
    notifications (id) {
        id -> Int8,
        device_id -> Varchar,
        timestamp -> Int8,
        package_name -> Varchar,
        title -> Text,
        text -> Text,
        extra -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Address-book entries, unique per `(device_id, phone_number)`.
    contacts (id) {
        id -> Int8,
        device_id -> Varchar,
        phone_number -> Varchar,
        contact_id -> Varchar,
        name -> Varchar,
        display_name -> Varchar,
        phones -> Jsonb,
        emails -> Jsonb,
        addresses -> Jsonb,
        websites -> Jsonb,
        im_accounts -> Jsonb,
        photo_uri -> Text,
        thumbnail_uri -> Text,
        company -> Varchar,
        job_title -> Varchar,
        department -> Varchar,
        birthday -> Varchar,
        anniversary -> Varchar,
        notes -> Text,
        last_contacted -> Nullable<Int8>,
        times_contacted -> Int4,
        is_starred -> Bool,
        nickname -> Varchar,
        phonetic_name -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Audit trail of sync runs.
    firebase_sync_logs (id) {
        id -> Int8,
        sync_type -> Varchar,
        status -> Varchar,
        device_id -> Nullable<Varchar>,
        devices_processed -> Int8,
        devices_succeeded -> Int8,
        devices_failed -> Int8,
        messages_fetched -> Int8,
        messages_created -> Int8,
        messages_skipped -> Int8,
        messages_deleted_from_firebase -> Int8,
        error_message -> Nullable<Text>,
        error_details -> Jsonb,
        started_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
        duration_seconds -> Nullable<Float8>,
        additional_info -> Jsonb,
    }
}

diesel::joinable!(messages -> devices (device_id));
diesel::joinable!(notifications -> devices (device_id));
diesel::joinable!(contacts -> devices (device_id));

diesel::allow_tables_to_appear_in_same_query!(
    devices,
    messages,
    notifications,
    contacts,
    firebase_sync_logs,
);
