//! PostgreSQL-backed `SyncLogRepository` over `firebase_sync_logs`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::{Map, Value};

use crate::domain::ports::{SyncLogRepository, SyncLogRepositoryError};
use crate::domain::{
    DeviceId, NewSyncLog, SyncLogCompletion, SyncLogCounts, SyncLogEntry, SyncLogId,
    SyncLogStatus,
};

use super::diesel_helpers::{self, count_from_db, count_to_db};
use super::models::{NewSyncLogRow, SyncLogCompletionChangeset, SyncLogRow};
use super::pool::{DbPool, PoolError};
use super::schema::firebase_sync_logs;

/// Diesel-backed implementation of the `SyncLogRepository` port.
#[derive(Clone)]
pub struct DieselSyncLogRepository {
    pool: DbPool,
}

impl DieselSyncLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SyncLogRepositoryError {
    diesel_helpers::map_pool_error(error, SyncLogRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> SyncLogRepositoryError {
    diesel_helpers::map_diesel_error(
        error,
        SyncLogRepositoryError::query,
        SyncLogRepositoryError::connection,
    )
}

fn row_to_entry(row: SyncLogRow) -> Result<SyncLogEntry, SyncLogRepositoryError> {
    let sync_type = row
        .sync_type
        .parse()
        .map_err(|err| SyncLogRepositoryError::query(format!("sync log {}: {err}", row.id)))?;
    let status = row
        .status
        .parse()
        .map_err(|err| SyncLogRepositoryError::query(format!("sync log {}: {err}", row.id)))?;
    let device_id = row
        .device_id
        .map(DeviceId::from_tree_key)
        .transpose()
        .map_err(|err| SyncLogRepositoryError::query(format!("sync log {}: {err}", row.id)))?;

    Ok(SyncLogEntry {
        id: SyncLogId(row.id),
        sync_type,
        status,
        device_id,
        counts: SyncLogCounts {
            devices_processed: count_from_db(row.devices_processed),
            devices_succeeded: count_from_db(row.devices_succeeded),
            devices_failed: count_from_db(row.devices_failed),
            messages_fetched: count_from_db(row.messages_fetched),
            messages_created: count_from_db(row.messages_created),
            messages_skipped: count_from_db(row.messages_skipped),
            messages_deleted_from_firebase: count_from_db(row.messages_deleted_from_firebase),
        },
        error_message: row.error_message,
        error_details: row.error_details,
        started_at: row.started_at,
        completed_at: row.completed_at,
        duration_seconds: row.duration_seconds,
        additional_info: match row.additional_info {
            Value::Object(map) => map,
            _ => Map::new(),
        },
    })
}

fn completion_changeset(completion: &SyncLogCompletion) -> SyncLogCompletionChangeset<'_> {
    let counts = &completion.counts;
    SyncLogCompletionChangeset {
        status: completion.status.as_str(),
        device_id: completion.device_id.as_ref().map(DeviceId::as_str),
        devices_processed: count_to_db(counts.devices_processed),
        devices_succeeded: count_to_db(counts.devices_succeeded),
        devices_failed: count_to_db(counts.devices_failed),
        messages_fetched: count_to_db(counts.messages_fetched),
        messages_created: count_to_db(counts.messages_created),
        messages_skipped: count_to_db(counts.messages_skipped),
        messages_deleted_from_firebase: count_to_db(counts.messages_deleted_from_firebase),
        error_message: completion.error_message.as_deref(),
        error_details: &completion.error_details,
        completed_at: completion.completed_at,
        duration_seconds: completion.duration_seconds,
    }
}

#[async_trait]
impl SyncLogRepository for DieselSyncLogRepository {
    async fn start(&self, entry: &NewSyncLog) -> Result<SyncLogId, SyncLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = NewSyncLogRow {
            sync_type: entry.sync_type.as_str(),
            status: SyncLogStatus::Running.as_str(),
            device_id: entry.device_id.as_ref().map(DeviceId::as_str),
            started_at: entry.started_at,
            additional_info: Value::Object(entry.additional_info.clone()),
        };

        diesel::insert_into(firebase_sync_logs::table)
            .values(&row)
            .returning(firebase_sync_logs::id)
            .get_result(&mut conn)
            .await
            .map(SyncLogId)
            .map_err(map_diesel_error)
    }

    async fn complete(
        &self,
        id: SyncLogId,
        completion: &SyncLogCompletion,
    ) -> Result<(), SyncLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let extra = Value::Object(completion.additional_info.clone());

        let affected = diesel::update(firebase_sync_logs::table.find(id.0))
            .set((
                &completion_changeset(completion),
                firebase_sync_logs::additional_info
                    .eq(firebase_sync_logs::additional_info.concat(extra)),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if affected == 0 {
            return Err(SyncLogRepositoryError::query(format!("no sync log {id}")));
        }
        Ok(())
    }

    async fn find(&self, id: SyncLogId) -> Result<Option<SyncLogEntry>, SyncLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<SyncLogRow> = firebase_sync_logs::table
            .find(id.0)
            .select(SyncLogRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_entry).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SyncType;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use serde_json::json;

    fn row() -> SyncLogRow {
        let started_at = Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        SyncLogRow {
            id: 9,
            sync_type: "hard_sync_single_device".to_owned(),
            status: "partial".to_owned(),
            device_id: Some("d1".to_owned()),
            devices_processed: 1,
            devices_succeeded: 0,
            devices_failed: 1,
            messages_fetched: 4,
            messages_created: 3,
            messages_skipped: 1,
            messages_deleted_from_firebase: 0,
            error_message: Some("boom".to_owned()),
            error_details: json!({ "errors": ["boom"] }),
            started_at,
            completed_at: Some(started_at),
            duration_seconds: Some(0.25),
            additional_info: json!({ "dry_run": false }),
        }
    }

    #[rstest]
    fn row_converts_to_entry() {
        let entry = row_to_entry(row()).expect("valid row");
        assert_eq!(entry.id, SyncLogId(9));
        assert_eq!(entry.sync_type, SyncType::HardSyncSingleDevice);
        assert_eq!(entry.status, SyncLogStatus::Partial);
        assert_eq!(entry.counts.messages_created, 3);
        assert_eq!(entry.additional_info.get("dry_run"), Some(&json!(false)));
    }

    #[rstest]
    fn unknown_sync_type_is_a_query_error() {
        let mut raw = row();
        raw.sync_type = "nightly".to_owned();
        let err = row_to_entry(raw).expect_err("unknown type");
        assert!(matches!(err, SyncLogRepositoryError::Query { .. }));
    }

    #[rstest]
    fn completion_changeset_carries_counts() {
        let completed_at = Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 1)
            .single()
            .expect("valid timestamp");
        let mut completion = SyncLogCompletion::bare(SyncLogStatus::Completed, completed_at);
        completion.counts.messages_fetched = 12;
        let changeset = completion_changeset(&completion);
        assert_eq!(changeset.status, "completed");
        assert_eq!(changeset.messages_fetched, 12);
        assert_eq!(changeset.device_id, None);
    }
}
