//! Diesel adapters for messages, notifications and contacts.
//!
//! All three are keyed by a natural `(device, key)` pair. Insert-only writes
//! are a single `ON CONFLICT DO NOTHING`; overwrites try the insert first and
//! fall back to an update inside the same transaction, which tells created
//! rows apart from updated ones.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{
    ContactRepository, MessageRepository, NotificationRepository, RecordRepositoryError,
    UpsertMode, UpsertOutcome,
};
use crate::domain::{ContactRecord, DeviceId, MessageRecord, NotificationRecord};

use super::diesel_helpers;
use super::models::{ContactWrite, MessageWrite, NotificationWrite};
use super::pool::{DbPool, PoolError};
use super::schema::{contacts, messages, notifications};

fn map_pool_error(error: PoolError) -> RecordRepositoryError {
    diesel_helpers::map_pool_error(error, RecordRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> RecordRepositoryError {
    diesel_helpers::map_diesel_error(
        error,
        RecordRepositoryError::query,
        RecordRepositoryError::connection,
    )
}

/// Insert-only outcome from the number of rows the insert touched.
fn insert_outcome(rows_affected: usize) -> UpsertOutcome {
    if rows_affected == 0 {
        UpsertOutcome::Skipped
    } else {
        UpsertOutcome::Created
    }
}

/// Overwrite outcome: a skipped insert was followed by an update.
fn overwrite_outcome(inserted: usize) -> UpsertOutcome {
    if inserted == 0 {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Created
    }
}

/// Expands to an upsert body for one natural-key table.
///
/// `$row` is the write struct, `$table` the schema module and `$key` the
/// filter that selects the existing row on conflict.
macro_rules! upsert_by_natural_key {
    ($conn:expr, $mode:expr, $row:expr, $table:ident, ($($conflict:expr),+), $key:expr) => {{
        let conn: &mut AsyncPgConnection = $conn;
        let row = $row;
        match $mode {
            UpsertMode::InsertOnly => diesel::insert_into($table::table)
                .values(&row)
                .on_conflict(($($conflict),+))
                .do_nothing()
                .execute(conn)
                .await
                .map(insert_outcome),
            UpsertMode::Overwrite => {
                conn.transaction(|conn| {
                    async move {
                        let inserted = diesel::insert_into($table::table)
                            .values(&row)
                            .on_conflict(($($conflict),+))
                            .do_nothing()
                            .execute(conn)
                            .await?;
                        if inserted == 0 {
                            diesel::update($table::table.filter($key))
                                .set((&row, $table::updated_at.eq(diesel::dsl::now)))
                                .execute(conn)
                                .await?;
                        }
                        Ok(overwrite_outcome(inserted))
                    }
                    .scope_boxed()
                })
                .await
            }
        }
        .map_err(map_diesel_error)
    }};
}

/// Diesel-backed implementation of the `MessageRepository` port.
#[derive(Clone)]
pub struct DieselMessageRepository {
    pool: DbPool,
}

impl DieselMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for DieselMessageRepository {
    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &MessageRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = MessageWrite {
            device_id: device_id.as_str(),
            timestamp: record.timestamp,
            message_type: record.direction.as_str(),
            phone: &record.phone,
            body: &record.body,
            read: record.read,
        };
        upsert_by_natural_key!(
            &mut conn,
            mode,
            row,
            messages,
            (messages::device_id, messages::timestamp),
            messages::device_id
                .eq(device_id.as_str())
                .and(messages::timestamp.eq(record.timestamp))
        )
    }
}

/// Diesel-backed implementation of the `NotificationRepository` port.
#[derive(Clone)]
pub struct DieselNotificationRepository {
    pool: DbPool,
}

impl DieselNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for DieselNotificationRepository {
    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &NotificationRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NotificationWrite {
            device_id: device_id.as_str(),
            timestamp: record.timestamp,
            package_name: &record.package_name,
            title: &record.title,
            text: &record.text,
            extra: &record.extra,
        };
        upsert_by_natural_key!(
            &mut conn,
            mode,
            row,
            notifications,
            (notifications::device_id, notifications::timestamp),
            notifications::device_id
                .eq(device_id.as_str())
                .and(notifications::timestamp.eq(record.timestamp))
        )
    }
}

/// Diesel-backed implementation of the `ContactRepository` port.
#[derive(Clone)]
pub struct DieselContactRepository {
    pool: DbPool,
}

impl DieselContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn contact_write<'a>(device_id: &'a DeviceId, record: &'a ContactRecord) -> ContactWrite<'a> {
    ContactWrite {
        device_id: device_id.as_str(),
        phone_number: &record.phone_number,
        contact_id: &record.contact_id,
        name: &record.name,
        display_name: &record.display_name,
        phones: &record.phones,
        emails: &record.emails,
        addresses: &record.addresses,
        websites: &record.websites,
        im_accounts: &record.im_accounts,
        photo_uri: &record.photo_uri,
        thumbnail_uri: &record.thumbnail_uri,
        company: &record.company,
        job_title: &record.job_title,
        department: &record.department,
        birthday: &record.birthday,
        anniversary: &record.anniversary,
        notes: &record.notes,
        last_contacted: record.last_contacted,
        times_contacted: record.times_contacted,
        is_starred: record.is_starred,
        nickname: &record.nickname,
        phonetic_name: &record.phonetic_name,
    }
}

#[async_trait]
impl ContactRepository for DieselContactRepository {
    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &ContactRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        upsert_by_natural_key!(
            &mut conn,
            mode,
            contact_write(device_id, record),
            contacts,
            (contacts::device_id, contacts::phone_number),
            contacts::device_id
                .eq(device_id.as_str())
                .and(contacts::phone_number.eq(&record.phone_number))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, UpsertOutcome::Skipped)]
    #[case(1, UpsertOutcome::Created)]
    fn insert_only_counts_rows(#[case] rows: usize, #[case] expected: UpsertOutcome) {
        assert_eq!(insert_outcome(rows), expected);
    }

    #[rstest]
    #[case(0, UpsertOutcome::Updated)]
    #[case(1, UpsertOutcome::Created)]
    fn overwrite_distinguishes_new_rows(#[case] inserted: usize, #[case] expected: UpsertOutcome) {
        assert_eq!(overwrite_outcome(inserted), expected);
    }

    #[rstest]
    fn pool_errors_are_connection_errors() {
        assert_eq!(
            map_pool_error(PoolError::build("no such host")),
            RecordRepositoryError::connection("no such host")
        );
    }
}
