//! Ports for per-device child records keyed by natural keys.
//!
//! Messages and notifications are unique per `(device, timestamp)`, contacts
//! per `(device, phone_number)`. Each upsert is its own write; callers do not
//! batch them in a transaction.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{ContactRecord, DeviceId, MessageRecord, NotificationRecord};

define_port_error! {
    /// Errors raised by record repository adapters.
    pub enum RecordRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "record repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "record repository query failed: {message}",
    }
}

/// How an upsert treats an existing row with the same natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Leave existing rows untouched.
    InsertOnly,
    /// Replace every mutable field of an existing row.
    Overwrite,
}

impl UpsertMode {
    /// Mode matching an `update_existing` flag.
    #[must_use]
    pub const fn from_update_existing(update_existing: bool) -> Self {
        if update_existing {
            Self::Overwrite
        } else {
            Self::InsertOnly
        }
    }
}

/// Result of one upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped,
}

/// Message persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Upsert by `(device, timestamp)`.
    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &MessageRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError>;
}

/// Notification persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Upsert by `(device, timestamp)`.
    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &NotificationRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError>;
}

/// Contact persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Upsert by `(device, phone_number)`.
    async fn upsert(
        &self,
        device_id: &DeviceId,
        record: &ContactRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, RecordRepositoryError>;
}
