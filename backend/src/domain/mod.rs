//! Domain primitives, ports and sync services.
//!
//! Purpose: model devices and their child records as pulled from the tree
//! store, and drive reconciliation of those records into local rows. Nothing
//! in this module performs I/O directly; adapters implement the traits in
//! [`ports`].
//!
//! Public surface:
//! - Error / ErrorCode: API error payload and stable identifier.
//! - DeviceId, Device, DeviceProfile, SyncStatus: device identity and state.
//! - MessageRecord, NotificationRecord, ContactRecord: typed child records.
//! - ExternalDataFetcher, RecordReconciler, FirebaseSyncService: the sync
//!   pipeline from tree reads to audited runs.

pub mod device;
pub mod error;
pub mod fetcher;
pub mod firebase_entry;
pub mod ports;
pub mod reconciler;
pub mod records;
pub mod sync_log;
pub mod sync_results;
pub mod sync_service;
pub mod sync_status_service;
pub mod trace_id;

pub use self::device::{
    DEFAULT_BANKCARD, Device, DeviceId, DeviceIdError, DeviceProfile, DeviceSyncState,
    SyncStatus, UnknownSyncStatus,
};
pub use self::error::{Error, ErrorCode};
pub use self::fetcher::{ExternalDataFetcher, FetchOutcome, PruneOutcome, ResourceKind};
pub use self::firebase_entry::FirebaseEntry;
pub use self::reconciler::{RecordReconciler, ReconcilerPorts};
pub use self::records::{
    ContactRecord, MessageDirection, MessageRecord, NotificationRecord, parse_timestamp_key,
};
pub use self::sync_log::{
    NewSyncLog, SyncLogCompletion, SyncLogCounts, SyncLogEntry, SyncLogId, SyncLogStatus,
    SyncType, UnknownSyncLogValue,
};
pub use self::sync_results::{
    DeviceSyncResult, FleetMessageSyncResult, FleetSyncResult, KindCounts, MessageSyncResult,
    ReconcileReport, RunPayload, SyncRun,
};
pub use self::sync_service::{FirebaseSyncPorts, FirebaseSyncService};
pub use self::sync_status_service::SyncStatusService;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use fastpay_backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::not_found("device not found"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
