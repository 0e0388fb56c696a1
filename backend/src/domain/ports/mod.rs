//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod device_repository;
mod firebase_tree_source;
mod record_repository;
mod sync_log_repository;
mod sync_runs;
mod sync_status;

#[cfg(test)]
pub use device_repository::MockDeviceRepository;
pub use device_repository::{
    DeviceProfileWrite, DeviceRepository, DeviceRepositoryError, SyncOutcomeUpdate,
    SyncStatusUpdate,
};
#[cfg(test)]
pub use firebase_tree_source::MockFirebaseTreeSource;
pub use firebase_tree_source::{
    FirebaseTreeSource, FirebaseTreeSourceError, UnavailableFirebaseTreeSource,
};
#[cfg(test)]
pub use record_repository::{
    MockContactRepository, MockMessageRepository, MockNotificationRepository,
};
pub use record_repository::{
    ContactRepository, MessageRepository, NotificationRepository, RecordRepositoryError,
    UpsertMode, UpsertOutcome,
};
#[cfg(test)]
pub use sync_log_repository::MockSyncLogRepository;
pub use sync_log_repository::{SyncLogRepository, SyncLogRepositoryError};
#[cfg(test)]
pub use sync_runs::MockSyncRunPort;
pub use sync_runs::SyncRunPort;
#[cfg(test)]
pub use sync_status::MockDeviceSyncStatusPort;
pub use sync_status::{DeviceSyncStatusPort, DeviceSyncStatusView, UpdateSyncStatusRequest};
