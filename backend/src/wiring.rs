//! Composition of concrete adapters into the sync services.
//!
//! Shared by the HTTP server and the sync CLIs so both talk to the same
//! tree source and repositories.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::ports::{FirebaseTreeSource, UnavailableFirebaseTreeSource};
use crate::domain::{FirebaseSyncPorts, FirebaseSyncService, SyncStatusService};
use crate::outbound::firebase::FirebaseRestSource;
use crate::outbound::persistence::{
    DbPool, DieselContactRepository, DieselDeviceRepository, DieselMessageRepository,
    DieselNotificationRepository, DieselSyncLogRepository,
};
use crate::settings::{FleetSyncSettings, SettingsError};

/// Failures while assembling the sync stack.
#[derive(Debug, Error)]
pub enum WiringError {
    /// A setting could not be interpreted.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// The Firebase HTTP client could not be built.
    #[error("failed to build Firebase client: {0}")]
    FirebaseClient(#[from] reqwest::Error),
}

/// Build the tree source described by `settings`.
///
/// Without a configured database URL every fetch reports the store as
/// unavailable, which the fetcher treats as a soft transport failure.
///
/// # Errors
///
/// Returns [`WiringError`] when the URL is malformed or the client fails to
/// build.
pub fn tree_source(
    settings: &FleetSyncSettings,
) -> Result<Arc<dyn FirebaseTreeSource>, WiringError> {
    match settings.firebase_url()? {
        Some(url) => {
            info!(firebase_url = %url, "using Firebase REST source");
            let source = FirebaseRestSource::new(
                url,
                settings.firebase_auth_token.clone(),
                settings.firebase_timeout(),
            )?;
            Ok(Arc::new(source))
        }
        None => {
            warn!("FASTPAY_FIREBASE_DATABASE_URL not set; Firebase reads will soft-fail");
            Ok(Arc::new(UnavailableFirebaseTreeSource::new(
                "Firebase database URL not configured",
            )))
        }
    }
}

/// Diesel-backed ports sharing one pool.
pub fn sync_ports(pool: &DbPool, tree: Arc<dyn FirebaseTreeSource>) -> FirebaseSyncPorts {
    FirebaseSyncPorts {
        tree,
        devices: Arc::new(DieselDeviceRepository::new(pool.clone())),
        messages: Arc::new(DieselMessageRepository::new(pool.clone())),
        notifications: Arc::new(DieselNotificationRepository::new(pool.clone())),
        contacts: Arc::new(DieselContactRepository::new(pool.clone())),
        sync_logs: Arc::new(DieselSyncLogRepository::new(pool.clone())),
    }
}

/// Orchestrator and status service wired to Postgres and `tree`.
pub fn sync_services(
    pool: &DbPool,
    tree: Arc<dyn FirebaseTreeSource>,
) -> (FirebaseSyncService, SyncStatusService) {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let ports = sync_ports(pool, tree);
    let status = SyncStatusService::new(ports.devices.clone(), clock.clone());
    (FirebaseSyncService::new(ports, clock), status)
}
