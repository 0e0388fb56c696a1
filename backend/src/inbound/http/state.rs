//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and only see driving ports, so
//! they stay testable without a database or tree store.

use std::sync::Arc;

use crate::domain::ports::{DeviceSyncStatusPort, SyncRunPort};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub sync_status: Arc<dyn DeviceSyncStatusPort>,
    pub sync_runs: Arc<dyn SyncRunPort>,
}

impl HttpState {
    pub fn new(sync_status: Arc<dyn DeviceSyncStatusPort>, sync_runs: Arc<dyn SyncRunPort>) -> Self {
        Self {
            sync_status,
            sync_runs,
        }
    }
}
