//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the sync endpoints, the health probes, and the
//! domain types their envelopes carry. The document backs Swagger UI in
//! debug builds and is exported via `cargo run --bin openapi-dump`.

use utoipa::OpenApi;

use crate::domain::ports::DeviceSyncStatusView;
use crate::domain::{
    DeviceSyncResult, Error, ErrorCode, KindCounts, SyncLogEntry, SyncLogStatus, SyncStatus,
    SyncType,
};
use crate::inbound::http::envelope::FailureEnvelope;
use crate::inbound::http::sync::{HardSyncResponse, UpdateStatusBody};

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "FastPay sync API",
        description = "Device sync status, Firebase hard-sync triggers, audit log lookups and health probes."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::sync::get_sync_status,
        crate::inbound::http::sync::update_sync_status,
        crate::inbound::http::sync::hard_sync_device,
        crate::inbound::http::sync::get_sync_log,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        FailureEnvelope,
        DeviceSyncStatusView,
        UpdateStatusBody,
        HardSyncResponse,
        DeviceSyncResult,
        KindCounts,
        SyncStatus,
        SyncLogEntry,
        SyncLogStatus,
        SyncType,
    )),
    tags(
        (name = "sync", description = "Firebase reconciliation and device sync status"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    //! Tests verifying OpenAPI path and schema registration.

    use super::*;
    use rstest::rstest;
    use utoipa::openapi::RefOr;
    use utoipa::openapi::schema::Schema;

    fn assert_object_schema_has_field(schema: &RefOr<Schema>, field: &str) {
        match schema {
            RefOr::T(Schema::Object(obj)) => {
                assert!(
                    obj.properties.contains_key(field),
                    "schema should have field '{field}'"
                );
            }
            _ => panic!("expected Object schema"),
        }
    }

    #[rstest]
    #[case("/api/v1/sync/status")]
    #[case("/api/v1/sync/devices/{device_id}/hard-sync")]
    #[case("/api/v1/sync/logs/{id}")]
    #[case("/health/ready")]
    #[case("/health/live")]
    fn paths_are_registered(#[case] path: &str) {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key(path), "missing path {path}");
    }

    #[rstest]
    fn status_view_schema_lists_timestamps() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let view = schemas
            .get("DeviceSyncStatusView")
            .expect("DeviceSyncStatusView schema");

        assert_object_schema_has_field(view, "sync_status");
        assert_object_schema_has_field(view, "last_hard_sync_at");
        assert_object_schema_has_field(view, "contacts_last_synced_at");
    }

    #[rstest]
    fn error_schema_has_code_and_message() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let error = schemas.get("Error").expect("Error schema");

        assert_object_schema_has_field(error, "code");
        assert_object_schema_has_field(error, "message");
    }
}
