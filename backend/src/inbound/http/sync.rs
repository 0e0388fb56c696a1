//! Sync status and sync trigger HTTP handlers.
//!
//! ```text
//! GET  /api/v1/sync/status?device_id=
//! POST /api/v1/sync/status
//! POST /api/v1/sync/devices/{device_id}/hard-sync?update_existing=
//! GET  /api/v1/sync/logs/{id}
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{DeviceSyncStatusView, UpdateSyncStatusRequest};
use crate::domain::{
    DeviceId, DeviceSyncResult, Error, RunPayload, SyncLogEntry, SyncLogId, SyncRun, SyncStatus,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelope::{FailureEnvelope, SuccessEnvelope};
use crate::inbound::http::state::HttpState;

/// Query string for the status read.
#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusQuery {
    /// Device to report on.
    pub device_id: Option<String>,
}

/// Body of a manual status override.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateStatusBody {
    #[schema(example = "d1")]
    pub device_id: Option<String>,
    #[schema(example = "out_of_sync")]
    pub sync_status: Option<String>,
    pub sync_error_message: Option<String>,
}

/// Query string for the hard-sync trigger.
#[derive(Debug, Deserialize, IntoParams)]
pub struct HardSyncQuery {
    /// Overwrite rows that already exist. Defaults to `true`.
    pub update_existing: Option<bool>,
}

/// Outcome of a triggered hard sync.
#[derive(Debug, Serialize, ToSchema)]
pub struct HardSyncResponse {
    /// Audit log entry, absent when the log could not be written.
    #[schema(value_type = Option<i64>)]
    pub log_id: Option<SyncLogId>,
    pub duration_seconds: f64,
    pub result: DeviceSyncResult,
}

impl TryFrom<SyncRun<DeviceSyncResult>> for HardSyncResponse {
    type Error = Error;

    fn try_from(run: SyncRun<DeviceSyncResult>) -> Result<Self, Self::Error> {
        match run.payload {
            RunPayload::Completed { result } => Ok(Self {
                log_id: run.log_id,
                duration_seconds: run.duration_seconds,
                result,
            }),
            RunPayload::DryRun { .. } => Err(Error::internal("hard sync ran as a dry run")),
        }
    }
}

fn missing_field_error(field: &str) -> Error {
    Error::invalid_request(format!("{field} is required")).with_details(json!({
        "field": field,
        "code": "missing_field",
    }))
}

fn parse_device_id(raw: &str) -> Result<DeviceId, Error> {
    DeviceId::new(raw).map_err(|err| {
        Error::invalid_request(format!("invalid device_id: {err}")).with_details(json!({
            "field": "device_id",
            "value": raw,
            "code": "invalid_device_id",
        }))
    })
}

fn parse_sync_status(raw: &str) -> Result<SyncStatus, Error> {
    raw.parse().map_err(|_| {
        Error::invalid_request(format!("unknown sync_status '{raw}'")).with_details(json!({
            "field": "sync_status",
            "value": raw,
            "code": "invalid_sync_status",
        }))
    })
}

fn parse_update(body: UpdateStatusBody) -> Result<UpdateSyncStatusRequest, Error> {
    let device_id = body
        .device_id
        .ok_or_else(|| missing_field_error("device_id"))?;
    let status = body
        .sync_status
        .ok_or_else(|| missing_field_error("sync_status"))?;
    Ok(UpdateSyncStatusRequest {
        device_id: parse_device_id(&device_id)?,
        status: parse_sync_status(&status)?,
        error_message: body.sync_error_message,
    })
}

/// Current sync status of one device.
#[utoipa::path(
    get,
    path = "/api/v1/sync/status",
    params(StatusQuery),
    responses(
        (status = 200, description = "Device sync status", body = SuccessEnvelope<DeviceSyncStatusView>),
        (status = 400, description = "Missing or invalid device_id", body = FailureEnvelope),
        (status = 404, description = "Unknown device", body = FailureEnvelope),
        (status = 503, description = "Store unavailable", body = FailureEnvelope)
    ),
    tags = ["sync"],
    operation_id = "getSyncStatus"
)]
#[get("/sync/status")]
pub async fn get_sync_status(
    state: web::Data<HttpState>,
    query: web::Query<StatusQuery>,
) -> ApiResult<HttpResponse> {
    let raw = query
        .into_inner()
        .device_id
        .ok_or_else(|| missing_field_error("device_id"))?;
    let device_id = parse_device_id(&raw)?;
    let view = state.sync_status.status(&device_id).await?;
    Ok(SuccessEnvelope::new(view).into_response())
}

/// Override a device's sync status.
#[utoipa::path(
    post,
    path = "/api/v1/sync/status",
    request_body = UpdateStatusBody,
    responses(
        (status = 200, description = "Updated sync status", body = SuccessEnvelope<DeviceSyncStatusView>),
        (status = 400, description = "Invalid request", body = FailureEnvelope),
        (status = 404, description = "Unknown device", body = FailureEnvelope)
    ),
    tags = ["sync"],
    operation_id = "updateSyncStatus"
)]
#[post("/sync/status")]
pub async fn update_sync_status(
    state: web::Data<HttpState>,
    payload: web::Json<UpdateStatusBody>,
) -> ApiResult<HttpResponse> {
    let request = parse_update(payload.into_inner())?;
    let view = state.sync_status.update_status(request).await?;
    Ok(SuccessEnvelope::new(view)
        .with_message("Sync status updated")
        .into_response())
}

/// Run an audited hard sync for one device.
///
/// Reconciliation failures are reported inside the result; the response is
/// still `200`.
#[utoipa::path(
    post,
    path = "/api/v1/sync/devices/{device_id}/hard-sync",
    params(
        ("device_id" = String, Path, description = "Device identifier"),
        HardSyncQuery
    ),
    responses(
        (status = 200, description = "Hard sync outcome", body = SuccessEnvelope<HardSyncResponse>),
        (status = 400, description = "Invalid device_id", body = FailureEnvelope)
    ),
    tags = ["sync"],
    operation_id = "hardSyncDevice"
)]
#[post("/sync/devices/{device_id}/hard-sync")]
pub async fn hard_sync_device(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    query: web::Query<HardSyncQuery>,
) -> ApiResult<HttpResponse> {
    let device_id = parse_device_id(&path.into_inner())?;
    let update_existing = query.update_existing.unwrap_or(true);
    info!(device_id = %device_id, update_existing, "hard sync requested over http");
    let run = state
        .sync_runs
        .hard_sync_device(&device_id, update_existing)
        .await;
    Ok(SuccessEnvelope::new(HardSyncResponse::try_from(run)?).into_response())
}

/// Load one sync audit log entry.
#[utoipa::path(
    get,
    path = "/api/v1/sync/logs/{id}",
    params(("id" = i64, Path, description = "Sync log identifier")),
    responses(
        (status = 200, description = "Sync log entry", body = SuccessEnvelope<SyncLogEntry>),
        (status = 404, description = "Unknown log entry", body = FailureEnvelope)
    ),
    tags = ["sync"],
    operation_id = "getSyncLog"
)]
#[get("/sync/logs/{id}")]
pub async fn get_sync_log(
    state: web::Data<HttpState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let id = SyncLogId(path.into_inner());
    let entry = state
        .sync_runs
        .find_log(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("sync log {id} not found")))?;
    Ok(SuccessEnvelope::new(entry).into_response())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
