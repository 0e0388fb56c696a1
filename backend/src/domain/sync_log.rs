//! Append-only audit records for orchestrated sync runs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::DeviceId;

/// Kind of run recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    HardSyncSingleDevice,
    HardSyncAllDevices,
    SingleDevice,
    AllDevices,
    Messages,
}

/// Lifecycle state of a logged run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Partial,
}

/// Error for unrecognised enum text read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownSyncLogValue {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! storage_text {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Storage representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownSyncLogValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownSyncLogValue {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

storage_text!(SyncType, "sync type", {
    HardSyncSingleDevice => "hard_sync_single_device",
    HardSyncAllDevices => "hard_sync_all_devices",
    SingleDevice => "single_device",
    AllDevices => "all_devices",
    Messages => "messages",
});

storage_text!(SyncLogStatus, "sync log status", {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Partial => "partial",
});

impl SyncLogStatus {
    /// Status for a single-device run.
    #[must_use]
    pub const fn for_device(succeeded: bool) -> Self {
        if succeeded {
            Self::Completed
        } else {
            Self::Failed
        }
    }

    /// Status for a fleet run from its success and failure counts.
    ///
    /// # Examples
    /// ```
    /// use fastpay_backend::domain::SyncLogStatus;
    ///
    /// assert_eq!(SyncLogStatus::for_fleet(3, 0), SyncLogStatus::Completed);
    /// assert_eq!(SyncLogStatus::for_fleet(2, 1), SyncLogStatus::Partial);
    /// assert_eq!(SyncLogStatus::for_fleet(0, 1), SyncLogStatus::Failed);
    /// ```
    #[must_use]
    pub const fn for_fleet(succeeded: u64, failed: u64) -> Self {
        if failed == 0 {
            Self::Completed
        } else if succeeded > 0 {
            Self::Partial
        } else {
            Self::Failed
        }
    }
}

/// Surrogate key of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SyncLogId(pub i64);

impl fmt::Display for SyncLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry written when a run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncLog {
    pub sync_type: SyncType,
    pub device_id: Option<DeviceId>,
    pub started_at: DateTime<Utc>,
    pub additional_info: Map<String, Value>,
}

/// Counters recorded on completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncLogCounts {
    pub devices_processed: u64,
    pub devices_succeeded: u64,
    pub devices_failed: u64,
    pub messages_fetched: u64,
    pub messages_created: u64,
    pub messages_skipped: u64,
    pub messages_deleted_from_firebase: u64,
}

/// Fields written once when a run completes.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncLogCompletion {
    pub status: SyncLogStatus,
    pub device_id: Option<DeviceId>,
    pub counts: SyncLogCounts,
    pub error_message: Option<String>,
    pub error_details: Value,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: Option<f64>,
    /// Keys merged into the `additional_info` written at start.
    pub additional_info: Map<String, Value>,
}

impl SyncLogCompletion {
    /// Completion with no counters, details or extra info.
    #[must_use]
    pub fn bare(status: SyncLogStatus, completed_at: DateTime<Utc>) -> Self {
        Self {
            status,
            device_id: None,
            counts: SyncLogCounts::default(),
            error_message: None,
            error_details: Value::Object(Map::new()),
            completed_at,
            duration_seconds: None,
            additional_info: Map::new(),
        }
    }
}

/// Stored audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SyncLogEntry {
    pub id: SyncLogId,
    pub sync_type: SyncType,
    pub status: SyncLogStatus,
    #[schema(value_type = Option<String>)]
    pub device_id: Option<DeviceId>,
    #[serde(flatten)]
    pub counts: SyncLogCounts,
    pub error_message: Option<String>,
    #[schema(value_type = Object)]
    pub error_details: Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    #[schema(value_type = Object)]
    pub additional_info: Map<String, Value>,
}

impl SyncLogEntry {
    /// Entry as it looks right after [`NewSyncLog`] is stored.
    #[must_use]
    pub fn started(id: SyncLogId, new: &NewSyncLog) -> Self {
        Self {
            id,
            sync_type: new.sync_type,
            status: SyncLogStatus::Running,
            device_id: new.device_id.clone(),
            counts: SyncLogCounts::default(),
            error_message: None,
            error_details: Value::Object(Map::new()),
            started_at: new.started_at,
            completed_at: None,
            duration_seconds: None,
            additional_info: new.additional_info.clone(),
        }
    }

    /// Apply a completion in place.
    pub fn complete(&mut self, completion: &SyncLogCompletion) {
        self.status = completion.status;
        if completion.device_id.is_some() {
            self.device_id.clone_from(&completion.device_id);
        }
        self.counts = completion.counts;
        self.error_message.clone_from(&completion.error_message);
        self.error_details = completion.error_details.clone();
        self.completed_at = Some(completion.completed_at);
        self.duration_seconds = completion.duration_seconds;
        for (key, value) in &completion.additional_info {
            self.additional_info.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(SyncType::HardSyncSingleDevice)]
    #[case(SyncType::HardSyncAllDevices)]
    #[case(SyncType::SingleDevice)]
    #[case(SyncType::AllDevices)]
    #[case(SyncType::Messages)]
    fn sync_type_text_parses_back(#[case] sync_type: SyncType) {
        assert_eq!(sync_type.as_str().parse::<SyncType>(), Ok(sync_type));
    }

    #[rstest]
    fn unknown_status_names_the_kind() {
        let err = "done".parse::<SyncLogStatus>().expect_err("unknown status");
        assert_eq!(err.to_string(), "unknown sync log status 'done'");
    }

    #[rstest]
    fn completion_merges_additional_info() {
        let started_at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("valid");
        let mut info = Map::new();
        info.insert("dry_run".to_owned(), json!(false));
        let mut entry = SyncLogEntry::started(
            SyncLogId(1),
            &NewSyncLog {
                sync_type: SyncType::Messages,
                device_id: None,
                started_at,
                additional_info: info,
            },
        );

        let mut completion = SyncLogCompletion::bare(SyncLogStatus::Completed, started_at);
        completion
            .additional_info
            .insert("device_created".to_owned(), json!(true));
        entry.complete(&completion);

        assert_eq!(entry.status, SyncLogStatus::Completed);
        assert_eq!(entry.additional_info.len(), 2);
        assert_eq!(entry.completed_at, Some(started_at));
    }
}
