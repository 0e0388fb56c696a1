//! Device identity, profile and sync bookkeeping.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::firebase_entry::{integer_field, normalize_flag, text_field};

/// Default bank card label for devices that never reported one.
pub const DEFAULT_BANKCARD: &str = "BANKCARD";

/// Characters the Firebase Realtime Database forbids in keys.
const FORBIDDEN_KEY_CHARS: [char; 6] = ['.', '$', '#', '[', ']', '/'];

/// Validation failures for [`DeviceId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceIdError {
    /// The identifier was empty once trimmed.
    #[error("device id must not be empty")]
    Empty,
    /// The identifier contains a character that cannot appear in a tree key.
    #[error("device id must not contain '{0}'")]
    ForbiddenCharacter(char),
}

/// External device identifier, usable both as a SQL key and a tree key.
///
/// # Examples
/// ```
/// use fastpay_backend::domain::DeviceId;
///
/// let id = DeviceId::new(" d1 ").expect("valid id");
/// assert_eq!(id.as_str(), "d1");
/// assert!(DeviceId::new("a/b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "d1")]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and wrap an identifier.
    ///
    /// # Errors
    /// Returns [`DeviceIdError`] when the identifier is blank or contains a
    /// forbidden tree-key character.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, DeviceIdError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DeviceIdError::Empty);
        }
        if let Some(ch) = trimmed.chars().find(|ch| FORBIDDEN_KEY_CHARS.contains(ch)) {
            return Err(DeviceIdError::ForbiddenCharacter(ch));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Wrap a key read back from the tree store or the local table as is.
    ///
    /// Surrounding whitespace is part of a stored key, so it is kept; only
    /// empty keys and forbidden characters are rejected.
    ///
    /// # Errors
    /// Returns [`DeviceIdError`] when the key is empty or contains a
    /// forbidden tree-key character.
    ///
    /// # Examples
    /// ```
    /// use fastpay_backend::domain::DeviceId;
    ///
    /// let id = DeviceId::from_tree_key("d1 ").expect("valid key");
    /// assert_eq!(id.as_str(), "d1 ");
    /// ```
    pub fn from_tree_key(raw: impl Into<String>) -> Result<Self, DeviceIdError> {
        let key = raw.into();
        if key.is_empty() {
            return Err(DeviceIdError::Empty);
        }
        if let Some(ch) = key.chars().find(|ch| FORBIDDEN_KEY_CHARS.contains(ch)) {
            return Err(DeviceIdError::ForbiddenCharacter(ch));
        }
        Ok(Self(key))
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = DeviceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

/// Outcome of the most recent reconciliation for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The device has never been reconciled.
    NeverSynced,
    /// A reconciliation is in progress.
    Syncing,
    /// The last reconciliation finished without errors.
    Synced,
    /// The last reconciliation recorded at least one error.
    SyncFailed,
    /// Local data is known to lag the external store.
    OutOfSync,
}

impl SyncStatus {
    /// Stable storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NeverSynced => "never_synced",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::SyncFailed => "sync_failed",
            Self::OutOfSync => "out_of_sync",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognised sync status text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sync status '{0}'")]
pub struct UnknownSyncStatus(pub String);

impl FromStr for SyncStatus {
    type Err = UnknownSyncStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never_synced" => Ok(Self::NeverSynced),
            "syncing" => Ok(Self::Syncing),
            "synced" => Ok(Self::Synced),
            "sync_failed" => Ok(Self::SyncFailed),
            "out_of_sync" => Ok(Self::OutOfSync),
            other => Err(UnknownSyncStatus(other.to_owned())),
        }
    }
}

/// Device profile as reported by the external store.
///
/// `None` means the store did not report the field; on update the stored
/// value is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceProfile {
    pub name: Option<String>,
    pub model: Option<String>,
    pub phone: Option<String>,
    pub code: Option<String>,
    pub is_active: bool,
    pub last_seen: Option<i64>,
    pub battery_percentage: Option<i32>,
    pub current_phone: Option<String>,
    pub current_identifier: Option<String>,
    pub time: Option<i64>,
    pub bankcard: Option<String>,
    pub system_info: Option<Map<String, Value>>,
}

impl DeviceProfile {
    /// Map a fetched device-info object onto a profile.
    ///
    /// # Examples
    /// ```
    /// use fastpay_backend::domain::DeviceProfile;
    /// use serde_json::json;
    ///
    /// let info = json!({ "deviceName": "Pixel", "isActive": "Opened", "time": 1700 });
    /// let profile = DeviceProfile::from_device_info(info.as_object().expect("object"));
    /// assert_eq!(profile.name.as_deref(), Some("Pixel"));
    /// assert!(profile.is_active);
    /// assert_eq!(profile.last_seen, Some(1700));
    /// ```
    #[must_use]
    pub fn from_device_info(info: &Map<String, Value>) -> Self {
        let phone = text_field(info, &["phone"]);
        let time = integer_field(info, &["time"]);
        Self {
            name: text_field(info, &["name", "deviceName"]),
            model: text_field(info, &["model"]),
            code: text_field(info, &["code"]),
            is_active: info.get("isActive").is_some_and(normalize_flag),
            last_seen: time.or_else(|| integer_field(info, &["lastSeen"])),
            battery_percentage: integer_field(info, &["batteryPercentage"])
                .and_then(|value| i32::try_from(value).ok()),
            current_phone: text_field(info, &["currentPhone"]).or_else(|| phone.clone()),
            current_identifier: text_field(info, &["currentIdentifier"]),
            time,
            bankcard: text_field(info, &["bankcard"]),
            system_info: info
                .get("systemInfo")
                .and_then(Value::as_object)
                .filter(|map| !map.is_empty())
                .cloned(),
            phone,
        }
    }
}

/// Sync bookkeeping stored on each device row.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSyncState {
    pub status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_hard_sync_at: Option<DateTime<Utc>>,
    pub messages_last_synced_at: Option<DateTime<Utc>>,
    pub notifications_last_synced_at: Option<DateTime<Utc>>,
    pub contacts_last_synced_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub metadata: Value,
}

impl Default for DeviceSyncState {
    fn default() -> Self {
        Self {
            status: SyncStatus::NeverSynced,
            last_sync_at: None,
            last_hard_sync_at: None,
            messages_last_synced_at: None,
            notifications_last_synced_at: None,
            contacts_last_synced_at: None,
            error_message: None,
            metadata: Value::Object(Map::new()),
        }
    }
}

/// Locally persisted device.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub device_id: DeviceId,
    pub name: Option<String>,
    pub model: Option<String>,
    pub phone: Option<String>,
    pub code: Option<String>,
    pub is_active: bool,
    pub last_seen: Option<i64>,
    pub battery_percentage: Option<i32>,
    pub current_phone: Option<String>,
    pub current_identifier: Option<String>,
    pub time: Option<i64>,
    pub bankcard: String,
    pub system_info: Map<String, Value>,
    pub sync: DeviceSyncState,
}

impl Device {
    /// Build a new device from its first fetched profile, already marked
    /// [`SyncStatus::Syncing`].
    #[must_use]
    pub fn from_profile(device_id: DeviceId, profile: &DeviceProfile) -> Self {
        Self {
            device_id,
            name: profile.name.clone(),
            model: profile.model.clone(),
            phone: profile.phone.clone(),
            code: profile.code.clone(),
            is_active: profile.is_active,
            last_seen: profile.last_seen,
            battery_percentage: profile.battery_percentage,
            current_phone: profile.current_phone.clone(),
            current_identifier: profile.current_identifier.clone(),
            time: profile.time,
            bankcard: profile
                .bankcard
                .clone()
                .unwrap_or_else(|| DEFAULT_BANKCARD.to_owned()),
            system_info: profile.system_info.clone().unwrap_or_default(),
            sync: DeviceSyncState {
                status: SyncStatus::Syncing,
                ..DeviceSyncState::default()
            },
        }
    }

    /// Overlay a fetched profile onto the stored device.
    ///
    /// Reported fields replace stored ones, unreported fields are kept, the
    /// active flag always follows the store and `system_info` is merged key
    /// by key.
    ///
    /// # Examples
    /// ```
    /// use fastpay_backend::domain::{Device, DeviceId, DeviceProfile};
    /// use serde_json::json;
    ///
    /// let id = DeviceId::new("d1").expect("valid id");
    /// let first = json!({ "name": "A", "model": "M", "systemInfo": { "os": "14" } });
    /// let mut device = Device::from_profile(
    ///     id,
    ///     &DeviceProfile::from_device_info(first.as_object().expect("object")),
    /// );
    /// let second = json!({ "name": "B", "systemInfo": { "sdk": 34 } });
    /// device.apply_profile(&DeviceProfile::from_device_info(second.as_object().expect("object")));
    /// assert_eq!(device.name.as_deref(), Some("B"));
    /// assert_eq!(device.model.as_deref(), Some("M"));
    /// assert_eq!(device.system_info.len(), 2);
    /// ```
    pub fn apply_profile(&mut self, profile: &DeviceProfile) {
        overlay(&mut self.name, profile.name.as_ref());
        overlay(&mut self.model, profile.model.as_ref());
        overlay(&mut self.phone, profile.phone.as_ref());
        overlay(&mut self.code, profile.code.as_ref());
        self.is_active = profile.is_active;
        self.last_seen = profile.last_seen.or(self.last_seen);
        self.battery_percentage = profile.battery_percentage.or(self.battery_percentage);
        overlay(&mut self.current_phone, profile.current_phone.as_ref());
        overlay(&mut self.current_identifier, profile.current_identifier.as_ref());
        self.time = profile.time.or(self.time);
        if let Some(bankcard) = &profile.bankcard {
            self.bankcard.clone_from(bankcard);
        }
        if let Some(system_info) = &profile.system_info {
            for (key, value) in system_info {
                self.system_info.insert(key.clone(), value.clone());
            }
        }
    }

    /// Reset the sync bookkeeping for a pass that is about to start.
    pub fn mark_syncing(&mut self) {
        self.sync.status = SyncStatus::Syncing;
        self.sync.error_message = None;
    }
}

fn overlay(slot: &mut Option<String>, reported: Option<&String>) {
    if let Some(value) = reported {
        *slot = Some(value.clone());
    }
}
