//! Child records reconciled per device: messages, notifications, contacts.
//!
//! Each record type is built from a classified [`FirebaseEntry`] and its
//! tree key. Builders return `None` for shapes that carry nothing usable;
//! the reconciler counts those as skipped.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::firebase_entry::{
    FirebaseEntry, array_field, flag_field, integer_field, legacy_fields, normalize_flag,
    text_or_empty,
};

/// Direction of an SMS relative to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    #[default]
    Received,
    Sent,
}

impl MessageDirection {
    /// Parse a direction, treating anything unknown as [`Self::Received`].
    #[must_use]
    pub fn lenient(raw: &str) -> Self {
        match raw {
            "sent" => Self::Sent,
            _ => Self::Received,
        }
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Sent => "sent",
        }
    }
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a tree key as an epoch-millisecond timestamp.
///
/// # Errors
/// Returns a description of the offending key when it is not an integer.
pub fn parse_timestamp_key(key: &str) -> Result<i64, String> {
    key.trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid timestamp key '{key}'"))
}

/// SMS message keyed by `(device, timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub timestamp: i64,
    pub direction: MessageDirection,
    pub phone: String,
    pub body: String,
    pub read: bool,
}

impl MessageRecord {
    /// Build a message from its timestamp and entry.
    ///
    /// # Examples
    /// ```
    /// use fastpay_backend::domain::{FirebaseEntry, MessageDirection, MessageRecord};
    /// use serde_json::json;
    ///
    /// let raw = json!("sent~+100~hello");
    /// let message = MessageRecord::from_entry(100, FirebaseEntry::classify(&raw))
    ///     .expect("legacy message");
    /// assert_eq!(message.direction, MessageDirection::Sent);
    /// assert_eq!(message.body, "hello");
    /// ```
    #[must_use]
    pub fn from_entry(timestamp: i64, entry: FirebaseEntry<'_>) -> Option<Self> {
        match entry {
            FirebaseEntry::Structured(map) => Some(Self {
                timestamp,
                direction: map
                    .get("type")
                    .and_then(Value::as_str)
                    .map(MessageDirection::lenient)
                    .unwrap_or_default(),
                phone: text_or_empty(map, &["phone"]),
                body: text_or_empty(map, &["body"]),
                read: map.get("read").is_some_and(normalize_flag),
            }),
            FirebaseEntry::LegacyDelimited(raw) => {
                let [direction, phone, body] = legacy_fields(raw);
                Some(Self {
                    timestamp,
                    direction: MessageDirection::lenient(direction),
                    phone: phone.to_owned(),
                    body: body.to_owned(),
                    read: false,
                })
            }
            FirebaseEntry::Unrecognized => None,
        }
    }
}

/// App notification keyed by `(device, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub timestamp: i64,
    pub package_name: String,
    pub title: String,
    pub text: String,
    pub extra: Value,
}

impl NotificationRecord {
    /// Build a notification; entries without a package name yield `None`.
    #[must_use]
    pub fn from_entry(timestamp: i64, entry: FirebaseEntry<'_>) -> Option<Self> {
        let record = match entry {
            FirebaseEntry::Structured(map) => Self {
                timestamp,
                package_name: text_or_empty(map, &["package", "packageName"]),
                title: text_or_empty(map, &["title"]),
                text: text_or_empty(map, &["text", "body"]),
                extra: map
                    .get("extra")
                    .filter(|value| value.is_object())
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new())),
            },
            FirebaseEntry::LegacyDelimited(raw) => {
                let [package_name, title, text] = legacy_fields(raw);
                Self {
                    timestamp,
                    package_name: package_name.to_owned(),
                    title: title.to_owned(),
                    text: text.to_owned(),
                    extra: Value::Object(Map::new()),
                }
            }
            FirebaseEntry::Unrecognized => return None,
        };
        (!record.package_name.is_empty()).then_some(record)
    }
}

/// Address-book contact keyed by `(device, phone_number)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactRecord {
    pub phone_number: String,
    pub contact_id: String,
    pub name: String,
    pub display_name: String,
    pub phones: Value,
    pub emails: Value,
    pub addresses: Value,
    pub websites: Value,
    pub im_accounts: Value,
    pub photo_uri: String,
    pub thumbnail_uri: String,
    pub company: String,
    pub job_title: String,
    pub department: String,
    pub birthday: String,
    pub anniversary: String,
    pub notes: String,
    pub last_contacted: Option<i64>,
    pub times_contacted: i32,
    pub is_starred: bool,
    pub nickname: String,
    pub phonetic_name: String,
}

impl ContactRecord {
    /// Contact carrying only its phone number.
    #[must_use]
    pub fn bare(phone_number: &str) -> Self {
        Self {
            phone_number: phone_number.to_owned(),
            contact_id: phone_number.to_owned(),
            name: String::new(),
            display_name: String::new(),
            phones: Value::Array(Vec::new()),
            emails: Value::Array(Vec::new()),
            addresses: Value::Array(Vec::new()),
            websites: Value::Array(Vec::new()),
            im_accounts: Value::Array(Vec::new()),
            photo_uri: String::new(),
            thumbnail_uri: String::new(),
            company: String::new(),
            job_title: String::new(),
            department: String::new(),
            birthday: String::new(),
            anniversary: String::new(),
            notes: String::new(),
            last_contacted: None,
            times_contacted: 0,
            is_starred: false,
            nickname: String::new(),
            phonetic_name: String::new(),
        }
    }

    /// Build a contact. Non-object entries become bare contacts.
    ///
    /// Field names are accepted in camelCase or snake_case.
    ///
    /// # Examples
    /// ```
    /// use fastpay_backend::domain::{ContactRecord, FirebaseEntry};
    /// use serde_json::json;
    ///
    /// let raw = json!({ "name": "Ann", "lastContacted": "1700", "isStarred": true });
    /// let contact = ContactRecord::from_entry("+100", FirebaseEntry::classify(&raw));
    /// assert_eq!(contact.contact_id, "+100");
    /// assert_eq!(contact.last_contacted, Some(1700));
    /// assert!(contact.is_starred);
    /// ```
    #[must_use]
    pub fn from_entry(phone_number: &str, entry: FirebaseEntry<'_>) -> Self {
        let FirebaseEntry::Structured(map) = entry else {
            return Self::bare(phone_number);
        };
        Self {
            phone_number: phone_number.to_owned(),
            contact_id: text_field_or(map, &["contactId", "id"], phone_number),
            name: text_or_empty(map, &["name"]),
            display_name: text_or_empty(map, &["displayName", "display_name"]),
            phones: array_field(map, &["phones"]),
            emails: array_field(map, &["emails"]),
            addresses: array_field(map, &["addresses"]),
            websites: array_field(map, &["websites"]),
            im_accounts: array_field(map, &["imAccounts", "im_accounts"]),
            photo_uri: text_or_empty(map, &["photoUri", "photo_uri"]),
            thumbnail_uri: text_or_empty(map, &["thumbnailUri", "thumbnail_uri"]),
            company: text_or_empty(map, &["company"]),
            job_title: text_or_empty(map, &["jobTitle", "job_title"]),
            department: text_or_empty(map, &["department"]),
            birthday: text_or_empty(map, &["birthday"]),
            anniversary: text_or_empty(map, &["anniversary"]),
            notes: text_or_empty(map, &["notes"]),
            last_contacted: integer_field(map, &["lastContacted", "last_contacted"]),
            times_contacted: integer_field(map, &["timesContacted", "times_contacted"])
                .and_then(|count| i32::try_from(count).ok())
                .unwrap_or_default(),
            is_starred: flag_field(map, &["isStarred", "is_starred"]),
            nickname: text_or_empty(map, &["nickname"]),
            phonetic_name: text_or_empty(map, &["phoneticName", "phonetic_name"]),
        }
    }
}

fn text_field_or(map: &Map<String, Value>, keys: &[&str], fallback: &str) -> String {
    let value = text_or_empty(map, keys);
    if value.is_empty() {
        fallback.to_owned()
    } else {
        value
    }
}
