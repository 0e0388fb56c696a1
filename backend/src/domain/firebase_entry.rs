//! Shape discrimination for loosely typed tree entries.
//!
//! Devices have written records either as JSON objects or as legacy
//! `~`-joined strings. [`FirebaseEntry::classify`] resolves the shape once at
//! ingestion; record builders match on the variant instead of probing types.

use serde_json::{Map, Value};

/// Separator used by legacy delimited records.
pub const LEGACY_SEPARATOR: char = '~';

/// Values accepted as "true" for device activity flags.
const TRUTHY_FLAGS: [&str; 5] = ["opened", "active", "true", "1", "yes"];

/// One raw entry under a resource subtree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FirebaseEntry<'a> {
    /// A JSON object with named fields.
    Structured(&'a Map<String, Value>),
    /// A delimiter-joined string such as `type~phone~body`.
    LegacyDelimited(&'a str),
    /// Anything else: numbers, booleans, arrays, null.
    Unrecognized,
}

impl<'a> FirebaseEntry<'a> {
    /// Classify a raw entry value.
    ///
    /// # Examples
    /// ```
    /// use fastpay_backend::domain::FirebaseEntry;
    /// use serde_json::json;
    ///
    /// let legacy = json!("sent~+100~hi");
    /// assert!(matches!(FirebaseEntry::classify(&legacy), FirebaseEntry::LegacyDelimited(_)));
    /// assert_eq!(FirebaseEntry::classify(&json!(42)), FirebaseEntry::Unrecognized);
    /// ```
    #[must_use]
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Structured(map),
            Value::String(raw) => Self::LegacyDelimited(raw.as_str()),
            _ => Self::Unrecognized,
        }
    }
}

/// Split a legacy record into exactly three fields.
///
/// The first two separators delimit fields; anything after the second stays
/// in the last field. Missing fields are empty.
///
/// # Examples
/// ```
/// use fastpay_backend::domain::firebase_entry::legacy_fields;
///
/// assert_eq!(legacy_fields("sent~+100~a~b"), ["sent", "+100", "a~b"]);
/// assert_eq!(legacy_fields("received"), ["received", "", ""]);
/// ```
#[must_use]
pub fn legacy_fields(raw: &str) -> [&str; 3] {
    let mut parts = raw.splitn(3, LEGACY_SEPARATOR);
    let first = parts.next().unwrap_or_default();
    let second = parts.next().unwrap_or_default();
    let third = parts.next().unwrap_or_default();
    [first, second, third]
}

/// First non-empty textual value among `keys`.
///
/// Numbers are rendered as text so a phone stored as a number still maps.
#[must_use]
pub fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Like [`text_field`] but yields an empty string when nothing matches.
#[must_use]
pub fn text_or_empty(map: &Map<String, Value>, keys: &[&str]) -> String {
    text_field(map, keys).unwrap_or_default()
}

/// First integer value among `keys`, accepting digit strings.
#[must_use]
pub fn integer_field(map: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| map.get(*key).and_then(integer_value))
}

/// Interpret a value as an integer when it is one or is made of digits.
#[must_use]
pub fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
            text.parse().ok()
        }
        _ => None,
    }
}

/// First non-empty array among `keys`, or an empty array.
#[must_use]
pub fn array_field(map: &Map<String, Value>, keys: &[&str]) -> Value {
    keys.iter()
        .find_map(|key| match map.get(*key) {
            Some(Value::Array(items)) if !items.is_empty() => Some(Value::Array(items.clone())),
            _ => None,
        })
        .unwrap_or_else(|| Value::Array(Vec::new()))
}

/// True when any of `keys` holds a truthy flag.
#[must_use]
pub fn flag_field(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .any(|key| map.get(*key).is_some_and(normalize_flag))
}

/// Normalise a heterogeneous flag into a boolean.
///
/// Strings are matched case-insensitively against `opened`, `active`,
/// `true`, `1` and `yes`; other values follow JSON truthiness.
///
/// # Examples
/// ```
/// use fastpay_backend::domain::firebase_entry::normalize_flag;
/// use serde_json::json;
///
/// assert!(normalize_flag(&json!("OPENED")));
/// assert!(!normalize_flag(&json!("closed")));
/// assert!(normalize_flag(&json!(1)));
/// assert!(!normalize_flag(&json!(null)));
/// ```
#[must_use]
pub fn normalize_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => {
            let lowered = text.trim().to_lowercase();
            TRUTHY_FLAGS.contains(&lowered.as_str())
        }
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}
