//! External Data Fetcher: reads a device's raw subtrees from the tree store.
//!
//! Each [`ResourceKind`] owns an ordered table of candidate path templates.
//! The first candidate holding a non-empty container wins. Transport
//! failures are surfaced as [`FetchOutcome::TransportError`] so callers make
//! the soft-fail decision explicitly, usually through
//! [`ExternalDataFetcher::fetch_or_empty`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::DeviceId;
use super::ports::{FirebaseTreeSource, FirebaseTreeSourceError};

/// Raw entries of one subtree keyed by their tree key.
pub type Entries = Map<String, Value>;

/// Placeholder substituted with the device identifier.
const DEVICE_PLACEHOLDER: &str = "{id}";

const DEVICE_INFO_PATHS: &[&str] = &[
    "device/{id}",
    "fastpay/{id}",
    "fastpay/testing/{id}",
    "fastpay/running/{id}",
];

const MESSAGE_PATHS: &[&str] = &[
    "fastpay/{id}/messages",
    "message/{id}",
    "fastpay/testing/{id}/messages",
    "fastpay/running/{id}/messages",
];

const NOTIFICATION_PATHS: &[&str] = &[
    "device/{id}/Notification",
    "fastpay/{id}/Notification",
    "notification/{id}",
    "fastpay/testing/{id}/Notification",
    "fastpay/running/{id}/Notification",
];

const CONTACT_PATHS: &[&str] = &[
    "device/{id}/Contact",
    "fastpay/{id}/Contact",
    "contact/{id}",
    "fastpay/testing/{id}/Contact",
    "fastpay/running/{id}/Contact",
];

/// Message subtrees eligible for pruning, newest schema first.
const PRUNABLE_MESSAGE_PATHS: &[&str] = &["fastpay/{id}/messages", "message/{id}"];

/// Top-level collection keyed by device identifier.
const DEVICE_COLLECTION: &str = "device";
/// Legacy collection mixing device subtrees with mode folders.
const LEGACY_COLLECTION: &str = "fastpay";
/// Child keys marking a legacy entry as a device subtree.
const LEGACY_DEVICE_MARKERS: [&str; 3] = ["messages", "Notification", "Contact"];

/// Resource kinds stored per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    DeviceInfo,
    Messages,
    Notifications,
    Contacts,
}

impl ResourceKind {
    /// Ordered candidate path templates.
    #[must_use]
    pub const fn candidate_paths(self) -> &'static [&'static str] {
        match self {
            Self::DeviceInfo => DEVICE_INFO_PATHS,
            Self::Messages => MESSAGE_PATHS,
            Self::Notifications => NOTIFICATION_PATHS,
            Self::Contacts => CONTACT_PATHS,
        }
    }

    /// Singular label used in log lines and error text.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DeviceInfo => "device info",
            Self::Messages => "message",
            Self::Notifications => "notification",
            Self::Contacts => "contact",
        }
    }
}

/// Substitute the device identifier into a path template.
///
/// # Examples
/// ```
/// use fastpay_backend::domain::{DeviceId, fetcher::render_path};
///
/// let id = DeviceId::new("d1").expect("valid id");
/// assert_eq!(render_path("fastpay/{id}/messages", &id), "fastpay/d1/messages");
/// ```
#[must_use]
pub fn render_path(template: &str, device_id: &DeviceId) -> String {
    template.replace(DEVICE_PLACEHOLDER, device_id.as_str())
}

/// Result of probing every candidate path of one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A candidate held data.
    Found(Entries),
    /// Every reachable candidate was empty.
    NotFound,
    /// Every candidate failed at the transport level.
    TransportError(String),
}

impl FetchOutcome {
    /// Collapse misses and failures into an empty map.
    #[must_use]
    pub fn into_entries(self) -> Entries {
        match self {
            Self::Found(entries) => entries,
            Self::NotFound | Self::TransportError(_) => Entries::new(),
        }
    }
}

/// What pruning did to a device's remote message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Path whose children were pruned.
    pub path: String,
    /// Children left in place.
    pub retained: usize,
    /// Children deleted.
    pub deleted: usize,
}

/// Reads device subtrees through a shared [`FirebaseTreeSource`].
#[derive(Clone)]
pub struct ExternalDataFetcher {
    source: Arc<dyn FirebaseTreeSource>,
}

impl ExternalDataFetcher {
    /// Wrap a tree source.
    pub fn new(source: Arc<dyn FirebaseTreeSource>) -> Self {
        Self { source }
    }

    /// Try the candidate paths of `kind` in order.
    pub async fn fetch(&self, device_id: &DeviceId, kind: ResourceKind) -> FetchOutcome {
        let mut failures = Vec::new();
        let candidates = kind.candidate_paths();
        for template in candidates {
            let path = render_path(template, device_id);
            match self.source.read(&path).await {
                Ok(Some(value)) => {
                    if let Some(entries) = into_entries(value) {
                        debug!(
                            device_id = %device_id,
                            %path,
                            count = entries.len(),
                            kind = kind.label(),
                            "resource found"
                        );
                        return FetchOutcome::Found(entries);
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    debug!(
                        device_id = %device_id,
                        %path,
                        error_kind = error.kind(),
                        %error,
                        "candidate path failed"
                    );
                    failures.push(format!("{path}: {error}"));
                }
            }
        }

        if failures.len() == candidates.len() {
            FetchOutcome::TransportError(failures.join("; "))
        } else {
            FetchOutcome::NotFound
        }
    }

    /// Fetch `kind`, treating misses and failures as an empty map.
    pub async fn fetch_or_empty(&self, device_id: &DeviceId, kind: ResourceKind) -> Entries {
        match self.fetch(device_id, kind).await {
            FetchOutcome::Found(entries) => entries,
            FetchOutcome::NotFound => {
                debug!(
                    device_id = %device_id,
                    kind = kind.label(),
                    "no data at any candidate path"
                );
                Entries::new()
            }
            FetchOutcome::TransportError(detail) => {
                warn!(
                    device_id = %device_id,
                    kind = kind.label(),
                    %detail,
                    "store unavailable; treating as empty"
                );
                Entries::new()
            }
        }
    }

    /// Fetch messages, optionally keeping only the `limit` newest.
    ///
    /// The limit is applied after the full subtree has been read.
    pub async fn fetch_messages(&self, device_id: &DeviceId, limit: Option<usize>) -> Entries {
        let entries = self.fetch_or_empty(device_id, ResourceKind::Messages).await;
        match limit {
            Some(limit) => keep_newest(entries, limit),
            None => entries,
        }
    }

    /// Device identifiers discoverable in the store.
    ///
    /// Combines the keys of the device collection with legacy entries that
    /// hold message, notification or contact subtrees. A failing collection
    /// is logged and skipped.
    pub async fn discover_device_ids(&self) -> BTreeSet<DeviceId> {
        let mut discovered = BTreeSet::new();

        match self.source.child_keys(DEVICE_COLLECTION).await {
            Ok(keys) => discovered.extend(
                keys.into_iter()
                    .filter_map(|key| DeviceId::from_tree_key(key).ok()),
            ),
            Err(error) => warn!(%error, collection = DEVICE_COLLECTION, "device discovery failed"),
        }

        match self.source.read(LEGACY_COLLECTION).await {
            Ok(Some(Value::Object(children))) => {
                discovered.extend(
                    children
                        .iter()
                        .filter(|(_, value)| is_legacy_device_subtree(value))
                        .filter_map(|(key, _)| DeviceId::from_tree_key(key.as_str()).ok()),
                );
            }
            Ok(_) => {}
            Err(error) => warn!(%error, collection = LEGACY_COLLECTION, "device discovery failed"),
        }

        discovered
    }

    /// Delete remote messages beyond the `keep_latest` newest.
    ///
    /// Walks the prunable message paths and prunes the first one holding
    /// data. Returns `Ok(None)` when no path holds messages.
    ///
    /// # Errors
    /// Returns the first delete failure, or the last read failure when no
    /// path could be read.
    pub async fn prune_messages(
        &self,
        device_id: &DeviceId,
        keep_latest: usize,
    ) -> Result<Option<PruneOutcome>, FirebaseTreeSourceError> {
        let mut last_error = None;
        let mut any_readable = false;
        for template in PRUNABLE_MESSAGE_PATHS {
            let path = render_path(template, device_id);
            let entries = match self.source.read(&path).await {
                Ok(value) => {
                    any_readable = true;
                    match value.and_then(into_entries) {
                        Some(entries) => entries,
                        None => continue,
                    }
                }
                Err(error) => {
                    debug!(
                        device_id = %device_id,
                        %path,
                        error_kind = error.kind(),
                        %error,
                        "prune read failed"
                    );
                    last_error = Some(error);
                    continue;
                }
            };

            let ordered = newest_first(&entries);
            let stale = ordered.get(keep_latest..).unwrap_or_default();
            for key in stale {
                self.source.delete(&format!("{path}/{key}")).await?;
            }
            info!(
                device_id = %device_id,
                %path,
                kept = ordered.len() - stale.len(),
                deleted = stale.len(),
                "pruned remote messages"
            );
            return Ok(Some(PruneOutcome {
                path,
                retained: ordered.len() - stale.len(),
                deleted: stale.len(),
            }));
        }

        match last_error {
            Some(error) if !any_readable => Err(error),
            _ => {
                warn!(device_id = %device_id, "no remote messages found to prune");
                Ok(None)
            }
        }
    }
}

fn is_legacy_device_subtree(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| LEGACY_DEVICE_MARKERS.iter().any(|marker| map.contains_key(*marker)))
}

/// Normalise a stored value into entries.
///
/// Arrays (written by the store for dense integer keys) become index-keyed
/// maps with null holes dropped. Scalars and empty containers yield `None`.
fn into_entries(value: Value) -> Option<Entries> {
    let entries = match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => return None,
    };
    (!entries.is_empty()).then_some(entries)
}

fn timestamp_sort_key(key: &str) -> i64 {
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        key.parse().unwrap_or(i64::MAX)
    } else {
        0
    }
}

/// Keys ordered by numeric timestamp, newest first.
///
/// Non-numeric keys sort as timestamp 0.
#[must_use]
pub fn newest_first(entries: &Entries) -> Vec<String> {
    let mut keys: Vec<String> = entries.keys().cloned().collect();
    keys.sort_by_key(|key| std::cmp::Reverse(timestamp_sort_key(key)));
    keys
}

/// Keep only the `limit` newest entries.
///
/// # Examples
/// ```
/// use fastpay_backend::domain::fetcher::{Entries, keep_newest};
/// use serde_json::json;
///
/// let mut entries = Entries::new();
/// for ts in ["100", "300", "200"] {
///     entries.insert(ts.to_owned(), json!("received~+1~hi"));
/// }
/// let kept = keep_newest(entries, 2);
/// assert!(kept.contains_key("300") && kept.contains_key("200"));
/// assert!(!kept.contains_key("100"));
/// ```
#[must_use]
pub fn keep_newest(mut entries: Entries, limit: usize) -> Entries {
    newest_first(&entries)
        .into_iter()
        .take(limit)
        .filter_map(|key| entries.remove_entry(&key))
        .collect()
}
