//! In-memory tree store with scripted transport failures.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::lock;
use crate::domain::ports::{FirebaseTreeSource, FirebaseTreeSourceError};

/// JSON tree addressed by slash-separated paths.
pub struct InMemoryFirebaseTree {
    root: Mutex<Value>,
    failing_prefixes: Mutex<Vec<String>>,
    failing_segments: Mutex<Vec<String>>,
    deletions: Mutex<Vec<String>>,
}

impl InMemoryFirebaseTree {
    pub fn new(root: Value) -> Self {
        Self {
            root: Mutex::new(root),
            failing_prefixes: Mutex::new(Vec::new()),
            failing_segments: Mutex::new(Vec::new()),
            deletions: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call whose path starts with `prefix`; `""` fails all.
    pub fn fail_prefix(&self, prefix: &str) {
        lock(&self.failing_prefixes).push(prefix.to_owned());
    }

    /// Fail every call whose path contains `segment` as a whole segment.
    pub fn fail_segment(&self, segment: &str) {
        lock(&self.failing_segments).push(segment.to_owned());
    }

    /// Replace the value at `path`.
    pub fn set(&self, path: &str, value: Value) {
        let mut root = lock(&self.root);
        let mut node = &mut *root;
        for segment in segments(path) {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                return;
            };
            node = map.entry(segment.to_owned()).or_insert(Value::Null);
        }
        *node = value;
    }

    /// Clone of the value at `path`.
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        let root = lock(&self.root);
        lookup(&root, path).filter(|value| !value.is_null()).cloned()
    }

    /// Paths deleted so far, in call order.
    pub fn deletions(&self) -> Vec<String> {
        lock(&self.deletions).clone()
    }

    fn check(&self, path: &str) -> Result<(), FirebaseTreeSourceError> {
        let prefix_hit = lock(&self.failing_prefixes)
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()));
        let segment_hit = lock(&self.failing_segments)
            .iter()
            .any(|failing| segments(path).any(|segment| segment == failing));
        if prefix_hit || segment_hit {
            Err(FirebaseTreeSourceError::transport(format!(
                "scripted failure for {path}"
            )))
        } else {
            Ok(())
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[async_trait]
impl FirebaseTreeSource for InMemoryFirebaseTree {
    async fn read(&self, path: &str) -> Result<Option<Value>, FirebaseTreeSourceError> {
        self.check(path)?;
        Ok(self.snapshot(path))
    }

    async fn child_keys(&self, path: &str) -> Result<Vec<String>, FirebaseTreeSourceError> {
        self.check(path)?;
        let keys = match self.snapshot(path) {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.is_null())
                .map(|(index, _)| index.to_string())
                .collect(),
            _ => Vec::new(),
        };
        Ok(keys)
    }

    async fn delete(&self, path: &str) -> Result<(), FirebaseTreeSourceError> {
        self.check(path)?;
        let mut parts: Vec<&str> = segments(path).collect();
        let Some(leaf) = parts.pop() else {
            *lock(&self.root) = Value::Null;
            return Ok(());
        };
        {
            let mut root = lock(&self.root);
            let parent = parts.iter().try_fold(&mut *root, |node, segment| match node {
                Value::Object(map) => map.get_mut(*segment),
                _ => None,
            });
            if let Some(Value::Object(map)) = parent {
                map.remove(leaf);
            }
        }
        lock(&self.deletions).push(path.to_owned());
        Ok(())
    }
}
