//! Per-identity cache of normalized recurring items.
//!
//! One slot per identity holding `{ "ts": <epoch ms>, "items": [...] }`.
//! Reads never fail: corrupt, mis-shaped, stale, or unreadable slots are
//! misses. Write faults are logged and swallowed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::RecurringItem;

/// Namespace for cache keys; bump the version if the item shape changes.
pub const CACHE_KEY_PREFIX: &str = "subtrack.recurring.v1:";

/// Storage key for an identity. Distinct identities never share a key.
pub fn cache_key(identity: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{identity}")
}

/// A flat string key-value slot store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> std::io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> std::io::Result<()>;
}

/// One JSON file per key, named by the hex SHA-256 of the key so any
/// identity maps to a fixed-length file name.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(self.slot_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        crate::util::atomic_write_str(&self.slot_path(key), value)
    }
}

/// In-process store, used when no cache directory is available and in tests.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        self.slots.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        (**self).set(key, value)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        (**self).set(key, value)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        (**self).set(key, value)
    }
}

#[derive(Serialize)]
struct CacheEntryRef<'a> {
    ts: i64,
    items: &'a [RecurringItem],
}

/// TTL-bounded recurring-item cache over a [`KeyValueStore`].
pub struct RecurringCache<S> {
    store: S,
    ttl: Duration,
}

impl<S: KeyValueStore> RecurringCache<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Fresh cached items for `identity`, or `None`.
    pub fn read(&self, identity: &str) -> Option<Vec<RecurringItem>> {
        self.read_at(identity, now_millis())
    }

    pub fn read_at(&self, identity: &str, now_ms: i64) -> Option<Vec<RecurringItem>> {
        let key = cache_key(identity);
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Recurring cache read failed for {}: {}", key, e);
                return None;
            }
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("Recurring cache entry unparseable, ignoring: {}", e);
                return None;
            }
        };

        let ts = value.get("ts").and_then(Value::as_f64)?;
        let items = value.get("items").filter(|v| v.is_array())?;

        let age_ms = now_ms as f64 - ts;
        if age_ms > self.ttl.as_millis() as f64 {
            log::debug!("Recurring cache entry for {} is stale ({} ms old)", key, age_ms);
            return None;
        }

        match serde_json::from_value::<Vec<RecurringItem>>(items.clone()) {
            Ok(items) => Some(items),
            Err(e) => {
                log::debug!("Recurring cache items malformed, ignoring: {}", e);
                None
            }
        }
    }

    /// Store `items` for `identity`, replacing any previous entry.
    pub fn write(&self, identity: &str, items: &[RecurringItem]) {
        self.write_at(identity, items, now_millis())
    }

    pub fn write_at(&self, identity: &str, items: &[RecurringItem], now_ms: i64) {
        let key = cache_key(identity);
        let entry = CacheEntryRef { ts: now_ms, items };
        let content = match serde_json::to_string(&entry) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to serialize recurring cache entry: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(&key, &content) {
            log::warn!("Recurring cache write failed for {}: {}", key, e);
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
