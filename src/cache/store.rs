// Cache store for reading and writing cached API responses.
// Handles JSON serialization, TTL checking, and atomic file replacement.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

use super::paths::{ENTRY_EXTENSION, entry_path};

/// Default TTL for cached responses: 10 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// On-disk wrapper for a cached payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData {
    /// When the payload was stored.
    pub timestamp: DateTime<Utc>,
    /// The cached payload.
    pub data: Value,
}

impl CachedData {
    /// Create a new entry stamped with the current time.
    pub fn new(data: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            data,
        }
    }

    /// Check whether this entry is older than `ttl` at `now`.
    pub fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let elapsed = now
            .signed_duration_since(self.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);

        elapsed > ttl
    }
}

/// Advisory key/value cache of JSON blobs with a time-to-live.
///
/// Reads never fail: corrupt or expired entries are deleted and reported
/// as misses. Writes are best-effort and never surface errors.
#[derive(Debug, Clone)]
pub struct TtlCache {
    dir: PathBuf,
    enabled: bool,
    ttl: Duration,
}

impl TtlCache {
    /// Create a cache rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>, enabled: bool, ttl: Duration) -> Self {
        let dir = dir.into();
        if enabled && let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!("Could not create cache dir {}: {}", dir.display(), e);
        }
        Self { dir, enabled, ttl }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
            ttl: DEFAULT_TTL,
        }
    }

    /// Get a cached value if present and not expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Utc::now())
    }

    /// Same as [`TtlCache::get`], evaluating expiry against `now`.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        if !self.enabled {
            return None;
        }

        let path = entry_path(&self.dir, key);
        if !path.exists() {
            return None;
        }

        match read_entry(&path) {
            Ok(entry) if entry.is_expired_at(self.ttl, now) => {
                tracing::debug!(key, "cache entry expired");
                remove_quietly(&path);
                None
            }
            Ok(entry) => Some(entry.data),
            Err(e) => {
                tracing::debug!(key, error = %e, "dropping unreadable cache entry");
                remove_quietly(&path);
                None
            }
        }
    }

    /// Payload stored under `key` regardless of age. Deletes nothing.
    pub fn peek_stale(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        read_entry(&entry_path(&self.dir, key))
            .ok()
            .map(|entry| entry.data)
    }

    /// Store a value. Failures are logged and otherwise ignored.
    pub fn set(&self, key: &str, data: &Value) {
        if !self.enabled {
            return;
        }

        let path = entry_path(&self.dir, key);
        if let Err(e) = write_entry(&path, &CachedData::new(data.clone())) {
            tracing::debug!(key, error = %e, "cache write failed");
        }
    }

    /// Clear one key, or every entry when `key` is `None`.
    ///
    /// Returns the number of entry files removed.
    pub fn clear(&self, key: Option<&str>) -> usize {
        if !self.enabled {
            return 0;
        }

        match key {
            Some(key) => usize::from(remove_quietly(&entry_path(&self.dir, key))),
            None => {
                let Ok(entries) = fs::read_dir(&self.dir) else {
                    return 0;
                };
                entries
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION))
                    .filter(|path| remove_quietly(path))
                    .count()
            }
        }
    }
}

/// Read a cache entry from a file.
fn read_entry(path: &Path) -> Result<CachedData> {
    let contents = fs::read_to_string(path)?;
    let cached: CachedData = serde_json::from_str(&contents)?;
    Ok(cached)
}

/// Write a cache entry atomically via a temp file.
fn write_entry(path: &Path, entry: &CachedData) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(entry)?;

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

fn remove_quietly(path: &Path) -> bool {
    path.exists() && fs::remove_file(path).is_ok()
}
