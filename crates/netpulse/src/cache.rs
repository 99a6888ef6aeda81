//! Key-value persistence collaborator.
//!
//! The engine writes discovered facts (the last external IP) and reads
//! host-provided secrets (an abuse-reputation API key). Values only need
//! to round-trip through JSON; no further schema is imposed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fs};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CacheError;

/// A single persisted fact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub last_updated: DateTime<Utc>,
}

/// The minimal contract the engine needs from its persistence collaborator
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), CacheError>;
}

/// Flat JSON file at `$XDG_CONFIG_HOME/netpulse/cache.json`, one entry per
/// key, rewritten whole on every set. The file stays hand-readable:
/// pretty-printed with a trailing newline.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

fn default_cache_path() -> Result<PathBuf, CacheError> {
    let base = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(CacheError::CachePathUnavailable);
    };
    Ok(base.join("netpulse/cache.json"))
}

impl JsonFileCache {
    /// Open a cache file, starting empty when it does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|source| CacheError::Read { path: path.clone(), source })?;
            serde_json::from_str(&raw)
                .map_err(|source| CacheError::Parse { path: path.clone(), source })?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn open_default() -> Result<Self, CacheError> {
        Self::open(default_cache_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Convenience accessor for string-valued entries
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.entries.get(key).and_then(|entry| entry.value.as_str().map(str::to_owned))
    }

    pub fn last_updated(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|entry| entry.last_updated)
    }

    fn persist(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| CacheError::Write { path: self.path.clone(), source })?;
        }
        let mut raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|source| CacheError::Parse { path: self.path.clone(), source })?;
        raw.push('\n');
        fs::write(&self.path, raw)
            .map_err(|source| CacheError::Write { path: self.path.clone(), source })
    }
}

impl Cache for JsonFileCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), CacheEntry { value, last_updated: Utc::now() });
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = JsonFileCache::open(dir.path().join("cache.json")).expect("open");

        cache.set("last_external_ip", json!("203.0.113.7")).expect("set");
        assert_eq!(cache.get("last_external_ip"), Some(json!("203.0.113.7")));
        assert_eq!(cache.get_str("last_external_ip").as_deref(), Some("203.0.113.7"));
        assert!(cache.last_updated("last_external_ip").is_some());
    }

    #[test]
    fn entries_survive_reopening() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");

        {
            let mut cache = JsonFileCache::open(&path).expect("open");
            cache.set("counter", json!(41)).expect("set");
            cache.set("counter", json!(42)).expect("overwrite");
        }

        let cache = JsonFileCache::open(&path).expect("reopen");
        assert_eq!(cache.get("counter"), Some(json!(42)));
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = JsonFileCache::open(dir.path().join("nope.json")).expect("open");
        assert_eq!(cache.get("anything"), None);
    }

    #[test]
    fn corrupt_file_is_a_typed_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json").expect("write");

        let error = JsonFileCache::open(&path).expect_err("corrupt");
        assert!(matches!(error, CacheError::Parse { .. }));
    }

    #[test]
    fn file_on_disk_is_pretty_with_trailing_newline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        let mut cache = JsonFileCache::open(&path).expect("open");
        cache.set("k", json!({"nested": true})).expect("set");

        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.ends_with('\n'));
        assert!(raw.contains("  \"k\""));
    }
}
