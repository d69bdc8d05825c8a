//! File-backed JSON cache for the standalone heuristic predictors.
//!
//! One document per `(factor, league)` pair, stored as
//! `<cache_dir>/<sha256-hex>.json`. Freshness is judged by file modification
//! time, so entries written by other processes are honoured too.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

pub const FILE_CACHE_FORMAT_VERSION: u32 = 1;
pub const DEFAULT_FILE_CACHE_TTL: Duration = Duration::from_secs(3600);

pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create cache directory {:?}", dir))?;
        }
        Ok(Self { dir, ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable 64-char hex digest of the normalized `"factor:league"` string
    pub fn cache_key(factor: &str, league: &str) -> String {
        let normalized = format!(
            "{}:{}",
            factor.trim().to_lowercase(),
            league.trim().to_lowercase()
        );
        hex::encode(Sha256::digest(normalized.as_bytes()))
    }

    fn path_for(&self, factor: &str, league: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", Self::cache_key(factor, league)))
    }

    fn is_fresh(&self, path: &Path) -> bool {
        let modified = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return false,
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age <= self.ttl,
            // mtime in the future: clock skew, treat as fresh
            Err(_) => true,
        }
    }

    /// Cached document if present and younger than the TTL.
    /// Unreadable or corrupt files count as a miss.
    pub fn get(&self, factor: &str, league: &str) -> Option<Value> {
        let path = self.path_for(factor, league);
        if !path.exists() || !self.is_fresh(&path) {
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("FileCache: Failed to read {:?}: {}", path, e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(doc) => {
                debug!("FileCache: Hit for {}:{}", factor, league);
                Some(doc)
            }
            Err(e) => {
                warn!("FileCache: Corrupt entry {:?}: {}", path, e);
                None
            }
        }
    }

    /// Overwrite the entry, stamping `_meta {cached_at, expires_at, version}`.
    /// Non-object documents are wrapped as `{"value": ...}`.
    pub fn set(&self, factor: &str, league: &str, document: &Value) -> Result<Value> {
        let mut body: Map<String, Value> = match document {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };

        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.ttl).unwrap_or(ChronoDuration::hours(1));
        body.insert(
            "_meta".to_string(),
            json!({
                "cached_at": now.to_rfc3339(),
                "expires_at": (now + ttl).to_rfc3339(),
                "version": FILE_CACHE_FORMAT_VERSION,
            }),
        );
        let stamped = Value::Object(body);

        let path = self.path_for(factor, league);
        let content =
            serde_json::to_string_pretty(&stamped).context("Failed to serialize cache entry")?;

        // Atomic write: write to a temp file unique to this writer, then rename
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        fs::write(&temp_path, content).context("Failed to write temp cache file")?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e).context("Failed to rename cache file");
        }

        Ok(stamped)
    }

    /// Delete stale entries; returns how many files were removed
    pub fn purge_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir).context("Failed to list cache directory")? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if !self.is_fresh(&path) {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {:?}", path))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cache_key_is_normalized_and_fixed_length() {
        let a = FileCache::cache_key("LeBron scores over 25 points ", "NBA");
        let b = FileCache::cache_key("lebron scores over 25 points", "nba");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, FileCache::cache_key("lebron scores over 25 points", "wnba"));
    }

    #[test]
    fn test_round_trip_stamps_meta() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), DEFAULT_FILE_CACHE_TTL).unwrap();

        cache
            .set("Chiefs win", "NFL", &json!({"probability": 0.61}))
            .unwrap();
        let doc = cache.get("chiefs win", "nfl").unwrap();
        assert_eq!(doc["probability"], 0.61);
        assert_eq!(doc["_meta"]["version"], FILE_CACHE_FORMAT_VERSION);
        assert!(doc["_meta"]["cached_at"].is_string());
        assert!(doc["_meta"]["expires_at"].is_string());
    }

    #[test]
    fn test_set_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), DEFAULT_FILE_CACHE_TTL).unwrap();
        cache.set("f", "NBA", &json!({"v": 1})).unwrap();
        cache.set("f", "NBA", &json!({"v": 2})).unwrap();
        assert_eq!(cache.get("f", "NBA").unwrap()["v"], 2);
    }

    #[test]
    fn test_concurrent_writers_of_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(FileCache::new(dir.path(), DEFAULT_FILE_CACHE_TTL).unwrap());

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for round in 0..20 {
                        cache
                            .set("Celtics cover", "NBA", &json!({"writer": i, "round": round}))
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let doc = cache.get("celtics cover", "nba").unwrap();
        assert_eq!(doc["round"], 19);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) != Some("json"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);
    }

    #[test]
    fn test_expired_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), Duration::from_millis(50)).unwrap();
        cache.set("f", "NBA", &json!({"v": 1})).unwrap();
        assert!(cache.get("f", "NBA").is_some());

        thread::sleep(Duration::from_millis(120));
        assert!(cache.get("f", "NBA").is_none());
        assert_eq!(cache.purge_expired().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), DEFAULT_FILE_CACHE_TTL).unwrap();
        let path = dir
            .path()
            .join(format!("{}.json", FileCache::cache_key("f", "NBA")));
        fs::write(&path, "{not json").unwrap();
        assert!(cache.get("f", "NBA").is_none());
    }
}
