//! Snapshot cache for yapscope
//!
//! A single slot holding `{yapScores, lastUpdated}`. Writes replace the whole
//! record; there is no history and no eviction beyond overwriting.
//! The file-backed store lives at ~/.config/yapscope/cache/yap_scores.json

use crate::error::{YapError, YapResult};
use crate::snapshot::DataSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Cache directory name
pub const CACHE_DIR: &str = "cache";

/// Cache file name
pub const CACHE_FILE: &str = "yap_scores.json";

/// A cached snapshot and the wall-clock time (epoch ms) it was stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "yapScores")]
    pub snapshot: DataSnapshot,

    #[serde(rename = "lastUpdated")]
    pub last_updated: i64,
}

impl CacheEntry {
    pub fn age_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.last_updated)
    }
}

/// `now - last_updated < window`, strictly
pub fn is_fresh(entry: &CacheEntry, now: i64, window: Duration) -> bool {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    entry.age_ms(now) < window_ms
}

/// Single-slot snapshot storage
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the current entry. Absence and unreadable storage both yield `None`.
    async fn read(&self) -> Option<CacheEntry>;

    /// Replace the entry with `snapshot` stored at `now`
    async fn write(&self, snapshot: &DataSnapshot, now: i64) -> YapResult<()>;
}

/// JSON file cache
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the config directory (~/.config/yapscope/cache/)
    pub fn in_config_dir() -> YapResult<Self> {
        let dir = crate::config::Config::dir_path()?.join(CACHE_DIR);
        Ok(Self::new(dir.join(CACHE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the cached entry; a missing file is not an error
    pub async fn clear(&self) -> YapResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(YapError::IoError(e)),
        }
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn read(&self) -> Option<CacheEntry> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cache file yet");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read cache file");
                return None;
            }
        };

        match serde_json::from_slice(&contents) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt cache file");
                None
            }
        }
    }

    async fn write(&self, snapshot: &DataSnapshot, now: i64) -> YapResult<()> {
        let entry = CacheEntry {
            snapshot: snapshot.clone(),
            last_updated: now,
        };
        let contents = serde_json::to_vec(&entry)?;
        let path = self.path.clone();

        // Write beside the target and rename so a reader never sees half a record
        tokio::task::spawn_blocking(move || write_replacing(&path, &contents))
            .await
            .map_err(|e| YapError::CacheError(format!("Cache write task failed: {}", e)))?
    }
}

fn write_replacing(path: &Path, contents: &[u8]) -> YapResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| YapError::CacheError(format!("Failed to replace cache file: {}", e.error)))?;
    Ok(())
}

/// In-process cache, used by tests and embedders without a filesystem
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entry: RwLock<Option<CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(snapshot: DataSnapshot, last_updated: i64) -> Self {
        Self {
            entry: RwLock::new(Some(CacheEntry {
                snapshot,
                last_updated,
            })),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn read(&self) -> Option<CacheEntry> {
        self.entry.read().await.clone()
    }

    async fn write(&self, snapshot: &DataSnapshot, now: i64) -> YapResult<()> {
        *self.entry.write().await = Some(CacheEntry {
            snapshot: snapshot.clone(),
            last_updated: now,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ScoreRecord;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn sample_snapshot() -> DataSnapshot {
        let mut exported = ScoreRecord::new("bob", 42);
        exported.uid = Some("0x01".into());
        exported.timestamp = Some(1_700_000_000);
        exported.twitter_user_id = Some("99".into());
        DataSnapshot::new(vec![ScoreRecord::new("alice", 1200), exported], 1_700_000_000_000)
    }

    fn entry_at(last_updated: i64) -> CacheEntry {
        CacheEntry {
            snapshot: DataSnapshot::empty(),
            last_updated,
        }
    }

    #[test]
    fn test_is_fresh_strict_boundary() {
        let window = Duration::from_millis(5 * DAY_MS as u64);
        let entry = entry_at(1_000);

        assert!(is_fresh(&entry, 1_000, window));
        assert!(is_fresh(&entry, 1_000 + 5 * DAY_MS - 1, window));
        assert!(!is_fresh(&entry, 1_000 + 5 * DAY_MS, window));
        assert!(!is_fresh(&entry, 1_000 + 6 * DAY_MS, window));
    }

    #[test]
    fn test_is_fresh_matches_predicate() {
        let window = Duration::from_millis(100);
        for last_updated in [0_i64, 50, 100, 1_000] {
            for now in [0_i64, 99, 100, 150, 199, 200, 1_099, 1_100] {
                let expected = now - last_updated < 100;
                assert_eq!(
                    is_fresh(&entry_at(last_updated), now, window),
                    expected,
                    "now={} last_updated={}",
                    now,
                    last_updated
                );
            }
        }
    }

    #[test]
    fn test_entry_uses_extension_storage_keys() {
        let value = serde_json::to_value(CacheEntry {
            snapshot: DataSnapshot::empty(),
            last_updated: 12,
        })
        .unwrap();
        assert_eq!(value["lastUpdated"], 12);
        assert_eq!(value["yapScores"]["timestamp"], 0);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join("cache").join(CACHE_FILE));
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join("nested").join(CACHE_FILE));
        let snapshot = sample_snapshot();

        store.write(&snapshot, 5_000).await.unwrap();
        let entry = store.read().await.unwrap();

        assert_eq!(entry.snapshot, snapshot);
        assert_eq!(entry.last_updated, 5_000);
    }

    #[tokio::test]
    async fn test_file_store_overwrites_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join(CACHE_FILE));

        store.write(&sample_snapshot(), 1).await.unwrap();
        let replacement = DataSnapshot::new(vec![ScoreRecord::new("carol", 5)], 2);
        store.write(&replacement, 2).await.unwrap();

        let entry = store.read().await.unwrap();
        assert_eq!(entry.snapshot, replacement);
        assert_eq!(entry.last_updated, 2);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE);
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileCacheStore::new(&path);
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn test_file_store_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join(CACHE_FILE));

        store.clear().await.unwrap();
        store.write(&sample_snapshot(), 1).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCacheStore::new();
        assert!(store.read().await.is_none());

        let snapshot = sample_snapshot();
        store.write(&snapshot, 77).await.unwrap();

        let entry = store.read().await.unwrap();
        assert_eq!(entry.snapshot, snapshot);
        assert_eq!(entry.last_updated, 77);
    }
}
