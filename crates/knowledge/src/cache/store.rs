//! Key-value stores with per-entry expiry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mira_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Backend for the response cache.
///
/// Expired entries must read as absent. Removing them eagerly is optional.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs and stats.
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AppResult<()>;

    /// Remove one key. Returns whether it existed.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Remove every key starting with `prefix`. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize>;

    /// Count live keys starting with `prefix`.
    async fn count_prefix(&self, prefix: &str) -> AppResult<usize>;
}

/// A stored value with its expiry time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    expires_at: DateTime<Utc>,
    value: String,
}

impl StoredEntry {
    fn new(key: &str, value: String, ttl: Duration) -> AppResult<Self> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::Cache(format!("Invalid TTL {:?}: {}", ttl, e)))?;
        Ok(Self {
            key: key.to_string(),
            expires_at: Utc::now() + ttl,
            value,
        })
    }

    fn is_live(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
        let entry = StoredEntry::new(key, value, ttl)?;
        let mut entries = self.entries.write().await;
        // Expired entries are dropped on write
        entries.retain(|_, e| e.is_live());
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    async fn count_prefix(&self, prefix: &str) -> AppResult<usize> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live())
            .count())
    }
}

/// One JSON file per key under a directory.
///
/// Writes go to a temporary file that is renamed into place, so a reader
/// never sees a partial entry.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AppError::Cache(format!("Failed to create cache directory {:?}: {}", dir, e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }

    async fn read_entry(&self, path: &Path) -> AppResult<Option<StoredEntry>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Cache(format!("Failed to read {:?}: {}", path, e))),
        }
    }

    /// Cache files whose names start with the stem of `prefix`.
    async fn files_with_prefix(&self, prefix: &str) -> AppResult<Vec<PathBuf>> {
        let stem_prefix = file_stem(prefix);
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to list {:?}: {}", self.dir, e)))?;

        let mut paths = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&stem_prefix) && name.ends_with(".json") {
                paths.push(entry.path());
            }
        }
        Ok(paths)
    }
}

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Map a key to a portable file stem.
///
/// ASCII alphanumerics and `-` pass through; every other character becomes
/// `_XX` per UTF-8 byte, `_` included. The mapping is injective and works
/// character by character, so key prefixes map to stem prefixes.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    let mut buf = [0u8; 4];
    for c in key.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            stem.push(c);
        } else {
            for byte in c.encode_utf8(&mut buf).bytes() {
                stem.push_str(&format!("_{:02X}", byte));
            }
        }
    }
    stem
}

#[async_trait]
impl CacheStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key);
        let Some(entry) = self.read_entry(&path).await? else {
            return Ok(None);
        };

        if entry.key != key {
            return Ok(None);
        }
        if !entry.is_live() {
            // Lazy expiry
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
        let entry = StoredEntry::new(key, value, ttl)?;
        let path = self.path_for(key);
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp-{}-{}", std::process::id(), seq));

        let json = serde_json::to_string(&entry)?;
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to commit {:?}: {}", path, e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Cache(format!("Failed to delete {}: {}", key, e))),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize> {
        let mut removed = 0;
        for path in self.files_with_prefix(prefix).await? {
            match self.read_entry(&path).await {
                Ok(Some(entry)) if !entry.key.starts_with(prefix) => continue,
                _ => {}
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::Cache(format!("Failed to delete {:?}: {}", path, e)))
                }
            }
        }
        Ok(removed)
    }

    async fn count_prefix(&self, prefix: &str) -> AppResult<usize> {
        let mut count = 0;
        for path in self.files_with_prefix(prefix).await? {
            if let Ok(Some(entry)) = self.read_entry(&path).await {
                if entry.key.starts_with(prefix) && entry.is_live() {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    async fn exercise(store: &dyn CacheStore) {
        store.set("ns:a", "1".into(), HOUR).await.unwrap();
        store.set("ns:b", "2".into(), HOUR).await.unwrap();
        store.set("other:c", "3".into(), HOUR).await.unwrap();

        assert_eq!(store.get("ns:a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("ns:zzz").await.unwrap(), None);
        assert_eq!(store.count_prefix("ns:").await.unwrap(), 2);

        assert!(store.delete("ns:a").await.unwrap());
        assert!(!store.delete("ns:a").await.unwrap());

        assert_eq!(store.delete_prefix("ns:").await.unwrap(), 1);
        assert_eq!(store.count_prefix("ns:").await.unwrap(), 0);
        assert_eq!(store.get("other:c").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_file_store() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().join("cache")).unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn test_expired_entries_read_as_absent() {
        let temp = TempDir::new().unwrap();
        let file = FileStore::open(temp.path()).unwrap();
        let memory = MemoryStore::new();

        let stores: [&dyn CacheStore; 2] = [&file, &memory];
        for store in stores {
            store.set("ns:k", "v".into(), Duration::ZERO).await.unwrap();
            assert_eq!(store.get("ns:k").await.unwrap(), None);
            assert_eq!(store.count_prefix("ns:").await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let temp = TempDir::new().unwrap();
        FileStore::open(temp.path())
            .unwrap()
            .set("ns:k", "persisted".into(), HOUR)
            .await
            .unwrap();

        let reopened = FileStore::open(temp.path()).unwrap();
        assert_eq!(
            reopened.get("ns:k").await.unwrap().as_deref(),
            Some("persisted")
        );
    }

    #[test]
    fn test_file_stem_is_injective_and_prefix_preserving() {
        assert_eq!(file_stem("mira:qa:ab-1"), "mira_3Aqa_3Aab-1");
        assert_eq!(file_stem("mira_qa"), "mira_5Fqa");
        assert_ne!(file_stem("mira:qa:abc"), file_stem("mira_qa:abc"));
        assert_ne!(file_stem("a:"), file_stem("a_3A"));
        assert_eq!(file_stem("é"), "_C3_A9");
        assert!(file_stem("mira:qa:abc").starts_with(&file_stem("mira:qa:")));
    }

    #[tokio::test]
    async fn test_similar_keys_do_not_share_files() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        store.set("mira:qa:abc", "mine".into(), HOUR).await.unwrap();

        assert_eq!(store.get("mira_qa:abc").await.unwrap(), None);
        assert!(!store.delete("mira_qa:abc").await.unwrap());

        store.set("mira_qa:abc", "theirs".into(), HOUR).await.unwrap();
        assert_eq!(
            store.get("mira:qa:abc").await.unwrap().as_deref(),
            Some("mine")
        );
        assert_eq!(store.delete_prefix("mira_qa:").await.unwrap(), 1);
        assert_eq!(store.count_prefix("mira:qa:").await.unwrap(), 1);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("mira:qa:ab12"), "mira_qa_ab12");
        assert!(file_stem("mira:qa:ab12").starts_with(&file_stem("mira:qa:")));
    }
}
