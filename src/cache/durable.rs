//! Durable Tier
//!
//! One JSON file per key under the cache directory, named by the SHA-256
//! digest of the raw key. Files are written to a temporary name and renamed
//! into place so readers never see a partial write.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::CacheEntry;
use crate::constants::cache as cache_constants;
use crate::types::Result;

/// On-disk record. The raw key is kept to detect digest collisions.
#[derive(Debug, Serialize, Deserialize)]
struct DurableRecord {
    key: String,
    #[serde(flatten)]
    entry: CacheEntry,
}

/// Result of a durable-tier read
#[derive(Debug)]
pub enum DurableRead {
    Found(CacheEntry),
    Missing,
    /// File exists but could not be parsed
    Corrupt(String),
}

/// Unbounded persisted tier
pub struct DurableTier {
    dir: PathBuf,
}

/// Fixed-length digest used as the durable filename stem
pub fn digest_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

fn is_entry_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e == cache_constants::DURABLE_EXTENSION)
}

impl DurableTier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(
            "{}.{}",
            digest_key(key),
            cache_constants::DURABLE_EXTENSION
        ))
    }

    pub async fn read(&self, key: &str) -> Result<DurableRead> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DurableRead::Missing),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<DurableRecord>(&content) {
            Ok(record) if record.key == key => Ok(DurableRead::Found(record.entry)),
            Ok(_) => {
                debug!("Digest collision for cache key, treating as miss");
                Ok(DurableRead::Missing)
            }
            Err(e) => Ok(DurableRead::Corrupt(e.to_string())),
        }
    }

    pub async fn write(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let record = DurableRecord {
            key: key.to_string(),
            entry: entry.clone(),
        };
        let content = serde_json::to_string(&record)?;

        let path = self.path_for(key);
        let tmp = self
            .dir
            .join(format!("{}.{}.tmp", digest_key(key), uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove the entry for a key. Returns whether a file was removed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        remove_path(&self.path_for(key)).await
    }

    /// Remove every entry file
    pub async fn clear(&self) -> Result<usize> {
        let mut count = 0;
        for path in self.entry_paths().await? {
            if remove_path(&path).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Remove expired and unreadable entries, returning how many were removed
    pub async fn sweep(&self, now_ms: i64) -> Result<usize> {
        let mut removed = 0;

        for path in self.entry_paths().await? {
            let expired = match tokio::fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<DurableRecord>(&content) {
                    Ok(record) => record.entry.is_expired(now_ms),
                    Err(e) => {
                        warn!("Removing corrupt cache file {}: {}", path.display(), e);
                        true
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Removing unreadable cache file {}: {}", path.display(), e);
                    true
                }
            };

            if expired && remove_path(&path).await? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Entry count and total size in bytes
    pub async fn usage(&self) -> Result<(usize, u64)> {
        let mut count = 0;
        let mut bytes = 0;
        for path in self.entry_paths().await? {
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                count += 1;
                bytes += metadata.len();
            }
        }
        Ok((count, bytes))
    }

    async fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_entry_file(&path) {
                paths.push(path);
            }
        }

        Ok(paths)
    }
}

async fn remove_path(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(created_at_ms: i64, ttl_secs: u64) -> CacheEntry {
        CacheEntry {
            value: json!({"text": "cached"}),
            created_at_ms,
            ttl_ms: ttl_secs * 1000,
        }
    }

    #[test]
    fn test_digest_is_fixed_length() {
        assert_eq!(digest_key("a").len(), 64);
        assert_eq!(digest_key(&"x".repeat(10_000)).len(), 64);
        assert_ne!(digest_key("a"), digest_key("b"));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let tier = DurableTier::new(temp_dir.path());

        tier.write("prompt", &entry(0, 60)).await.unwrap();
        match tier.read("prompt").await.unwrap() {
            DurableRead::Found(found) => assert_eq!(found.value, json!({"text": "cached"})),
            other => panic!("unexpected read result: {:?}", other),
        }
        assert!(matches!(
            tier.read("other").await.unwrap(),
            DurableRead::Missing
        ));
    }

    #[tokio::test]
    async fn test_read_missing_dir_is_missing() {
        let temp_dir = TempDir::new().unwrap();
        let tier = DurableTier::new(temp_dir.path().join("absent"));
        assert!(matches!(tier.read("k").await.unwrap(), DurableRead::Missing));
        assert_eq!(tier.sweep(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_and_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let tier = DurableTier::new(temp_dir.path());

        tier.write("fresh", &entry(0, 3600)).await.unwrap();
        tier.write("stale", &entry(0, 1)).await.unwrap();
        std::fs::write(temp_dir.path().join("garbage.json"), "{not json").unwrap();

        let removed = tier.sweep(10_000).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(tier.usage().await.unwrap().0, 1);
        assert!(matches!(
            tier.read("fresh").await.unwrap(),
            DurableRead::Found(_)
        ));
    }

    #[tokio::test]
    async fn test_clear_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let tier = DurableTier::new(temp_dir.path());

        tier.write("a", &entry(0, 60)).await.unwrap();
        tier.write("b", &entry(0, 60)).await.unwrap();

        assert!(tier.remove("a").await.unwrap());
        assert!(!tier.remove("a").await.unwrap());
        assert_eq!(tier.clear().await.unwrap(), 1);
        assert_eq!(tier.usage().await.unwrap(), (0, 0));
    }
}
