// Client-side local cache.
// Persists the last good repository list for an instant first render; every failure reads as a miss.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::KvStore;
use crate::github::RepositorySummary;
use crate::github::types::deserialize_loose_list;

/// What is persisted under the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCacheRecord {
    /// Must be a sequence; elements are projected loosely.
    #[serde(deserialize_with = "deserialize_loose_list")]
    pub repos: Vec<RepositorySummary>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

impl LocalCacheRecord {
    pub fn new(repos: Vec<RepositorySummary>) -> Self {
        Self {
            repos,
            generated_at: Some(Utc::now()),
        }
    }
}

/// Best-effort cache over a persistent key-value store.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn KvStore>,
    key: String,
}

impl LocalCache {
    pub fn new(store: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Load the stored record.
    ///
    /// Returns `None` when nothing is stored, the store fails, the bytes are
    /// not JSON, or `repos` is missing or not a list.
    pub async fn read(&self) -> Option<LocalCacheRecord> {
        let bytes = match self.store.get(&self.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                debug!(key = %self.key, error = %e, "local cache read failed");
                return None;
            }
        };

        match serde_json::from_slice::<LocalCacheRecord>(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(key = %self.key, error = %e, "ignoring unreadable local cache");
                None
            }
        }
    }

    /// Persist `record`, overwriting whatever was there. Failures are swallowed.
    pub async fn write(&self, record: &LocalCacheRecord) {
        let bytes = match serde_json::to_vec(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(key = %self.key, error = %e, "could not encode local cache");
                return;
            }
        };
        if let Err(e) = self.store.put(&self.key, bytes, None).await {
            debug!(key = %self.key, error = %e, "local cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileStore, MemoryStore};
    use crate::error::{Result, ShelfError};
    use crate::gateway::swr::tests::summary;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Store that rejects every operation, like a full or disabled localStorage.
    struct BrokenStore;

    #[async_trait]
    impl KvStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(ShelfError::Other("storage disabled".to_string()))
        }

        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            Err(ShelfError::Other("quota exceeded".to_string()))
        }
    }

    fn memory_cache() -> (LocalCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (LocalCache::new(store.clone(), "repos-cache-v1"), store)
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let (cache, _store) = memory_cache();
        assert!(cache.read().await.is_none());
    }

    #[tokio::test]
    async fn test_read_not_json_is_none() {
        let (cache, store) = memory_cache();
        store
            .put("repos-cache-v1", b"not json".to_vec(), None)
            .await
            .unwrap();

        assert!(cache.read().await.is_none());
    }

    #[tokio::test]
    async fn test_read_schema_mismatch_is_none() {
        let (cache, store) = memory_cache();
        store
            .put("repos-cache-v1", br#"{"repos": "nope"}"#.to_vec(), None)
            .await
            .unwrap();
        assert!(cache.read().await.is_none());

        store
            .put("repos-cache-v1", br#"{"generated_at": null}"#.to_vec(), None)
            .await
            .unwrap();
        assert!(cache.read().await.is_none());
    }

    #[tokio::test]
    async fn test_read_tolerates_missing_timestamp() {
        let (cache, store) = memory_cache();
        store
            .put("repos-cache-v1", br#"{"repos": []}"#.to_vec(), None)
            .await
            .unwrap();

        let record = cache.read().await.unwrap();
        assert!(record.repos.is_empty());
        assert!(record.generated_at.is_none());
    }

    #[tokio::test]
    async fn test_read_accepts_sparse_records() {
        let (cache, store) = memory_cache();
        store
            .put(
                "repos-cache-v1",
                br#"{"repos":[{"name":"x"}, 7],"generated_at":"2024-01-01T00:00:00Z"}"#.to_vec(),
                None,
            )
            .await
            .unwrap();

        let record = cache.read().await.unwrap();
        assert_eq!(record.repos.len(), 1);
        assert_eq!(record.repos[0].name, "x");
        assert!(record.generated_at.is_some());
    }

    #[tokio::test]
    async fn test_write_then_read_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::new(Arc::new(FileStore::new(temp_dir.path())), "repos-cache-v1");
        let record = LocalCacheRecord::new(vec![summary("a"), summary("b")]);

        cache.write(&record).await;

        // A fresh handle over the same directory simulates a reload.
        let reloaded = LocalCache::new(Arc::new(FileStore::new(temp_dir.path())), "repos-cache-v1");
        assert_eq!(reloaded.read().await, Some(record));
    }

    #[tokio::test]
    async fn test_broken_store_is_absorbed() {
        let cache = LocalCache::new(Arc::new(BrokenStore), "repos-cache-v1");

        cache.write(&LocalCacheRecord::new(vec![summary("a")])).await;
        assert!(cache.read().await.is_none());
    }
}
