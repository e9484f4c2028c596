// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Cache store for aggregated statistics
//!
//! Entries are keyed `<cache_key>:<stat name>` and never expire; they are
//! only overwritten by a recompute or deleted by invalidation.

use crate::error::Result;
use crate::stat::StatName;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Key/value store with atomic per-key operations
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub fn stat_key(cache_key: &str, name: StatName) -> String {
    format!("{}:{}", cache_key, name.as_str())
}

/// Operation counters for [`MemoryCacheStore`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
}

/// Process-local cache store
#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    stats: Arc<Mutex<CacheStats>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        *self.stats.lock().await
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Raw presence check that does not touch the hit/miss counters
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
        debug!("MemoryCacheStore: cleared");
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.entries.lock().await.get(key).cloned();
        let mut stats = self.stats.lock().await;
        if value.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        _ = self.entries.lock().await.insert(key.to_string(), value);
        self.stats.lock().await.sets += 1;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.entries.lock().await.remove(key).is_some() {
            self.stats.lock().await.deletes += 1;
            debug!("MemoryCacheStore: deleted {}", key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_key() {
        assert_eq!(
            stat_key("/af/tutorial/", StatName::LastAction),
            "/af/tutorial/:last_action"
        );
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let cache = MemoryCacheStore::new();
        assert_eq!(cache.get("a").await.unwrap(), None);
        cache.set("a", b"1".to_vec()).await.unwrap();
        cache.set("a", b"2".to_vec()).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some(b"2".to_vec()));
        cache.delete("a").await.unwrap();
        cache.delete("a").await.unwrap();
        assert!(cache.is_empty().await);

        assert_eq!(
            cache.cache_stats().await,
            CacheStats {
                hits: 1,
                misses: 1,
                sets: 2,
                deletes: 1,
            }
        );
    }
}
