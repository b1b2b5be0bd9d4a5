// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk-backed cache of remote parse/validate results using cacache.

use crate::error::CacheError;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Content-addressable result cache with a time-to-live.
#[derive(Debug, Clone)]
pub struct ResultCache {
    cache_dir: PathBuf,
    ttl: Duration,
}

impl ResultCache {
    /// Open (and create if needed) a cache in `cache_dir`.
    pub async fn new(cache_dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        tokio::fs::create_dir_all(&cache_dir).await?;
        Ok(Self { cache_dir, ttl })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache key for `operation` over `data` (SHA-256 of the content).
    pub fn key(operation: &str, data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{}-{}", operation, hex::encode(hasher.finalize()))
    }

    /// Get a cached value. Expired entries are removed and reported as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(metadata) = cacache::metadata(&self.cache_dir, key).await? else {
            return Ok(None);
        };

        if is_expired(metadata.time, now_millis(), self.ttl) {
            cacache::remove(&self.cache_dir, key).await?;
            return Ok(None);
        }

        match cacache::read(&self.cache_dir, key).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a cached value.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let data = serde_json::to_vec(value)?;
        cacache::write(&self.cache_dir, key, &data).await?;
        Ok(())
    }

    /// Clear all cached entries.
    pub async fn clear(&self) -> Result<(), CacheError> {
        cacache::clear(&self.cache_dir).await?;
        Ok(())
    }
}

fn now_millis() -> u128 {
    chrono::Utc::now().timestamp_millis().max(0) as u128
}

/// Whether an entry written at `written_ms` is older than `ttl` at `now_ms`.
fn is_expired(written_ms: u128, now_ms: u128, ttl: Duration) -> bool {
    now_ms.saturating_sub(written_ms) > ttl.as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_ingest_core::{EntityCounts, Metadata, ParseResult};

    #[test]
    fn test_key_is_content_addressed() {
        let a = ResultCache::key("parse", b"ISO-10303-21;");
        let b = ResultCache::key("parse", b"ISO-10303-21;");
        let c = ResultCache::key("validate", b"ISO-10303-21;");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("parse-"));
        assert_eq!(a.len(), "parse-".len() + 64);
    }

    #[test]
    fn test_is_expired() {
        let ttl = Duration::from_secs(60);
        assert!(!is_expired(1_000, 1_000, ttl));
        assert!(!is_expired(1_000, 61_000, ttl));
        assert!(is_expired(1_000, 61_001, ttl));
        // Clock skew never expires an entry.
        assert!(!is_expired(5_000, 1_000, ttl));
    }

    #[tokio::test]
    async fn test_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join("results"), Duration::from_secs(3600))
            .await
            .unwrap();

        let counts = EntityCounts {
            buildings: 1,
            walls: 3,
            ..Default::default()
        };
        let result = ParseResult::from_counts(counts, Vec::new(), Metadata::default());
        let key = ResultCache::key("parse", b"model");

        assert!(cache.get::<ParseResult>(&key).await.unwrap().is_none());
        cache.set(&key, &result).await.unwrap();

        let cached: ParseResult = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(cached.counts, counts);
        assert_eq!(cached.total_entities, 4);

        cache.clear().await.unwrap();
        assert!(cache.get::<ParseResult>(&key).await.unwrap().is_none());
    }
}
