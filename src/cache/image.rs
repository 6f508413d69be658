use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use serde::Serialize;

use super::clock::Clock;
use crate::images::Dimensions;

/// A stored image. `data` is shared so hits never copy the bytes.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub data: Arc<[u8]>,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub dimensions: Option<Dimensions>,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        content_type: impl Into<String>,
        created_at: DateTime<Utc>,
        dimensions: Option<Dimensions>,
    ) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            content_type: content_type.into(),
            created_at,
            dimensions,
        }
    }

    /// Age relative to `now`; entries stamped in the future count as brand new.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub approximate_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub ttl_seconds: u64,
}

/// In-memory image cache keyed by source URL.
///
/// Entries expire `ttl` after insertion. Reads check freshness lazily, and
/// expired entries stay in the map until the next `sweep` or `clear`.
/// There is no size bound.
#[derive(Debug, Clone)]
pub struct ImageCache {
    images: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ImageCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            images: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            clock,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the entry for `key` if it exists and has not expired.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let images = self.images.read();

        match images.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            Some(entry) => {
                debug!(
                    "Cache entry for {} expired {}s ago, awaiting sweep",
                    key,
                    entry.age(now).saturating_sub(self.ttl).as_secs()
                );
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts `entry` under its key, replacing whatever was there.
    pub fn put(&self, entry: CacheEntry) {
        let mut images = self.images.write();
        images.insert(entry.key.clone(), entry);
    }

    /// Removes every entry whose age at `now` is at least the TTL.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut images = self.images.write();
        let before = images.len();
        images.retain(|_, entry| entry.is_fresh(now, self.ttl));
        let removed = before - images.len();

        if removed > 0 {
            info!(
                "Cache sweep removed {} expired entries, {} remaining",
                removed,
                images.len()
            );
        } else {
            debug!("Cache sweep found nothing to remove ({} entries)", images.len());
        }

        removed
    }

    /// Drops all entries and reports how many there were.
    pub fn clear(&self) -> usize {
        let mut images = self.images.write();
        let cleared = images.len();
        images.clear();
        info!("Cache cleared, {} entries removed", cleared);
        cleared
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let images = self.images.read();
        CacheStats {
            entries: images.len(),
            approximate_bytes: images.values().map(|e| e.data.len() as u64).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}
