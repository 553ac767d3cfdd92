use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use market::{AssetId, AssetSnapshot, IconImage, OhlcSeries};
use tracing::{debug, warn};

use crate::jobs::{JobKey, JobValue};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: JobValue,
    pub inserted_at: DateTime<Utc>,
}

/// Bounded in-memory store of fetched artifacts, keyed by [`JobKey`].
///
/// Guarantees:
/// - Memory usage is bounded by `max_cached` entries.
/// - OHLC keys carry their UTC fetch day, so a new day is a miss with no
///   explicit invalidation.
/// - On overflow, evicts an entry from a past UTC day first, then the
///   oldest insertion.
///
/// Owned by the foreground context; not shared across threads.
pub struct ResultCache {
    max_cached: usize,
    map: HashMap<JobKey, CacheEntry>,
}

impl ResultCache {
    pub fn new(max_cached: usize) -> Self {
        Self {
            max_cached: max_cached.max(1),
            map: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &JobKey) -> Option<&JobValue> {
        self.map.get(key).map(|e| &e.value)
    }

    pub fn entry(&self, key: &JobKey) -> Option<&CacheEntry> {
        self.map.get(key)
    }

    /// Latest market snapshot, if one has completed.
    pub fn snapshot(&self) -> Option<Arc<Vec<AssetSnapshot>>> {
        match self.get(&JobKey::Snapshot)? {
            JobValue::Snapshot(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }

    pub fn ohlc(&self, key: &JobKey) -> Option<Arc<OhlcSeries>> {
        match self.get(key)? {
            JobValue::Ohlc(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }

    pub fn icon(&self, asset_id: &AssetId) -> Option<Arc<IconImage>> {
        match self.get(&JobKey::icon(asset_id.clone()))? {
            JobValue::Icon(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }

    /// Insert or replace the value for `key`.
    ///
    /// Returns `false` (and stores nothing) if `value` is of a different
    /// kind than `key`.
    pub fn put(&mut self, key: JobKey, value: JobValue, now: DateTime<Utc>) -> bool {
        if !value.fits(&key) {
            warn!(key = %key, value = value.kind(), "cache put rejected: kind mismatch");
            return false;
        }

        if !self.map.contains_key(&key) && self.map.len() >= self.max_cached {
            if let Some(victim) = pick_victim(&self.map, now) {
                self.map.remove(&victim);
                debug!(
                    evicted = %victim,
                    cache_size = self.map.len(),
                    "cache capacity reached; evicted entry"
                );
            }
        }

        self.map.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
        true
    }
}

/// Select an eviction victim.
/// Criteria:
/// 1) entries whose UTC day has passed
/// 2) if tie, oldest `inserted_at`
fn pick_victim(map: &HashMap<JobKey, CacheEntry>, now: DateTime<Utc>) -> Option<JobKey> {
    let today = now.date_naive();
    map.iter()
        .min_by_key(|(k, e)| (k.is_current(today), e.inserted_at))
        .map(|(k, _)| k.clone())
}
