//! Persistent geocoding cache.
//!
//! Public geocoders are slow and rate-limited, and a guide is exported many
//! times with mostly unchanged addresses. Successful lookups are kept in the
//! key-value store under [`CACHE_KEY`] and reused on the next export.
//!
//! ## Cache keys
//!
//! One entry per `(address, maps URL)` pair:
//!
//! ```text
//! "<normalized address, or label when there is no address>|<maps URL>"
//! ```
//!
//! The address part is the normalized query form, so trivially different
//! spellings ("Bd." vs "Boulevard") share an entry. Coordinates taken from
//! the maps URL itself are never cached; they are free to recompute.
//!
//! ## Storage
//!
//! ```json
//! { "version": 2, "entries": { "<key>": { "lat": 48.8, "lng": 2.3, "cachedAt": 1700000000000 } } }
//! ```
//!
//! A bare `{ "<key>": { "lat", "lng" } }` map, the format written before
//! versioning, is still read; its entries count as cached at time zero.
//! Anything else (corruption, future version) loads as an empty cache.
//! Storage errors never fail an export: they are logged and the cache
//! behaves as empty.

use super::backend::Coordinates;
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store key holding the cache document.
pub const CACHE_KEY: &str = "geocodeCacheV2";

/// Bump to invalidate every existing cache when the key format changes.
const CACHE_VERSION: u32 = 2;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub cached_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

/// Cache key for a point.
pub fn cache_key(address_or_label: &str, maps_url: Option<&str>) -> String {
    format!("{}|{}", address_or_label, maps_url.unwrap_or_default())
}

/// Geocoding cache backed by a [`KeyValueStore`], loaded lazily.
pub struct GeocodeCache<S: KeyValueStore> {
    store: S,
    entries: Option<BTreeMap<String, CacheEntry>>,
    max_age_ms: Option<i64>,
}

impl<S: KeyValueStore> GeocodeCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            entries: None,
            max_age_ms: None,
        }
    }

    /// Ignore entries older than `days`.
    pub fn with_max_age_days(mut self, days: Option<u32>) -> Self {
        self.max_age_ms = days.map(|d| i64::from(d) * DAY_MS);
        self
    }

    fn entries(&mut self) -> &mut BTreeMap<String, CacheEntry> {
        let store = &self.store;
        self.entries.get_or_insert_with(|| load_entries(store))
    }

    pub fn len(&mut self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Cached coordinates for `key` that are still fresh at `now` (ms).
    pub fn get_at(&mut self, key: &str, now: i64) -> Option<Coordinates> {
        let max_age = self.max_age_ms;
        let entry = *self.entries().get(key)?;
        if max_age.is_some_and(|age| now.saturating_sub(entry.cached_at) > age) {
            tracing::debug!(key, "cache entry expired");
            return None;
        }
        Coordinates::new(entry.lat, entry.lng)
    }

    pub fn get(&mut self, key: &str) -> Option<Coordinates> {
        self.get_at(key, crate::guide::now_millis())
    }

    /// Record a successful lookup and persist the cache.
    pub fn insert_at(&mut self, key: &str, coords: Coordinates, now: i64) {
        self.entries().insert(
            key.to_string(),
            CacheEntry {
                lat: coords.lat,
                lng: coords.lng,
                cached_at: now,
            },
        );
        self.persist();
    }

    pub fn insert(&mut self, key: &str, coords: Coordinates) {
        self.insert_at(key, coords, crate::guide::now_millis());
    }

    /// Drop one entry. Returns whether it existed.
    pub fn invalidate(&mut self, key: &str) -> bool {
        let existed = self.entries().remove(key).is_some();
        if existed {
            self.persist();
        }
        existed
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries = Some(BTreeMap::new());
        if let Err(e) = self.store.remove(CACHE_KEY) {
            tracing::warn!(error = %e, "failed to clear geocoding cache");
        }
    }

    fn persist(&mut self) {
        let doc = CacheDocument {
            version: CACHE_VERSION,
            entries: self.entries().clone(),
        };
        let result = serde_json::to_string(&doc)
            .map_err(crate::store::StoreError::from)
            .and_then(|json| self.store.set(CACHE_KEY, json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist geocoding cache");
        }
    }
}

fn load_entries<S: KeyValueStore>(store: &S) -> BTreeMap<String, CacheEntry> {
    let raw = match store.get(CACHE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read geocoding cache");
            return BTreeMap::new();
        }
    };
    if let Ok(doc) = serde_json::from_str::<CacheDocument>(&raw) {
        if doc.version == CACHE_VERSION {
            return doc.entries;
        }
        tracing::debug!(version = doc.version, "ignoring geocoding cache with other version");
        return BTreeMap::new();
    }
    serde_json::from_str::<BTreeMap<String, CacheEntry>>(&raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn coords(lat: f64, lng: f64) -> Coordinates {
        Coordinates { lat, lng }
    }

    #[test]
    fn empty_store_means_empty_cache() {
        let mut cache = GeocodeCache::new(MemoryStore::new());
        assert!(cache.is_empty());
        assert_eq!(cache.get("a|"), None);
    }

    #[test]
    fn insert_persists_versioned_document() {
        let mut store = MemoryStore::new();
        {
            let mut cache = GeocodeCache::new(&mut store);
            cache.insert_at("1 Rue A, France|", coords(48.0, 2.0), 1_000);
        }
        let raw = store.get(CACHE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["entries"]["1 Rue A, France|"]["cachedAt"], 1_000);

        let mut reloaded = GeocodeCache::new(store);
        assert_eq!(reloaded.get("1 Rue A, France|"), Some(coords(48.0, 2.0)));
    }

    #[test]
    fn reads_unversioned_map() {
        let mut store = MemoryStore::new();
        store
            .set(CACHE_KEY, r#"{"Gare, France|":{"lat":45.0,"lng":4.0}}"#.into())
            .unwrap();
        let mut cache = GeocodeCache::new(store);
        assert_eq!(cache.get("Gare, France|"), Some(coords(45.0, 4.0)));
    }

    #[test]
    fn corrupt_or_foreign_version_loads_empty() {
        let mut store = MemoryStore::new();
        store.set(CACHE_KEY, "{oops".into()).unwrap();
        assert!(GeocodeCache::new(store.clone()).is_empty());

        store
            .set(CACHE_KEY, r#"{"version":99,"entries":{}}"#.into())
            .unwrap();
        assert!(GeocodeCache::new(store).is_empty());
    }

    #[test]
    fn expired_entries_are_ignored() {
        let mut cache = GeocodeCache::new(MemoryStore::new()).with_max_age_days(Some(1));
        cache.insert_at("k|", coords(1.0, 1.0), 0);
        assert_eq!(cache.get_at("k|", DAY_MS), Some(coords(1.0, 1.0)));
        assert_eq!(cache.get_at("k|", DAY_MS + 1), None);
    }

    #[test]
    fn absurd_timestamps_read_as_expired() {
        let mut cache = GeocodeCache::new(MemoryStore::new()).with_max_age_days(Some(30));
        cache.insert_at("k|", coords(1.0, 1.0), i64::MIN);
        assert_eq!(cache.get_at("k|", 1_741_780_800_000), None);
    }

    #[test]
    fn invalidate_and_clear() {
        let mut store = MemoryStore::new();
        let mut cache = GeocodeCache::new(&mut store);
        cache.insert_at("a|", coords(1.0, 1.0), 0);
        cache.insert_at("b|", coords(2.0, 2.0), 0);
        assert!(cache.invalidate("a|"));
        assert!(!cache.invalidate("a|"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        drop(cache);
        assert_eq!(store.get(CACHE_KEY).unwrap(), None);
    }

    #[test]
    fn cache_key_format() {
        assert_eq!(cache_key("1 Rue A, France", None), "1 Rue A, France|");
        assert_eq!(
            cache_key("Plage", Some("https://maps.example/x")),
            "Plage|https://maps.example/x"
        );
    }
}
