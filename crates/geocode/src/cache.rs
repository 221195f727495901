//! Persistent geocode cache.
//!
//! One JSON object on disk: `{address_key: {lat, lng, fetched_at}}`. Entries
//! never expire; a successful answer is reused by every later run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use locus_resolver::address::address_key;
use locus_resolver::{GeoPoint, GeocodeError, Geocoder};

use crate::error::DataError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub lat: f64,
    pub lng: f64,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Serialize `value` to a sibling temp file, then rename over `path`.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| DataError::parse(path, e))?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json).map_err(|e| DataError::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| DataError::io(path, e))
}

#[derive(Debug, Default)]
pub struct GeocodeCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

impl GeocodeCache {
    /// Cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file is an empty cache; it is created on
    /// the first flush.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DataError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| DataError::parse(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(DataError::io(&path, e)),
        };
        Ok(Self { path: Some(path), entries, dirty: false })
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, point: GeoPoint, fetched_at: DateTime<Utc>) {
        self.entries.insert(key, CacheEntry { lat: point.lat, lng: point.lng, fetched_at });
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write to disk if anything changed since the last flush.
    pub fn flush(&mut self) -> Result<(), DataError> {
        let Some(path) = &self.path else {
            self.dirty = false;
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        write_json_atomic(path, &self.entries)?;
        log::info!("geocode cache: {} entries written to {}", self.entries.len(), path.display());
        self.dirty = false;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub api_calls: u64,
}

/// Read-through cache in front of any [`Geocoder`].
///
/// Only successful lookups are stored; failures and empty answers are
/// retried by the next run.
pub struct CachedGeocoder<G> {
    inner: G,
    cache: GeocodeCache,
    stats: CacheStats,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G, cache: GeocodeCache) -> Self {
        Self { inner, cache, stats: CacheStats::default() }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn flush(&mut self) -> Result<(), DataError> {
        self.cache.flush()
    }

    pub fn into_parts(self) -> (G, GeocodeCache) {
        (self.inner, self.cache)
    }
}

impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    fn geocode(&mut self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let key = address_key(address);
        if let Some(entry) = self.cache.get(&key) {
            self.stats.hits += 1;
            log::debug!("geocode cache hit: {key}");
            return Ok(Some(entry.point()));
        }
        self.stats.misses += 1;
        self.stats.api_calls += 1;
        let point = self.inner.geocode(address)?;
        if let Some(p) = point {
            self.cache.insert(key, p, Utc::now());
        }
        Ok(point)
    }
}
