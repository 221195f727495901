//! Municipality coordinate store.
//!
//! Precomputed centroids keyed by `(prefecture, city)`, where designated-city
//! wards carry the concatenated name (`大阪市北区`). Persisted as a JSON
//! array, built incrementally from the reference dataset, and resumable:
//! keys already present are never geocoded again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use locus_resolver::{CentroidLookup, GeoPoint, Geocoder, LocateError};

use crate::cache::write_json_atomic;
use crate::error::DataError;
use crate::reference::ReferenceRow;

const LAT_RANGE: (f64, f64) = (24.0, 46.0);
const LNG_RANGE: (f64, f64) = (123.0, 146.0);

/// Inside Japan's bounding box.
pub fn in_japan(lat: f64, lng: f64) -> bool {
    (LAT_RANGE.0..=LAT_RANGE.1).contains(&lat) && (LNG_RANGE.0..=LNG_RANGE.1).contains(&lng)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityCoordinate {
    #[serde(default)]
    pub code: String,
    pub prefecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    /// Key city (designated-city wards already concatenated).
    pub city: String,
    pub lat: f64,
    pub lng: f64,
}

impl MunicipalityCoordinate {
    fn key(&self) -> (String, String) {
        (self.prefecture.clone(), self.city.clone())
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManualOverride {
    #[serde(default)]
    pub code: String,
    pub prefecture: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverrideReport {
    pub applied: usize,
    #[serde(serialize_with = "errors_as_strings")]
    pub rejected: Vec<LocateError>,
}

fn errors_as_strings<S: serde::Serializer>(errors: &[LocateError], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(errors.iter().map(|e| e.to_string()))
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Persist after this many geocoded rows. Zero flushes only at the end.
    pub flush_every: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { flush_every: 50 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    /// Already in the store, no geocoder call.
    pub skipped: usize,
    pub geocoded: usize,
    /// `(query, reason)` for rows the geocoder could not place.
    pub failed: Vec<(String, String)>,
}

/// Expected reference keys that the store lacks, grouped by prefecture.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Completeness {
    pub expected: usize,
    pub present: usize,
    pub missing: BTreeMap<String, Vec<String>>,
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Default)]
pub struct MunicipalityStore {
    path: Option<PathBuf>,
    rows: BTreeMap<(String, String), MunicipalityCoordinate>,
    dirty: bool,
}

impl MunicipalityStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store file. A missing file starts an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DataError> {
        let path = path.into();
        let mut store = Self { path: Some(path.clone()), ..Self::default() };
        match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => {}
            Ok(text) => {
                let rows: Vec<MunicipalityCoordinate> =
                    serde_json::from_str(&text).map_err(|e| DataError::parse(&path, e))?;
                store.merge(rows);
                store.dirty = false;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(DataError::io(&path, e)),
        }
        Ok(store)
    }

    /// Merge rows by key. Later rows replace earlier ones.
    pub fn merge(&mut self, rows: impl IntoIterator<Item = MunicipalityCoordinate>) {
        for row in rows {
            self.rows.insert(row.key(), row);
            self.dirty = true;
        }
    }

    pub fn get(&self, prefecture: &str, city: &str) -> Option<&MunicipalityCoordinate> {
        self.rows.get(&(prefecture.to_string(), city.to_string()))
    }

    /// Stored centroid, without any geocoder call.
    pub fn lookup(&self, prefecture: &str, city: &str) -> Option<GeoPoint> {
        self.get(prefecture, city).map(MunicipalityCoordinate::point)
    }

    pub fn contains(&self, prefecture: &str, city: &str) -> bool {
        self.get(prefecture, city).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MunicipalityCoordinate> {
        self.rows.values()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn flush(&mut self) -> Result<(), DataError> {
        let Some(path) = &self.path else {
            self.dirty = false;
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        let rows: Vec<&MunicipalityCoordinate> = self.rows.values().collect();
        write_json_atomic(path, &rows)?;
        log::info!("municipality store: {} rows written to {}", rows.len(), path.display());
        self.dirty = false;
        Ok(())
    }

    /// Geocode every reference row whose key is not stored yet.
    ///
    /// Resumable: an interrupted build keeps everything flushed so far, and
    /// rerunning it on an unchanged store makes zero geocoder calls.
    pub fn build<G: Geocoder + ?Sized>(
        &mut self,
        rows: &[ReferenceRow],
        geocoder: &mut G,
        options: &BuildOptions,
    ) -> Result<BuildReport, DataError> {
        let mut report = BuildReport::default();
        let mut since_flush = 0usize;

        for row in rows {
            let (prefecture, city) = row.key();
            if self.contains(&prefecture, &city) {
                report.skipped += 1;
                continue;
            }
            let query = row.query();
            match geocoder.geocode(&query) {
                Ok(Some(point)) => {
                    self.merge([MunicipalityCoordinate {
                        code: row.code.clone(),
                        prefecture,
                        district: row.district.clone(),
                        city,
                        lat: point.lat,
                        lng: point.lng,
                    }]);
                    report.geocoded += 1;
                    since_flush += 1;
                }
                Ok(None) => {
                    log::warn!("municipality build: no result for {query}");
                    report.failed.push((query, "no result".into()));
                }
                Err(e) => {
                    log::warn!("municipality build: {query}: {e}");
                    report.failed.push((query, e.to_string()));
                }
            }
            if options.flush_every > 0 && since_flush >= options.flush_every {
                self.flush()?;
                since_flush = 0;
            }
        }

        self.flush()?;
        Ok(report)
    }

    /// Diff the expected reference keys against the store.
    pub fn check(&self, rows: &[ReferenceRow]) -> Completeness {
        let mut result = Completeness::default();
        let mut seen = std::collections::BTreeSet::new();
        for row in rows {
            let (prefecture, city) = row.key();
            if !seen.insert((prefecture.clone(), city.clone())) {
                continue;
            }
            result.expected += 1;
            if self.contains(&prefecture, &city) {
                result.present += 1;
            } else {
                result.missing.entry(prefecture).or_default().push(city);
            }
        }
        result
    }

    /// Merge hand-entered coordinates. Points outside Japan are rejected;
    /// accepted ones replace any existing row for the key.
    pub fn apply_overrides(&mut self, overrides: &[ManualOverride]) -> OverrideReport {
        let mut report = OverrideReport::default();
        for o in overrides {
            if !in_japan(o.lat, o.lng) {
                report.rejected.push(LocateError::InvalidOverrideCoordinate {
                    prefecture: o.prefecture.clone(),
                    city: o.city.clone(),
                    lat: o.lat,
                    lng: o.lng,
                });
                continue;
            }
            let district = self.get(&o.prefecture, &o.city).and_then(|r| r.district.clone());
            self.merge([MunicipalityCoordinate {
                code: o.code.clone(),
                prefecture: o.prefecture.clone(),
                district,
                city: o.city.clone(),
                lat: o.lat,
                lng: o.lng,
            }]);
            report.applied += 1;
        }
        report
    }
}

impl CentroidLookup for MunicipalityStore {
    fn centroid(&self, prefecture: &str, city: &str) -> Option<GeoPoint> {
        self.lookup(prefecture, city)
    }
}

pub fn load_overrides(path: &Path) -> Result<Vec<ManualOverride>, DataError> {
    if !path.exists() {
        return Err(DataError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| DataError::parse(path, e))
}
