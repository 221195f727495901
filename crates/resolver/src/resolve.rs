//! Entity → location record.
//!
//! Phone first (area-code table), address second (municipality centroid,
//! then the geocoder). A failed attempt still yields a record, tagged
//! `unresolved`, so a batch pass can persist what it learned.

use chrono::{DateTime, Utc};

use crate::address::{self, address_key, AddressParts};
use crate::area_code::AreaCodeTable;
use crate::error::{GeocodeError, LocateError};
use crate::model::{Entity, GeoPoint, LocationRecord, Place, Resolution, UnresolvedReason};
use crate::phone::PhoneNumber;
use crate::prefecture;

/// External address → coordinate service.
///
/// `&mut self` serializes calls: implementations rate-limit and cache, and
/// the borrow checker keeps a single caller at a time.
pub trait Geocoder {
    /// `Ok(None)` when the service answered but found nothing.
    fn geocode(&mut self, address: &str) -> Result<Option<GeoPoint>, GeocodeError>;
}

impl<G: Geocoder + ?Sized> Geocoder for &mut G {
    fn geocode(&mut self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        (**self).geocode(address)
    }
}

/// Precomputed municipality centroids, consulted before any geocoder call.
pub trait CentroidLookup {
    fn centroid(&self, prefecture: &str, city: &str) -> Option<GeoPoint>;
}

/// Result of one resolution attempt for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub record: LocationRecord,
    /// Why the record is unresolved. `None` on success.
    pub error: Option<LocateError>,
}

impl Attempt {
    fn done(entity: &Entity, resolution: Resolution, now: DateTime<Utc>) -> Self {
        Self {
            record: LocationRecord::new(entity.id.clone(), resolution, now),
            error: None,
        }
    }

    fn failed(entity: &Entity, err: LocateError, now: DateTime<Utc>) -> Self {
        let reason = UnresolvedReason::from(&err);
        Self {
            record: LocationRecord::new(entity.id.clone(), Resolution::Unresolved { reason }, now),
            error: Some(err),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Resolver {
    table: AreaCodeTable,
}

impl Resolver {
    pub fn new(table: AreaCodeTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AreaCodeTable {
        &self.table
    }

    /// Area-code resolution of a raw phone number. Pure.
    pub fn resolve_phone(&self, raw: &str) -> Result<Resolution, LocateError> {
        let phone = PhoneNumber::parse(raw);
        let entry = self.table.resolve(&phone)?;
        Ok(Resolution::AreaCode {
            prefix: entry.prefix.clone(),
            place: entry.place(),
            point: entry.centroid,
        })
    }

    /// Municipality-granularity resolution of a free-text address.
    ///
    /// Prefecture-only addresses use the prefectural capital centroid.
    /// Otherwise the centroid store is consulted first and the geocoder only
    /// on a miss.
    pub fn resolve_address(
        &self,
        text: &str,
        geocoder: Option<&mut dyn Geocoder>,
        centroids: Option<&dyn CentroidLookup>,
    ) -> Result<Resolution, LocateError> {
        let parts = address::parse_address(text)?;
        let query = parts.query();
        let key = address_key(&query);

        let Some(city) = parts.city.as_deref() else {
            let pref = prefecture::lookup(&parts.prefecture)
                .ok_or_else(|| LocateError::InvalidAddressFormat(text.to_string()))?;
            return Ok(Resolution::Geocoded {
                address_key: key,
                place: Place::prefecture_only(pref.name),
                point: pref.centroid,
            });
        };

        if let Some(point) = centroids.and_then(|c| c.centroid(&parts.prefecture, city)) {
            log::debug!("centroid store hit for {query}");
            return Ok(geocoded(&parts, key, point));
        }

        let Some(geocoder) = geocoder else {
            return Err(LocateError::GeocodeUnavailable {
                query,
                reason: "not in municipality store and no geocoder configured".into(),
            });
        };
        match geocoder.geocode(&query) {
            Ok(Some(point)) => Ok(geocoded(&parts, key, point)),
            Ok(None) => Err(LocateError::GeocodeUnavailable { query, reason: "no result".into() }),
            Err(e) => Err(LocateError::GeocodeUnavailable { query, reason: e.to_string() }),
        }
    }

    /// Phone first. Non-geographic numbers fall through to the address when
    /// one exists and some address source (store or geocoder) is available.
    pub fn locate_by_phone(
        &self,
        entity: &Entity,
        geocoder: Option<&mut dyn Geocoder>,
        centroids: Option<&dyn CentroidLookup>,
        now: DateTime<Utc>,
    ) -> Attempt {
        let Some(raw) = entity.phone.as_deref().filter(|p| !p.trim().is_empty()) else {
            return self.locate_by_address(entity, geocoder, centroids, now);
        };
        match self.resolve_phone(raw) {
            Ok(resolution) => Attempt::done(entity, resolution, now),
            Err(err @ LocateError::NotGeographic { .. }) => {
                let has_source = geocoder.is_some() || centroids.is_some();
                if has_source && has_address(entity) {
                    self.locate_by_address(entity, geocoder, centroids, now)
                } else {
                    Attempt::failed(entity, err, now)
                }
            }
            Err(err) => Attempt::failed(entity, err, now),
        }
    }

    pub fn locate_by_address(
        &self,
        entity: &Entity,
        geocoder: Option<&mut dyn Geocoder>,
        centroids: Option<&dyn CentroidLookup>,
        now: DateTime<Utc>,
    ) -> Attempt {
        let Some(text) = entity.address.as_deref().filter(|_| has_address(entity)) else {
            return Attempt::failed(entity, LocateError::NoSignal, now);
        };
        match self.resolve_address(text, geocoder, centroids) {
            Ok(resolution) => Attempt::done(entity, resolution, now),
            Err(err) => {
                log::warn!("entity {}: {}", entity.id, err);
                Attempt::failed(entity, err, now)
            }
        }
    }
}

fn has_address(entity: &Entity) -> bool {
    entity.address.as_deref().is_some_and(|a| !a.trim().is_empty())
}

fn geocoded(parts: &AddressParts, address_key: String, point: GeoPoint) -> Resolution {
    Resolution::Geocoded { address_key, place: parts.place(), point }
}
