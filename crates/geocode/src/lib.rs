//! `locus-geocode`: everything that talks to the geocoding service or
//! persists what it answered.
//!
//! - [`HttpGeocoder`]: rate-limited HTTP client with retry
//! - [`GeocodeCache`] / [`CachedGeocoder`]: persistent read-through cache
//! - [`MunicipalityStore`]: precomputed municipality centroids, built from
//!   the reference dataset and used before any API call

pub mod cache;
pub mod client;
pub mod error;
pub mod municipality;
pub mod reference;

pub use cache::{CacheEntry, CacheStats, CachedGeocoder, GeocodeCache};
pub use client::{ClientOptions, HttpGeocoder};
pub use error::DataError;
pub use locus_resolver::{GeocodeError, Geocoder};
pub use municipality::{
    BuildOptions, BuildReport, Completeness, ManualOverride, MunicipalityCoordinate,
    MunicipalityStore, OverrideReport,
};
pub use reference::{ColumnMap, ReferenceRow};
