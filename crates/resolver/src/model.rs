use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LocateError;
use crate::phone::PhoneClass;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Latitude/longitude pair in degrees. Always `lat` first inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a GeoJSON coordinate array, which is ordered `[lng, lat]`.
    ///
    /// This is the only place the engine deals with that ordering. Returns
    /// `None` for arrays shorter than two elements or non-finite values.
    pub fn from_geojson(coordinates: &[f64]) -> Option<Self> {
        match coordinates {
            [lng, lat, ..] if lat.is_finite() && lng.is_finite() => Some(Self::new(*lat, *lng)),
            _ => None,
        }
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        crate::distance::haversine_km(self, other)
    }
}

// ---------------------------------------------------------------------------
// Identity + places
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prefecture with an optional municipality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Place {
    pub prefecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl Place {
    pub fn new(prefecture: impl Into<String>, city: Option<String>) -> Self {
        Self { prefecture: prefecture.into(), city }
    }

    pub fn prefecture_only(prefecture: impl Into<String>) -> Self {
        Self { prefecture: prefecture.into(), city: None }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.city {
            Some(city) => write!(f, "{}{}", self.prefecture, city),
            None => f.write_str(&self.prefecture),
        }
    }
}

// ---------------------------------------------------------------------------
// Location record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    AreaCode,
    Geocoded,
    ManualOverride,
    Unresolved,
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AreaCode => write!(f, "area_code"),
            Self::Geocoded => write!(f, "geocoded"),
            Self::ManualOverride => write!(f, "manual_override"),
            Self::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// Why a record was overridden. Both variants keep the place they replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideReason {
    /// Exactly one declared service area outranked the inferred prefecture.
    ServiceArea { replaced: Place },
    /// A known-bad-prefix rule rewrote the inferred prefecture.
    CorrectionRule { rule: String, replaced: Place },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnresolvedReason {
    NotGeographic { class: PhoneClass },
    NoAreaCodeMatch { prefix: String },
    InvalidAddress,
    GeocodeUnavailable,
    NoSignal,
}

impl From<&LocateError> for UnresolvedReason {
    fn from(err: &LocateError) -> Self {
        match err {
            LocateError::NotGeographic { class, .. } => Self::NotGeographic { class: *class },
            LocateError::NoAreaCodeMatch { longest_prefix, .. } => Self::NoAreaCodeMatch {
                prefix: longest_prefix.clone(),
            },
            LocateError::InvalidAddressFormat(_) => Self::InvalidAddress,
            LocateError::GeocodeUnavailable { .. } => Self::GeocodeUnavailable,
            _ => Self::NoSignal,
        }
    }
}

/// How an entity's location was obtained. Each method carries the fields it
/// requires, so an area-code resolution can never lack its prefix and an
/// unresolved record can never carry coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Resolution {
    AreaCode {
        prefix: String,
        place: Place,
        point: GeoPoint,
    },
    Geocoded {
        address_key: String,
        place: Place,
        point: GeoPoint,
    },
    ManualOverride {
        place: Place,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        point: Option<GeoPoint>,
        reason: OverrideReason,
    },
    Unresolved {
        reason: UnresolvedReason,
    },
}

impl Resolution {
    pub fn method(&self) -> ResolutionMethod {
        match self {
            Self::AreaCode { .. } => ResolutionMethod::AreaCode,
            Self::Geocoded { .. } => ResolutionMethod::Geocoded,
            Self::ManualOverride { .. } => ResolutionMethod::ManualOverride,
            Self::Unresolved { .. } => ResolutionMethod::Unresolved,
        }
    }

    pub fn place(&self) -> Option<&Place> {
        match self {
            Self::AreaCode { place, .. }
            | Self::Geocoded { place, .. }
            | Self::ManualOverride { place, .. } => Some(place),
            Self::Unresolved { .. } => None,
        }
    }

    pub fn point(&self) -> Option<GeoPoint> {
        match self {
            Self::AreaCode { point, .. } | Self::Geocoded { point, .. } => Some(*point),
            Self::ManualOverride { point, .. } => *point,
            Self::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved { .. })
    }
}

/// The single persisted location of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub entity_id: EntityId,
    #[serde(flatten)]
    pub resolution: Resolution,
    pub last_updated: DateTime<Utc>,
}

impl LocationRecord {
    pub fn new(entity_id: EntityId, resolution: Resolution, last_updated: DateTime<Utc>) -> Self {
        Self { entity_id, resolution, last_updated }
    }

    pub fn method(&self) -> ResolutionMethod {
        self.resolution.method()
    }

    pub fn place(&self) -> Option<&Place> {
        self.resolution.place()
    }

    pub fn prefecture(&self) -> Option<&str> {
        self.place().map(|p| p.prefecture.as_str())
    }

    pub fn point(&self) -> Option<GeoPoint> {
        self.resolution.point()
    }

    /// True when both records describe the same location, ignoring timestamps.
    pub fn same_location(&self, other: &LocationRecord) -> bool {
        self.entity_id == other.entity_id && self.resolution == other.resolution
    }
}

// ---------------------------------------------------------------------------
// Entities + declared areas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    #[default]
    Entire,
    Partial,
}

/// A prefecture (optionally a city) an entity declares it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceArea {
    #[serde(default)]
    pub entity_id: EntityId,
    pub prefecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default)]
    pub coverage: Coverage,
}

/// A directory listing as seen by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub service_areas: Vec<ServiceArea>,
    /// Branch office coordinates, used only for distance ranking.
    #[serde(default)]
    pub branches: Vec<GeoPoint>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationRecord>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(id),
            name: String::new(),
            phone: None,
            address: None,
            service_areas: Vec::new(),
            branches: Vec::new(),
            is_premium: false,
            location: None,
        }
    }

    /// Distinct declared prefectures, in declaration order.
    pub fn declared_prefectures(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for area in &self.service_areas {
            if !out.contains(&area.prefecture.as_str()) {
                out.push(area.prefecture.as_str());
            }
        }
        out
    }

    /// No record yet, or the last attempt left it unresolved.
    pub fn needs_resolution(&self) -> bool {
        match &self.location {
            None => true,
            Some(record) => !record.resolution.is_resolved(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciliation output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Diagnostic only. Regenerated on every validation run, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchFinding {
    pub entity_id: EntityId,
    pub declared: Vec<String>,
    pub resolved: Place,
    pub method: ResolutionMethod,
    /// Smallest region-block distance between resolved and any declared prefecture.
    pub region_distance: u8,
    pub severity: Severity,
}

impl MismatchFinding {
    pub fn to_error(&self) -> LocateError {
        LocateError::AmbiguousReconciliation {
            entity_id: self.entity_id.to_string(),
            resolved: self.resolved.to_string(),
            declared: self.declared.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionCause {
    ServiceArea,
    Rule { id: String },
}

impl fmt::Display for CorrectionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceArea => write!(f, "single declared service area"),
            Self::Rule { id } => write!(f, "correction rule '{id}'"),
        }
    }
}

/// A deterministic rewrite of a resolved location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correction {
    pub entity_id: EntityId,
    pub before: Place,
    pub after: Place,
    pub cause: CorrectionCause,
}
