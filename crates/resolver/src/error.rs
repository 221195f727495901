use std::fmt;

use crate::phone::PhoneClass;

#[derive(Debug, Clone, PartialEq)]
pub enum LocateError {
    /// Address text has no recognizable prefecture.
    InvalidAddressFormat(String),
    /// Landline number with no table entry at any prefix length.
    NoAreaCodeMatch { digits: String, longest_prefix: String },
    /// Freephone, mobile, IP or malformed number.
    NotGeographic { digits: String, class: PhoneClass },
    /// Geocoder failed or returned nothing for the query.
    GeocodeUnavailable { query: String, reason: String },
    /// Location conflicts with declared areas and no deterministic rule applies.
    AmbiguousReconciliation { entity_id: String, resolved: String, declared: Vec<String> },
    /// Manual override coordinate outside Japan's bounding box.
    InvalidOverrideCoordinate { prefecture: String, city: String, lat: f64, lng: f64 },
    /// Entity has neither a phone number nor an address.
    NoSignal,
    /// Reference data parse error (area-code CSV, etc.).
    Parse(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for LocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddressFormat(addr) => write!(f, "invalid address format: '{addr}'"),
            Self::NoAreaCodeMatch { digits, longest_prefix } => {
                write!(f, "no area code match for {digits} (longest prefix tried: {longest_prefix})")
            }
            Self::NotGeographic { digits, class } => {
                write!(f, "{digits} is a {class} number, not tied to a calling region")
            }
            Self::GeocodeUnavailable { query, reason } => {
                write!(f, "geocode unavailable for '{query}': {reason}")
            }
            Self::AmbiguousReconciliation { entity_id, resolved, declared } => {
                write!(
                    f,
                    "entity {entity_id}: resolved {resolved} conflicts with declared [{}]",
                    declared.join(", ")
                )
            }
            Self::InvalidOverrideCoordinate { prefecture, city, lat, lng } => {
                write!(f, "override {prefecture}{city}: ({lat}, {lng}) is outside Japan")
            }
            Self::NoSignal => write!(f, "no phone number or address"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for LocateError {}

/// Failure of a single geocoder call.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeError {
    /// Network error, timeout, or non-success status after retries.
    Unavailable(String),
    /// Response body was not the expected shape.
    Malformed(String),
}

impl fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "geocoder unavailable: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed geocoder response: {msg}"),
        }
    }
}

impl std::error::Error for GeocodeError {}
