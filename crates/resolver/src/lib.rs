//! `locus-resolver`: deterministic location resolution and reconciliation engine.
//!
//! Pure engine crate: receives entities, returns location records, corrections
//! and findings. Network access and persistence are reached only through the
//! [`Geocoder`], [`CentroidLookup`] and [`EntityStore`] traits.

pub mod address;
pub mod area_code;
pub mod distance;
pub mod error;
pub mod model;
pub mod phone;
pub mod prefecture;
pub mod reconcile;
pub mod resolve;
pub mod store;

pub use area_code::{AreaCodeEntry, AreaCodeTable};
pub use error::{GeocodeError, LocateError};
pub use model::{
    Entity, EntityId, GeoPoint, LocationRecord, MismatchFinding, Place, Resolution, ServiceArea,
};
pub use phone::{PhoneClass, PhoneNumber};
pub use reconcile::{default_rules, CorrectionRule, Reconciliation, Reconciler, ReconcilePolicy, Verdict};
pub use resolve::{Attempt, CentroidLookup, Geocoder, Resolver};
pub use store::{EntityStore, MemoryEntityStore, StoreError};
