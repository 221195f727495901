use std::cmp::Ordering;

use serde::Serialize;

use crate::model::{Entity, EntityId, GeoPoint};

const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntity {
    pub entity_id: EntityId,
    pub name: String,
    pub is_premium: bool,
    pub distance_km: f64,
    /// The branch (or resolved location) that produced `distance_km`.
    pub nearest: GeoPoint,
}

/// All coordinates an entity can be reached at: its branches plus its
/// resolved location, if any.
fn entity_points(entity: &Entity) -> impl Iterator<Item = GeoPoint> + '_ {
    entity
        .branches
        .iter()
        .copied()
        .chain(entity.location.as_ref().and_then(|l| l.point()))
        .filter(|p| p.lat.is_finite() && p.lng.is_finite())
}

/// Closest branch wins. `None` when the entity has no coordinate at all.
pub fn nearest_point(target: &GeoPoint, entity: &Entity) -> Option<(GeoPoint, f64)> {
    entity_points(entity)
        .map(|p| (p, haversine_km(target, &p)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
}

/// Rank entities around `target`.
///
/// Entities without coordinates are excluded, the rest are filtered to
/// `distance <= max_distance_km` and ordered premium first, then nearest
/// first. Remaining ties fall back to entity id so output is stable.
pub fn rank(target: &GeoPoint, entities: &[Entity], max_distance_km: f64) -> Vec<RankedEntity> {
    let mut ranked: Vec<RankedEntity> = entities
        .iter()
        .filter_map(|e| {
            let (nearest, distance_km) = nearest_point(target, e)?;
            (distance_km <= max_distance_km).then(|| RankedEntity {
                entity_id: e.id.clone(),
                name: e.name.clone(),
                is_premium: e.is_premium,
                distance_km,
                nearest,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.is_premium
            .cmp(&a.is_premium)
            .then_with(|| a.distance_km.partial_cmp(&b.distance_km).unwrap_or(Ordering::Equal))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    ranked
}
