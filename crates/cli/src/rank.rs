use locus_resolver::distance;
use locus_resolver::GeoPoint;

use crate::context::Context;
use crate::report::emit;
use crate::CliError;

/// Entities within `max_km` of a point, premium first, then nearest.
pub fn cmd_rank(
    ctx: &Context,
    lat: f64,
    lng: f64,
    max_km: f64,
    limit: Option<usize>,
    json: bool,
) -> Result<(), CliError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(CliError::usage(format!("invalid coordinate ({lat}, {lng})")));
    }
    if !max_km.is_finite() || max_km < 0.0 {
        return Err(CliError::usage(format!("--max-km must be a non-negative number, got {max_km}")));
    }

    let store = ctx.entity_store()?;
    let mut ranked = distance::rank(&GeoPoint::new(lat, lng), store.entities(), max_km);
    if let Some(n) = limit {
        ranked.truncate(n);
    }

    if json {
        return emit(&ranked, true, None);
    }
    for (i, r) in ranked.iter().enumerate() {
        let premium = if r.is_premium { "*" } else { " " };
        println!("{:>3} {premium} {:>8.2} km  {}  {}", i + 1, r.distance_km, r.entity_id, r.name);
    }
    eprintln!("{} entities within {max_km} km", ranked.len());
    Ok(())
}
