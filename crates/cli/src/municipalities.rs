//! `locus municipalities build|check|apply-overrides`

use std::path::PathBuf;

use locus_geocode::municipality::load_overrides;
use locus_geocode::{BuildOptions, DataError};

use crate::context::{data_read, data_write, Context};
use crate::exit_codes::{EXIT_MUNICIPALITIES_INCOMPLETE, EXIT_REFERENCE_MISSING};
use crate::report::emit;
use crate::CliError;

/// Geocode every reference municipality not yet in the store. Resumable.
pub fn cmd_build(ctx: &Context, json: bool) -> Result<(), CliError> {
    let rows = ctx.reference_rows()?;
    let mut geocoder = ctx.require_geocoder()?;
    let mut store = ctx.municipality_store()?;
    let options = BuildOptions { flush_every: ctx.settings.batch.checkpoint_every };

    let result = store.build(&rows, &mut geocoder, &options);
    // Keep paid-for answers even when the store write failed.
    geocoder.flush().map_err(data_write)?;
    let report = result.map_err(data_write)?;

    let stats = geocoder.stats();
    eprintln!(
        "municipalities: {} geocoded, {} already stored, {} failed ({} api calls)",
        report.geocoded,
        report.skipped,
        report.failed.len(),
        stats.api_calls
    );
    for (query, reason) in &report.failed {
        eprintln!("  failed: {query}: {reason}");
    }
    emit(&report, json, None)
}

pub fn cmd_check(ctx: &Context, json: bool, strict: bool) -> Result<(), CliError> {
    let rows = ctx.reference_rows()?;
    let store = ctx.municipality_store()?;
    let completeness = store.check(&rows);

    eprintln!("municipalities: {}/{} present", completeness.present, completeness.expected);
    for (prefecture, cities) in &completeness.missing {
        eprintln!("  missing {prefecture}: {}", cities.join(", "));
    }
    emit(&completeness, json, None)?;

    if strict && !completeness.is_complete() {
        return Err(CliError::new(
            EXIT_MUNICIPALITIES_INCOMPLETE,
            format!("{} municipalities missing", completeness.missing_count()),
        )
        .with_hint("run `locus municipalities build`, then apply-overrides for the rest"));
    }
    Ok(())
}

pub fn cmd_apply_overrides(ctx: &Context, file: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let path = file.or_else(|| ctx.settings.paths.overrides.clone()).ok_or_else(|| {
        CliError::new(EXIT_REFERENCE_MISSING, "no overrides file given")
            .with_hint("pass a file or set paths.overrides in locus.toml")
    })?;
    let overrides = load_overrides(&path).map_err(|e| match e {
        DataError::NotFound(_) => CliError::new(EXIT_REFERENCE_MISSING, e.to_string()),
        other => data_read(other),
    })?;

    let mut store = ctx.municipality_store()?;
    let report = store.apply_overrides(&overrides);
    store.flush().map_err(data_write)?;

    eprintln!("overrides: {} applied, {} rejected", report.applied, report.rejected.len());
    for err in &report.rejected {
        eprintln!("  rejected: {err}");
    }
    emit(&report, json, None)
}
