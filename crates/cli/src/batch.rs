//! `locus resolve` batch runner.
//!
//! Sequential, one entity at a time. Per-entity failures become
//! [`Outcome`]s and never abort the run; only listing entities and
//! checkpointing can fail the run as a whole.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;

use locus_geocode::{CacheStats, CachedGeocoder};
use locus_resolver::model::{Correction, Severity};
use locus_resolver::reconcile::Verdict;
use locus_resolver::resolve::Attempt;
use locus_resolver::{
    CentroidLookup, Entity, EntityId, EntityStore, Geocoder, LocateError, MismatchFinding,
    Reconciler, Resolution, Resolver, StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Area-code resolution for entities without a location
    Phone,
    /// Address geocoding for entities without a location
    Geocode,
    /// Report conflicts with declared service areas, write nothing
    Validate,
    /// Apply deterministic corrections, report the rest
    Fix,
}

impl Mode {
    fn writes(self) -> bool {
        !matches!(self, Mode::Validate)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Phone => "phone",
            Mode::Geocode => "geocode",
            Mode::Validate => "validate",
            Mode::Fix => "fix",
        };
        f.write_str(s)
    }
}

/// What happened to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    AreaCode,
    Geocoded,
    NotGeographic,
    NoAreaCodeMatch,
    InvalidAddress,
    GeocodeUnavailable,
    NoSignal,
    Consistent,
    Corrected,
    WouldCorrect,
    Tolerated,
    Flagged,
    Skipped,
    StoreError,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::AreaCode => "area_code",
            Outcome::Geocoded => "geocoded",
            Outcome::NotGeographic => "not_geographic",
            Outcome::NoAreaCodeMatch => "no_area_code_match",
            Outcome::InvalidAddress => "invalid_address",
            Outcome::GeocodeUnavailable => "geocode_unavailable",
            Outcome::NoSignal => "no_signal",
            Outcome::Consistent => "consistent",
            Outcome::Corrected => "corrected",
            Outcome::WouldCorrect => "would_correct",
            Outcome::Tolerated => "tolerated",
            Outcome::Flagged => "flagged",
            Outcome::Skipped => "skipped",
            Outcome::StoreError => "store_error",
        }
    }

    fn of_attempt(attempt: &Attempt) -> Self {
        match &attempt.error {
            None => match attempt.record.resolution {
                Resolution::Geocoded { .. } => Outcome::Geocoded,
                _ => Outcome::AreaCode,
            },
            Some(LocateError::NotGeographic { .. }) => Outcome::NotGeographic,
            Some(LocateError::NoAreaCodeMatch { .. }) => Outcome::NoAreaCodeMatch,
            Some(LocateError::InvalidAddressFormat(_)) => Outcome::InvalidAddress,
            Some(LocateError::GeocodeUnavailable { .. }) => Outcome::GeocodeUnavailable,
            Some(_) => Outcome::NoSignal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedSample {
    pub entity_id: EntityId,
    pub phone: String,
    pub longest_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureSample {
    pub entity_id: EntityId,
    pub error: String,
}

/// Bounded per-kind samples for the report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Samples {
    pub no_area_code_match: Vec<UnmatchedSample>,
    pub ambiguous: Vec<MismatchFinding>,
    pub corrections: Vec<Correction>,
    pub failures: Vec<FailureSample>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub processed: usize,
    pub outcomes: BTreeMap<Outcome, usize>,
    pub unmatched_prefixes: BTreeMap<String, usize>,
    pub findings_by_severity: BTreeMap<Severity, usize>,
    pub samples: Samples,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
    pub checkpoints: usize,
}

impl RunStats {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    fn record(&mut self, outcome: Outcome) {
        *self.outcomes.entry(outcome).or_default() += 1;
    }

    /// Most frequent unmatched prefixes, count descending then prefix.
    pub fn top_unmatched(&self, n: usize) -> Vec<(&str, usize)> {
        let mut v: Vec<(&str, usize)> =
            self.unmatched_prefixes.iter().map(|(p, c)| (p.as_str(), *c)).collect();
        v.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        v.truncate(n);
        v
    }
}

fn push_bounded<T>(v: &mut Vec<T>, item: T, limit: usize) {
    if v.len() < limit {
        v.push(item);
    }
}

#[derive(Debug)]
pub enum RunError {
    List(StoreError),
    Checkpoint(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::List(e) => write!(f, "cannot list entities: {e}"),
            RunError::Checkpoint(msg) => write!(f, "checkpoint failed: {msg}"),
        }
    }
}

impl std::error::Error for RunError {}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub checkpoint_every: usize,
    pub sample_limit: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { checkpoint_every: 50, sample_limit: 20 }
    }
}

pub struct BatchRunner<'a, G> {
    resolver: Resolver,
    reconciler: Reconciler<'a>,
    geocoder: Option<CachedGeocoder<G>>,
    centroids: Option<&'a dyn CentroidLookup>,
    options: RunOptions,
}

impl<'a, G: Geocoder> BatchRunner<'a, G> {
    pub fn new(resolver: Resolver, reconciler: Reconciler<'a>, options: RunOptions) -> Self {
        Self { resolver, reconciler, geocoder: None, centroids: None, options }
    }

    pub fn with_geocoder(mut self, geocoder: CachedGeocoder<G>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_centroids(mut self, centroids: &'a dyn CentroidLookup) -> Self {
        self.centroids = Some(centroids);
        self
    }

    pub fn run<S: EntityStore>(
        &mut self,
        store: &mut S,
        mode: Mode,
        now: DateTime<Utc>,
    ) -> Result<RunStats, RunError> {
        let entities: Vec<Entity> = match mode {
            Mode::Phone => store.list_entities_needing_resolution(),
            Mode::Geocode => store.list_entities_needing_resolution().map(|all| {
                all.into_iter()
                    .filter(|e| e.address.as_deref().is_some_and(|a| !a.trim().is_empty()))
                    .collect()
            }),
            Mode::Validate | Mode::Fix => store.list_entities_with_declared_areas(),
        }
        .map_err(RunError::List)?;
        log::info!("{mode}: {} entities to process", entities.len());

        let mut stats = RunStats::default();
        let mut since_checkpoint = 0usize;

        for entity in &entities {
            stats.processed += 1;
            match mode {
                Mode::Phone | Mode::Geocode => self.resolve_one(store, entity, mode, now, &mut stats),
                Mode::Validate => self.reconcile_one(store, entity, false, now, &mut stats),
                Mode::Fix => self.reconcile_one(store, entity, true, now, &mut stats),
            }

            if mode.writes() {
                since_checkpoint += 1;
                if since_checkpoint >= self.options.checkpoint_every.max(1) {
                    self.checkpoint(store)?;
                    stats.checkpoints += 1;
                    since_checkpoint = 0;
                }
            }
        }

        if mode.writes() && since_checkpoint > 0 {
            self.checkpoint(store)?;
            stats.checkpoints += 1;
        }
        stats.cache = self.geocoder.as_ref().map(|g| g.stats());
        Ok(stats)
    }

    fn resolve_one<S: EntityStore>(
        &mut self,
        store: &mut S,
        entity: &Entity,
        mode: Mode,
        now: DateTime<Utc>,
        stats: &mut RunStats,
    ) {
        let geocoder = self.geocoder.as_mut().map(|g| g as &mut dyn Geocoder);
        let attempt = match mode {
            Mode::Phone => self.resolver.locate_by_phone(entity, geocoder, self.centroids, now),
            _ => self.resolver.locate_by_address(entity, geocoder, self.centroids, now),
        };
        let outcome = Outcome::of_attempt(&attempt);
        let limit = self.options.sample_limit;

        if let Some(err) = &attempt.error {
            log::debug!("entity {}: {err}", entity.id);
            if let LocateError::NoAreaCodeMatch { longest_prefix, .. } = err {
                *stats.unmatched_prefixes.entry(longest_prefix.clone()).or_default() += 1;
                let sample = UnmatchedSample {
                    entity_id: entity.id.clone(),
                    phone: entity.phone.clone().unwrap_or_default(),
                    longest_prefix: longest_prefix.clone(),
                };
                push_bounded(&mut stats.samples.no_area_code_match, sample, limit);
            }
            let sample = FailureSample { entity_id: entity.id.clone(), error: err.to_string() };
            push_bounded(&mut stats.samples.failures, sample, limit);
        }

        // Unresolved records are stored too: the reason is kept and the
        // entity is retried by the next pass.
        if let Err(e) = store.update_location(&entity.id, attempt.record) {
            log::warn!("entity {}: {e}", entity.id);
            stats.record(Outcome::StoreError);
            return;
        }
        stats.record(outcome);
    }

    fn reconcile_one<S: EntityStore>(
        &self,
        store: &mut S,
        entity: &Entity,
        apply: bool,
        now: DateTime<Utc>,
        stats: &mut RunStats,
    ) {
        let result = self.reconciler.reconcile(entity, now);
        let limit = self.options.sample_limit;

        let outcome = match result.verdict {
            Verdict::Skipped => Outcome::Skipped,
            Verdict::Consistent => Outcome::Consistent,
            Verdict::Tolerated { .. } => Outcome::Tolerated,
            Verdict::Flagged { finding } => {
                log::warn!("{}", finding.to_error());
                *stats.findings_by_severity.entry(finding.severity).or_default() += 1;
                push_bounded(&mut stats.samples.ambiguous, finding, limit);
                Outcome::Flagged
            }
            Verdict::Corrected { correction } => {
                push_bounded(&mut stats.samples.corrections, correction, limit);
                if apply {
                    Outcome::Corrected
                } else {
                    Outcome::WouldCorrect
                }
            }
        };

        if apply {
            if let Some(updated) = result.updated {
                if let Err(e) = store.update_location(&entity.id, updated) {
                    log::warn!("entity {}: {e}", entity.id);
                    stats.record(Outcome::StoreError);
                    return;
                }
            }
        }
        stats.record(outcome);
    }

    fn checkpoint<S: EntityStore>(&mut self, store: &mut S) -> Result<(), RunError> {
        store.checkpoint().map_err(|e| RunError::Checkpoint(e.to_string()))?;
        if let Some(geocoder) = self.geocoder.as_mut() {
            geocoder.flush().map_err(|e| RunError::Checkpoint(e.to_string()))?;
        }
        log::debug!("checkpoint written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use locus_geocode::GeocodeCache;
    use locus_resolver::model::{Coverage, ServiceArea};
    use locus_resolver::{
        default_rules, AreaCodeTable, GeoPoint, GeocodeError, MemoryEntityStore, ReconcilePolicy,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()
    }

    struct Flaky;

    impl Geocoder for Flaky {
        fn geocode(&mut self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
            if address.starts_with("京都府") {
                Ok(Some(GeoPoint::new(35.01, 135.76)))
            } else {
                Err(GeocodeError::Unavailable("timeout".into()))
            }
        }
    }

    /// Counts checkpoints on top of an in-memory store.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryEntityStore,
        checkpoints: usize,
    }

    impl EntityStore for CountingStore {
        fn list_entities_needing_resolution(&self) -> Result<Vec<Entity>, StoreError> {
            self.inner.list_entities_needing_resolution()
        }
        fn list_entities_with_declared_areas(&self) -> Result<Vec<Entity>, StoreError> {
            self.inner.list_entities_with_declared_areas()
        }
        fn update_location(&mut self, id: &EntityId, record: locus_resolver::LocationRecord) -> Result<(), StoreError> {
            self.inner.update_location(id, record)
        }
        fn checkpoint(&mut self) -> Result<(), StoreError> {
            self.checkpoints += 1;
            Ok(())
        }
    }

    fn entity(id: &str, phone: Option<&str>, address: Option<&str>, declared: &[&str]) -> Entity {
        let mut e = Entity::new(id);
        e.phone = phone.map(String::from);
        e.address = address.map(String::from);
        e.service_areas = declared
            .iter()
            .map(|p| ServiceArea {
                entity_id: EntityId::new(id),
                prefecture: p.to_string(),
                city: None,
                coverage: Coverage::Entire,
            })
            .collect();
        e
    }

    fn runner(options: RunOptions) -> BatchRunner<'static, Flaky> {
        BatchRunner::new(
            Resolver::new(AreaCodeTable::builtin()),
            Reconciler::new(ReconcilePolicy::default(), default_rules()),
            options,
        )
        .with_geocoder(CachedGeocoder::new(Flaky, GeocodeCache::in_memory()))
    }

    fn store() -> CountingStore {
        CountingStore {
            inner: MemoryEntityStore::new([
                entity("1", Some("03-1234-5678"), None, &["東京都"]),
                entity("2", Some("0120-000-000"), Some("東京都八王子市"), &[]),
                entity("3", Some("0155-11-2222"), None, &[]),
                entity("4", Some("090-0000-0000"), Some("京都府京都市"), &[]),
                entity("5", Some("087-800-0000"), None, &["高知県"]),
            ]),
            checkpoints: 0,
        }
    }

    #[test]
    fn failures_do_not_stop_the_run() {
        let mut store = store();
        let stats = runner(RunOptions::default()).run(&mut store, Mode::Phone, now()).unwrap();

        assert_eq!(stats.processed, 5);
        assert_eq!(stats.count(Outcome::AreaCode), 2);
        assert_eq!(stats.count(Outcome::Geocoded), 1);
        assert_eq!(stats.count(Outcome::GeocodeUnavailable), 1);
        assert_eq!(stats.count(Outcome::NoAreaCodeMatch), 1);
        assert_eq!(stats.top_unmatched(5), vec![("0155", 1)]);
        assert_eq!(stats.samples.failures.len(), 2);
        assert_eq!(stats.cache.unwrap().api_calls, 2);
    }

    #[test]
    fn checkpoints_every_n_entities_and_at_the_end() {
        let mut store = store();
        let options = RunOptions { checkpoint_every: 2, sample_limit: 20 };
        let stats = runner(options).run(&mut store, Mode::Phone, now()).unwrap();
        assert_eq!(stats.checkpoints, 3);
        assert_eq!(store.checkpoints, 3);
    }

    #[test]
    fn samples_are_bounded() {
        let mut store = store();
        let options = RunOptions { checkpoint_every: 50, sample_limit: 1 };
        let stats = runner(options).run(&mut store, Mode::Phone, now()).unwrap();
        assert_eq!(stats.samples.failures.len(), 1);
    }

    #[test]
    fn validate_is_a_dry_run() {
        let mut store = store();
        let mut runner = runner(RunOptions::default());
        runner.run(&mut store, Mode::Phone, now()).unwrap();
        let checkpoints_before = store.checkpoints;

        let stats = runner.run(&mut store, Mode::Validate, now()).unwrap();
        assert_eq!(stats.count(Outcome::Consistent), 1);
        assert_eq!(stats.count(Outcome::WouldCorrect), 1);
        assert_eq!(store.checkpoints, checkpoints_before);

        let kagawa = store.inner.get(&EntityId::new("5")).unwrap();
        assert_eq!(kagawa.location.as_ref().unwrap().prefecture(), Some("香川県"));
    }

    #[test]
    fn fix_applies_once() {
        let mut store = store();
        let mut runner = runner(RunOptions::default());
        runner.run(&mut store, Mode::Phone, now()).unwrap();

        let stats = runner.run(&mut store, Mode::Fix, now()).unwrap();
        assert_eq!(stats.count(Outcome::Corrected), 1);
        let kochi = store.inner.get(&EntityId::new("5")).unwrap();
        assert_eq!(kochi.location.as_ref().unwrap().prefecture(), Some("高知県"));

        let again = runner.run(&mut store, Mode::Fix, now()).unwrap();
        assert_eq!(again.count(Outcome::Corrected), 0);
        assert_eq!(again.count(Outcome::Consistent), 2);
    }

    #[test]
    fn geocode_mode_only_takes_entities_with_addresses() {
        let mut store = store();
        let stats = runner(RunOptions::default()).run(&mut store, Mode::Geocode, now()).unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.count(Outcome::Geocoded), 1);
        assert_eq!(stats.count(Outcome::GeocodeUnavailable), 1);
    }
}
