//! Cross-checks resolved locations against declared service areas.
//!
//! Evaluation order:
//!
//! 1. Resolved prefecture is declared → consistent.
//! 2. A known-bad-prefix rule matches and points at exactly one declared
//!    prefecture → rewritten by the rule, even between neighbours.
//! 3. Resolved prefecture borders a declared one → tolerated, no finding.
//! 4. Exactly one distinct declared prefecture → the declaration wins.
//! 5. Otherwise → [`MismatchFinding`] for manual triage. Never auto-corrects.
//!
//! Every correction produces a record whose prefecture is declared, so a
//! second pass over the output is always step 1: reconciliation is a fixed
//! point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    Correction, CorrectionCause, Entity, LocationRecord, MismatchFinding, OverrideReason, Place,
    Resolution, Severity,
};
use crate::prefecture;
use crate::resolve::CentroidLookup;

// ---------------------------------------------------------------------------
// Policy + rules
// ---------------------------------------------------------------------------

/// Tunable thresholds. Region distance is measured in regional blocks
/// (see [`prefecture::Region`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilePolicy {
    pub single_area_override: bool,
    pub tolerate_adjacent: bool,
    pub low_max_region_distance: u8,
    pub medium_max_region_distance: u8,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            single_area_override: true,
            tolerate_adjacent: true,
            low_max_region_distance: 0,
            medium_max_region_distance: 2,
        }
    }
}

impl ReconcilePolicy {
    pub fn severity(&self, region_distance: u8) -> Severity {
        if region_distance <= self.low_max_region_distance {
            Severity::Low
        } else if region_distance <= self.medium_max_region_distance {
            Severity::Medium
        } else {
            Severity::High
        }
    }
}

/// A historically misassigned prefix family.
///
/// Matches area-code records whose prefix starts with `prefix` and whose
/// prefecture is in `from`. The record is rewritten to the single declared
/// prefecture found in `to`; if zero or several declared prefectures are in
/// `to`, the rule does not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRule {
    pub id: String,
    pub prefix: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
}

impl CorrectionRule {
    fn applies_to(&self, record_prefix: &str, resolved: &str) -> bool {
        record_prefix.trim_end_matches('-').starts_with(&self.prefix)
            && self.from.iter().any(|p| p == resolved)
    }
}

fn rule(id: &str, prefix: &str, from: &[&str], to: &[&str]) -> CorrectionRule {
    CorrectionRule {
        id: id.into(),
        prefix: prefix.into(),
        from: from.iter().map(|s| s.to_string()).collect(),
        to: to.iter().map(|s| s.to_string()).collect(),
    }
}

/// The known-bad-prefix families.
pub fn default_rules() -> Vec<CorrectionRule> {
    vec![
        rule("tama-sagamihara", "042", &["東京都"], &["神奈川県", "埼玉県"]),
        rule("shikoku-088", "088", &["高知県", "香川県"], &["徳島県", "高知県"]),
        rule("miyazaki-098", "098", &["沖縄県"], &["宮崎県", "鹿児島県"]),
    ]
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Nothing to compare: no declared areas or no resolved location.
    Skipped,
    Consistent,
    Corrected { correction: Correction },
    Tolerated { neighbour: String },
    Flagged { finding: MismatchFinding },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub verdict: Verdict,
    /// Replacement record, present only for [`Verdict::Corrected`].
    pub updated: Option<LocationRecord>,
}

impl Reconciliation {
    fn verdict(verdict: Verdict) -> Self {
        Self { verdict, updated: None }
    }

    pub fn findings(&self) -> Vec<MismatchFinding> {
        match &self.verdict {
            Verdict::Flagged { finding } => vec![finding.clone()],
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Reconciler<'a> {
    policy: ReconcilePolicy,
    rules: Vec<CorrectionRule>,
    centroids: Option<&'a dyn CentroidLookup>,
}

impl<'a> Reconciler<'a> {
    pub fn new(policy: ReconcilePolicy, rules: Vec<CorrectionRule>) -> Self {
        Self { policy, rules, centroids: None }
    }

    /// Use municipality centroids for corrected records that name a city.
    pub fn with_centroids(mut self, centroids: &'a dyn CentroidLookup) -> Self {
        self.centroids = Some(centroids);
        self
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Findings only. Never suggests a correction.
    pub fn validate(&self, entity: &Entity) -> Vec<MismatchFinding> {
        self.reconcile(entity, Utc::now()).findings()
    }

    pub fn reconcile(&self, entity: &Entity, now: DateTime<Utc>) -> Reconciliation {
        let Some(record) = entity.location.as_ref() else {
            return Reconciliation::verdict(Verdict::Skipped);
        };
        let Some(resolved) = record.place() else {
            return Reconciliation::verdict(Verdict::Skipped);
        };
        let declared = entity.declared_prefectures();
        if declared.is_empty() {
            return Reconciliation::verdict(Verdict::Skipped);
        }

        if declared.contains(&resolved.prefecture.as_str()) {
            return Reconciliation::verdict(Verdict::Consistent);
        }

        if let Resolution::AreaCode { prefix, .. } = &record.resolution {
            for rule in &self.rules {
                if !rule.applies_to(prefix, &resolved.prefecture) {
                    continue;
                }
                let targets: Vec<&str> = declared
                    .iter()
                    .copied()
                    .filter(|d| rule.to.iter().any(|t| t == d))
                    .collect();
                if let [only] = targets.as_slice() {
                    let target = declared_place(entity, only);
                    return self.correct(record, resolved, target, OverrideCause::Rule(&rule.id), now);
                }
            }
        }

        // Only explicit rules may move a record into a neighbouring prefecture.
        if self.policy.tolerate_adjacent {
            if let Some(n) = declared.iter().find(|d| prefecture::are_adjacent(&resolved.prefecture, d)) {
                return Reconciliation::verdict(Verdict::Tolerated { neighbour: n.to_string() });
            }
        }

        if self.policy.single_area_override && declared.len() == 1 {
            let target = declared_place(entity, declared[0]);
            return self.correct(record, resolved, target, OverrideCause::ServiceArea, now);
        }

        let region_distance = declared
            .iter()
            .map(|d| prefecture::region_distance(&resolved.prefecture, d).unwrap_or(u8::MAX))
            .min()
            .unwrap_or(u8::MAX);

        Reconciliation::verdict(Verdict::Flagged {
            finding: MismatchFinding {
                entity_id: entity.id.clone(),
                declared: declared.iter().map(|s| s.to_string()).collect(),
                resolved: resolved.clone(),
                method: record.method(),
                region_distance,
                severity: self.policy.severity(region_distance),
            },
        })
    }

    fn correct(
        &self,
        record: &LocationRecord,
        before: &Place,
        after: Place,
        cause: OverrideCause<'_>,
        now: DateTime<Utc>,
    ) -> Reconciliation {
        let point = after
            .city
            .as_deref()
            .and_then(|city| self.centroids.and_then(|c| c.centroid(&after.prefecture, city)))
            .or_else(|| prefecture::lookup(&after.prefecture).map(|p| p.centroid));

        let (reason, cause) = match cause {
            OverrideCause::ServiceArea => (
                OverrideReason::ServiceArea { replaced: before.clone() },
                CorrectionCause::ServiceArea,
            ),
            OverrideCause::Rule(id) => (
                OverrideReason::CorrectionRule { rule: id.to_string(), replaced: before.clone() },
                CorrectionCause::Rule { id: id.to_string() },
            ),
        };

        let correction = Correction {
            entity_id: record.entity_id.clone(),
            before: before.clone(),
            after: after.clone(),
            cause,
        };
        log::info!(
            "entity {}: corrected {} -> {} ({})",
            correction.entity_id,
            correction.before,
            correction.after,
            correction.cause,
        );

        let updated = LocationRecord::new(
            record.entity_id.clone(),
            Resolution::ManualOverride { place: after, point, reason },
            now,
        );
        Reconciliation {
            verdict: Verdict::Corrected { correction },
            updated: Some(updated),
        }
    }
}

enum OverrideCause<'r> {
    ServiceArea,
    Rule(&'r str),
}

/// The declared place for a prefecture. The city is kept only when the
/// entity declares exactly one city there.
fn declared_place(entity: &Entity, prefecture: &str) -> Place {
    let mut cities: Vec<&str> = entity
        .service_areas
        .iter()
        .filter(|a| a.prefecture == prefecture)
        .filter_map(|a| a.city.as_deref())
        .collect();
    cities.sort_unstable();
    cities.dedup();
    let whole_prefecture = entity
        .service_areas
        .iter()
        .any(|a| a.prefecture == prefecture && a.city.is_none());
    let city = match (cities.as_slice(), whole_prefecture) {
        ([only], false) => Some(only.to_string()),
        _ => None,
    };
    Place::new(prefecture, city)
}
