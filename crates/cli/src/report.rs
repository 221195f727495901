//! Run report: human summary on stderr, JSON on stdout or to a file.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::batch::{Mode, RunStats};
use crate::exit_codes::EXIT_DATA_WRITE;
use crate::CliError;

const TOP_PREFIXES: usize = 10;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub locus_version: &'static str,
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Version of the area-code table the run resolved against.
    pub area_codes: String,
    #[serde(flatten)]
    pub stats: RunStats,
}

impl RunReport {
    pub fn new(mode: Mode, area_codes: String, started_at: DateTime<Utc>, stats: RunStats) -> Self {
        Self {
            locus_version: env!("CARGO_PKG_VERSION"),
            mode,
            started_at,
            finished_at: Utc::now(),
            area_codes,
            stats,
        }
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let s = &self.stats;
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        let mut lines = vec![format!(
            "resolve --mode {}: {} entities in {elapsed:.1}s (area codes: {})",
            self.mode, s.processed, self.area_codes
        )];

        for (outcome, count) in &s.outcomes {
            lines.push(format!("  {:<20} {count}", outcome.as_str()));
        }

        let top = s.top_unmatched(TOP_PREFIXES);
        if !top.is_empty() {
            lines.push(format!("unmatched prefixes (top {}):", top.len()));
            for (prefix, count) in top {
                lines.push(format!("  {prefix:<8} {count}"));
            }
        }

        if !s.findings_by_severity.is_empty() {
            let parts: Vec<String> =
                s.findings_by_severity.iter().rev().map(|(sev, n)| format!("{sev} {n}")).collect();
            lines.push(format!("findings: {}", parts.join(", ")));
        }
        for f in &s.samples.ambiguous {
            lines.push(format!(
                "  [{}] {}: resolved {} vs declared {}",
                f.severity,
                f.entity_id,
                f.resolved,
                f.declared.join(", ")
            ));
        }
        for c in &s.samples.corrections {
            lines.push(format!("  corrected {}: {} -> {} ({})", c.entity_id, c.before, c.after, c.cause));
        }

        if let Some(cache) = &s.cache {
            lines.push(format!(
                "geocode cache: {} hits, {} misses, {} api calls",
                cache.hits, cache.misses, cache.api_calls
            ));
        }
        if s.checkpoints > 0 {
            lines.push(format!("checkpoints: {}", s.checkpoints));
        }
        lines
    }

    pub fn print_summary(&self) {
        for line in self.summary_lines() {
            eprintln!("{line}");
        }
    }
}

/// `--json` prints to stdout, `--output` writes the file.
pub fn emit<T: Serialize>(value: &T, json: bool, output: Option<&Path>) -> Result<(), CliError> {
    if !json && output.is_none() {
        return Ok(());
    }
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("cannot serialize report: {e}")))?;
    if let Some(path) = output {
        std::fs::write(path, format!("{text}\n")).map_err(|e| {
            CliError::new(EXIT_DATA_WRITE, format!("cannot write {}: {e}", path.display()))
        })?;
        eprintln!("wrote {}", path.display());
    }
    if json {
        println!("{text}");
    }
    Ok(())
}
