//! `locus.toml` settings.
//!
//! Every section is optional; a missing key takes its default. Relative
//! paths in `[paths]` are resolved against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use locus_resolver::prefecture;
use locus_resolver::reconcile::default_rules;
use locus_resolver::{CorrectionRule, ReconcilePolicy};

use crate::ConfigError;

pub const FILE_NAME: &str = "locus.toml";

/// Upper bound for `geocoder.max_retries`.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderSettings {
    /// Geocoding service root. Geocoding is disabled when unset.
    pub base_url: Option<String>,
    /// Environment variable holding the API key, if the service needs one.
    pub api_key_env: Option<String>,
    pub request_interval_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: None,
            request_interval_ms: 500,
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub entities: PathBuf,
    pub geocode_cache: PathBuf,
    pub municipalities: PathBuf,
    pub reference_csv: Option<PathBuf>,
    pub overrides: Option<PathBuf>,
    /// Alternative area-code table version (`prefix,prefecture,city,lat,lng`).
    pub area_codes: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            entities: PathBuf::from("entities.json"),
            geocode_cache: PathBuf::from("geocode-cache.json"),
            municipalities: PathBuf::from("municipalities.json"),
            reference_csv: None,
            overrides: None,
            area_codes: None,
        }
    }
}

impl PathSettings {
    fn resolve_against(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.entities);
        join(&mut self.geocode_cache);
        join(&mut self.municipalities);
        for p in [&mut self.reference_csv, &mut self.overrides, &mut self.area_codes]
            .into_iter()
            .flatten()
        {
            join(p);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Store checkpoint + cache flush every N entities.
    pub checkpoint_every: usize,
    /// Bounded sample size per reported error kind.
    pub sample_limit: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { checkpoint_every: 50, sample_limit: 20 }
    }
}

/// Column positions in the reference municipality CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceColumns {
    pub code: usize,
    pub prefecture: usize,
    pub district: usize,
    pub city: usize,
}

impl Default for ReferenceColumns {
    fn default() -> Self {
        Self { code: 0, prefecture: 1, district: 2, city: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub geocoder: GeocoderSettings,
    pub paths: PathSettings,
    pub batch: BatchSettings,
    pub reference: ReferenceColumns,
    pub policy: ReconcilePolicy,
    /// Replaces the built-in rule table when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrections: Option<Vec<CorrectionRule>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            geocoder: GeocoderSettings::default(),
            paths: PathSettings::default(),
            batch: BatchSettings::default(),
            reference: ReferenceColumns::default(),
            policy: ReconcilePolicy::default(),
            corrections: None,
        }
    }
}

impl Settings {
    /// `<config dir>/locus/locus.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("locus")
            .join(FILE_NAME)
    }

    pub fn from_toml(text: &str) -> Result<Self, String> {
        let settings: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate `path`. The file must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ConfigError::Io { path: path.to_path_buf(), message: e.to_string() });
            }
        };
        let mut settings = Self::from_toml(&text)
            .map_err(|message| ConfigError::Parse { path: path.to_path_buf(), message })?;
        if let Some(base) = path.parent() {
            settings.paths.resolve_against(base);
        }
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Explicit path (flag or `LOCUS_CONFIG`) must exist. The default path
    /// falls back to built-in defaults when absent.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        let path = Self::default_path();
        if path.exists() {
            Ok((Self::load(&path)?, Some(path)))
        } else {
            log::debug!("no config at {}, using defaults", path.display());
            Ok((Self::default(), None))
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = &self.geocoder.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("geocoder.base_url must be http(s): '{url}'"));
            }
        }
        if self.geocoder.timeout_secs == 0 {
            return Err("geocoder.timeout_secs must be > 0".into());
        }
        if self.geocoder.max_retries > MAX_RETRIES {
            return Err(format!(
                "geocoder.max_retries must be at most {MAX_RETRIES}, got {}",
                self.geocoder.max_retries
            ));
        }
        if self.batch.checkpoint_every == 0 {
            return Err("batch.checkpoint_every must be > 0".into());
        }
        if self.policy.low_max_region_distance > self.policy.medium_max_region_distance {
            return Err(format!(
                "policy.low_max_region_distance ({}) exceeds policy.medium_max_region_distance ({})",
                self.policy.low_max_region_distance, self.policy.medium_max_region_distance
            ));
        }
        for rule in self.corrections.iter().flatten() {
            validate_rule(rule)?;
        }
        Ok(())
    }

    /// Configured correction rules, or the built-in table.
    pub fn correction_rules(&self) -> Vec<CorrectionRule> {
        self.corrections.clone().unwrap_or_else(default_rules)
    }

    /// API key from the configured environment variable.
    ///
    /// `Ok(None)` when no variable is configured; an error when one is
    /// configured but unset, so a run never silently goes unauthenticated.
    pub fn api_key(&self) -> Result<Option<String>, ConfigError> {
        let Some(var) = &self.geocoder.api_key_env else {
            return Ok(None);
        };
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(ConfigError::MissingCredential { env: var.clone() }),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    /// Write a commented starter file. Refuses to overwrite.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::Invalid(format!("{} already exists", path.display())));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io { path: parent.to_path_buf(), message: e.to_string() })?;
        }
        fs::write(path, TEMPLATE)
            .map_err(|e| ConfigError::Io { path: path.to_path_buf(), message: e.to_string() })
    }
}

fn validate_rule(rule: &CorrectionRule) -> Result<(), String> {
    if rule.id.trim().is_empty() {
        return Err("correction rule with empty id".into());
    }
    let digits_ok = rule.prefix.len() >= 2
        && rule.prefix.starts_with('0')
        && rule.prefix.chars().all(|c| c.is_ascii_digit());
    if !digits_ok {
        return Err(format!("rule '{}': prefix '{}' is not an area-code prefix", rule.id, rule.prefix));
    }
    if rule.from.is_empty() || rule.to.is_empty() {
        return Err(format!("rule '{}': from and to must not be empty", rule.id));
    }
    if let Some(bad) = rule.from.iter().chain(&rule.to).find(|p| !prefecture::is_prefecture(p)) {
        return Err(format!("rule '{}': unknown prefecture '{bad}'", rule.id));
    }
    Ok(())
}

const TEMPLATE: &str = r#"# locus configuration

[geocoder]
# base_url = "https://msearch.gsi.go.jp"
# api_key_env = "LOCUS_GEOCODER_KEY"
request_interval_ms = 500
timeout_secs = 10
max_retries = 2

[paths]
# Relative paths are resolved against this file's directory.
entities = "entities.json"
geocode_cache = "geocode-cache.json"
municipalities = "municipalities.json"
# reference_csv = "municipalities-reference.csv"
# overrides = "overrides.json"
# area_codes = "area-codes.csv"

[batch]
checkpoint_every = 50
sample_limit = 20

[reference]
code = 0
prefecture = 1
district = 2
city = 3

[policy]
single_area_override = true
tolerate_adjacent = true
low_max_region_distance = 0
medium_max_region_distance = 2

# Uncomment to replace the built-in correction rules.
# [[corrections]]
# id = "shikoku-088"
# prefix = "088"
# from = ["高知県", "香川県"]
# to = ["徳島県", "高知県"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let s = Settings::from_toml("").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.batch.checkpoint_every, 50);
        assert_eq!(s.geocoder.request_interval_ms, 500);
        assert_eq!(s.correction_rules(), default_rules());
    }

    #[test]
    fn template_parses() {
        let s = Settings::from_toml(TEMPLATE).unwrap();
        assert_eq!(s.reference, ReferenceColumns::default());
        assert!(s.corrections.is_none());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let s = Settings::from_toml(
            r#"
[geocoder]
base_url = "http://localhost:8080"

[policy]
tolerate_adjacent = false
"#,
        )
        .unwrap();
        assert_eq!(s.geocoder.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(s.geocoder.max_retries, 2);
        assert!(!s.policy.tolerate_adjacent);
        assert!(s.policy.single_area_override);
    }

    #[test]
    fn custom_corrections_replace_builtin() {
        let s = Settings::from_toml(
            r#"
[[corrections]]
id = "tama"
prefix = "042"
from = ["東京都"]
to = ["神奈川県"]
"#,
        )
        .unwrap();
        let rules = s.correction_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].to, vec!["神奈川県"]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Settings::from_toml("[batch]\ncheckpoint_every = 0").is_err());
        assert!(Settings::from_toml("[geocoder]\nbase_url = \"ftp://x\"").is_err());
        assert!(Settings::from_toml("[geocoder]\nmax_retries = 10").is_ok());
        let err = Settings::from_toml("[geocoder]\nmax_retries = 4294967295").unwrap_err();
        assert!(err.contains("max_retries"), "{err}");
        assert!(Settings::from_toml(
            "[policy]\nlow_max_region_distance = 3\nmedium_max_region_distance = 1"
        )
        .is_err());
        let err = Settings::from_toml(
            "[[corrections]]\nid = \"x\"\nprefix = \"088\"\nfrom = [\"高知\"]\nto = [\"徳島県\"]",
        )
        .unwrap_err();
        assert!(err.contains("unknown prefecture"), "{err}");
    }

    #[test]
    fn relative_paths_follow_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "[paths]\nentities = \"data/e.json\"\nreference_csv = \"/abs/ref.csv\"\n").unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.paths.entities, dir.path().join("data/e.json"));
        assert_eq!(s.paths.reference_csv, Some(PathBuf::from("/abs/ref.csv")));
        assert_eq!(s.paths.municipalities, dir.path().join("municipalities.json"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Settings::load_or_default(Some(Path::new("/nonexistent/locus.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn api_key_env_must_be_set() {
        let mut s = Settings::default();
        assert_eq!(s.api_key().unwrap(), None);

        s.geocoder.api_key_env = Some("LOCUS_TEST_UNSET_KEY_VAR".into());
        assert!(matches!(s.api_key(), Err(ConfigError::MissingCredential { .. })));

        std::env::set_var("LOCUS_TEST_SET_KEY_VAR", "abc");
        s.geocoder.api_key_env = Some("LOCUS_TEST_SET_KEY_VAR".into());
        assert_eq!(s.api_key().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn template_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(FILE_NAME);
        Settings::write_template(&path).unwrap();
        assert!(Settings::load(&path).is_ok());
        assert!(Settings::write_template(&path).is_err());
    }

    #[test]
    fn show_roundtrips() {
        let mut s = Settings::default();
        s.corrections = Some(default_rules());
        let text = s.to_toml_string().unwrap();
        assert_eq!(Settings::from_toml(&text).unwrap(), s);
    }
}
