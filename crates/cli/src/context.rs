//! Settings plus the data sources they point at.
//!
//! Every loader maps its failure to a [`CliError`] with the registry exit
//! code, so commands can just `?`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use locus_config::{ConfigError, Settings};
use locus_geocode::reference::load_reference;
use locus_geocode::{
    CachedGeocoder, ClientOptions, ColumnMap, DataError, GeocodeCache, HttpGeocoder,
    MunicipalityStore, ReferenceRow,
};
use locus_resolver::{AreaCodeTable, CentroidLookup, Reconciler};

use crate::exit_codes::{
    EXIT_AREA_CODES, EXIT_CONFIG, EXIT_DATA_READ, EXIT_DATA_WRITE, EXIT_GEOCODER_UNCONFIGURED,
    EXIT_MISSING_CREDENTIAL, EXIT_REFERENCE_MISSING,
};
use crate::json_store::JsonFileEntityStore;
use crate::CliError;

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match &err {
            ConfigError::MissingCredential { env } => {
                let hint = format!("export {env}=<key>, or remove geocoder.api_key_env");
                CliError::new(EXIT_MISSING_CREDENTIAL, err.to_string()).with_hint(hint)
            }
            ConfigError::NotFound(_) => CliError::new(EXIT_CONFIG, err.to_string())
                .with_hint("create one with `locus config init --path <file>`"),
            _ => CliError::new(EXIT_CONFIG, err.to_string()),
        }
    }
}

pub fn data_read(err: DataError) -> CliError {
    CliError::new(EXIT_DATA_READ, err.to_string())
}

pub fn data_write(err: DataError) -> CliError {
    CliError::new(EXIT_DATA_WRITE, err.to_string())
}

pub struct Context {
    pub settings: Settings,
    /// File the settings came from; `None` means built-in defaults.
    pub config_path: Option<PathBuf>,
}

impl Context {
    pub fn load(explicit: Option<&Path>) -> Result<Self, CliError> {
        let (settings, config_path) = Settings::load_or_default(explicit)?;
        Ok(Self { settings, config_path })
    }

    /// Configured alternative table, or the built-in one. The version is
    /// the file stem.
    pub fn area_code_table(&self) -> Result<AreaCodeTable, CliError> {
        let Some(path) = &self.settings.paths.area_codes else {
            return Ok(AreaCodeTable::builtin());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::new(EXIT_AREA_CODES, format!("cannot read {}: {e}", path.display()))
        })?;
        let version = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".into());
        let table = AreaCodeTable::from_csv(version, &text).map_err(|e| {
            CliError::new(EXIT_AREA_CODES, format!("{}: {e}", path.display()))
        })?;
        log::info!("area-code table {} ({} prefixes)", table.version(), table.len());
        Ok(table)
    }

    /// Cached HTTP geocoder, or `None` when `geocoder.base_url` is unset.
    pub fn geocoder(&self) -> Result<Option<CachedGeocoder<HttpGeocoder>>, CliError> {
        let g = &self.settings.geocoder;
        let Some(base_url) = g.base_url.as_deref() else {
            return Ok(None);
        };
        let options = ClientOptions {
            timeout: Duration::from_secs(g.timeout_secs),
            request_interval: Duration::from_millis(g.request_interval_ms),
            max_retries: g.max_retries,
            api_key: self.settings.api_key()?,
            ..ClientOptions::default()
        };
        let client = HttpGeocoder::new(base_url, options)
            .map_err(|e| CliError::new(EXIT_CONFIG, e.to_string()))?;
        let cache = GeocodeCache::open(&self.settings.paths.geocode_cache).map_err(data_read)?;
        log::debug!("geocode cache: {} entries", cache.len());
        Ok(Some(CachedGeocoder::new(client, cache)))
    }

    pub fn require_geocoder(&self) -> Result<CachedGeocoder<HttpGeocoder>, CliError> {
        self.geocoder()?.ok_or_else(|| {
            CliError::new(EXIT_GEOCODER_UNCONFIGURED, "no geocoder configured")
                .with_hint("set geocoder.base_url in locus.toml")
        })
    }

    pub fn municipality_store(&self) -> Result<MunicipalityStore, CliError> {
        MunicipalityStore::open(&self.settings.paths.municipalities).map_err(data_read)
    }

    pub fn reference_rows(&self) -> Result<Vec<ReferenceRow>, CliError> {
        let Some(path) = &self.settings.paths.reference_csv else {
            return Err(CliError::new(EXIT_REFERENCE_MISSING, "no reference municipality CSV configured")
                .with_hint("set paths.reference_csv in locus.toml"));
        };
        let r = self.settings.reference;
        let columns = ColumnMap { code: r.code, prefecture: r.prefecture, district: r.district, city: r.city };
        load_reference(path, columns).map_err(|e| match e {
            DataError::NotFound(_) => CliError::new(EXIT_REFERENCE_MISSING, e.to_string()),
            other => data_read(other),
        })
    }

    pub fn entity_store(&self) -> Result<JsonFileEntityStore, CliError> {
        JsonFileEntityStore::open(&self.settings.paths.entities)
            .map_err(|e| CliError::new(EXIT_DATA_READ, e.to_string()))
    }

    pub fn reconciler<'a>(&self, centroids: Option<&'a dyn CentroidLookup>) -> Reconciler<'a> {
        let reconciler = Reconciler::new(self.settings.policy.clone(), self.settings.correction_rules());
        match centroids {
            Some(c) => reconciler.with_centroids(c),
            None => reconciler,
        }
    }
}
