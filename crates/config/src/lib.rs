// Configuration loading

pub mod settings;

use std::fmt;
use std::path::PathBuf;

pub use settings::{
    BatchSettings, GeocoderSettings, PathSettings, ReferenceColumns, Settings, FILE_NAME,
};

#[derive(Debug)]
pub enum ConfigError {
    NotFound(PathBuf),
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    Invalid(String),
    /// `geocoder.api_key_env` names a variable that is not set.
    MissingCredential { env: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "config file not found: {}", path.display()),
            Self::Io { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            Self::Parse { path, message } => write!(f, "invalid config {}: {message}", path.display()),
            Self::Invalid(msg) => write!(f, "{msg}"),
            Self::MissingCredential { env } => {
                write!(f, "geocoder API key variable {env} is not set")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
