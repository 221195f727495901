use std::fmt;
use std::path::{Path, PathBuf};

/// Failure reading or writing one of the persisted data files.
#[derive(Debug)]
pub enum DataError {
    NotFound(PathBuf),
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
}

impl DataError {
    pub(crate) fn io(path: &Path, err: impl fmt::Display) -> Self {
        Self::Io { path: path.to_path_buf(), message: err.to_string() }
    }

    pub(crate) fn parse(path: &Path, err: impl fmt::Display) -> Self {
        Self::Parse { path: path.to_path_buf(), message: err.to_string() }
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Parse { path, message } => write!(f, "{}: invalid data: {message}", path.display()),
        }
    }
}

impl std::error::Error for DataError {}
