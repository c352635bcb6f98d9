use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::platform;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid collection root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("Invalid ignore pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying I/O failure means the volume is out of space.
    pub fn is_disk_full(&self) -> bool {
        match self {
            Error::Io { source, .. } => platform::is_disk_full(source),
            _ => false,
        }
    }
}

/// Failures of a single verified copy.
#[derive(Error, Debug)]
pub enum CopyError {
    #[error("Disk full while writing {path}: {source}")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(Error),

    #[error("Copy verification failed, destination deleted: {src} -> {dest}")]
    VerificationFailed { src: PathBuf, dest: PathBuf },
}

impl CopyError {
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        if platform::is_disk_full(&source) {
            CopyError::DiskFull {
                path: path.to_path_buf(),
                source,
            }
        } else {
            CopyError::Io(Error::io(path, source))
        }
    }
}

impl From<Error> for CopyError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io { path, source } => CopyError::from_io(&path, source),
            other => CopyError::Io(other),
        }
    }
}
