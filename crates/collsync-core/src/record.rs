use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A regular file found under a collection root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the collection root.
    pub relative: PathBuf,
    /// Absolute (root-joined) path.
    pub path: PathBuf,
    pub size: u64,
}

impl FileRecord {
    pub fn new(relative: impl Into<PathBuf>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            relative: relative.into(),
            path: path.into(),
            size,
        }
    }

    /// Builds a record for `root/relative` from the file's current metadata.
    pub fn from_root(root: &Path, relative: impl Into<PathBuf>) -> Result<Self> {
        let relative = relative.into();
        let path = root.join(&relative);
        let metadata = fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Self::new(relative, path, metadata.len()))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.relative.file_name().and_then(|name| name.to_str())
    }

    /// Relative parent directory; empty for a path directly under the root.
    pub fn relative_parent(&self) -> &Path {
        self.relative.parent().unwrap_or_else(|| Path::new(""))
    }
}
