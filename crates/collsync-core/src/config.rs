use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::hasher::Tier;

pub const DEFAULT_HASH_CHUNK_SIZE: usize = 64 * 1024;
const MIN_HASH_CHUNK_SIZE: usize = 4 * 1024;
const MAX_HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// What the scanner does when a directory inside a collection entry cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnreadablePolicy {
    /// Record the failure in the scan outcome and keep walking.
    #[default]
    Skip,
    /// Fail the whole scan.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub primary_root: Option<String>,
    pub backup_root: Option<String>,
    pub exclusion_marker: String,
    pub reserved_dir_names: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub comparison_mode: Option<Tier>,
    pub hash_chunk_size: usize,
    pub on_unreadable: UnreadablePolicy,
    pub collision_suffix: String,
    pub parallel_hashing: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            primary_root: None,
            backup_root: None,
            exclusion_marker: "_".to_string(),
            reserved_dir_names: default_reserved_dir_names(),
            ignore_patterns: Vec::new(),
            comparison_mode: None,
            hash_chunk_size: DEFAULT_HASH_CHUNK_SIZE,
            on_unreadable: UnreadablePolicy::Skip,
            collision_suffix: "_".to_string(),
            parallel_hashing: false,
        }
    }
}

impl AppConfig {
    /// Chunk size clamped to the range the hasher accepts.
    pub fn effective_chunk_size(&self) -> usize {
        self.hash_chunk_size
            .clamp(MIN_HASH_CHUNK_SIZE, MAX_HASH_CHUNK_SIZE)
    }
}

/// Volume metadata directories that never hold collection entries.
pub fn default_reserved_dir_names() -> Vec<String> {
    [
        "System Volume Information",
        "$RECYCLE.BIN",
        "lost+found",
        ".Trashes",
        ".Spotlight-V100",
        ".fseventsd",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

/// Defaults, then an optional `Config.toml` in the working directory, then
/// `COLLSYNC_*` environment variables.
pub fn load_configuration() -> std::result::Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("COLLSYNC").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

pub fn load_configuration_from(path: &Path) -> std::result::Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(path).required(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Checks that `path` names an existing, traversable directory.
pub fn validate_root(path: &Path) -> Result<PathBuf> {
    let metadata = fs::metadata(path).map_err(|err| Error::InvalidRoot {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    if !metadata.is_dir() {
        return Err(Error::InvalidRoot {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    fs::read_dir(path).map_err(|err| Error::InvalidRoot {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    Ok(path.to_path_buf())
}

/// Validates both roots and rejects a backup that is the primary itself.
pub fn validate_roots(primary: &Path, backup: &Path) -> Result<(PathBuf, PathBuf)> {
    let primary = validate_root(primary)?;
    let backup = validate_root(backup)?;

    let same = match (fs::canonicalize(&primary), fs::canonicalize(&backup)) {
        (Ok(p), Ok(b)) => p == b,
        _ => primary == backup,
    };
    if same {
        return Err(Error::InvalidRoot {
            path: backup,
            reason: "backup root is the same directory as the primary root".to_string(),
        });
    }
    Ok((primary, backup))
}
