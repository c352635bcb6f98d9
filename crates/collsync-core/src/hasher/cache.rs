use dashmap::DashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

use super::strong::{self, StrongDigest};
use super::xxhash;

/// Size and modification time observed when a digest was computed.
/// An entry whose stamp no longer matches the file is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl Stamp {
    fn read(file: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(file)?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug, Clone)]
struct CachedDigests {
    stamp: Stamp,
    fast: Option<u64>,
    strong: Option<StrongDigest>,
}

impl CachedDigests {
    fn empty(stamp: Stamp) -> Self {
        Self {
            stamp,
            fast: None,
            strong: None,
        }
    }
}

/// Session-scoped digest cache keyed on absolute path.
#[derive(Debug, Default)]
pub struct DigestCache {
    entries: DashMap<PathBuf, CachedDigests>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fast(&self, file: &Path, chunk_size: usize) -> io::Result<u64> {
        let (stamp, cached) = self.lookup(file)?;
        if let Some(hash) = cached.and_then(|c| c.fast) {
            trace!("Found fast hash for {} in cache", file.display());
            return Ok(hash);
        }
        let hash = xxhash::hash_file(file, chunk_size)?;
        self.store(file, stamp, |entry| entry.fast = Some(hash));
        Ok(hash)
    }

    pub fn strong(&self, file: &Path, chunk_size: usize) -> io::Result<StrongDigest> {
        let (stamp, cached) = self.lookup(file)?;
        if let Some(digest) = cached.and_then(|c| c.strong) {
            trace!("Found strong hash for {} in cache", file.display());
            return Ok(digest);
        }
        let digest = strong::hash_file(file, chunk_size)?;
        self.store(file, stamp, |entry| entry.strong = Some(digest));
        Ok(digest)
    }

    /// Strong digest if one is cached and still fresh; never hashes.
    pub fn cached_strong(&self, file: &Path) -> io::Result<Option<StrongDigest>> {
        let (_, cached) = self.lookup(file)?;
        Ok(cached.and_then(|c| c.strong))
    }

    pub fn forget(&self, file: &Path) {
        self.entries.remove(file);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, file: &Path) -> io::Result<(Stamp, Option<CachedDigests>)> {
        let stamp = Stamp::read(file)?;
        let cached = self
            .entries
            .get(file)
            .map(|entry| entry.value().clone())
            .filter(|entry| entry.stamp == stamp);
        Ok((stamp, cached))
    }

    fn store(&self, file: &Path, stamp: Stamp, update: impl FnOnce(&mut CachedDigests)) {
        let mut entry = self
            .entries
            .entry(file.to_path_buf())
            .or_insert_with(|| CachedDigests::empty(stamp));
        if entry.stamp != stamp {
            *entry = CachedDigests::empty(stamp);
        }
        update(entry.value_mut());
    }
}
