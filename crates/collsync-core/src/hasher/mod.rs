//! Tiered content identity.
//!
//! Files are compared from cheapest to most expensive evidence:
//! 1. Size from the scan (no reads; a mismatch is a hard veto)
//! 2. Streaming XxHash64
//! 3. Streaming BLAKE3
//!
//! Digests are kept in a [`DigestCache`] for the lifetime of the owning session.

pub mod cache;
pub mod strong;
pub mod xxhash;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::{trace, warn};

use crate::config::DEFAULT_HASH_CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::record::FileRecord;
pub use cache::DigestCache;
pub use strong::StrongDigest;

/// Identity tier, ordered by cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "size")]
    Size,
    #[serde(rename = "fast", alias = "xxhash")]
    FastHash,
    #[serde(rename = "strong", alias = "sha256", alias = "blake3")]
    StrongHash,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Size => "size",
            Tier::FastHash => "fast",
            Tier::StrongHash => "strong",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "size" => Ok(Tier::Size),
            "fast" | "xxhash" => Ok(Tier::FastHash),
            "strong" | "sha256" | "blake3" => Ok(Tier::StrongHash),
            other => Err(format!(
                "unknown comparison mode '{}', expected size, fast or strong",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityDigest {
    Size(u64),
    FastHash(u64),
    StrongHash(StrongDigest),
}

impl IdentityDigest {
    pub fn tier(&self) -> Tier {
        match self {
            IdentityDigest::Size(_) => Tier::Size,
            IdentityDigest::FastHash(_) => Tier::FastHash,
            IdentityDigest::StrongHash(_) => Tier::StrongHash,
        }
    }
}

/// Compares file records tier by tier, caching digests as it goes.
#[derive(Debug)]
pub struct Comparator {
    cache: DigestCache,
    chunk_size: usize,
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_CHUNK_SIZE)
    }
}

impl Comparator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            cache: DigestCache::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// True once every tier up to and including `tier` agrees.
    pub fn identical(&self, a: &FileRecord, b: &FileRecord, tier: Tier) -> Result<bool> {
        if a.size != b.size {
            trace!(
                "Size veto: {} ({}) vs {} ({})",
                a.path.display(),
                a.size,
                b.path.display(),
                b.size
            );
            return Ok(false);
        }
        if tier == Tier::Size {
            return Ok(true);
        }

        if tier == Tier::StrongHash {
            if let (Some(x), Some(y)) = (self.cached_strong(&a.path)?, self.cached_strong(&b.path)?)
            {
                return Ok(x == y);
            }
        }

        if self.fast(&a.path)? != self.fast(&b.path)? {
            return Ok(false);
        }
        if tier == Tier::FastHash {
            return Ok(true);
        }

        Ok(self.strong(&a.path)? == self.strong(&b.path)?)
    }

    pub fn digest(&self, record: &FileRecord, tier: Tier) -> Result<IdentityDigest> {
        Ok(match tier {
            Tier::Size => IdentityDigest::Size(record.size),
            Tier::FastHash => IdentityDigest::FastHash(self.fast(&record.path)?),
            Tier::StrongHash => IdentityDigest::StrongHash(self.strong(&record.path)?),
        })
    }

    /// Checks a freshly written copy against its source at the strongest tier.
    /// The copy is always re-read; only the source digest may come from cache.
    pub fn verify_copy(&self, src: &FileRecord, copy: &Path) -> Result<bool> {
        let src_len = std::fs::metadata(&src.path)
            .map_err(|e| Error::io(&src.path, e))?
            .len();
        let copy_len = std::fs::metadata(copy)
            .map_err(|e| Error::io(copy, e))?
            .len();
        if src_len != copy_len {
            return Ok(false);
        }
        let expected = self.strong(&src.path)?;
        let actual = strong::hash_file(copy, self.chunk_size).map_err(|e| Error::io(copy, e))?;
        if expected != actual {
            warn!(
                "Digest mismatch for {}: expected {}, got {}",
                copy.display(),
                strong::to_hex(&expected),
                strong::to_hex(&actual)
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Warms the cache for `records` on the rayon pool. Hashing is read-only,
    /// so this never races with filesystem mutations. Returns per-file failures.
    pub fn prehash(&self, records: &[FileRecord], tier: Tier) -> Vec<Error> {
        if tier == Tier::Size {
            return Vec::new();
        }
        records
            .par_iter()
            .filter_map(|record| self.digest(record, tier).err())
            .collect()
    }

    pub fn forget(&self, file: &Path) {
        self.cache.forget(file);
    }

    pub fn cache(&self) -> &DigestCache {
        &self.cache
    }

    fn fast(&self, file: &Path) -> Result<u64> {
        self.cache
            .fast(file, self.chunk_size)
            .map_err(|e| Error::io(file, e))
    }

    fn strong(&self, file: &Path) -> Result<StrongDigest> {
        self.cache
            .strong(file, self.chunk_size)
            .map_err(|e| Error::io(file, e))
    }

    fn cached_strong(&self, file: &Path) -> Result<Option<StrongDigest>> {
        self.cache
            .cached_strong(file)
            .map_err(|e| Error::io(file, e))
    }
}

/// Feeds `file` to `sink` in chunks of at most `chunk_size` bytes.
pub(crate) fn read_chunks(
    file: &Path,
    chunk_size: usize,
    mut sink: impl FnMut(&[u8]),
) -> io::Result<()> {
    let mut f = File::open(file)?;
    let mut buffer = vec![0; chunk_size.max(1)];
    loop {
        match f.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => sink(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_record(root: &Path, name: &str, contents: &[u8]) -> FileRecord {
        fs::write(root.join(name), contents).unwrap();
        FileRecord::from_root(root, name).unwrap()
    }

    #[test]
    fn test_reflexive_at_every_tier() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.bin", b"some bytes");
        let comparator = Comparator::default();
        for tier in [Tier::Size, Tier::FastHash, Tier::StrongHash] {
            assert!(comparator.identical(&a, &a, tier).unwrap());
        }
    }

    #[test]
    fn test_size_veto_reads_nothing() {
        // Neither path exists; any read would surface as an error.
        let a = FileRecord::new("a", PathBuf::from("/nonexistent/a"), 10);
        let b = FileRecord::new("b", PathBuf::from("/nonexistent/b"), 11);
        let comparator = Comparator::default();
        for tier in [Tier::Size, Tier::FastHash, Tier::StrongHash] {
            assert!(!comparator.identical(&a, &b, tier).unwrap());
        }
        assert!(comparator.cache().is_empty());
    }

    #[test]
    fn test_same_size_different_content() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.bin", b"aaaa");
        let b = write_record(dir.path(), "b.bin", b"bbbb");
        let comparator = Comparator::default();

        assert!(comparator.identical(&a, &b, Tier::Size).unwrap());
        assert!(!comparator.identical(&a, &b, Tier::FastHash).unwrap());
        assert!(!comparator.identical(&a, &b, Tier::StrongHash).unwrap());
    }

    #[test]
    fn test_identical_copies_match_at_strong_tier() {
        let dir = tempdir().unwrap();
        let data = vec![7u8; 100_000];
        let a = write_record(dir.path(), "a.bin", &data);
        let b = write_record(dir.path(), "b.bin", &data);
        let comparator = Comparator::new(4096);
        assert!(comparator.identical(&a, &b, Tier::StrongHash).unwrap());
        // Second comparison is served from cached strong digests.
        assert!(comparator.identical(&a, &b, Tier::StrongHash).unwrap());
    }

    #[test]
    fn test_unreadable_file_is_an_error_not_a_mismatch() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.bin", b"data");
        let b = FileRecord::new("b.bin", dir.path().join("b.bin"), 4);
        let comparator = Comparator::default();
        assert!(matches!(
            comparator.identical(&a, &b, Tier::FastHash),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_digest_tiers() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.bin", b"data");
        let comparator = Comparator::default();
        assert_eq!(
            comparator.digest(&a, Tier::Size).unwrap(),
            IdentityDigest::Size(4)
        );
        assert_eq!(
            comparator.digest(&a, Tier::FastHash).unwrap(),
            IdentityDigest::FastHash(xxhash::hash_data(b"data"))
        );
        assert_eq!(
            comparator.digest(&a, Tier::StrongHash).unwrap().tier(),
            Tier::StrongHash
        );
    }

    #[test]
    fn test_verify_copy_detects_corruption() {
        let dir = tempdir().unwrap();
        let src = write_record(dir.path(), "src.bin", b"original");
        fs::write(dir.path().join("good.bin"), b"original").unwrap();
        fs::write(dir.path().join("bad.bin"), b"originaX").unwrap();

        let comparator = Comparator::default();
        assert!(comparator.verify_copy(&src, &dir.path().join("good.bin")).unwrap());
        assert!(!comparator.verify_copy(&src, &dir.path().join("bad.bin")).unwrap());
    }

    #[test]
    fn test_prehash_fills_cache_and_reports_failures() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.bin", b"one");
        let b = write_record(dir.path(), "b.bin", b"two");
        let missing = FileRecord::new("c.bin", dir.path().join("c.bin"), 3);

        let comparator = Comparator::default();
        let failures = comparator.prehash(&[a, b, missing], Tier::StrongHash);
        assert_eq!(failures.len(), 1);
        assert_eq!(comparator.cache().len(), 2);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("size".parse::<Tier>().unwrap(), Tier::Size);
        assert_eq!("xxhash".parse::<Tier>().unwrap(), Tier::FastHash);
        assert_eq!("SHA256".parse::<Tier>().unwrap(), Tier::StrongHash);
        assert!("medium".parse::<Tier>().is_err());
        assert!(Tier::Size < Tier::FastHash && Tier::FastHash < Tier::StrongHash);
    }
}
