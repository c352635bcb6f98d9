use std::hash::Hasher as _;
use std::io;
use std::path::Path;
use twox_hash::XxHash64;

use super::read_chunks;

/// Streams the whole file through XxHash64 (seed 0), `chunk_size` bytes at a time.
pub fn hash_file(file: &Path, chunk_size: usize) -> io::Result<u64> {
    let mut hasher = XxHash64::with_seed(0);
    read_chunks(file, chunk_size, |chunk| hasher.write(chunk))?;
    Ok(hasher.finish())
}

pub fn hash_data(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}
