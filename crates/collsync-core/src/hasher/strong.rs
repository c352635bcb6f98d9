use std::io;
use std::path::Path;

use super::read_chunks;

/// 256-bit BLAKE3 digest.
pub type StrongDigest = [u8; 32];

/// Streams the file through BLAKE3; memory use is bounded by `chunk_size`.
pub fn hash_file(file: &Path, chunk_size: usize) -> io::Result<StrongDigest> {
    let mut hasher = blake3::Hasher::new();
    read_chunks(file, chunk_size, |chunk| {
        hasher.update(chunk);
    })?;
    Ok(*hasher.finalize().as_bytes())
}

pub fn to_hex(digest: &StrongDigest) -> String {
    blake3::Hash::from(*digest).to_hex().to_string()
}
