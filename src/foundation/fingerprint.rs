use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::Xxh3;

use crate::foundation::error::{ScaleError, ScaleResult};

const XXH3_SEED: u64 = 0x5ca1_ab1e_0d15_ea5e;

/// Number of digest bytes used for artifact names (40 bits).
pub const DIGEST_LENGTH: usize = 5;

const BASE32_TABLE: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// 128-bit content-addressed key. Stable across runs: the seed is fixed and every field is written
/// little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(pub u128);

/// Incremental hasher producing [`CacheKey`] values.
pub(crate) struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    pub(crate) fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    pub(crate) fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_u128(&mut self, v: u128) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    pub(crate) fn finish(self) -> CacheKey {
        CacheKey(self.inner.digest128())
    }
}

/// Encode the first 40 bits of `digest` as 8 base32 characters (RFC 4648 §6 alphabet).
pub fn encode_base32_digest(digest: &[u8]) -> ScaleResult<String> {
    let first: &[u8; DIGEST_LENGTH] = digest
        .get(..DIGEST_LENGTH)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            ScaleError::buffer_too_small(format!(
                "hash must be at least {DIGEST_LENGTH} bytes, got {}",
                digest.len()
            ))
        })?;
    Ok(encode(first))
}

fn encode(b: &[u8; DIGEST_LENGTH]) -> String {
    let idx = [
        b[0] >> 3,
        ((b[0] & 0x07) << 2) | (b[1] >> 6),
        (b[1] & 0x3e) >> 1,
        ((b[1] & 0x01) << 4) | (b[2] >> 4),
        ((b[2] & 0x0f) << 1) | (b[3] >> 7),
        (b[3] & 0x7c) >> 2,
        ((b[3] & 0x03) << 3) | (b[4] >> 5),
        b[4] & 0x1f,
    ];
    idx.iter()
        .map(|&i| char::from(BASE32_TABLE[usize::from(i)]))
        .collect()
}

/// Short content hash for naming cached artifacts: SHA-256 of `data`, truncated to 40 bits and
/// base32 encoded.
pub fn content_hash(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    let mut first = [0u8; DIGEST_LENGTH];
    first.copy_from_slice(&digest[..DIGEST_LENGTH]);
    encode(&first)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/fingerprint.rs"]
mod tests;
