//! SHA-256 hex digests for poster keys and job submission keys.

use sha2::{Digest, Sha256};

/// Hex characters of the digest kept in poster object keys.
pub const SHORT_DIGEST_LEN: usize = 12;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Leading [`SHORT_DIGEST_LEN`] hex characters of [`sha256_hex`].
pub fn short_digest(data: &[u8]) -> String {
    let mut hex = sha256_hex(data);
    hex.truncate(SHORT_DIGEST_LEN);
    hex
}
