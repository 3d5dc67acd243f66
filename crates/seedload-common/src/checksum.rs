//! Content digests for change detection
//!
//! Source files are fingerprinted with SHA3-256 over their raw bytes and the
//! digest is stored hex-encoded (64 lowercase characters).

use sha3::{Digest, Sha3_256};

/// Length of a hex-encoded SHA3-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the SHA3-256 digest of bytes, hex-encoded
pub fn sha3_hex(data: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
