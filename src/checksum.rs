//! Checksum calculation for migration content

use sha2::{Digest, Sha256};

/// Calculate the ledger checksum of migration content.
///
/// This is used to detect that migration content changed after being
/// applied. The ledger stores a 32-bit value, so the first four bytes of
/// the SHA-256 digest are folded into an `i32` (big-endian).
pub fn checksum_of(content: &str) -> i32 {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
