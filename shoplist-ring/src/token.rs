use sha2::{Digest, Sha256};

/// Position on the ring.
pub type Token = u128;

/// Hashes `key` onto the ring: the first 16 bytes of its SHA-256, big-endian.
#[must_use]
pub fn token_for(key: &str) -> Token {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(bytes)
}
