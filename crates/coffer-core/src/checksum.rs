//! SHA-256 digest helpers.
//!
//! Content checksums are stored as lowercase hex strings. Verification
//! compares in constant time so a stored digest cannot be probed
//! byte-by-byte through timing.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data` as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Recompute the digest of `data` and compare it to `expected` (hex).
///
/// Returns `false` on any mismatch, including a malformed `expected`.
pub fn verify_sha256(data: &[u8], expected: &str) -> bool {
    let actual = sha256_hex(data);
    constant_time_eq(actual.as_bytes(), expected.to_ascii_lowercase().as_bytes())
}

/// Constant-time byte-slice equality.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // Well-known SHA-256 of the empty string.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify_roundtrip() {
        let digest = sha256_hex(b"hello world");
        assert!(verify_sha256(b"hello world", &digest));
        assert!(verify_sha256(b"hello world", &digest.to_uppercase()));
        assert!(!verify_sha256(b"hello worlds", &digest));
        assert!(!verify_sha256(b"hello world", "deadbeef"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
