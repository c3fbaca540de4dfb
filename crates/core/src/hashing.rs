//! SHA-256 digests for the audit log hash chain.
//!
//! Each `audit_logs` row stores the hex digest of its predecessor's hash
//! joined with its own canonical payload; see [`crate::audit`].

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_is_hex_encoded() {
        let hash = sha256_hex(br#"{"action_type":"ledger.purge","purged":3}"#);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
