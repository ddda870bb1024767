//! Secret hashing for credential records
//!
//! One-way, deterministic hashing of account secrets with a fixed salt.
//! The salt perturbs the digest so equal secrets in unrelated deployments
//! do not share hashes; determinism is required so that rotation with the
//! same secret is observable as a no-op change in tests and audits.

use base64::prelude::*;
use sha2::{Digest, Sha256};

/// Hash a plaintext secret with the given salt.
///
/// Output is a base64-encoded SHA-256 digest over `salt` followed by the
/// secret, so the same `(secret, salt)` pair always yields the same string.
pub fn hash_secret(secret: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    BASE64_STANDARD_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_is_deterministic() {
        let a = hash_secret("pw1", "212021918");
        let b = hash_secret("pw1", "212021918");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_secrets_differ() {
        assert_ne!(hash_secret("pw1", "212021918"), hash_secret("pw2", "212021918"));
    }

    #[test]
    fn test_salt_perturbs_hash() {
        assert_ne!(hash_secret("pw1", "salt-a"), hash_secret("pw1", "salt-b"));
    }

    #[test]
    fn test_hash_contains_no_delimiter() {
        // Hashes are stored in colon-delimited lines; base64 output must
        // never contain the delimiter.
        let hash = hash_secret("pw1", "212021918");
        assert!(!hash.contains(':'));
        assert!(!hash.contains('\n'));
    }
}
