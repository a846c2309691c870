//! Pre-shared secret authentication and payload checksums.
//!
//! The configured value is `hex(sha256("{secret}:{salt}"))`, so the secret
//! itself never sits in configuration.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Salted hash of the single shared secret that unlocks an admin token.
#[derive(Clone)]
pub struct SharedSecret {
    hash_hex: String,
    salt: String,
}

impl SharedSecret {
    pub fn new(hash_hex: impl Into<String>, salt: impl Into<String>) -> Self {
        Self {
            hash_hex: hash_hex.into().to_ascii_lowercase(),
            salt: salt.into(),
        }
    }

    /// Check a client-supplied secret. An empty secret, or an unconfigured
    /// hash, never matches.
    pub fn verify(&self, secret: &str) -> bool {
        if secret.is_empty() || self.hash_hex.is_empty() {
            return false;
        }
        let candidate = hash_secret(secret, &self.salt);
        candidate.as_bytes().ct_eq(self.hash_hex.as_bytes()).into()
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("configured", &!self.hash_hex.is_empty())
            .finish()
    }
}

/// Produce the value to configure as the shared-secret hash.
pub fn hash_secret(secret: &str, salt: &str) -> String {
    hex::encode(Sha256::digest(format!("{secret}:{salt}").as_bytes()))
}

/// SHA-256 hex checksum comparison for uploaded payloads.
pub fn checksum_matches(payload: &[u8], checksum: &str) -> bool {
    let computed = hex::encode(Sha256::digest(payload));
    computed.eq_ignore_ascii_case(checksum)
}
