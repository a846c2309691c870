//! Authentication: the signing key, capability tokens, and the shared secret
//! that bootstraps an admin session.

pub mod basic;
pub mod keys;
pub mod token;

pub use basic::{checksum_matches, hash_secret, SharedSecret};
pub use keys::{generate_signing_key_pem, KeyError, KeyStore};
pub use token::{Subject, TokenAuthority, TokenError};
