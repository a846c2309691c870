//! Scoped, time-limited bearer tokens.
//!
//! Wire format: `{expiry}_{salt}_{signature}` where
//! - `expiry` is decimal Unix seconds,
//! - `salt` is the hex SHA-256 of 2048 random bytes,
//! - `signature` is the hex DER encoding of an ECDSA P-256 signature over
//!   `SHA-256("{subject}:{expiry}_{salt}")`.
//!
//! The subject is never part of the token. The verifier supplies it, so a
//! token only verifies against the exact subject string it was issued for.
//! Changing how [`Subject`] renders silently invalidates every token already
//! handed out.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use p256::ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use p256::ecdsa::Signature;
use percent_encoding::percent_decode_str;
use rand::RngCore;
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use crate::auth::keys::KeyStore;

/// Size of the random payload hashed into each token's salt.
const RANDOM_PAYLOAD_SIZE: usize = 2048;

const COMPONENT_SEPARATOR: char = '_';

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token validity of {requested_secs}s is outside (0, {max_secs}s]")]
    InvalidDuration { requested_secs: i64, max_secs: i64 },

    #[error("token subject path cannot be empty")]
    EmptySubject,

    #[error("authentication token is malformed: {0}")]
    Malformed(&'static str),

    #[error("authentication token has expired")]
    Expired,

    #[error("could not sign token: {0}")]
    Signing(String),
}

/// What a token grants. Rendered into the signed preimage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Full capability: upload, list, view and delete in every tier.
    Admin,
    /// Read access to exactly one file in one tier.
    /// `file_name` is the real (untagged) name, never the stored name.
    Image { tier: String, file_name: String },
}

impl Subject {
    pub fn image(tier: impl Into<String>, file_name: impl Into<String>) -> Self {
        Subject::Image {
            tier: tier.into(),
            file_name: file_name.into(),
        }
    }

    /// Upper bound on validity. Admin tokens carry more capability, so they
    /// live shorter.
    pub fn max_validity(&self) -> Duration {
        match self {
            Subject::Admin => Duration::hours(12),
            Subject::Image { .. } => Duration::hours(48),
        }
    }

    pub fn render(&self) -> Cow<'static, str> {
        match self {
            Subject::Admin => Cow::Borrowed("user/admin"),
            Subject::Image { tier, file_name } => Cow::Owned(format!("image/{tier}/{file_name}")),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Issues and verifies tokens with a single injected key.
#[derive(Debug, Clone)]
pub struct TokenAuthority {
    keys: KeyStore,
}

impl TokenAuthority {
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }

    /// Issue a token for `subject` valid for `validity` from now.
    pub fn issue(&self, subject: &Subject, validity: Duration) -> Result<String, TokenError> {
        self.issue_at(subject, validity, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: &Subject,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let max = subject.max_validity();
        if validity <= Duration::zero() || validity > max {
            return Err(TokenError::InvalidDuration {
                requested_secs: validity.num_seconds(),
                max_secs: max.num_seconds(),
            });
        }
        if let Subject::Image { tier, file_name } = subject {
            if tier.is_empty() || file_name.is_empty() {
                return Err(TokenError::EmptySubject);
            }
        }

        let mut payload = vec![0u8; RANDOM_PAYLOAD_SIZE];
        rand::rng().fill_bytes(&mut payload);
        let salt = hex::encode(Sha256::digest(&payload));

        let expiry = now
            .checked_add_signed(validity)
            .ok_or(TokenError::InvalidDuration {
                requested_secs: validity.num_seconds(),
                max_secs: max.num_seconds(),
            })?
            .timestamp();
        let salted_expiry = format!("{expiry}{COMPONENT_SEPARATOR}{salt}");
        let digest = preimage_digest(&subject.render(), &salted_expiry);

        // Hedged signing: RFC 6979 nonce mixed with fresh OS randomness.
        let signature: Signature = self
            .keys
            .signing_key()
            .sign_prehash_with_rng(&mut OsRng, &digest)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        tracing::debug!(subject = %subject, expiry, "Issued token");
        Ok(format!(
            "{salted_expiry}{COMPONENT_SEPARATOR}{}",
            hex::encode(signature.to_der().as_bytes())
        ))
    }

    /// Verify `token` against `subject`.
    ///
    /// `Ok(false)` covers both forged signatures and tokens issued for a
    /// different subject; the two cases are deliberately indistinguishable.
    pub fn verify(&self, token: &str, subject: &Subject) -> Result<bool, TokenError> {
        self.verify_at(token, subject, Utc::now())
    }

    /// Verify as if the current time were `now`.
    pub fn verify_at(
        &self,
        token: &str,
        subject: &Subject,
        now: DateTime<Utc>,
    ) -> Result<bool, TokenError> {
        let token = query_unescape(token)?;

        let components: Vec<&str> = token.split(COMPONENT_SEPARATOR).collect();
        let [expiry, salt, signature] = &components[..] else {
            return Err(TokenError::Malformed("expected three components"));
        };

        let declared: i64 = expiry
            .parse()
            .map_err(|_| TokenError::Malformed("expiry is not a Unix timestamp"))?;
        let expires_at = DateTime::<Utc>::from_timestamp(declared, 0)
            .ok_or(TokenError::Malformed("expiry is out of range"))?;
        if expires_at < now {
            return Err(TokenError::Expired);
        }

        let signature_der =
            hex::decode(signature).map_err(|_| TokenError::Malformed("signature is not hex"))?;
        let signature = Signature::from_der(&signature_der)
            .map_err(|_| TokenError::Malformed("signature is not a DER (r, s) pair"))?;

        let digest = preimage_digest(
            &subject.render(),
            &format!("{expiry}{COMPONENT_SEPARATOR}{salt}"),
        );
        Ok(self
            .keys
            .verifying_key()
            .verify_prehash(&digest, &signature)
            .is_ok())
    }

    /// `true` only for a well-formed, unexpired token signed for `subject`.
    pub fn is_valid(&self, token: &str, subject: &Subject) -> bool {
        matches!(self.verify(token, subject), Ok(true))
    }
}

fn preimage_digest(subject: &str, salted_expiry: &str) -> [u8; 32] {
    Sha256::digest(format!("{subject}:{salted_expiry}").as_bytes()).into()
}

/// Undo query-string escaping: `+` is a space, `%XX` is a byte. A `%` not
/// followed by two hex digits is malformed.
fn query_unescape(raw: &str) -> Result<String, TokenError> {
    let bytes = raw.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|e| e.iter().all(u8::is_ascii_hexdigit)) {
                return Err(TokenError::Malformed("invalid percent escape"));
            }
        }
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| TokenError::Malformed("escaped token is not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(KeyStore::generate())
    }

    #[test]
    fn test_subject_rendering() {
        assert_eq!(Subject::Admin.to_string(), "user/admin");
        assert_eq!(
            Subject::image("private", "foo.jpg").to_string(),
            "image/private/foo.jpg"
        );
    }

    #[test]
    fn test_admin_ceiling_is_shorter_than_image_ceiling() {
        assert!(Subject::Admin.max_validity() < Subject::image("p", "a.jpg").max_validity());
    }

    #[test]
    fn test_token_has_three_components() {
        let token = authority().issue(&Subject::Admin, Duration::hours(1)).unwrap();
        let parts: Vec<&str> = token.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].parse::<i64>().is_ok());
        assert_eq!(parts[1].len(), 64);
        assert!(hex::decode(parts[2]).is_ok());
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let auth = authority();
        let now = Utc::now();
        let a = auth.issue_at(&Subject::Admin, Duration::hours(1), now).unwrap();
        let b = auth.issue_at(&Subject::Admin, Duration::hours(1), now).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_and_negative_validity_rejected() {
        let auth = authority();
        assert!(matches!(
            auth.issue(&Subject::Admin, Duration::zero()),
            Err(TokenError::InvalidDuration { .. })
        ));
        assert!(matches!(
            auth.issue(&Subject::Admin, Duration::seconds(-5)),
            Err(TokenError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_ceilings_enforced_per_subject_class() {
        let auth = authority();
        assert!(auth.issue(&Subject::Admin, Duration::hours(24)).is_err());
        assert!(auth.issue(&Subject::image("private", "a.jpg"), Duration::hours(24)).is_ok());
        assert!(auth.issue(&Subject::image("private", "a.jpg"), Duration::hours(60)).is_err());
    }

    #[test]
    fn test_empty_image_path_rejected() {
        let auth = authority();
        assert!(matches!(
            auth.issue(&Subject::image("private", ""), Duration::hours(1)),
            Err(TokenError::EmptySubject)
        ));
    }

    #[test]
    fn test_query_unescape() {
        assert_eq!(query_unescape("a%5Fb+c").unwrap(), "a_b c");
        assert!(query_unescape("abc%").is_err());
        assert!(query_unescape("abc%zz").is_err());
    }

    #[test]
    fn test_url_escaped_token_verifies() {
        let auth = authority();
        let token = auth.issue(&Subject::Admin, Duration::hours(1)).unwrap();
        let escaped = token.replace('_', "%5F");
        assert!(auth.verify(&escaped, &Subject::Admin).unwrap());
    }

    #[test]
    fn test_malformed_inputs() {
        let auth = authority();
        for bad in ["invalid", "a_b", "a_b_c_d", "notanumber_abc_00", ""] {
            assert!(
                matches!(auth.verify(bad, &Subject::Admin), Err(TokenError::Malformed(_))),
                "expected malformed for {bad:?}"
            );
        }
    }

    #[test]
    fn test_bad_signature_encoding_is_malformed() {
        let auth = authority();
        let future = (Utc::now() + Duration::hours(1)).timestamp();
        let not_hex = format!("{future}_{}_xyz", "0".repeat(64));
        let not_der = format!("{future}_{}_deadbeef", "0".repeat(64));
        assert!(matches!(auth.verify(&not_hex, &Subject::Admin), Err(TokenError::Malformed(_))));
        assert!(matches!(auth.verify(&not_der, &Subject::Admin), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_expiry_boundary() {
        let auth = authority();
        let now = Utc::now();
        let token = auth.issue_at(&Subject::Admin, Duration::hours(1), now).unwrap();
        let expiry = DateTime::<Utc>::from_timestamp((now + Duration::hours(1)).timestamp(), 0).unwrap();

        assert!(auth.verify_at(&token, &Subject::Admin, expiry).unwrap());
        assert!(matches!(
            auth.verify_at(&token, &Subject::Admin, expiry + Duration::seconds(1)),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_other_key_rejects() {
        let token = authority().issue(&Subject::Admin, Duration::hours(1)).unwrap();
        assert!(!authority().verify(&token, &Subject::Admin).unwrap());
    }
}
