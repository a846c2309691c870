//! Adapter-facing operations: authenticate, upload, list, view, delete.
//!
//! These are what a transport layer calls. They take the decoded request
//! values, enforce authentication per tier, and touch the filesystem only
//! through `storage::ops`. Errors come back as [`GalleryError`] classes for
//! the adapter to map onto its own responses.

pub mod listing;
pub mod types;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Duration;

use crate::auth::{checksum_matches, KeyError, KeyStore, SharedSecret, Subject, TokenAuthority};
use crate::config::Config;
use crate::error::{GalleryError, Result};
use crate::storage::{
    codec, content_type_for, ops, AccessTier, FilenameValidator, NameCodec, TierError,
    TierResolver, TierRoot,
};

use listing::{page_bounds, ListedImage, Listing, TagFilter};
pub use types::{
    AuthenticateRequest, AuthenticateResponse, ImageContent, ImageDeleteRequest,
    ImageListRequest, ImageListResponse, ImageMetadata, ImageUploadRequest, ViewRequest,
};

/// Startup failures: the gallery cannot be built from this configuration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid signing key: {0}")]
    Key(#[from] KeyError),

    #[error("invalid tier configuration: {0}")]
    Tier(#[from] TierError),

    #[error("{name} of {secs}s is outside (0, {max_secs}s]")]
    Validity {
        name: &'static str,
        secs: i64,
        max_secs: i64,
    },
}

pub struct Gallery {
    tokens: TokenAuthority,
    secret: SharedSecret,
    tiers: TierResolver,
    validator: FilenameValidator,
    codec: NameCodec,
    max_file_size: usize,
    admin_token_validity: Duration,
    image_token_validity: Duration,
}

impl Gallery {
    /// Build from configuration, parsing the signing key from `auth.signing_key`.
    pub fn from_config(config: &Config) -> std::result::Result<Self, SetupError> {
        let keys = KeyStore::from_pem(&config.auth.signing_key)?;
        Self::new(keys, config)
    }

    /// Build with an already loaded key.
    pub fn new(keys: KeyStore, config: &Config) -> std::result::Result<Self, SetupError> {
        let storage = &config.storage;
        let auth = &config.auth;

        let admin_token_validity = checked_validity(
            "admin_token_validity_secs",
            auth.admin_token_validity_secs,
            &Subject::Admin,
        )?;
        let image_token_validity = checked_validity(
            "image_token_validity_secs",
            auth.image_token_validity_secs,
            &Subject::image(&storage.private_name, "-"),
        )?;

        Ok(Self {
            tokens: TokenAuthority::new(keys),
            secret: SharedSecret::new(&auth.basic_secret, &auth.basic_salt),
            tiers: TierResolver::from_config(storage)?,
            validator: FilenameValidator::from_delimited(&storage.permitted_extensions),
            codec: NameCodec::new(storage.max_name_length),
            max_file_size: storage.max_file_size,
            admin_token_validity,
            image_token_validity,
        })
    }

    pub fn tokens(&self) -> &TokenAuthority {
        &self.tokens
    }

    /// Exchange the shared secret for an admin token.
    pub fn authenticate(&self, req: &AuthenticateRequest) -> Result<AuthenticateResponse> {
        if req.secret.is_empty() {
            return Err(GalleryError::bad_request(
                "secret_required",
                "Pre-shared secret required for authentication",
            ));
        }

        if !self.secret.verify(&req.secret) {
            tracing::warn!("Rejected authentication with incorrect secret");
            return Err(GalleryError::Forbidden("Incorrect secret, cannot authenticate"));
        }

        let token = self
            .tokens
            .issue(&Subject::Admin, self.admin_token_validity)
            .inspect_err(|e| tracing::error!("Error signing auth token: {}", e))?;

        tracing::info!("Issued admin token");
        Ok(AuthenticateResponse { token })
    }

    /// Store a new image. Names are never overwritten.
    pub fn upload(&self, req: &ImageUploadRequest) -> Result<()> {
        self.require_admin(&req.token)?;

        if req.payload.is_empty() || req.payload.len() > self.max_file_size {
            return Err(GalleryError::bad_request(
                "bad_file_size",
                "Content length of payload is empty or too large",
            ));
        }

        let file_name = &req.metadata.file_name;
        if !self.validator.validate(file_name) {
            return Err(GalleryError::bad_request(
                "bad_file_name",
                "Invalid file name or extension specified",
            ));
        }

        let stored_name = self
            .codec
            .encode(file_name, &req.metadata.tags)
            .map_err(|e| GalleryError::bad_request("bad_file_tags", format!("Invalid file tags: {e}")))?;

        let tier = self.resolve(&req.access_type).ok_or_else(|| {
            GalleryError::bad_request("bad_access_type", "Invalid file access type specified")
        })?;

        if !checksum_matches(req.payload.as_bytes(), &req.checksum) {
            return Err(GalleryError::bad_request(
                "bad_payload",
                "Invalid payload, could not verify checksum",
            ));
        }

        let data = STANDARD
            .decode(&req.payload)
            .map_err(|_| GalleryError::bad_request("bad_payload", "Invalid payload, could not decode"))?;

        let stored = ops::ensure_root(&tier.root)
            .and_then(|()| ops::create_exclusive(&tier.root, file_name, &data))
            .and_then(|()| ops::link_tags(&tier.root, file_name, &stored_name));
        stored.map_err(|e| self.storage_failure("upload", e))?;

        tracing::info!(
            tier = %tier.name,
            tags = req.metadata.tags.len(),
            "Uploaded {} ({} bytes)",
            file_name,
            data.len()
        );
        Ok(())
    }

    /// List images visible from a tier, newest first, one page at a time.
    pub fn list(&self, req: &ImageListRequest) -> Result<ImageListResponse> {
        let requested = self.resolve(&req.access_type).ok_or_else(|| {
            GalleryError::bad_request("invalid_access_type", "Access type specified is invalid")
        })?;

        if requested.tier != AccessTier::Public {
            self.require_admin(&req.token)?;
        }

        let filter = TagFilter::new(&req.tags);
        let mut listing = Listing::default();
        for root in self.tiers.expand(&req.access_type) {
            let entries = ops::list(&root.root).map_err(|e| self.storage_failure("list", e))?;
            for entry in entries {
                let (file_name, tags) = codec::decode(&entry.name).map_err(|e| {
                    tracing::error!("Error decoding tags for {} in {}: {}", entry.name, root.name, e);
                    GalleryError::internal(e)
                })?;

                if !filter.matches(&tags) {
                    continue;
                }

                listing.insert(ListedImage {
                    tier: root.tier,
                    tier_name: root.name.clone(),
                    file_name,
                    tags,
                    uploaded: entry.modified,
                });
            }
        }

        let images = listing.into_sorted();
        let (start, end) = page_bounds(req.page, images.len());
        let pages_available = end < images.len();

        let mut page = Vec::with_capacity(end - start);
        for image in images.into_iter().skip(start).take(end - start) {
            let image_token = match image.tier {
                AccessTier::Private => self.presign(&image)?,
                _ => String::new(),
            };
            page.push(image.into_metadata(image_token));
        }

        Ok(ImageListResponse {
            images: page,
            pages_available,
        })
    }

    /// Read one image. Private images need an admin token or an image token
    /// for this exact file.
    pub fn view(&self, req: &ViewRequest) -> Result<ImageContent> {
        let not_found = || GalleryError::NotFound("Requested image is not found".to_string());

        let tier = self.resolve(&req.access_type).ok_or_else(not_found)?;

        if tier.tier == AccessTier::Private && !self.tokens.is_valid(&req.token, &Subject::Admin) {
            self.require(&req.token, &Subject::image(&tier.name, &req.file_name))?;
        }

        if !self.validator.validate(&req.file_name) {
            return Err(GalleryError::bad_request(
                "invalid_filename",
                format!("File name {} is invalid", req.file_name),
            ));
        }

        let bytes = ops::read(&tier.root, &req.file_name).ok_or_else(not_found)?;
        Ok(ImageContent {
            bytes,
            content_type: content_type_for(&req.file_name),
        })
    }

    /// Remove an image and its tag links.
    pub fn delete(&self, req: &ImageDeleteRequest) -> Result<()> {
        self.require_admin(&req.token)?;

        if !self.validator.validate(&req.file_name) {
            return Err(GalleryError::bad_request(
                "invalid_filename",
                format!("File name {} is invalid", req.file_name),
            ));
        }

        let tier = self.resolve(&req.access_type).ok_or_else(|| {
            GalleryError::bad_request("invalid_access_type", "Access type specified is invalid")
        })?;

        ops::delete(&tier.root, &req.file_name).map_err(|e| self.storage_failure("delete", e))?;

        tracing::info!(tier = %tier.name, "Deleted {}", req.file_name);
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<&TierRoot> {
        self.tiers.resolve(name)
    }

    fn require_admin(&self, token: &str) -> Result<()> {
        self.require(token, &Subject::Admin)
    }

    fn require(&self, token: &str, subject: &Subject) -> Result<()> {
        if token.is_empty() {
            return Err(GalleryError::Unauthenticated);
        }

        if self.tokens.verify(token, subject)? {
            Ok(())
        } else {
            tracing::warn!(subject = %subject, "Rejected token");
            Err(GalleryError::Forbidden("Authentication failure"))
        }
    }

    fn presign(&self, image: &ListedImage) -> Result<String> {
        let subject = Subject::image(&image.tier_name, &image.file_name);
        self.tokens
            .issue(&subject, self.image_token_validity)
            .map_err(|e| {
                tracing::error!("Error pre-signing image {}: {}", subject, e);
                GalleryError::internal(e)
            })
    }

    fn storage_failure(&self, operation: &str, err: ops::StorageError) -> GalleryError {
        let err = GalleryError::from(err);
        if err.is_internal() {
            tracing::error!("Storage failure during {}: {:?}", operation, err);
        }
        err
    }
}

impl std::fmt::Debug for Gallery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gallery")
            .field("tiers", &self.tiers)
            .field("validator", &self.validator)
            .field("max_file_size", &self.max_file_size)
            .finish_non_exhaustive()
    }
}

fn checked_validity(
    name: &'static str,
    secs: i64,
    subject: &Subject,
) -> std::result::Result<Duration, SetupError> {
    let max = subject.max_validity();
    match Duration::try_seconds(secs) {
        Some(validity) if secs > 0 && validity <= max => Ok(validity),
        _ => Err(SetupError::Validity {
            name,
            secs,
            max_secs: max.num_seconds(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_bounds_checked_at_startup() {
        let mut config = Config::default();
        config.auth.admin_token_validity_secs = 13 * 3600;
        assert!(matches!(
            Gallery::new(KeyStore::generate(), &config),
            Err(SetupError::Validity { name: "admin_token_validity_secs", .. })
        ));

        let mut config = Config::default();
        config.auth.image_token_validity_secs = 0;
        assert!(matches!(
            Gallery::new(KeyStore::generate(), &config),
            Err(SetupError::Validity { name: "image_token_validity_secs", .. })
        ));
    }

    #[test]
    fn test_out_of_range_validity_is_an_error() {
        for secs in [i64::MAX, i64::MIN, i64::MAX / 1000 + 1] {
            let mut config = Config::default();
            config.auth.admin_token_validity_secs = secs;
            assert!(matches!(
                Gallery::new(KeyStore::generate(), &config),
                Err(SetupError::Validity { name: "admin_token_validity_secs", .. })
            ));

            let mut config = Config::default();
            config.auth.image_token_validity_secs = secs;
            assert!(matches!(
                Gallery::new(KeyStore::generate(), &config),
                Err(SetupError::Validity { name: "image_token_validity_secs", .. })
            ));
        }
    }

    #[test]
    fn test_missing_signing_key() {
        assert!(matches!(
            Gallery::from_config(&Config::default()),
            Err(SetupError::Key(KeyError::MissingPem))
        ));
    }

    #[test]
    fn test_duplicate_tier_names() {
        let mut config = Config::default();
        config.storage.unlisted_name = "public".to_string();
        assert!(matches!(
            Gallery::new(KeyStore::generate(), &config),
            Err(SetupError::Tier(_))
        ));
    }
}
