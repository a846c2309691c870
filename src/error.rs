//! Errors surfaced to transport adapters.
//!
//! Each variant is one client-visible class. `Internal` keeps its cause for
//! logging, but [`GalleryError::client_message`] never reveals it.

use crate::auth::{KeyError, TokenError};
use crate::storage::{StorageError, TierError};

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    /// Malformed input: bad token format, invalid file name or tag, bad checksum.
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    /// No credentials were presented.
    #[error("authentication required")]
    Unauthenticated,

    /// The token was well formed but its expiry has passed.
    #[error("authentication token has expired")]
    Expired,

    /// Credentials were presented and rejected.
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl GalleryError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        GalleryError::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        GalleryError::Internal(Box::new(err))
    }

    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            GalleryError::BadRequest { code, .. } => *code,
            GalleryError::Unauthenticated => "unauthenticated",
            GalleryError::Expired => "token_expired",
            GalleryError::Forbidden(_) => "forbidden",
            GalleryError::NotFound(_) => "not_found",
            GalleryError::Internal(_) => "internal",
        }
    }

    /// Message safe to return to a client.
    pub fn client_message(&self) -> String {
        match self {
            GalleryError::Internal(_) => "Error encountered handling request".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the failure is the server's fault rather than the client's.
    pub fn is_internal(&self) -> bool {
        matches!(self, GalleryError::Internal(_))
    }
}

impl From<TokenError> for GalleryError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(reason) => {
                GalleryError::bad_request("invalid_token", format!("Authentication token is malformed: {reason}"))
            }
            TokenError::Expired => GalleryError::Expired,
            TokenError::InvalidDuration { .. } | TokenError::EmptySubject => {
                GalleryError::bad_request("invalid_duration", err.to_string())
            }
            TokenError::Signing(_) => GalleryError::internal(err),
        }
    }
}

impl From<StorageError> for GalleryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => GalleryError::NotFound("Requested image is not found".to_string()),
            StorageError::AlreadyExists(_) => {
                GalleryError::bad_request("file_exists", "File with given name already exists")
            }
            StorageError::ExpectedSymlink { .. } | StorageError::Io { .. } => GalleryError::internal(err),
        }
    }
}

impl From<KeyError> for GalleryError {
    fn from(err: KeyError) -> Self {
        GalleryError::internal(err)
    }
}

impl From<TierError> for GalleryError {
    fn from(err: TierError) -> Self {
        GalleryError::internal(err)
    }
}

pub type Result<T> = std::result::Result<T, GalleryError>;
