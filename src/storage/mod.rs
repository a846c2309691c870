//! Tiered, tag-indexed file storage.
//!
//! Each visibility tier owns one directory. Tags live in the names of
//! symlinks next to the content file, so a directory listing is the index.

pub mod codec;
pub mod ops;
pub mod tier;
pub mod validate;

pub use codec::{CodecError, NameCodec};
pub use ops::{StorageError, StoredEntry};
pub use tier::{AccessTier, TierError, TierResolver, TierRoot};
pub use validate::{content_type_for, FilenameValidator};
