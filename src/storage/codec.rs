//! Tag encoding in on-disk names.
//!
//! A stored name is `b64(tag1)|b64(tag2)|real.ext`. Tags are restricted to
//! the safe component class, whose standard base64 encoding never contains
//! `/`, so an encoded name is always a single path component.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::storage::validate::is_safe_component;

pub const TAG_SEPARATOR: char = '|';

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("tag {0:?} contains invalid characters")]
    InvalidTag(String),

    #[error("encoded name is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct NameCodec {
    max_name_length: usize,
}

impl NameCodec {
    pub fn new(max_name_length: usize) -> Self {
        Self { max_name_length }
    }

    /// Encode `tags` into the stored name for `real_name`. Untagged files keep
    /// their real name unchanged.
    pub fn encode<S: AsRef<str>>(&self, real_name: &str, tags: &[S]) -> Result<String, CodecError> {
        if tags.is_empty() {
            return Ok(real_name.to_string());
        }

        let mut segments = Vec::with_capacity(tags.len() + 1);
        for tag in tags {
            let tag = tag.as_ref();
            if !is_safe_component(tag) {
                return Err(CodecError::InvalidTag(tag.to_string()));
            }
            segments.push(STANDARD.encode(tag));
        }
        segments.push(real_name.to_string());

        let stored = segments.join(&TAG_SEPARATOR.to_string());
        if stored.len() > self.max_name_length {
            return Err(CodecError::TooLong {
                len: stored.len(),
                max: self.max_name_length,
            });
        }
        Ok(stored)
    }

    /// Split a stored name back into the real name and its tags.
    pub fn decode(&self, stored_name: &str) -> Result<(String, Vec<String>), CodecError> {
        decode(stored_name)
    }
}

/// Inverse of [`NameCodec::encode`]; needs no configuration.
pub fn decode(stored_name: &str) -> Result<(String, Vec<String>), CodecError> {
    let mut segments: Vec<&str> = stored_name.split(TAG_SEPARATOR).collect();
    // split always yields at least one segment.
    let real_name = segments.pop().unwrap_or_default().to_string();

    let tags = segments
        .into_iter()
        .map(|encoded| {
            STANDARD
                .decode(encoded)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| CodecError::InvalidTag(encoded.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((real_name, tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TAGS: &[&str] = &[];

    #[test]
    fn test_untagged_name_unchanged() {
        let codec = NameCodec::new(255);
        assert_eq!(codec.encode("cat.jpg", NO_TAGS).unwrap(), "cat.jpg");
        assert_eq!(decode("cat.jpg").unwrap(), ("cat.jpg".to_string(), vec![]));
    }

    #[test]
    fn test_known_encoding() {
        let codec = NameCodec::new(255);
        let stored = codec.encode("cat.jpg", &["pets", "2019"]).unwrap();
        assert_eq!(stored, "cGV0cw==|MjAxOQ==|cat.jpg");
    }

    #[test]
    fn test_decode_inverts_encode() {
        let codec = NameCodec::new(1024);
        let cases: &[(&str, &[&str])] = &[
            ("a.png", &["x"]),
            ("holiday_2019.jpeg", &["beach", "family", "summer-trip"]),
            ("z.gif", &["___", "---", "A1b2C3"]),
            ("dup.jpg", &["same", "same"]),
        ];
        for (name, tags) in cases {
            let stored = codec.encode(name, tags).unwrap();
            let (real, decoded) = codec.decode(&stored).unwrap();
            assert_eq!(real, *name);
            assert_eq!(decoded, tags.iter().map(|t| t.to_string()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_encoded_tags_are_single_path_component() {
        let codec = NameCodec::new(1024);
        // Inputs whose bytes end in all-ones bit patterns are the ones that
        // could produce '/' or '+' in base64.
        let stored = codec.encode("a.png", &["zzz", "___", "o_o", "wwww", "999"]).unwrap();
        assert!(!stored.contains('/'));
        assert!(!stored.contains('+'));
    }

    #[test]
    fn test_invalid_tags_rejected() {
        let codec = NameCodec::new(255);
        for bad in ["", "has space", "../x", "pipe|tag", "ok?"] {
            assert_eq!(
                codec.encode("a.jpg", &[bad]),
                Err(CodecError::InvalidTag(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_too_long() {
        let codec = NameCodec::new(16);
        assert!(matches!(
            codec.encode("a.jpg", &["long_tag_value"]),
            Err(CodecError::TooLong { max: 16, .. })
        ));
        // The limit only applies to tagged names.
        assert!(codec.encode("a_very_long_name.jpg", NO_TAGS).is_ok());
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(decode("!!!|a.jpg"), Err(CodecError::InvalidTag(_))));
    }
}
