//! Whitelist validation for client-supplied file names and tags.

/// `^[A-Za-z0-9_-]+$`, matched against the whole string.
pub fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Accepts `name.ext` where `ext` is whitelisted (case-insensitive) and
/// `name` is a safe component.
#[derive(Debug, Clone)]
pub struct FilenameValidator {
    extensions: Vec<String>,
}

impl FilenameValidator {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Build from a `|`-delimited list such as `jpeg|jpg|png|gif`.
    pub fn from_delimited(list: &str) -> Self {
        Self::new(list.split('|'))
    }

    pub fn validate(&self, file_name: &str) -> bool {
        // Split on the first dot only: "a..jpg" has extension ".jpg".
        let Some((name, extension)) = file_name.split_once('.') else {
            return false;
        };

        let extension = extension.to_ascii_lowercase();
        if !self.extensions.iter().any(|e| *e == extension) {
            return false;
        }

        is_safe_component(name)
    }
}

/// HTTP content type for a stored file, keyed on its extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let Some((_, extension)) = file_name.split_once('.') else {
        return "application/octet-stream";
    };

    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> FilenameValidator {
        FilenameValidator::from_delimited("jpeg|jpg|png|gif")
    }

    #[test]
    fn test_accepts_plain_names() {
        let v = validator();
        assert!(v.validate("a.jpg"));
        assert!(v.validate("ok-name_1.png"));
        assert!(v.validate("Holiday2019.JPEG"));
    }

    #[test]
    fn test_rejects_extension_ambiguity() {
        let v = validator();
        assert!(!v.validate("a..jpg"));
        assert!(!v.validate("a.tar.gif"));
    }

    #[test]
    fn test_rejects_traversal() {
        let v = validator();
        assert!(!v.validate("../etc/passwd.png"));
        assert!(!v.validate("dir/a.png"));
        assert!(!v.validate(".png"));
    }

    #[test]
    fn test_rejects_partial_matches() {
        let v = validator();
        assert!(!v.validate("good name.png"));
        assert!(!v.validate("bad!.png"));
        assert!(!v.validate("tag|a.png"));
    }

    #[test]
    fn test_rejects_missing_or_unlisted_extension() {
        let v = validator();
        assert!(!v.validate("noextension"));
        assert!(!v.validate("script.sh"));
        assert!(!v.validate("a."));
    }

    #[test]
    fn test_safe_component() {
        assert!(is_safe_component("tag_1-x"));
        assert!(!is_safe_component(""));
        assert!(!is_safe_component("with space"));
        assert!(!is_safe_component("ünicode"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("a.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.gif"), "image/gif");
        assert_eq!(content_type_for("a.bmp"), "application/octet-stream");
        assert_eq!(content_type_for("a"), "application/octet-stream");
    }
}
