use serde::{Deserialize, Serialize};

// --- Request/Response types ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub file_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Tier name the image was listed from
    #[serde(default)]
    pub access_path: String,
    /// RFC 3339 modification time
    #[serde(default)]
    pub uploaded: String,
    /// Pre-signed read token, only set for private images
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageUploadRequest {
    #[serde(default)]
    pub token: String,
    pub metadata: ImageMetadata,
    /// Base64-encoded file content
    pub payload: String,
    /// Hex SHA-256 of `payload` as sent (before decoding)
    pub checksum: String,
    pub access_type: String,
}

/// Auth optional for public listings only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageListRequest {
    #[serde(default)]
    pub token: String,
    pub access_type: String,
    #[serde(default)]
    pub page: i64,
    /// Keep only images carrying at least one of these tags
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageListResponse {
    pub images: Vec<ImageMetadata>,
    #[serde(rename = "next_page")]
    pub pages_available: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageDeleteRequest {
    #[serde(default)]
    pub token: String,
    pub file_name: String,
    pub access_type: String,
}

/// Read of a single image, addressed as `{access_type}/{file_name}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewRequest {
    pub access_type: String,
    pub file_name: String,
    /// Admin token or an image token for exactly this file; private tier only
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContent {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}
