use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// An image captured into the session: base64 content plus the metadata the
/// gateway needs to ship it inline. Never mutated after construction; a
/// re-upload or re-edit produces a replacement value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: String,
    pub source_name: String,
}

impl EncodedImage {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            data: BASE64.encode(bytes),
            mime_type: mime_type.into(),
            source_name: source_name.into(),
        }
    }

    pub fn decode(&self) -> anyhow::Result<Vec<u8>> {
        use anyhow::Context as _;
        BASE64
            .decode(self.data.as_bytes())
            .with_context(|| format!("image content base64 decode failed ({})", self.source_name))
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Sniffs JPEG/PNG from leading magic bytes. Anything else is unsupported.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    None
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}
