use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Largest upload a session accepts, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// An image held in memory: base64 content plus the media type and the
/// display name used for saving and for deriving result names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub content: String,
    pub media_type: String,
    pub display_name: String,
}

impl ImageAsset {
    pub fn from_bytes(
        display_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            content: BASE64.encode(bytes),
            media_type: media_type.into(),
            display_name: display_name.into(),
        }
    }

    pub fn decode(&self) -> anyhow::Result<Vec<u8>> {
        BASE64
            .decode(self.content.as_bytes())
            .context("image content is not valid base64")
    }

    /// `data:` URI carrying the full image, usable for inline previews.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.content)
    }

    /// Display name without its extension.
    pub fn stem(&self) -> &str {
        match self.display_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => self.display_name.as_str(),
        }
    }

    /// Extension of the display name, when it has a non-empty one.
    pub fn extension(&self) -> Option<&str> {
        match self.display_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }
}

/// Sniff the media type from leading magic bytes. Covers the formats
/// the upload surface accepts; anything else is rejected upstream.
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(PNG_MAGIC) {
        return Some("image/png");
    }
    if bytes.starts_with(JPEG_MAGIC) {
        return Some("image/jpeg");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_and_extension_split_on_last_dot() {
        let asset = ImageAsset::from_bytes("archive.tar.gz", "image/png", b"x");
        assert_eq!(asset.stem(), "archive.tar");
        assert_eq!(asset.extension(), Some("gz"));
    }

    #[test]
    fn extensionless_names_keep_full_stem() {
        let asset = ImageAsset::from_bytes("snapshot", "image/png", b"x");
        assert_eq!(asset.stem(), "snapshot");
        assert_eq!(asset.extension(), None);
    }

    #[test]
    fn trailing_dot_counts_as_no_extension() {
        let asset = ImageAsset::from_bytes("photo.", "image/png", b"x");
        assert_eq!(asset.stem(), "photo");
        assert_eq!(asset.extension(), None);
    }

    #[test]
    fn data_url_embeds_media_type_and_content() {
        let asset = ImageAsset::from_bytes("dot.png", "image/png", &[1, 2, 3]);
        assert_eq!(
            asset.data_url(),
            format!("data:image/png;base64,{}", asset.content)
        );
    }

    #[test]
    fn decode_rejects_content_that_is_not_base64() {
        let asset = ImageAsset {
            content: "definitely not base64!!!".to_string(),
            media_type: "image/png".to_string(),
            display_name: "x.png".to_string(),
        };
        assert!(asset.decode().is_err());
    }

    #[test]
    fn sniff_media_type_recognizes_known_magics() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(sniff_media_type(&png), Some("image/png"));
        assert_eq!(sniff_media_type(&jpeg), Some("image/jpeg"));
        assert_eq!(sniff_media_type(b"RIFF\x10\x00\x00\x00WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_media_type(b"GIF89a-tiny"), Some("image/gif"));
        assert_eq!(sniff_media_type(b"plain text"), None);
        assert_eq!(sniff_media_type(b""), None);
    }
}
