//! Media codec helpers.
//!
//! Converts uploaded binary files to the transport-safe [`ImageData`] form
//! (base64 text + media type) and back, and keeps downloaded video payloads
//! in a [`BlobRegistry`] addressable by local `blob:` URLs.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{StudioError, StudioResult};

/// Transport-safe encoded media payload. Equality is by value.
///
/// Serialized as `{ "base64": ..., "mimeType": ... }` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(rename = "base64")]
    pub encoded_bytes: String,
    #[serde(rename = "mimeType")]
    pub media_type: String,
}

impl ImageData {
    /// Wraps an already-encoded payload.
    pub fn new(encoded_bytes: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            encoded_bytes: encoded_bytes.into(),
            media_type: media_type.into(),
        }
    }

    /// Encodes raw bytes.
    pub fn from_bytes(bytes: &[u8], media_type: impl Into<String>) -> Self {
        Self {
            encoded_bytes: STANDARD.encode(bytes),
            media_type: media_type.into(),
        }
    }

    /// Parses a `data:<type>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> StudioResult<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| StudioError::invalid_response("not a data URL"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| StudioError::invalid_response("data URL has no payload"))?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| StudioError::invalid_response("data URL is not base64 encoded"))?;
        Ok(Self::new(payload, media_type))
    }

    /// Renders as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.encoded_bytes)
    }

    /// Decodes back to raw bytes.
    pub fn decode(&self) -> StudioResult<Vec<u8>> {
        Ok(STANDARD.decode(self.encoded_bytes.as_bytes())?)
    }

    /// Size of the decoded payload in bytes (approximate, from encoded length).
    pub fn approx_len(&self) -> usize {
        self.encoded_bytes.len() / 4 * 3
    }

    /// File extension matching the media type, used when writing to disk.
    pub fn extension(&self) -> &str {
        extension_for(&self.media_type)
    }
}

/// Binary content handed in by the uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl UploadedFile {
    /// Creates an upload from raw bytes and declared media type.
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    /// Whether the declared media type is an image.
    pub fn is_image(&self) -> bool {
        is_image_media_type(&self.media_type)
    }

    /// Encodes to the transport form.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::from_bytes(&self.bytes, self.media_type.clone())
    }
}

/// Returns true for `image/*` media types.
pub fn is_image_media_type(media_type: &str) -> bool {
    media_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// Guesses a media type from a file extension.
pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        _ => None,
    }
}

fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => "bin",
    }
}

// =============================================================================
// BLOB REGISTRY
// =============================================================================

/// Decoded playable payload held locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl Blob {
    /// File extension matching the media type.
    pub fn extension(&self) -> &str {
        extension_for(&self.media_type)
    }
}

/// In-memory registry of locally addressable blobs keyed by `blob:<uuid>` URLs.
#[derive(Debug, Default)]
pub struct BlobRegistry {
    blobs: Mutex<HashMap<String, Blob>>,
}

impl BlobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the payload and registers it, returning its local URL.
    pub fn materialize(&self, payload: &ImageData) -> StudioResult<String> {
        let bytes = payload.decode()?;
        let url = format!("blob:{}", uuid::Uuid::new_v4());
        self.blobs.lock().insert(
            url.clone(),
            Blob {
                bytes,
                media_type: payload.media_type.clone(),
            },
        );
        Ok(url)
    }

    /// Looks up a blob by URL.
    pub fn get(&self, url: &str) -> Option<Blob> {
        self.blobs.lock().get(url).cloned()
    }

    /// Releases a blob. Returns true if it existed.
    pub fn revoke(&self, url: &str) -> bool {
        self.blobs.lock().remove(url).is_some()
    }

    /// Releases every blob.
    pub fn clear(&self) {
        self.blobs.lock().clear();
    }

    /// Number of live blobs.
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    /// Returns true if no blobs are held.
    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_encodes_bytes() {
        let file = UploadedFile::new(vec![0xff, 0xd8, 0xff], "image/jpeg");
        let data = file.to_image_data();
        assert_eq!(data.encoded_bytes, "/9j/");
        assert_eq!(data.media_type, "image/jpeg");
        assert_eq!(data.decode().unwrap(), vec![0xff, 0xd8, 0xff]);
    }

    #[test]
    fn test_is_image_media_type() {
        assert!(is_image_media_type("image/png"));
        assert!(is_image_media_type("Image/WEBP"));
        assert!(!is_image_media_type("video/mp4"));
        assert!(!is_image_media_type("application/pdf"));
    }

    #[test]
    fn test_data_url_parsing() {
        let data = ImageData::from_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(data.media_type, "image/png");
        assert_eq!(data.encoded_bytes, "iVBORw0KGgo=");
        assert_eq!(data.to_data_url(), "data:image/png;base64,iVBORw0KGgo=");

        assert!(ImageData::from_data_url("https://example.com/a.png").is_err());
        assert!(ImageData::from_data_url("data:image/png,raw").is_err());
    }

    #[test]
    fn test_wire_field_names() {
        let data = ImageData::new("AAAA", "image/png");
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["base64"], "AAAA");
        assert_eq!(json["mimeType"], "image/png");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let data = ImageData::new("@@not base64@@", "video/mp4");
        assert!(matches!(
            data.decode(),
            Err(StudioError::InvalidResponseFormat(_))
        ));
    }

    #[test]
    fn test_blob_registry_lifecycle() {
        let registry = BlobRegistry::new();
        let url = registry
            .materialize(&ImageData::from_bytes(b"\x00\x00\x00\x18ftypmp42", "video/mp4"))
            .unwrap();

        assert!(url.starts_with("blob:"));
        let blob = registry.get(&url).unwrap();
        assert_eq!(blob.media_type, "video/mp4");
        assert_eq!(blob.extension(), "mp4");
        assert_eq!(registry.len(), 1);

        assert!(registry.revoke(&url));
        assert!(!registry.revoke(&url));
        assert!(registry.is_empty());
    }
}
