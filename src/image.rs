//! Generated market visuals

use crate::models::ImageSize;
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File name used when a visual is downloaded
pub const DOWNLOAD_FILE_NAME: &str = "market-visual.png";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub mime_type: String,
    /// Base64 payload as returned by the model
    pub data: String,
    pub size: ImageSize,
    pub created_at: DateTime<Utc>,
}

impl GeneratedImage {
    pub fn new(mime_type: String, data: String, size: ImageSize) -> Self {
        Self {
            mime_type,
            data,
            size,
            created_at: Utc::now(),
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(self.data.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGAWjR9awAAAABJRU5ErkJggg==";

    #[test]
    fn test_data_uri() {
        let image = GeneratedImage::new("image/png".into(), "AAAA".into(), ImageSize::OneK);
        assert_eq!(image.data_uri(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_bytes_decode_png_signature() {
        let image = GeneratedImage::new("image/png".into(), PIXEL.into(), ImageSize::OneK);
        let bytes = image.bytes().unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[test]
    fn test_invalid_base64_is_error() {
        let image = GeneratedImage::new("image/png".into(), "not base64!".into(), ImageSize::OneK);
        assert!(image.bytes().is_err());
    }
}
