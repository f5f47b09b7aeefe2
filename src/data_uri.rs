// ============================================================================
// DATA URIs — self-contained encoded images passed between components
// ============================================================================

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

const BASE64_MARKER: &str = ";base64,";

#[derive(Debug, thiserror::Error)]
pub enum DataUriError {
    #[error("malformed data URI: expected data:<mime>;base64,<payload>")]
    Malformed,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("unsupported image format")]
    UnsupportedFormat,
}

/// An image (or any binary payload) carried inline as `data:<mime>;base64,…`.
///
/// Stored decoded; the base64 form is produced on demand.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataUri {
    mime: String,
    bytes: Vec<u8>,
}

impl DataUri {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Parse a `data:` URI. Exactly one `;base64,` separator is accepted.
    pub fn parse(s: &str) -> Result<Self, DataUriError> {
        let parts: Vec<&str> = s.split(BASE64_MARKER).collect();
        if parts.len() != 2 {
            return Err(DataUriError::Malformed);
        }
        let mime = parts[0]
            .strip_prefix("data:")
            .filter(|m| !m.is_empty())
            .ok_or(DataUriError::Malformed)?;
        let bytes = STANDARD.decode(parts[1].trim())?;
        Ok(Self::new(mime, bytes))
    }

    /// Wrap raw file bytes, sniffing the image format for the MIME type.
    pub fn from_image_bytes(bytes: Vec<u8>) -> Result<Self, DataUriError> {
        let format = image::guess_format(&bytes)?;
        let mime = mime_for(format).ok_or(DataUriError::UnsupportedFormat)?;
        Ok(Self::new(mime, bytes))
    }

    /// Encode an RGBA raster as a PNG data URI.
    pub fn from_png(image: &RgbaImage) -> Result<Self, DataUriError> {
        Ok(Self::new("image/png", crate::render::encode_png(image)?))
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn base64_payload(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn decode_image(&self) -> Result<DynamicImage, DataUriError> {
        Ok(image::load_from_memory(&self.bytes)?)
    }
}

fn mime_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{}{}{}", self.mime, BASE64_MARKER, self.base64_payload())
    }
}

// Payloads are often megabytes; keep Debug output readable.
impl fmt::Debug for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataUri")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl TryFrom<String> for DataUri {
    type Error = DataUriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DataUri> for String {
    fn from(value: DataUri) -> Self {
        value.to_string()
    }
}
