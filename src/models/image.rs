//! Image payloads accepted by the cascade.

use crate::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::borrow::Cow;
use std::fmt;
use std::path::Path;

/// Default MIME type when the payload format cannot be sniffed.
const DEFAULT_MIME: &str = "image/jpeg";

/// An encoded image in one of the supported transport encodings.
///
/// Base64 payloads may carry a `data:<mime>;base64,` prefix; it is stripped
/// wherever raw data is needed.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Raw encoded bytes (JPEG, PNG, WebP).
    Bytes(Vec<u8>),
    /// Base64 text, optionally a data URL.
    Base64(String),
}

impl ImageInput {
    /// Wraps raw encoded bytes.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Wraps a base64 string or data URL.
    #[must_use]
    pub fn from_base64(data: impl Into<String>) -> Self {
        Self::Base64(data.into())
    }

    /// Reads an encoded image from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::OperationFailed {
            operation: "read_image".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Ok(Self::Bytes(bytes))
    }

    /// Encodes decoded pixels as PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn from_image(image: &image::DynamicImage) -> Result<Self> {
        let mut out = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| Error::OperationFailed {
                operation: "encode_image".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self::Bytes(out.into_inner()))
    }

    /// Returns true if the payload carries no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Base64(data) => strip_data_url(data).trim().is_empty(),
        }
    }

    /// Returns the raw encoded bytes, decoding base64 if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the base64 payload is malformed.
    pub fn to_bytes(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            Self::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            Self::Base64(data) => STANDARD
                .decode(strip_data_url(data).trim())
                .map(Cow::Owned)
                .map_err(|e| Error::InvalidInput(format!("invalid base64 image: {e}"))),
        }
    }

    /// Returns the payload as bare base64 (no data URL prefix).
    #[must_use]
    pub fn to_base64(&self) -> String {
        match self {
            Self::Bytes(bytes) => STANDARD.encode(bytes),
            Self::Base64(data) => strip_data_url(data).trim().to_string(),
        }
    }

    /// Returns the MIME type of the payload.
    ///
    /// Data URLs report their declared type; otherwise the bytes are sniffed,
    /// defaulting to `image/jpeg`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        if let Self::Base64(data) = self {
            if let Some(mime) = declared_mime(data) {
                return mime.to_string();
            }
        }
        self.to_bytes()
            .ok()
            .and_then(|bytes| image::guess_format(&bytes).ok())
            .map_or_else(
                || DEFAULT_MIME.to_string(),
                |format| format.to_mime_type().to_string(),
            )
    }

    /// Returns the payload as a `data:` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        if let Self::Base64(data) = self {
            if data.starts_with("data:") {
                return data.clone();
            }
        }
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }

    /// Decodes the payload into pixels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the payload is not a decodable image.
    pub fn decode(&self) -> Result<image::DynamicImage> {
        let bytes = self.to_bytes()?;
        image::load_from_memory(&bytes)
            .map_err(|e| Error::InvalidInput(format!("undecodable image: {e}")))
    }
}

impl fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "ImageInput::Bytes({} bytes)", bytes.len()),
            Self::Base64(data) => write!(f, "ImageInput::Base64({} chars)", data.len()),
        }
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// Strips a `data:...,` prefix if present.
fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        data.split_once(',').map_or(data, |(_, payload)| payload)
    } else {
        data
    }
}

/// Extracts the MIME type declared by a data URL.
fn declared_mime(data: &str) -> Option<&str> {
    let header = data.strip_prefix("data:")?.split_once(',')?.0;
    let mime = header.split(';').next()?;
    (!mime.is_empty()).then_some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_bytes_roundtrip_through_base64() {
        let bytes = png_bytes();
        let encoded = ImageInput::from_bytes(bytes.clone()).to_base64();
        let input = ImageInput::from_base64(encoded);
        let decoded = input.to_bytes().unwrap();
        assert_eq!(decoded.as_ref(), bytes.as_slice());
    }

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let input = ImageInput::from_base64(format!(
            "data:image/png;base64,{}",
            STANDARD.encode(png_bytes())
        ));
        assert_eq!(input.mime_type(), "image/png");
        assert!(!input.to_base64().starts_with("data:"));
        assert_eq!(input.decode().unwrap().width(), 4);
    }

    #[test]
    fn test_mime_sniffed_from_bytes() {
        let input = ImageInput::from_bytes(png_bytes());
        assert_eq!(input.mime_type(), "image/png");
        assert!(input.to_data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_unknown_bytes_default_to_jpeg() {
        let input = ImageInput::from_bytes(vec![1, 2, 3]);
        assert_eq!(input.mime_type(), "image/jpeg");
        assert!(input.decode().is_err());
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let input = ImageInput::from_base64("not base64!!");
        assert!(matches!(input.to_bytes(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_from_image_encodes_png() {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(3, 2));
        let input = ImageInput::from_image(&img).unwrap();
        assert_eq!(input.mime_type(), "image/png");
        assert_eq!(input.decode().unwrap().height(), 2);
    }

    #[test]
    fn test_empty_detection() {
        assert!(ImageInput::from_bytes(Vec::new()).is_empty());
        assert!(ImageInput::from_base64("data:image/png;base64,").is_empty());
        assert!(!ImageInput::from_bytes(png_bytes()).is_empty());
    }
}
