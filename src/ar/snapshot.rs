//! Raster captures of the current AR frame.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Snapshot
// ============================================================================

/// Encoded image bytes captured by the native layer.
///
/// The bytes are kept exactly as received. Decoding into pixels is lazy.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Vec<u8>,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.bytes.len())
            .field("format", &self.format())
            .finish()
    }
}

impl Snapshot {
    /// Wraps raw encoded bytes.
    #[inline]
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Decodes a `snapshot` response.
    ///
    /// Native layers answer either with a base64 string or with an array of
    /// byte values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for null, empty, or malformed payloads.
    pub fn from_value(value: &Value) -> Result<Self> {
        let bytes = match value {
            Value::String(data) => Base64Standard
                .decode(data)
                .map_err(|e| Error::decode(format!("Failed to decode base64: {e}")))?,
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| Error::decode("snapshot byte out of range"))
                })
                .collect::<Result<Vec<u8>>>()?,
            other => {
                return Err(Error::decode(format!(
                    "snapshot payload must be base64 or bytes, got {other}"
                )));
            }
        };

        if bytes.is_empty() {
            return Err(Error::decode("snapshot payload is empty"));
        }

        Ok(Self::new(bytes))
    }

    /// Returns the encoded bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the snapshot, returning the encoded bytes.
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Guesses the image format from the magic bytes.
    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        image::guess_format(&self.bytes).ok()
    }

    /// Decodes the image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if the bytes are not a supported image.
    pub fn to_image(&self) -> Result<DynamicImage> {
        Ok(image::load_from_memory(&self.bytes)?)
    }

    /// Returns the pixel dimensions `(width, height)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if the bytes are not a supported image.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        Ok(self.to_image()?.dimensions())
    }

    /// Writes the encoded bytes to a file unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if writing fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), &self.bytes)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
