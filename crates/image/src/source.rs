//! Decoding input bytes into a source raster.

use crate::detect::{detect_format, ImageFormat};
use crate::{CompressError, Result};
use image::{DynamicImage, RgbaImage};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Which decoder produced the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePath {
    /// `image::load_from_memory` with a guessed format
    Native,
    /// Signature-driven reader with relaxed limits
    Fallback,
}

/// Immutable decoded raster, shared with the blocking pool via `Arc`.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: Arc<RgbaImage>,
    format: Option<ImageFormat>,
    decode_path: DecodePath,
    input_size: usize,
}

impl SourceImage {
    /// Decode raw image bytes.
    ///
    /// Tries the native decoder first and falls back to an explicit reader
    /// selected from the magic bytes. Fails with [`CompressError::Decode`]
    /// when neither produces a non-empty raster.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(CompressError::decode("input is empty"));
        }

        let format = detect_format(bytes).ok();

        let (image, decode_path) = match image::load_from_memory(bytes) {
            Ok(image) => (image, DecodePath::Native),
            Err(native_err) => {
                debug!(error = %native_err, "Native decode failed, trying fallback reader");
                let image = decode_fallback(bytes, format).map_err(|fallback_err| {
                    CompressError::decode(format!("{native_err}; fallback: {fallback_err}"))
                })?;
                (image, DecodePath::Fallback)
            }
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(CompressError::decode("image has zero width or height"));
        }

        debug!(
            width = image.width(),
            height = image.height(),
            format = ?format,
            path = ?decode_path,
            "Decoded source image"
        );

        Ok(Self {
            pixels: Arc::new(image.to_rgba8()),
            format,
            decode_path,
            input_size: bytes.len(),
        })
    }

    /// Wrap an already decoded raster.
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            format: None,
            decode_path: DecodePath::Native,
            input_size: 0,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Shared pixel buffer.
    pub fn pixels(&self) -> &Arc<RgbaImage> {
        &self.pixels
    }

    /// Detected input format, if the signature was recognised.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    /// Decoder that produced the raster.
    pub fn decode_path(&self) -> DecodePath {
        self.decode_path
    }

    /// Size of the encoded input in bytes (0 for wrapped rasters).
    pub fn input_size(&self) -> usize {
        self.input_size
    }
}

fn decode_fallback(bytes: &[u8], format: Option<ImageFormat>) -> Result<DynamicImage> {
    let format = format.ok_or(CompressError::UnknownFormat)?;
    let decoder_format = format.decoder_format().ok_or_else(|| {
        CompressError::decode(format!(
            "no decoder for {}; convert it to JPEG or PNG first",
            format.mime_type()
        ))
    })?;

    let mut reader = image::io::Reader::with_format(Cursor::new(bytes), decoder_format);
    reader.no_limits();
    reader
        .decode()
        .map_err(|e| CompressError::decode(e.to_string()))
}
