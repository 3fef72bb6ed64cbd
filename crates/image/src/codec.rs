//! Output codecs.

use crate::CompressError;
use image::ImageOutputFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Codec the compressed output is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCodec {
    /// Lossy JPEG; honours the quality parameter
    #[default]
    Jpeg,
    /// Lossless PNG
    Png,
    /// Lossless WebP
    WebP,
}

impl OutputCodec {
    /// Whether the quality parameter changes the output.
    pub fn is_lossy(&self) -> bool {
        matches!(self, OutputCodec::Jpeg)
    }

    /// Whether the codec can store an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, OutputCodec::Jpeg)
    }

    /// MIME type of the encoded output.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputCodec::Jpeg => "image/jpeg",
            OutputCodec::Png => "image/png",
            OutputCodec::WebP => "image/webp",
        }
    }

    /// File extension for the encoded output.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputCodec::Jpeg => "jpg",
            OutputCodec::Png => "png",
            OutputCodec::WebP => "webp",
        }
    }

    pub(crate) fn output_format(&self, quality: f32) -> ImageOutputFormat {
        match self {
            OutputCodec::Jpeg => ImageOutputFormat::Jpeg(quality_to_percent(quality)),
            OutputCodec::Png => ImageOutputFormat::Png,
            OutputCodec::WebP => ImageOutputFormat::WebP,
        }
    }
}

impl fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputCodec::Jpeg => "jpeg",
            OutputCodec::Png => "png",
            OutputCodec::WebP => "webp",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputCodec {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "image/jpeg" => Ok(OutputCodec::Jpeg),
            "png" | "image/png" => Ok(OutputCodec::Png),
            "webp" | "image/webp" => Ok(OutputCodec::WebP),
            other => Err(CompressError::InvalidRequest(format!(
                "unsupported output codec: {other}"
            ))),
        }
    }
}

/// Map a 0.0-1.0 quality onto the encoder's 1-100 scale.
pub fn quality_to_percent(quality: f32) -> u8 {
    let quality = if quality.is_nan() { 0.0 } else { quality.clamp(0.0, 1.0) };
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}
