//! Request and result types of a compression run.

use crate::codec::OutputCodec;
use crate::package::output_file_name;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest byte budget a request may ask for.
///
/// Below this no common codec produces anything but a garbage thumbnail.
pub const MIN_TARGET_BYTES: u64 = 8 * 1024;

/// Quality used when a request gives none.
pub const DEFAULT_QUALITY: f32 = 0.82;

/// What the caller wants out of a run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionRequest {
    /// Output codec
    pub codec: OutputCodec,
    /// Quality hint in 0.0-1.0
    pub quality: Option<f32>,
    /// Target size in KB (1 KB = 1024 bytes)
    pub target_kb: Option<u32>,
    /// Maximum output width in pixels
    pub max_width: Option<u32>,
}

impl Default for CompressionRequest {
    fn default() -> Self {
        Self::new(OutputCodec::default())
    }
}

impl CompressionRequest {
    /// Request for `codec` with no quality, target or width hint.
    pub fn new(codec: OutputCodec) -> Self {
        Self {
            codec,
            quality: None,
            target_kb: None,
            max_width: None,
        }
    }

    /// Set the quality hint, clamped to 0.0-1.0.
    #[must_use]
    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = Some(if quality.is_nan() { DEFAULT_QUALITY } else { quality.clamp(0.0, 1.0) });
        self
    }

    /// Set the target size in KB.
    #[must_use]
    pub fn with_target_kb(mut self, target_kb: u32) -> Self {
        self.target_kb = Some(target_kb);
        self
    }

    /// Set the maximum output width; zero clears it.
    #[must_use]
    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = (max_width > 0).then_some(max_width);
        self
    }

    /// Quality to use without a target.
    pub fn quality(&self) -> f32 {
        self.quality
            .filter(|q| !q.is_nan())
            .map_or(DEFAULT_QUALITY, |q| q.clamp(0.0, 1.0))
    }

    /// Byte budget, clamped up to [`MIN_TARGET_BYTES`].
    ///
    /// # Example
    /// ```
    /// use shrinkray_image::{CompressionRequest, OutputCodec};
    ///
    /// let request = CompressionRequest::new(OutputCodec::Jpeg).with_target_kb(1);
    /// assert_eq!(request.target_bytes(), Some(8192));
    /// ```
    pub fn target_bytes(&self) -> Option<u64> {
        self.target_kb
            .map(|kb| (u64::from(kb) * 1024).max(MIN_TARGET_BYTES))
    }
}

/// One trial of the search.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeAttempt {
    /// Encoded width
    pub width: u32,
    /// Encoded height
    pub height: u32,
    /// Quality passed to the encoder
    pub quality: f32,
    /// Encoded bytes
    pub bytes: Vec<u8>,
}

impl EncodeAttempt {
    /// Encoded size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStatus {
    /// No target: a single encode at the requested quality
    Encoded,
    /// An attempt fit the byte budget
    ReachedTarget,
    /// No attempt fit; the smallest output is returned
    BestEffort,
}

impl fmt::Display for CompressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionStatus::Encoded => f.write_str("encoded"),
            CompressionStatus::ReachedTarget => f.write_str("reached target"),
            CompressionStatus::BestEffort => f.write_str("best effort"),
        }
    }
}

/// Final output of a run.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// Codec of `bytes`
    pub codec: OutputCodec,
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
    /// Quality the output was encoded at
    pub quality: f32,
    /// How the run ended
    pub status: CompressionStatus,
    /// Human-readable status note
    pub note: String,
    /// Resample + encode attempts made
    pub attempts: u32,
}

impl CompressionResult {
    pub(crate) fn from_attempt(
        attempt: EncodeAttempt,
        codec: OutputCodec,
        status: CompressionStatus,
        note: String,
        attempts: u32,
    ) -> Self {
        Self {
            bytes: attempt.bytes,
            codec,
            width: attempt.width,
            height: attempt.height,
            quality: attempt.quality,
            status,
            note,
            attempts,
        }
    }

    /// Output size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// MIME type of the output.
    pub fn mime_type(&self) -> &'static str {
        self.codec.mime_type()
    }

    /// Whether the budget was missed.
    pub fn is_best_effort(&self) -> bool {
        self.status == CompressionStatus::BestEffort
    }

    /// Output file name derived from the original name.
    pub fn file_name(&self, original: &str) -> String {
        output_file_name(original, self.codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_floor() {
        let request = CompressionRequest::new(OutputCodec::Jpeg).with_target_kb(1);
        assert_eq!(request.target_bytes(), Some(MIN_TARGET_BYTES));

        let request = CompressionRequest::new(OutputCodec::Jpeg).with_target_kb(100);
        assert_eq!(request.target_bytes(), Some(102_400));

        assert_eq!(CompressionRequest::default().target_bytes(), None);
    }

    #[test]
    fn test_quality_defaults_and_clamps() {
        assert_eq!(CompressionRequest::default().quality(), DEFAULT_QUALITY);
        assert_eq!(CompressionRequest::default().with_quality(1.7).quality(), 1.0);
        assert_eq!(CompressionRequest::default().with_quality(-0.2).quality(), 0.0);
    }

    #[test]
    fn test_zero_width_hint_clears() {
        let request = CompressionRequest::default().with_max_width(0);
        assert_eq!(request.max_width, None);
    }

    #[test]
    fn test_request_deserializes_from_json() {
        let request: CompressionRequest =
            serde_json::from_str(r#"{"codec":"webp","quality":0.5,"target_kb":40,"max_width":null}"#)
                .unwrap();
        assert_eq!(request.codec, OutputCodec::WebP);
        assert_eq!(request.target_bytes(), Some(40 * 1024));
    }

    #[test]
    fn test_result_file_name() {
        let result = CompressionResult::from_attempt(
            EncodeAttempt {
                width: 10,
                height: 10,
                quality: 0.5,
                bytes: vec![0; 12],
            },
            OutputCodec::WebP,
            CompressionStatus::ReachedTarget,
            "reached target at 50%".to_string(),
            3,
        );
        assert_eq!(result.size(), 12);
        assert_eq!(result.file_name("IMG_0001.HEIC"), "IMG_0001.webp");
        assert!(!result.is_best_effort());
    }
}
