//! Result packaging: output names and serializable summaries.

use crate::codec::OutputCodec;
use crate::request::{CompressionResult, CompressionStatus};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Strip the original extension and append the codec's.
///
/// # Example
/// ```
/// use shrinkray_image::{output_file_name, OutputCodec};
///
/// assert_eq!(output_file_name("holiday.HEIC", OutputCodec::Jpeg), "holiday.jpg");
/// assert_eq!(output_file_name("scan", OutputCodec::Png), "scan.png");
/// ```
pub fn output_file_name(original: &str, codec: OutputCodec) -> String {
    format!("{}.{}", file_stem(original), codec.extension())
}

/// Output path next to `input`, with a suffix so it never overwrites the input.
pub fn output_path(input: &Path, codec: OutputCodec, suffix: &str) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    input.with_file_name(format!("{}{}.{}", file_stem(name), suffix, codec.extension()))
}

fn file_stem(original: &str) -> &str {
    let name = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original);
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    };
    if stem.is_empty() {
        "image"
    } else {
        stem
    }
}

/// Serializable summary of a run for `--json` output and logs.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionSummary {
    /// Derived output file name
    pub file_name: String,
    /// Output codec
    pub codec: OutputCodec,
    /// Output MIME type
    pub mime_type: &'static str,
    /// Encoded input size
    pub input_bytes: u64,
    /// Encoded output size
    pub output_bytes: u64,
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
    /// Output quality as a percentage
    pub quality_percent: u8,
    /// How the run ended
    pub status: CompressionStatus,
    /// Human-readable status note
    pub note: String,
    /// Encode attempts made
    pub attempts: u32,
    /// Fraction of the input saved (negative when the output grew)
    pub saved_ratio: f64,
}

impl CompressionSummary {
    /// Summarize `result` for an input of `input_bytes` named `original`.
    pub fn new(result: &CompressionResult, original: &str, input_bytes: u64) -> Self {
        let saved_ratio = if input_bytes == 0 {
            0.0
        } else {
            1.0 - result.size() as f64 / input_bytes as f64
        };

        Self {
            file_name: result.file_name(original),
            codec: result.codec,
            mime_type: result.mime_type(),
            input_bytes,
            output_bytes: result.size(),
            width: result.width,
            height: result.height,
            quality_percent: crate::codec::quality_to_percent(result.quality),
            status: result.status,
            note: result.note.clone(),
            attempts: result.attempts,
            saved_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::EncodeAttempt;

    #[test]
    fn test_output_file_names() {
        assert_eq!(output_file_name("photo.png", OutputCodec::Jpeg), "photo.jpg");
        assert_eq!(output_file_name("archive.tar.gz", OutputCodec::WebP), "archive.tar.webp");
        assert_eq!(output_file_name(".hidden", OutputCodec::Png), ".hidden.png");
        assert_eq!(output_file_name("dir/sub/pic.jpeg", OutputCodec::Jpeg), "pic.jpg");
        assert_eq!(output_file_name("", OutputCodec::Jpeg), "image.jpg");
    }

    #[test]
    fn test_output_path_never_collides() {
        let path = output_path(Path::new("/tmp/photos/cat.jpg"), OutputCodec::Jpeg, "-min");
        assert_eq!(path, PathBuf::from("/tmp/photos/cat-min.jpg"));
    }

    #[test]
    fn test_summary_ratio() {
        let result = CompressionResult::from_attempt(
            EncodeAttempt {
                width: 100,
                height: 50,
                quality: 0.62,
                bytes: vec![0; 250],
            },
            OutputCodec::Jpeg,
            CompressionStatus::ReachedTarget,
            "reached target at 62%".to_string(),
            4,
        );

        let summary = CompressionSummary::new(&result, "in.png", 1000);
        assert_eq!(summary.file_name, "in.jpg");
        assert_eq!(summary.quality_percent, 62);
        assert!((summary.saved_ratio - 0.75).abs() < f64::EPSILON);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "reached_target");
    }
}
