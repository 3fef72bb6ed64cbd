//! Error types for the image crate.

use thiserror::Error;

/// Result type alias for compression operations.
pub type Result<T> = std::result::Result<T, CompressError>;

/// Errors that can end a compression run.
///
/// A missed byte budget is not an error: it is reported through
/// [`CompressionStatus::BestEffort`](crate::CompressionStatus::BestEffort).
#[derive(Debug, Error)]
pub enum CompressError {
    /// Unknown image format
    #[error("Unknown image format")]
    UnknownFormat,

    /// Input bytes could not be turned into a raster
    #[error("Decode error: {0}")]
    Decode(String),

    /// Every encode attempt failed on both routes
    #[error("Encode error: {0}")]
    Encode(String),

    /// A newer request superseded this run
    #[error("Compression cancelled: superseded by a newer request")]
    Cancelled,

    /// Request or search configuration is unusable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompressError {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an encode error
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Whether the caller may retry with different settings
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::Cancelled)
    }
}

impl From<CompressError> for shrinkray_core::Error {
    fn from(err: CompressError) -> Self {
        use shrinkray_core::ErrorCode;

        match err {
            CompressError::UnknownFormat => {
                Self::decode("Unknown image format").with_context("Detecting input format")
            }
            CompressError::Decode(msg) => Self::decode(msg),
            CompressError::Encode(msg) => Self::encode(msg),
            CompressError::Cancelled => {
                Self::cancelled("Compression was superseded by a newer request")
            }
            CompressError::InvalidRequest(msg) => Self::new(ErrorCode::InvalidInput, msg),
            CompressError::Io(e) => Self::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinkray_core::ErrorCode;

    #[test]
    fn test_encode_error_maps_with_suggestion() {
        let err: shrinkray_core::Error = CompressError::encode("both routes failed").into();
        assert_eq!(err.code, ErrorCode::EncodeError);
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_decode_error_maps() {
        let err: shrinkray_core::Error = CompressError::decode("truncated").into();
        assert_eq!(err.code, ErrorCode::DecodeError);
        assert!(err.message.contains("truncated"));
    }

    #[test]
    fn test_retryable() {
        assert!(CompressError::encode("x").is_retryable());
        assert!(CompressError::Cancelled.is_retryable());
        assert!(!CompressError::decode("x").is_retryable());
    }
}
