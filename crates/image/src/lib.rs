//! Size-targeting image re-encoding.
//!
//! This crate provides:
//! - Format detection from magic bytes and decoding with a fallback reader
//! - Resampling with progressive halving and budget-driven smoothing
//! - A time-bounded encoder with an alternate serialization route
//! - The search that fits an output into a byte budget
//!
//! # Example
//! ```no_run
//! use shrinkray_image::{CompressionRequest, Compressor, OutputCodec, Progress, RequestToken};
//! use shrinkray_core::config::SearchConfig;
//!
//! # async fn run(bytes: Vec<u8>) -> shrinkray_image::Result<()> {
//! let compressor = Compressor::with_default_encoder(SearchConfig::default());
//! let request = CompressionRequest::new(OutputCodec::Jpeg).with_target_kb(100);
//! let result = compressor
//!     .compress_bytes(bytes, &request, &Progress::silent(), &RequestToken::detached())
//!     .await?;
//! println!("{} ({} bytes)", result.note, result.size());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod alpha;
mod codec;
mod detect;
mod encode;
mod error;
pub mod heuristics;
mod package;
mod progress;
mod request;
pub mod resample;
mod search;
mod source;

pub use alpha::{flatten_alpha, has_alpha, DEFAULT_BACKGROUND};
pub use codec::{quality_to_percent, OutputCodec};
pub use detect::{detect_format, ImageFormat};
pub use encode::{decode_data_url, EncodeRoute, Encoded, Encoder, HardenedEncoder, ImageCrateEncoder};
pub use error::{CompressError, Result};
pub use heuristics::{BudgetTier, SearchPlan};
pub use package::{output_file_name, output_path, CompressionSummary};
pub use progress::{Phase, Progress, ProgressUpdate, RequestToken, RequestTracker};
pub use request::{
    CompressionRequest, CompressionResult, CompressionStatus, EncodeAttempt, DEFAULT_QUALITY,
    MIN_TARGET_BYTES,
};
pub use resample::{resample, ResampleOptions};
pub use search::Compressor;
pub use source::{DecodePath, SourceImage};
