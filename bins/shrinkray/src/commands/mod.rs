//! Command implementations

pub mod compress;
pub mod detect;
pub mod plan;

use clap::Args;
use shrinkray_core::config::DefaultsConfig;
use shrinkray_core::{Error, Result, ResultExt};
use shrinkray_image::{CompressionRequest, OutputCodec};
use std::path::Path;

/// Request options shared by `compress` and `plan`
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Output codec: jpeg, png or webp
    #[arg(long)]
    pub codec: Option<OutputCodec>,

    /// Quality from 0.0 to 1.0, used when no target is given
    #[arg(short, long)]
    pub quality: Option<f32>,

    /// Target size in KB (values below 8 are raised to 8)
    #[arg(short, long)]
    pub target_kb: Option<u32>,

    /// Maximum output width in pixels
    #[arg(long)]
    pub max_width: Option<u32>,
}

/// Merge command-line options over the `[defaults]` config section.
pub fn build_request(args: &RequestArgs, defaults: &DefaultsConfig) -> Result<CompressionRequest> {
    let codec = match args.codec {
        Some(codec) => codec,
        None => defaults.codec.parse::<OutputCodec>().map_err(|e| {
            Error::config(e.to_string()).with_suggestion("Set [defaults] codec to jpeg, png or webp")
        })?,
    };

    let quality = args.quality.unwrap_or(defaults.quality);
    if !(0.0..=1.0).contains(&quality) {
        return Err(Error::validation(format!(
            "Quality must be between 0.0 and 1.0, got {quality}"
        )));
    }

    let mut request = CompressionRequest::new(codec).with_quality(quality);

    match args.target_kb.or(defaults.target_kb) {
        Some(0) => return Err(Error::validation("Target size must be a positive number of KB")),
        Some(kb) => request = request.with_target_kb(kb),
        None => {}
    }

    if let Some(width) = args.max_width.or(defaults.max_width) {
        request = request.with_max_width(width);
    }

    Ok(request)
}

/// Read an input file, mapping a missing file to a clear error.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }
    std::fs::read(path)
        .map_err(Error::from)
        .context(format!("Reading {}", path.display()))
}

/// Display name of an input path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
