//! Plan command

use super::{build_request, display_name, read_input, RequestArgs};
use shrinkray_cli::output::{format_dimensions, format_size, Status};
use shrinkray_core::config::Config;
use shrinkray_core::{Error, Result};
use shrinkray_image::{quality_to_percent, Compressor, SourceImage};
use std::path::Path;

/// Show the working resolution and seed quality a run would start from.
pub async fn run(input: &Path, args: &RequestArgs, json: bool, config: &Config) -> Result<()> {
    let request = build_request(args, &config.schema.defaults)?;
    let bytes = read_input(input)?;

    let source = tokio::task::spawn_blocking(move || SourceImage::decode(&bytes))
        .await
        .map_err(|e| Error::new(shrinkray_core::ErrorCode::Internal, e.to_string()))??;

    let compressor = Compressor::with_default_encoder(config.schema.search.clone());
    let plan = compressor.plan(&source, &request);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    Status::header(&display_name(input));
    Status::field("source", &format_dimensions(plan.source.0, plan.source.1));
    Status::field("working", &format_dimensions(plan.working.0, plan.working.1));
    Status::field("codec", &plan.codec.to_string());

    match (plan.target_bytes, plan.bytes_per_pixel, plan.tier) {
        (Some(target), Some(bpp), Some(tier)) => {
            Status::field("target", &format_size(target));
            Status::field("budget/pixel", &format!("{bpp:.4} bytes ({tier:?})"));
            Status::field("seed quality", &format!("{}%", quality_to_percent(plan.seed_quality)));
            Status::field(
                "window",
                &format!(
                    "{}% - {}%",
                    quality_to_percent(plan.window.0),
                    quality_to_percent(plan.window.1)
                ),
            );
        }
        _ => {
            Status::field("quality", &format!("{}%", quality_to_percent(plan.seed_quality)));
            Status::info("No target: a single encode, no search");
        }
    }

    Ok(())
}
