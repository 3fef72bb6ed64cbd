//! Compress command

use super::{build_request, display_name, read_input, RequestArgs};
use indicatif::ProgressBar;
use shrinkray_cli::output::{format_change, format_count, format_dimensions, format_duration, format_size, Status};
use shrinkray_cli::progress::{compression_bar, finish_error, finish_success, set_percent};
use shrinkray_core::config::Config;
use shrinkray_core::{Error, Result, ResultExt};
use shrinkray_image::{output_path, CompressionSummary, Compressor, Progress, RequestToken};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Arguments of `shrinkray compress`
pub struct CompressArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub suffix: String,
    pub request: RequestArgs,
    pub json: bool,
}

/// Compress one file and write the result next to it (or to `--output`).
pub async fn run(args: CompressArgs, config: &Config) -> Result<()> {
    let request = build_request(&args.request, &config.schema.defaults)?;
    let bytes = read_input(&args.input)?;
    let input_bytes = bytes.len() as u64;
    let name = display_name(&args.input);

    let output = args
        .output
        .unwrap_or_else(|| output_path(&args.input, request.codec, &args.suffix));
    if output == args.input {
        return Err(Error::validation("Output path would overwrite the input")
            .with_suggestion("Pass a different --output or a non-empty --suffix"));
    }

    let pb = if args.json {
        ProgressBar::hidden()
    } else {
        compression_bar(&name)
    };
    let bar = pb.clone();
    let progress = Progress::new(move |update| set_percent(&bar, update.percent, &update.message));

    let compressor = Compressor::with_default_encoder(config.schema.search.clone());
    let started = Instant::now();

    let result = match compressor
        .compress_bytes(bytes, &request, &progress, &RequestToken::detached())
        .await
    {
        Ok(result) => result,
        Err(e) => {
            finish_error(&pb, &e.to_string());
            return Err(e.into());
        }
    };
    let elapsed = started.elapsed();

    std::fs::write(&output, &result.bytes)
        .map_err(Error::from)
        .context(format!("Writing {}", output.display()))?;

    let summary = CompressionSummary::new(&result, &name, input_bytes);
    info!(
        output = %output.display(),
        size = summary.output_bytes,
        status = %summary.status,
        "Wrote compressed image"
    );
    debug!(metrics = %shrinkray_telemetry::metrics().export_json(), "Run metrics");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    finish_success(&pb, &result.note);

    Status::header(&summary.file_name);
    Status::field("output", &output.display().to_string());
    Status::field(
        "size",
        &format!(
            "{} → {} ({})",
            format_size(input_bytes),
            format_size(summary.output_bytes),
            format_change(input_bytes, summary.output_bytes)
        ),
    );
    Status::field("dimensions", &format_dimensions(summary.width, summary.height));
    Status::field("quality", &format!("{}%", summary.quality_percent));
    Status::field(
        "search",
        &format!(
            "{} in {}",
            format_count(summary.attempts as usize, "attempt", "attempts"),
            format_duration(elapsed)
        ),
    );
    println!();

    if result.is_best_effort() {
        Status::warning(&result.note);
    } else {
        Status::success(&result.note);
    }

    Ok(())
}
