//! Detect command

use super::{display_name, read_input};
use shrinkray_cli::output::{format_dimensions, format_size, Status};
use shrinkray_core::Result;
use shrinkray_image::{detect_format, has_alpha, SourceImage};
use std::path::Path;

/// Print the detected format and, when decodable, the dimensions.
pub fn run(input: &Path, json: bool) -> Result<()> {
    let bytes = read_input(input)?;
    let format = detect_format(&bytes)?;
    let decoded = SourceImage::decode(&bytes);

    if json {
        let report = serde_json::json!({
            "file": display_name(input),
            "format": format,
            "mime_type": format.mime_type(),
            "extensions": format.extensions(),
            "size_bytes": bytes.len(),
            "width": decoded.as_ref().ok().map(SourceImage::width),
            "height": decoded.as_ref().ok().map(SourceImage::height),
            "decode_path": decoded.as_ref().ok().map(SourceImage::decode_path),
            "has_alpha": decoded.as_ref().ok().map(|s| has_alpha(s.pixels())),
            "decode_error": decoded.as_ref().err().map(ToString::to_string),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    Status::header(&display_name(input));
    Status::field("format", &format!("{:?}", format));
    Status::field("mime", format.mime_type());
    Status::field("extensions", &format.extensions().join(", "));
    Status::field("size", &format_size(bytes.len() as u64));

    match decoded {
        Ok(source) => {
            Status::field("dimensions", &format_dimensions(source.width(), source.height()));
            Status::field("decoder", &format!("{:?}", source.decode_path()).to_lowercase());
            Status::field("alpha", if has_alpha(source.pixels()) { "yes" } else { "no" });
        }
        Err(e) => Status::warning(&e.to_string()),
    }

    Ok(())
}
