//! Encoder contract and the time-bounded wrapper the search drives.
//!
//! Every attempt goes through [`HardenedEncoder`]:
//! 1. Primary route on the blocking pool, bounded by a timeout
//! 2. On error, timeout, panic or an empty buffer, the fallback route under the same bound
//! 3. Both failing surfaces [`CompressError::Encode`]

use crate::alpha::{flatten_alpha, DEFAULT_BACKGROUND};
use crate::codec::{quality_to_percent, OutputCodec};
use crate::{CompressError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderStringWriter;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, RgbaImage};
use shrinkray_telemetry::{metrics, names, Timer};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Serializes a surface with a given codec and quality.
///
/// Both routes must produce the same codec at the same quality; the fallback
/// is a different path to the same bytes, not an approximation.
pub trait Encoder: Send + Sync {
    /// Primary encode route.
    fn encode(&self, surface: &RgbaImage, codec: OutputCodec, quality: f32) -> Result<Vec<u8>>;

    /// Alternate route used when the primary fails.
    fn encode_fallback(&self, surface: &RgbaImage, codec: OutputCodec, quality: f32) -> Result<Vec<u8>>;
}

/// Encoder backed by the `image` crate codecs.
#[derive(Debug, Clone)]
pub struct ImageCrateEncoder {
    background: [u8; 3],
}

impl Default for ImageCrateEncoder {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND,
        }
    }
}

impl ImageCrateEncoder {
    /// Encoder that flattens transparency onto `background` for JPEG.
    pub fn with_background(background: [u8; 3]) -> Self {
        Self { background }
    }

    /// Render the surface as a `data:` URL.
    pub fn encode_data_url(&self, surface: &RgbaImage, codec: OutputCodec, quality: f32) -> Result<String> {
        let (width, height) = surface.dimensions();
        let prefix = format!("data:{};base64,", codec.mime_type());
        let mut writer = EncoderStringWriter::from_consumer(prefix, &STANDARD);

        let written = match codec {
            OutputCodec::Jpeg => {
                let rgb = flatten_alpha(surface, self.background);
                JpegEncoder::new_with_quality(&mut writer, quality_to_percent(quality))
                    .write_image(rgb.as_raw(), width, height, ColorType::Rgb8)
            }
            OutputCodec::Png => {
                PngEncoder::new(&mut writer).write_image(surface.as_raw(), width, height, ColorType::Rgba8)
            }
            OutputCodec::WebP => WebPEncoder::new_lossless(&mut writer)
                .write_image(surface.as_raw(), width, height, ColorType::Rgba8),
        };
        written.map_err(|e| CompressError::encode(format!("{codec} data URL render failed: {e}")))?;

        Ok(writer.into_inner())
    }

    fn prepare(&self, surface: &RgbaImage, codec: OutputCodec) -> DynamicImage {
        if codec.supports_alpha() {
            DynamicImage::ImageRgba8(surface.clone())
        } else {
            DynamicImage::ImageRgb8(flatten_alpha(surface, self.background))
        }
    }
}

impl Encoder for ImageCrateEncoder {
    fn encode(&self, surface: &RgbaImage, codec: OutputCodec, quality: f32) -> Result<Vec<u8>> {
        let img = self.prepare(surface, codec);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, codec.output_format(quality))
            .map_err(|e| CompressError::encode(format!("{codec} encode failed: {e}")))?;
        Ok(buffer.into_inner())
    }

    fn encode_fallback(&self, surface: &RgbaImage, codec: OutputCodec, quality: f32) -> Result<Vec<u8>> {
        let url = self.encode_data_url(surface, codec, quality)?;
        decode_data_url(&url)
    }
}

/// Extract the payload of a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| CompressError::encode("malformed data URL"))?;

    STANDARD
        .decode(payload)
        .map_err(|e| CompressError::encode(format!("invalid base64 payload: {e}")))
}

/// Which route produced an encoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeRoute {
    /// The encoder's primary route
    Primary,
    /// The alternate route after a primary failure
    Fallback,
}

impl fmt::Display for EncodeRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeRoute::Primary => f.write_str("primary"),
            EncodeRoute::Fallback => f.write_str("fallback"),
        }
    }
}

/// Output of one hardened encode.
#[derive(Debug, Clone)]
pub struct Encoded {
    /// Encoded bytes, never empty
    pub bytes: Vec<u8>,
    /// Route that produced them
    pub route: EncodeRoute,
}

/// Time-bounded encoder with a fallback route.
#[derive(Clone)]
pub struct HardenedEncoder {
    encoder: Arc<dyn Encoder>,
    timeout: Duration,
}

impl HardenedEncoder {
    /// Wrap an encoder with a per-route time bound.
    pub fn new(encoder: Arc<dyn Encoder>, timeout: Duration) -> Self {
        Self { encoder, timeout }
    }

    /// Per-route time bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Encode `surface`, falling back to the alternate route on failure.
    pub async fn encode(&self, surface: Arc<RgbaImage>, codec: OutputCodec, quality: f32) -> Result<Encoded> {
        metrics().increment(names::ENCODE_ATTEMPTS);
        let _timer = Timer::start(names::ENCODE_DURATION_MS);

        let primary_err = match self
            .run(Arc::clone(&surface), codec, quality, EncodeRoute::Primary)
            .await
        {
            Ok(bytes) => {
                return Ok(Encoded {
                    bytes,
                    route: EncodeRoute::Primary,
                })
            }
            Err(e) => e,
        };

        metrics().increment(names::ENCODE_PRIMARY_FAILURES);
        warn!(
            codec = %codec,
            quality,
            error = %primary_err,
            "Primary encode failed, trying fallback route"
        );

        match self.run(surface, codec, quality, EncodeRoute::Fallback).await {
            Ok(bytes) => {
                metrics().increment(names::ENCODE_FALLBACK_SUCCESSES);
                Ok(Encoded {
                    bytes,
                    route: EncodeRoute::Fallback,
                })
            }
            Err(fallback_err) => {
                metrics().increment(names::ENCODE_FAILURES);
                Err(CompressError::encode(format!(
                    "{primary_err}; fallback: {fallback_err}"
                )))
            }
        }
    }

    async fn run(
        &self,
        surface: Arc<RgbaImage>,
        codec: OutputCodec,
        quality: f32,
        route: EncodeRoute,
    ) -> Result<Vec<u8>> {
        let encoder = Arc::clone(&self.encoder);
        let task = tokio::task::spawn_blocking(move || match route {
            EncodeRoute::Primary => encoder.encode(&surface, codec, quality),
            EncodeRoute::Fallback => encoder.encode_fallback(&surface, codec, quality),
        });

        let bytes = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                return Err(CompressError::encode(format!(
                    "{route} route timed out after {:?}",
                    self.timeout
                )))
            }
            Ok(Err(join_err)) => {
                return Err(CompressError::encode(format!(
                    "{route} route aborted: {join_err}"
                )))
            }
            Ok(Ok(result)) => result?,
        };

        if bytes.is_empty() {
            return Err(CompressError::encode(format!("{route} route produced no data")));
        }

        debug!(codec = %codec, quality, route = %route, size = bytes.len(), "Encoded surface");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128, 255])
        })
    }

    /// Primary route is scripted; fallback always succeeds.
    struct ScriptedEncoder {
        primary: fn() -> Result<Vec<u8>>,
        stall: Option<Duration>,
        fallback_calls: AtomicU32,
    }

    impl ScriptedEncoder {
        fn new(primary: fn() -> Result<Vec<u8>>) -> Self {
            Self {
                primary,
                stall: None,
                fallback_calls: AtomicU32::new(0),
            }
        }
    }

    impl Encoder for ScriptedEncoder {
        fn encode(&self, _: &RgbaImage, _: OutputCodec, _: f32) -> Result<Vec<u8>> {
            if let Some(stall) = self.stall {
                std::thread::sleep(stall);
            }
            (self.primary)()
        }

        fn encode_fallback(&self, _: &RgbaImage, _: OutputCodec, _: f32) -> Result<Vec<u8>> {
            self.fallback_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![7; 64])
        }
    }

    #[test]
    fn test_routes_produce_identical_jpeg() {
        let encoder = ImageCrateEncoder::default();
        let surface = gradient(48, 32);

        let primary = encoder.encode(&surface, OutputCodec::Jpeg, 0.7).unwrap();
        let fallback = encoder.encode_fallback(&surface, OutputCodec::Jpeg, 0.7).unwrap();

        assert_eq!(primary, fallback);
        assert_eq!(&primary[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_routes_produce_identical_png() {
        let encoder = ImageCrateEncoder::default();
        let surface = gradient(20, 20);

        let primary = encoder.encode(&surface, OutputCodec::Png, 1.0).unwrap();
        let fallback = encoder.encode_fallback(&surface, OutputCodec::Png, 1.0).unwrap();

        assert_eq!(primary, fallback);
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let encoder = ImageCrateEncoder::default();
        let surface = gradient(128, 96);

        let high = encoder.encode(&surface, OutputCodec::Jpeg, 0.95).unwrap();
        let low = encoder.encode(&surface, OutputCodec::Jpeg, 0.2).unwrap();

        assert!(low.len() < high.len());
    }

    #[test]
    fn test_webp_output_signature() {
        let encoder = ImageCrateEncoder::default();
        let bytes = encoder.encode(&gradient(16, 16), OutputCodec::WebP, 0.5).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_data_url_roundtrip_prefix() {
        let encoder = ImageCrateEncoder::default();
        let url = encoder.encode_data_url(&gradient(8, 8), OutputCodec::Png, 1.0).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(!decode_data_url(&url).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_data_url() {
        assert!(decode_data_url("image/png;base64,AAAA").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let inner = Arc::new(ScriptedEncoder::new(|| Ok(vec![1; 10])));
        let hardened = HardenedEncoder::new(inner.clone(), Duration::from_secs(2));

        let encoded = hardened
            .encode(Arc::new(gradient(4, 4)), OutputCodec::Jpeg, 0.5)
            .await
            .unwrap();

        assert_eq!(encoded.route, EncodeRoute::Primary);
        assert_eq!(inner.fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_primary_uses_fallback() {
        let inner = Arc::new(ScriptedEncoder::new(|| Ok(Vec::new())));
        let hardened = HardenedEncoder::new(inner.clone(), Duration::from_secs(2));

        let encoded = hardened
            .encode(Arc::new(gradient(4, 4)), OutputCodec::Jpeg, 0.5)
            .await
            .unwrap();

        assert_eq!(encoded.route, EncodeRoute::Fallback);
        assert_eq!(encoded.bytes.len(), 64);
    }

    #[tokio::test]
    async fn test_stalled_primary_times_out() {
        let mut scripted = ScriptedEncoder::new(|| Ok(vec![1; 10]));
        scripted.stall = Some(Duration::from_millis(400));
        let inner = Arc::new(scripted);
        let hardened = HardenedEncoder::new(inner.clone(), Duration::from_millis(50));

        let encoded = hardened
            .encode(Arc::new(gradient(4, 4)), OutputCodec::Png, 1.0)
            .await
            .unwrap();

        assert_eq!(encoded.route, EncodeRoute::Fallback);
        assert_eq!(inner.fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_routes_failing() {
        struct Broken;
        impl Encoder for Broken {
            fn encode(&self, _: &RgbaImage, _: OutputCodec, _: f32) -> Result<Vec<u8>> {
                Err(CompressError::encode("primary broke"))
            }
            fn encode_fallback(&self, _: &RgbaImage, _: OutputCodec, _: f32) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
        }

        let hardened = HardenedEncoder::new(Arc::new(Broken), Duration::from_secs(1));
        let err = hardened
            .encode(Arc::new(gradient(2, 2)), OutputCodec::Jpeg, 0.5)
            .await
            .unwrap_err();

        assert!(matches!(err, CompressError::Encode(_)));
        assert!(err.to_string().contains("no data"));
    }
}
