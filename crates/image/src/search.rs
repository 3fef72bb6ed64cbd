//! Size-targeting search.
//!
//! Maps a byte budget to an encoder quality and, when quality alone is not
//! enough, to a smaller resolution:
//! 1. No target: one encode at the requested quality
//! 2. Quality bisection at the working resolution
//! 3. Downscale ladder with a short downward quality sweep per round
//! 4. Best effort: the smallest attempt seen anywhere
//!
//! Every resample and encode is a suspension point. The run checks its
//! [`RequestToken`] at each one and stops with [`CompressError::Cancelled`]
//! once a newer request has started.

use crate::codec::{quality_to_percent, OutputCodec};
use crate::encode::{Encoder, HardenedEncoder, ImageCrateEncoder};
use crate::heuristics::{bytes_per_pixel, initial_quality, SearchPlan};
use crate::progress::{Phase, Progress, RequestToken};
use crate::request::{CompressionRequest, CompressionResult, CompressionStatus, EncodeAttempt};
use crate::resample::{blur_for_budget, resample, ResampleOptions};
use crate::source::SourceImage;
use crate::{CompressError, Result};
use image::RgbaImage;
use shrinkray_core::config::SearchConfig;
use shrinkray_telemetry::{metrics, names, Timer};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Width factor of the safety downscale for very low quality runs.
const SAFETY_DOWNSCALE_FACTOR: f32 = 0.9;

/// Quality below which the safety downscale applies.
const SAFETY_DOWNSCALE_QUALITY: f32 = 0.1;

/// Drives resample and encode attempts for one request at a time.
#[derive(Clone)]
pub struct Compressor {
    encoder: HardenedEncoder,
    config: SearchConfig,
}

impl Compressor {
    /// Compressor over `encoder`, bounded by the config's encode timeout.
    pub fn new(encoder: Arc<dyn Encoder>, config: SearchConfig) -> Self {
        let encoder = HardenedEncoder::new(encoder, config.encode_timeout());
        Self { encoder, config }
    }

    /// Compressor over the `image` crate codecs.
    pub fn with_default_encoder(config: SearchConfig) -> Self {
        Self::new(Arc::new(ImageCrateEncoder::default()), config)
    }

    /// Search configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Plan a run without encoding anything.
    pub fn plan(&self, source: &SourceImage, request: &CompressionRequest) -> SearchPlan {
        SearchPlan::new(source.width(), source.height(), request, &self.config)
    }

    /// Decode `bytes` and compress the result.
    ///
    /// A decode failure ends the run before any encode attempt.
    pub async fn compress_bytes(
        &self,
        bytes: Vec<u8>,
        request: &CompressionRequest,
        progress: &Progress,
        token: &RequestToken,
    ) -> Result<CompressionResult> {
        let source = tokio::task::spawn_blocking(move || SourceImage::decode(&bytes))
            .await
            .map_err(|e| CompressError::decode(format!("decoder aborted: {e}")))??;

        if token.is_superseded() {
            return Err(CompressError::Cancelled);
        }

        self.compress(&source, request, progress, token).await
    }

    /// Compress a decoded source according to `request`.
    #[instrument(
        skip_all,
        fields(
            codec = %request.codec,
            target_kb = ?request.target_kb,
            width = source.width(),
            height = source.height(),
        )
    )]
    pub async fn compress(
        &self,
        source: &SourceImage,
        request: &CompressionRequest,
        progress: &Progress,
        token: &RequestToken,
    ) -> Result<CompressionResult> {
        self.config
            .validate()
            .map_err(|e| CompressError::InvalidRequest(e.to_string()))?;

        progress.restart();
        let plan = self.plan(source, request);
        debug!(
            working = ?plan.working,
            seed_quality = plan.seed_quality,
            tier = ?plan.tier,
            "Planned compression run"
        );

        let mut run = SearchRun {
            compressor: self,
            source,
            plan: &plan,
            progress,
            token,
            attempts: 0,
            smallest: None,
            surface: None,
            last_error: None,
        };

        let result = match plan.target_bytes {
            None => run.single_encode(request.quality()).await?,
            Some(target) => run.search(target).await?,
        };

        progress.report(Phase::Finishing, 100, result.note.clone());
        info!(
            status = %result.status,
            size = result.size(),
            width = result.width,
            height = result.height,
            quality = result.quality,
            attempts = result.attempts,
            "Compression finished"
        );

        Ok(result)
    }
}

/// Resampled surface kept between attempts at the same resolution.
struct CachedSurface {
    width: u32,
    height: u32,
    blur_bits: u32,
    pixels: Arc<RgbaImage>,
}

/// Mutable state of one run. Owned by [`Compressor::compress`].
struct SearchRun<'a> {
    compressor: &'a Compressor,
    source: &'a SourceImage,
    plan: &'a SearchPlan,
    progress: &'a Progress,
    token: &'a RequestToken,
    attempts: u32,
    smallest: Option<EncodeAttempt>,
    surface: Option<CachedSurface>,
    last_error: Option<String>,
}

impl SearchRun<'_> {
    fn config(&self) -> &SearchConfig {
        &self.compressor.config
    }

    fn codec(&self) -> OutputCodec {
        self.plan.codec
    }

    fn ensure_current(&self) -> Result<()> {
        if self.token.is_superseded() {
            debug!(generation = self.token.generation(), "Run superseded");
            return Err(CompressError::Cancelled);
        }
        Ok(())
    }

    async fn single_encode(&mut self, quality: f32) -> Result<CompressionResult> {
        let (mut width, mut height) = self.plan.working;
        if self.config().safety_downscale && quality < SAFETY_DOWNSCALE_QUALITY {
            let scaled = (width as f32 * SAFETY_DOWNSCALE_FACTOR).round() as u32;
            (width, height) = self.plan.aspect().dimensions_for_width(scaled);
            debug!(width, height, "Safety downscale for very low quality");
        }

        self.progress.report(
            Phase::Encoding,
            10,
            format!("encoding {width}x{height} at {}%", quality_to_percent(quality)),
        );

        let attempt = self
            .attempt(width, height, quality, 0.0)
            .await?
            .ok_or_else(|| self.exhausted())?;

        let note = format!("encoded at {}% quality", quality_to_percent(attempt.quality));
        Ok(self.finish(attempt, CompressionStatus::Encoded, note))
    }

    async fn search(&mut self, target: u64) -> Result<CompressionResult> {
        let found = match self.quality_search(target).await? {
            Some(attempt) => Some(attempt),
            None => {
                debug!(target, "Quality alone cannot reach the target, downscaling");
                self.downscale_ladder(target).await?
            }
        };

        if let Some(attempt) = found {
            let note = format!("reached target at {}%", quality_to_percent(attempt.quality));
            return Ok(self.finish(attempt, CompressionStatus::ReachedTarget, note));
        }

        let smallest = self.smallest.take().ok_or_else(|| self.exhausted())?;
        metrics().increment(names::SEARCH_BEST_EFFORT);
        warn!(
            target,
            size = smallest.size(),
            width = smallest.width,
            "Target unreachable, returning smallest output"
        );

        let note = format!(
            "best effort: smallest output was {} (target {})",
            kilobytes(smallest.size()),
            kilobytes(target)
        );
        Ok(self.finish(smallest, CompressionStatus::BestEffort, note))
    }

    /// Bisect quality at the working resolution.
    ///
    /// Returns the largest attempt under `target`, if any. Stops once the
    /// next midpoint rounds to an encoder percent already tried.
    async fn quality_search(&mut self, target: u64) -> Result<Option<EncodeAttempt>> {
        let (width, height) = self.plan.working;
        let (mut low, mut high) = self.plan.window;
        let lossy = self.codec().is_lossy();
        let iterations = if lossy { self.config().quality_iterations.max(1) } else { 1 };
        let close_enough = f64::from(self.config().tolerance) * target as f64;

        let mut best: Option<EncodeAttempt> = None;
        let mut tried: Vec<u8> = Vec::with_capacity(iterations as usize);

        for i in 0..iterations {
            let quality = if i == 0 {
                self.plan.seed_quality
            } else {
                (low + high) / 2.0
            };

            let percent = quality_to_percent(quality);
            if tried.contains(&percent) {
                debug!(percent, low, high, "Quality window below the encoder step");
                break;
            }

            self.progress.report(
                Phase::QualitySearch,
                (5 + i * 60 / iterations) as u8,
                format!("trying {percent}% at {width}x{height}"),
            );

            let Some(attempt) = self.attempt(width, height, quality, 0.0).await? else {
                continue;
            };
            tried.push(percent);

            if attempt.size() <= target {
                low = low.max(quality);
                let done = attempt.size() as f64 >= close_enough;
                if best.as_ref().is_none_or(|b| attempt.size() > b.size()) {
                    best = Some(attempt);
                }
                if done {
                    break;
                }
            } else {
                high = high.min(quality);
            }

            if !lossy {
                break;
            }
        }

        Ok(best)
    }

    /// Shrink the width round by round, sweeping quality downward in each.
    ///
    /// A round starts at the budget-per-pixel seed for its own resolution
    /// and ends at the quality floor.
    async fn downscale_ladder(&mut self, target: u64) -> Result<Option<EncodeAttempt>> {
        let config = self.config().clone();
        let aspect = self.plan.aspect();
        let (floor, top) = self.plan.window;
        let lossy = self.codec().is_lossy();
        let steps = if lossy { config.ladder_quality_steps.max(1) } else { 1 };

        let mut width = self.plan.working.0;
        for round in 0..config.ladder_rounds {
            let factor = if round == 0 {
                config.ladder_first_factor
            } else {
                config.ladder_factor
            };
            let next = (width as f32 * factor).round() as u32;
            if next < config.ladder_min_width || next >= width {
                debug!(width, next, "Downscale ladder reached its floor");
                break;
            }
            width = next;

            let (w, h) = aspect.dimensions_for_width(width);
            let bpp = bytes_per_pixel(target, w, h);
            let ceiling = if lossy {
                initial_quality(bpp).clamp(floor, top)
            } else {
                top
            };

            let mut previous = None;
            for step in 0..steps {
                let quality = sweep_quality(ceiling, floor, step, steps);
                let quality_percent = quality_to_percent(quality);
                if previous == Some(quality_percent) {
                    continue;
                }
                previous = Some(quality_percent);
                let blur = blur_for_budget(bpp, quality);

                let percent = 65 + (round * steps + step) * 30 / (config.ladder_rounds * steps);
                self.progress.report(
                    Phase::Downscale,
                    percent as u8,
                    format!("trying {quality_percent}% at {w}x{h}"),
                );

                if let Some(attempt) = self.attempt(w, h, quality, blur).await? {
                    if attempt.size() <= target {
                        return Ok(Some(attempt));
                    }
                }
            }
        }

        Ok(None)
    }

    /// One resample and encode.
    ///
    /// `Ok(None)` is a failed attempt: no data point, bounds unchanged.
    async fn attempt(
        &mut self,
        width: u32,
        height: u32,
        quality: f32,
        blur: f32,
    ) -> Result<Option<EncodeAttempt>> {
        self.ensure_current()?;

        let surface = match self.surface(width, height, blur).await {
            Ok(surface) => surface,
            Err(e) => {
                warn!(width, height, error = %e, "Resample failed");
                self.last_error = Some(e.to_string());
                return Ok(None);
            }
        };
        self.ensure_current()?;

        self.attempts += 1;
        let outcome = self.compressor.encoder.encode(surface, self.codec(), quality).await;
        tokio::task::yield_now().await;
        self.ensure_current()?;

        match outcome {
            Ok(encoded) => {
                let attempt = EncodeAttempt {
                    width,
                    height,
                    quality,
                    bytes: encoded.bytes,
                };
                debug!(
                    width,
                    height,
                    quality,
                    blur,
                    size = attempt.size(),
                    route = %encoded.route,
                    "Encode attempt"
                );
                if self.smallest.as_ref().is_none_or(|s| attempt.size() < s.size()) {
                    self.smallest = Some(attempt.clone());
                }
                Ok(Some(attempt))
            }
            Err(e) => {
                warn!(width, height, quality, error = %e, "Encode attempt failed");
                self.last_error = Some(e.to_string());
                Ok(None)
            }
        }
    }

    async fn surface(&mut self, width: u32, height: u32, blur: f32) -> Result<Arc<RgbaImage>> {
        let blur_bits = blur.to_bits();
        if (width, height) == self.source.dimensions() && blur <= 0.0 {
            return Ok(Arc::clone(self.source.pixels()));
        }

        if let Some(cached) = &self.surface {
            if cached.width == width && cached.height == height && cached.blur_bits == blur_bits {
                return Ok(Arc::clone(&cached.pixels));
            }
        }

        let src = Arc::clone(self.source.pixels());
        let options = ResampleOptions {
            blur,
            progressive: self.config().progressive_halving,
        };
        let pixels = tokio::task::spawn_blocking(move || {
            let _timer = Timer::start(names::RESAMPLE_DURATION_MS);
            resample(&src, width, height, options)
        })
        .await
        .map_err(|e| CompressError::encode(format!("resample aborted: {e}")))?;

        let pixels = Arc::new(pixels);
        self.surface = Some(CachedSurface {
            width,
            height,
            blur_bits,
            pixels: Arc::clone(&pixels),
        });
        Ok(pixels)
    }

    fn finish(&self, attempt: EncodeAttempt, status: CompressionStatus, note: String) -> CompressionResult {
        CompressionResult::from_attempt(attempt, self.codec(), status, note, self.attempts)
    }

    fn exhausted(&self) -> CompressError {
        let detail = self.last_error.as_deref().unwrap_or("no attempt was made");
        CompressError::encode(format!(
            "every encode attempt failed after {} tries: {detail}",
            self.attempts
        ))
    }
}

/// Quality of step `step` out of `steps`, from `ceiling` down to `floor`.
fn sweep_quality(ceiling: f32, floor: f32, step: u32, steps: u32) -> f32 {
    if steps <= 1 || ceiling <= floor {
        return ceiling.max(floor);
    }
    let t = step as f32 / (steps - 1) as f32;
    (ceiling - (ceiling - floor) * t).max(floor)
}

fn kilobytes(bytes: u64) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}
