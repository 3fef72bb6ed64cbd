//! Resampling with progressive halving and optional smoothing.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::borrow::Cow;

/// Upper bound on the smoothing radius, in pixels.
pub const MAX_BLUR: f32 = 0.6;

/// Height-to-width ratio of the source, computed once per run.
///
/// Every working resolution of a search derives its height from this ratio
/// so repeated rounding never drifts the aspect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio(f64);

impl AspectRatio {
    /// Ratio of a `width x height` raster.
    pub fn of(width: u32, height: u32) -> Self {
        Self(height.max(1) as f64 / width.max(1) as f64)
    }

    /// Height matching `width`, rounded to the nearest pixel.
    pub fn height_for_width(&self, width: u32) -> u32 {
        ((width as f64 * self.0).round() as u32).max(1)
    }

    /// `(width, height)` for a target width.
    pub fn dimensions_for_width(&self, width: u32) -> (u32, u32) {
        let width = width.max(1);
        (width, self.height_for_width(width))
    }
}

/// Clamp source dimensions to an optional width hint and a long-edge ceiling.
///
/// # Example
/// ```
/// use shrinkray_image::resample::fit_within;
///
/// assert_eq!(fit_within(4000, 3000, None, 8192), (4000, 3000));
/// assert_eq!(fit_within(4000, 3000, Some(1000), 8192), (1000, 750));
/// assert_eq!(fit_within(10000, 5000, None, 8192), (8192, 4096));
/// ```
pub fn fit_within(width: u32, height: u32, max_width: Option<u32>, max_dimension: u32) -> (u32, u32) {
    let aspect = AspectRatio::of(width, height);
    let mut w = width.max(1);
    let mut h = height.max(1);

    if let Some(limit) = max_width.filter(|&m| m > 0 && m < w) {
        (w, h) = aspect.dimensions_for_width(limit);
    }

    let long_edge = w.max(h);
    if long_edge > max_dimension {
        let scale = max_dimension as f64 / long_edge as f64;
        let scaled = ((w as f64 * scale).round() as u32).clamp(1, max_dimension);
        (w, h) = aspect.dimensions_for_width(scaled);
        h = h.min(max_dimension);
    }

    (w, h)
}

/// Options for [`resample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleOptions {
    /// Gaussian smoothing applied on the final blit, clamped to [0, `MAX_BLUR`]
    pub blur: f32,
    /// Halve repeatedly before the final blit on large reductions
    pub progressive: bool,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            blur: 0.0,
            progressive: true,
        }
    }
}

/// Number of halving passes taken before the final blit.
pub fn halving_steps(src_width: u32, src_height: u32, width: u32, height: u32) -> u32 {
    let (mut w, mut h) = (src_width, src_height);
    let mut steps = 0;
    while w > width.saturating_mul(2) && h > height.saturating_mul(2) {
        w = w.div_ceil(2);
        h = h.div_ceil(2);
        steps += 1;
    }
    steps
}

/// Produce a surface of exactly `width x height`.
pub fn resample(src: &RgbaImage, width: u32, height: u32, options: ResampleOptions) -> RgbaImage {
    let width = width.max(1);
    let height = height.max(1);
    let blur = if options.blur.is_nan() { 0.0 } else { options.blur.clamp(0.0, MAX_BLUR) };

    if src.dimensions() == (width, height) {
        return if blur > 0.0 {
            imageops::blur(src, blur)
        } else {
            src.clone()
        };
    }

    let mut current: Cow<'_, RgbaImage> = Cow::Borrowed(src);
    if options.progressive {
        while current.width() > width.saturating_mul(2) && current.height() > height.saturating_mul(2) {
            let half_w = current.width().div_ceil(2);
            let half_h = current.height().div_ceil(2);
            current = Cow::Owned(imageops::resize(&*current, half_w, half_h, FilterType::Triangle));
        }
    }

    let out = imageops::resize(&*current, width, height, FilterType::Lanczos3);
    if blur > 0.0 {
        imageops::blur(&out, blur)
    } else {
        out
    }
}

/// Smoothing radius for an aggressive byte budget.
///
/// Zero unless the quality is already low and the budget per pixel is small;
/// the search never calls this for runs without a target.
pub fn blur_for_budget(bytes_per_pixel: f64, quality: f32) -> f32 {
    if quality > 0.35 {
        return 0.0;
    }

    match bytes_per_pixel {
        b if b < 0.03 => MAX_BLUR,
        b if b < 0.08 => 0.4,
        b if b < 0.2 => 0.25,
        _ => 0.0,
    }
}
