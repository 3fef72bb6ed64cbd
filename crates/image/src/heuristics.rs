//! Budget-per-pixel heuristics that seed the quality search.
//!
//! Byte size is not a closed-form function of quality, but the budget per
//! pixel predicts roughly where the answer lies. Seeding the first attempt
//! there saves several bisection steps.

use crate::codec::OutputCodec;
use crate::request::CompressionRequest;
use crate::resample::{fit_within, AspectRatio};
use serde::{Deserialize, Serialize};
use shrinkray_core::config::SearchConfig;

/// Budget tiers, from generous to starved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    /// Under 0.06 bytes per pixel
    Starved,
    /// 0.06 - 0.12 bytes per pixel
    Scarce,
    /// 0.12 - 0.25 bytes per pixel
    Tight,
    /// 0.25 - 0.5 bytes per pixel
    Moderate,
    /// 0.5 - 1.0 bytes per pixel
    High,
    /// 1.0 bytes per pixel and above
    Generous,
}

impl BudgetTier {
    /// Tier for a budget-per-pixel value.
    pub fn from_bytes_per_pixel(bpp: f64) -> Self {
        match bpp {
            b if b >= 1.0 => BudgetTier::Generous,
            b if b >= 0.5 => BudgetTier::High,
            b if b >= 0.25 => BudgetTier::Moderate,
            b if b >= 0.12 => BudgetTier::Tight,
            b if b >= 0.06 => BudgetTier::Scarce,
            _ => BudgetTier::Starved,
        }
    }

    /// First quality to try for this tier.
    pub fn initial_quality(&self) -> f32 {
        match self {
            BudgetTier::Generous => 0.92,
            BudgetTier::High => 0.85,
            BudgetTier::Moderate => 0.75,
            BudgetTier::Tight => 0.62,
            BudgetTier::Scarce => 0.48,
            BudgetTier::Starved => 0.32,
        }
    }
}

/// Target bytes divided by pixel count.
pub fn bytes_per_pixel(target_bytes: u64, width: u32, height: u32) -> f64 {
    let pixels = (width.max(1) as u64) * (height.max(1) as u64);
    target_bytes as f64 / pixels as f64
}

/// Initial quality guess for a budget-per-pixel value.
///
/// # Example
/// ```
/// use shrinkray_image::heuristics::initial_quality;
///
/// // 100 KB for a 4000x3000 photo
/// let q = initial_quality(102_400.0 / 12_000_000.0);
/// assert_eq!(q, 0.32);
/// ```
pub fn initial_quality(bytes_per_pixel: f64) -> f32 {
    BudgetTier::from_bytes_per_pixel(bytes_per_pixel).initial_quality()
}

/// Everything the search derives before its first attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPlan {
    /// Source dimensions
    pub source: (u32, u32),
    /// Working resolution after the width hint and long-edge ceiling
    pub working: (u32, u32),
    /// Output codec
    pub codec: OutputCodec,
    /// Clamped target in bytes, if any
    pub target_bytes: Option<u64>,
    /// Budget per pixel at the working resolution
    pub bytes_per_pixel: Option<f64>,
    /// Tier of that budget
    pub tier: Option<BudgetTier>,
    /// First quality to try (the requested quality without a target)
    pub seed_quality: f32,
    /// Quality window of the bisection
    pub window: (f32, f32),
    #[serde(skip)]
    aspect: AspectRatio,
}

impl SearchPlan {
    /// Plan a run for a `width x height` source.
    pub fn new(width: u32, height: u32, request: &CompressionRequest, config: &SearchConfig) -> Self {
        let aspect = AspectRatio::of(width, height);
        let working = fit_within(width, height, request.max_width, config.max_dimension);
        let window = (config.quality_floor, config.quality_ceiling);
        let target_bytes = request.target_bytes();

        let bpp = target_bytes.map(|t| bytes_per_pixel(t, working.0, working.1));
        let tier = bpp.map(BudgetTier::from_bytes_per_pixel);

        let seed_quality = match tier {
            Some(_) if !request.codec.is_lossy() => window.1,
            Some(tier) => tier.initial_quality().clamp(window.0, window.1),
            None => request.quality(),
        };

        Self {
            source: (width, height),
            working,
            codec: request.codec,
            target_bytes,
            bytes_per_pixel: bpp,
            tier,
            seed_quality,
            window,
            aspect,
        }
    }

    /// Aspect ratio of the source, shared by every resolution of the run.
    pub fn aspect(&self) -> AspectRatio {
        self.aspect
    }

    /// Whether the working resolution differs from the source.
    pub fn is_clamped(&self) -> bool {
        self.working != self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KB: u64 = 1024;

    #[test]
    fn test_tier_detection() {
        assert_eq!(BudgetTier::from_bytes_per_pixel(2.0), BudgetTier::Generous);
        assert_eq!(BudgetTier::from_bytes_per_pixel(0.6), BudgetTier::High);
        assert_eq!(BudgetTier::from_bytes_per_pixel(0.3), BudgetTier::Moderate);
        assert_eq!(BudgetTier::from_bytes_per_pixel(0.2), BudgetTier::Tight);
        assert_eq!(BudgetTier::from_bytes_per_pixel(0.1), BudgetTier::Scarce);
        assert_eq!(BudgetTier::from_bytes_per_pixel(0.001), BudgetTier::Starved);
    }

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(bytes_per_pixel(1_000, 100, 10), 1.0);
        assert_eq!(bytes_per_pixel(500, 0, 0), 500.0);
    }

    #[test]
    fn test_plan_without_target() {
        let request = CompressionRequest::new(OutputCodec::Jpeg).with_quality(0.82);
        let plan = SearchPlan::new(4000, 3000, &request, &SearchConfig::default());

        assert_eq!(plan.working, (4000, 3000));
        assert!(plan.target_bytes.is_none());
        assert!(plan.tier.is_none());
        assert_eq!(plan.seed_quality, 0.82);
        assert!(!plan.is_clamped());
    }

    #[test]
    fn test_plan_with_target_and_width_hint() {
        let request = CompressionRequest::new(OutputCodec::Jpeg)
            .with_target_kb(100)
            .with_max_width(1000);
        let plan = SearchPlan::new(4000, 3000, &request, &SearchConfig::default());

        assert_eq!(plan.working, (1000, 750));
        assert_eq!(plan.target_bytes, Some(100 * KB));
        assert_eq!(plan.tier, Some(BudgetTier::Tight));
        assert_eq!(plan.seed_quality, 0.62);
        assert!(plan.is_clamped());
    }

    #[test]
    fn test_plan_lossless_seeds_ceiling() {
        let request = CompressionRequest::new(OutputCodec::Png).with_target_kb(50);
        let config = SearchConfig::default();
        let plan = SearchPlan::new(800, 600, &request, &config);
        assert_eq!(plan.seed_quality, config.quality_ceiling);
    }

    proptest! {
        #[test]
        fn prop_more_budget_never_lowers_seed(a in 0.0f64..4.0, b in 0.0f64..4.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(initial_quality(lo) <= initial_quality(hi));
        }
    }
}
