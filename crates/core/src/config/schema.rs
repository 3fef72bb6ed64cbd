//! Configuration schema definitions
//!
//! Every field has a serde default so a partial `shrinkray.toml` is valid.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigSchema {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.defaults.validate()?;
        self.search.validate()
    }
}

/// Request defaults applied when the command line leaves a value unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Output codec name (`jpeg`, `png`, `webp`)
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Encoder quality in 0.0-1.0
    #[serde(default = "default_quality")]
    pub quality: f32,

    /// Target size in KB
    #[serde(default)]
    pub target_kb: Option<u32>,

    /// Maximum output width in pixels
    #[serde(default)]
    pub max_width: Option<u32>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            quality: default_quality(),
            target_kb: None,
            max_width: None,
        }
    }
}

impl DefaultsConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(Error::validation(format!(
                "defaults.quality must be within 0.0-1.0, got {}",
                self.quality
            )));
        }
        if self.target_kb == Some(0) {
            return Err(Error::validation("defaults.target_kb must be positive"));
        }
        if self.max_width == Some(0) {
            return Err(Error::validation("defaults.max_width must be positive"));
        }
        Ok(())
    }
}

fn default_codec() -> String {
    "jpeg".to_string()
}

fn default_quality() -> f32 {
    0.82
}

/// Tunables for the size-targeting search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Lowest quality the bisection may try
    #[serde(default = "default_quality_floor")]
    pub quality_floor: f32,

    /// Highest quality the bisection may try
    #[serde(default = "default_quality_ceiling")]
    pub quality_ceiling: f32,

    /// Bisection steps at the working resolution
    #[serde(default = "default_quality_iterations")]
    pub quality_iterations: u32,

    /// Fraction of the budget that counts as close enough to stop early
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,

    /// Width factor of the first downscale round
    #[serde(default = "default_ladder_first_factor")]
    pub ladder_first_factor: f32,

    /// Width factor of every later downscale round
    #[serde(default = "default_ladder_factor")]
    pub ladder_factor: f32,

    /// The ladder stops once the width drops below this
    #[serde(default = "default_ladder_min_width")]
    pub ladder_min_width: u32,

    /// Maximum downscale rounds
    #[serde(default = "default_ladder_rounds")]
    pub ladder_rounds: u32,

    /// Qualities swept per downscale round
    #[serde(default = "default_ladder_quality_steps")]
    pub ladder_quality_steps: u32,

    /// Absolute ceiling on the long edge of any encoded surface
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    /// Per-attempt encoder time bound in milliseconds
    #[serde(default = "default_encode_timeout_ms")]
    pub encode_timeout_ms: u64,

    /// Allow a light downscale for very low quality runs without a target
    #[serde(default)]
    pub safety_downscale: bool,

    /// Use progressive halving for large downscales
    #[serde(default = "default_true")]
    pub progressive_halving: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            quality_floor: default_quality_floor(),
            quality_ceiling: default_quality_ceiling(),
            quality_iterations: default_quality_iterations(),
            tolerance: default_tolerance(),
            ladder_first_factor: default_ladder_first_factor(),
            ladder_factor: default_ladder_factor(),
            ladder_min_width: default_ladder_min_width(),
            ladder_rounds: default_ladder_rounds(),
            ladder_quality_steps: default_ladder_quality_steps(),
            max_dimension: default_max_dimension(),
            encode_timeout_ms: default_encode_timeout_ms(),
            safety_downscale: false,
            progressive_halving: true,
        }
    }
}

impl SearchConfig {
    /// Encoder time bound as a `Duration`
    pub fn encode_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.encode_timeout_ms)
    }

    /// Reject settings the search cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.quality_floor && self.quality_floor < self.quality_ceiling && self.quality_ceiling <= 1.0) {
            return Err(Error::validation(format!(
                "search quality window must satisfy 0 < floor < ceiling <= 1, got [{}, {}]",
                self.quality_floor, self.quality_ceiling
            )));
        }
        if !(self.tolerance > 0.0 && self.tolerance <= 1.0) {
            return Err(Error::validation("search.tolerance must be within (0, 1]"));
        }
        for (name, factor) in [
            ("ladder_first_factor", self.ladder_first_factor),
            ("ladder_factor", self.ladder_factor),
        ] {
            if !(factor > 0.0 && factor < 1.0) {
                return Err(Error::validation(format!(
                    "search.{name} must be within (0, 1), got {factor}"
                )));
            }
        }
        if self.quality_iterations == 0 || self.ladder_quality_steps == 0 {
            return Err(Error::validation("search iteration counts must be positive"));
        }
        if self.max_dimension == 0 {
            return Err(Error::validation("search.max_dimension must be positive"));
        }
        if self.encode_timeout_ms == 0 {
            return Err(Error::validation("search.encode_timeout_ms cannot be zero"));
        }
        Ok(())
    }
}

fn default_quality_floor() -> f32 {
    0.05
}

fn default_quality_ceiling() -> f32 {
    0.98
}

fn default_quality_iterations() -> u32 {
    10
}

fn default_tolerance() -> f32 {
    0.95
}

fn default_ladder_first_factor() -> f32 {
    0.9
}

fn default_ladder_factor() -> f32 {
    0.8
}

fn default_ladder_min_width() -> u32 {
    200
}

fn default_ladder_rounds() -> u32 {
    7
}

fn default_ladder_quality_steps() -> u32 {
    5
}

fn default_max_dimension() -> u32 {
    8192
}

fn default_encode_timeout_ms() -> u64 {
    2750
}

fn default_true() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
