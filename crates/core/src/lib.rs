//! Core utilities shared by the shrinkray crates
//!
//! - **Error handling**: structured errors with codes, context and recovery suggestions
//! - **Configuration**: TOML-based configuration with validation
//!
//! # Example
//!
//! ```rust,no_run
//! use shrinkray_core::config::Config;
//!
//! let config = Config::load(None).expect("invalid shrinkray.toml");
//! println!("encode timeout: {:?}", config.schema.search.encode_timeout());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema, SearchConfig};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
}
