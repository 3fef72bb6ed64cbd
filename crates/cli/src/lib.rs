//! CLI utilities for the shrinkray tools
//!
//! Provides shared CLI functionality:
//! - Terminal output formatting
//! - Progress indicators
//! - Structured error reporting

#![warn(missing_docs)]

pub mod output;
pub mod progress;
