//! Progress indicators
//!
//! Percent-driven bar for compression runs, hidden when stderr is not a terminal.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a 0-100 progress bar for a compression run
pub fn compression_bar(message: &str) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .map(|style| style.progress_chars("█▓░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Move the bar to `percent` with a status message
pub fn set_percent(pb: &ProgressBar, percent: u8, message: &str) {
    pb.set_position(u64::from(percent.min(100)));
    pb.set_message(message.to_string());
}

/// Finish a progress bar with a success message
pub fn finish_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✓ {}", message));
}

/// Finish a progress bar with an error message
pub fn finish_error(pb: &ProgressBar, message: &str) {
    pb.abandon_with_message(format!("✗ {}", message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_bar_creation() {
        let pb = compression_bar("Compressing");
        set_percent(&pb, 40, "trying 62% at 4000×3000");
        finish_success(&pb, "done");
    }

    #[test]
    fn test_percent_clamped() {
        let pb = ProgressBar::hidden();
        pb.set_length(100);
        set_percent(&pb, 250, "over");
        assert_eq!(pb.position(), 100);
        finish_error(&pb, "failed");
    }
}
