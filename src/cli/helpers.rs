//! Shared helper functions for CLI commands.

use std::time::Duration;

/// Truncate to at most `max` characters, marking the cut with `…`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Format a duration as seconds with two decimals.
pub fn format_secs(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}
