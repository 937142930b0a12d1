//! Spinners and progress bars for discovery and audit runs.
//!
//! Hidden entirely in `--quiet` and `--json` modes so stdout stays clean.

use crate::cli::output::{self, Styled};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICKS: &str = "\u{25b8}\u{25b9}\u{25b8}\u{25b9}\u{25b8}";

fn hidden() -> bool {
    output::is_quiet() || output::is_json()
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn spinner_template(s: &Styled) -> &'static str {
    if s.use_color() {
        "  {spinner:.cyan} {msg}"
    } else {
        "  {spinner} {msg}"
    }
}

fn audit_template(s: &Styled) -> &'static str {
    if s.use_color() {
        "  {spinner:.blue} Auditing {bar:30.cyan/blue} {pos}/{len} {msg}"
    } else {
        "  {spinner} Auditing {bar:30} {pos}/{len} {msg}"
    }
}

fn finish_line(symbol: &str, message: &str) -> String {
    format!("{symbol} {message}")
}

/// Spinner for operations with no known total.
pub fn create_spinner(message: &str) -> ProgressBar {
    if hidden() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(style(spinner_template(&Styled::new())).tick_chars(TICKS));
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Bar for an audit over `total` pages.
pub fn create_audit_bar(total: usize) -> ProgressBar {
    if hidden() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        style(audit_template(&Styled::new()))
            .progress_chars("\u{2588}\u{2589}\u{2591}")
            .tick_chars(TICKS),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Replace the bar with a final check-marked line.
pub fn finish_ok(bar: &ProgressBar, message: &str) {
    bar.set_style(style("  {msg}"));
    bar.finish_with_message(finish_line(Styled::new().ok_sym(), message));
}

/// Replace the bar with a final warning line.
pub fn finish_warn(bar: &ProgressBar, message: &str) {
    bar.set_style(style("  {msg}"));
    bar.finish_with_message(finish_line(Styled::new().warn_sym(), message));
}

/// Remove the bar without leaving a line behind.
pub fn finish_clear(bar: &ProgressBar) {
    bar.finish_and_clear();
}
