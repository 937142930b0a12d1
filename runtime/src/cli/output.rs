//! Shared CLI output formatting with colors, symbols, and structured display.

use crate::map::types::{MonetizationStatus, PageRecord, Priority};
use serde::Serialize;
use std::io::IsTerminal;
use std::sync::OnceLock;

/// Global output switches, set once from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFlags {
    pub json: bool,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

static FLAGS: OnceLock<OutputFlags> = OnceLock::new();

/// Install the flags. Later calls are ignored.
pub fn init(flags: OutputFlags) {
    let _ = FLAGS.set(flags);
}

fn flags() -> OutputFlags {
    FLAGS.get().copied().unwrap_or_default()
}

/// Check if color output is enabled.
pub fn color_enabled() -> bool {
    // https://no-color.org/
    if std::env::var_os("NO_COLOR").is_some() || flags().no_color {
        return false;
    }
    std::io::stdout().is_terminal()
}

pub fn is_quiet() -> bool {
    flags().quiet
}

pub fn is_verbose() -> bool {
    flags().verbose
}

pub fn is_json() -> bool {
    flags().json
}

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Colored string builder.
pub struct Styled {
    use_color: bool,
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

impl Styled {
    pub fn new() -> Self {
        Self {
            use_color: color_enabled(),
        }
    }

    pub fn with_color(use_color: bool) -> Self {
        Self { use_color }
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    pub fn ok_sym(&self) -> &str {
        if self.use_color {
            "\x1b[32m\u{2713}\x1b[0m"
        } else {
            "OK"
        }
    }

    pub fn fail_sym(&self) -> &str {
        if self.use_color {
            "\x1b[31m\u{2717}\x1b[0m"
        } else {
            "!!"
        }
    }

    pub fn warn_sym(&self) -> &str {
        if self.use_color {
            "\x1b[33m\u{26a0}\x1b[0m"
        } else {
            "??"
        }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.use_color {
            format!("{code}{s}{RESET}")
        } else {
            s.to_string()
        }
    }

    pub fn green(&self, s: &str) -> String {
        self.paint(GREEN, s)
    }

    pub fn red(&self, s: &str) -> String {
        self.paint(RED, s)
    }

    pub fn yellow(&self, s: &str) -> String {
        self.paint(YELLOW, s)
    }

    pub fn cyan(&self, s: &str) -> String {
        self.paint(CYAN, s)
    }

    pub fn dim(&self, s: &str) -> String {
        self.paint(DIM, s)
    }

    pub fn bold(&self, s: &str) -> String {
        self.paint(BOLD, s)
    }

    /// Priority label, padded before coloring so columns stay aligned.
    pub fn priority(&self, p: Priority) -> String {
        let label = format!("{:<8}", p.as_str());
        match p {
            Priority::Critical => self.red(&label),
            Priority::High => self.yellow(&label),
            Priority::Medium => self.cyan(&label),
            Priority::Low => self.dim(&label),
        }
    }

    pub fn status(&self, status: MonetizationStatus) -> String {
        let label = format!("{:<11}", status.as_str());
        match status {
            MonetizationStatus::Monetized => self.green(&label),
            MonetizationStatus::Opportunity => self.bold(&label),
            MonetizationStatus::None => self.dim(&label),
        }
    }
}

/// Print a branded header for CLI output.
pub fn print_header(s: &Styled) {
    eprintln!(
        "  {} {}",
        s.bold("PageScout"),
        s.dim(&format!("v{}", env!("CARGO_PKG_VERSION")))
    );
    eprintln!();
}

/// Print a check result line with symbol and label/value.
pub fn print_check(symbol: &str, label: &str, value: &str) {
    eprintln!("    {symbol} {label:<16} {value}");
}

/// Print an indented detail/fix line under a check.
pub fn print_detail(msg: &str) {
    eprintln!("                        {msg}");
}

/// Shorten `s` to `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}

/// One table row for a page record.
pub fn format_record_row(s: &Styled, record: &PageRecord) -> String {
    let kind = serde_json::to_value(record.page_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    format!(
        "  {} {} {:<10} {:<42} {}",
        s.priority(record.priority),
        s.status(record.monetization_status),
        kind,
        truncate(&record.title, 42),
        s.dim(&record.url)
    )
}

/// Print JSON output to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    if let Ok(s) = serde_json::to_string_pretty(value) {
        println!("{s}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long page title", 6), "a lon\u{2026}");
    }

    #[test]
    fn test_plain_styles_without_color() {
        let s = Styled { use_color: false };
        assert_eq!(s.priority(Priority::High), "high    ");
        assert_eq!(s.status(MonetizationStatus::None), "none       ");
        assert_eq!(s.ok_sym(), "OK");
    }
}
