//! Manually entered URLs.

use crate::cartography::normalize::canonicalize_url;
use crate::cartography::text::title_from_url;
use crate::error::DiscoveryError;
use crate::map::types::{RawPage, SourceType};

/// Validate one user-entered URL and return its canonical form.
///
/// The input must be an absolute http(s) URL with a non-empty host; bare
/// domains are refused so a typo is not silently turned into a page.
pub fn validate_manual_url(input: &str) -> Result<String, DiscoveryError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DiscoveryError::invalid(input, "enter a URL"));
    }
    if !trimmed.contains("://") {
        return Err(DiscoveryError::invalid(input, "expected an absolute http(s) URL"));
    }
    canonicalize_url(trimmed)
}

/// A page descriptor for a manual entry, inserted at `position`.
pub fn manual_entry(input: &str, position: usize) -> Result<RawPage, DiscoveryError> {
    let canonical = validate_manual_url(input)?;
    let title = title_from_url(&canonical);
    Ok(RawPage::new(canonical, SourceType::Manual)
        .with_title(title)
        .at_position(position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_urls() {
        for bad in ["not-a-url", "", "   ", "example.com/page", "ftp://example.com/f", "https://"] {
            let err = validate_manual_url(bad).unwrap_err();
            assert!(
                matches!(err, DiscoveryError::InvalidInput { .. }),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_manual_entry() {
        let raw = manual_entry(" https://Example.com/Best-Blenders/?utm_source=nl ", 0).unwrap();
        assert_eq!(raw.url, "https://example.com/Best-Blenders");
        assert_eq!(raw.title.as_deref(), Some("Best Blenders"));
        assert_eq!(raw.source, SourceType::Manual);
        assert_eq!(raw.position, Some(0));
    }
}
