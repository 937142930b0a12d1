//! Page records and their classification vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a page record was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Sitemap,
    CmsApi,
    Manual,
}

impl SourceType {
    /// Higher wins when two sources describe the same URL.
    pub fn authority(self) -> u8 {
        match self {
            SourceType::CmsApi => 3,
            SourceType::Sitemap => 2,
            SourceType::Manual => 1,
        }
    }
}

/// Structural type from the source, or content kind from the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageType {
    #[default]
    Post,
    Page,
    Custom,
    Review,
    Comparison,
    HowTo,
}

impl PageType {
    /// Map a CMS `type` field.
    pub fn from_cms_type(kind: &str) -> Self {
        match kind {
            "post" => PageType::Post,
            "page" => PageType::Page,
            _ => PageType::Custom,
        }
    }
}

/// Monetization opportunity, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonetizationStatus {
    Monetized,
    #[default]
    Opportunity,
    None,
}

impl MonetizationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MonetizationStatus::Monetized => "monetized",
            MonetizationStatus::Opportunity => "opportunity",
            MonetizationStatus::None => "none",
        }
    }
}

/// Classification produced by a content analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub priority: Priority,
    pub page_type: PageType,
    pub monetization_status: MonetizationStatus,
}

/// A page descriptor straight from a source adapter, before canonicalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub url: String,
    pub title: Option<String>,
    pub source: SourceType,
    pub page_type: PageType,
    pub last_modified: Option<DateTime<Utc>>,
    /// Requested insertion index in the working set; appended when `None`.
    pub position: Option<usize>,
    /// Post id in the CMS, for CMS-sourced pages.
    pub cms_id: Option<u64>,
    /// Content delivered alongside the listing, if any.
    pub content: Option<String>,
}

impl RawPage {
    pub fn new(url: impl Into<String>, source: SourceType) -> Self {
        Self {
            url: url.into(),
            title: None,
            source,
            page_type: PageType::default(),
            last_modified: None,
            position: None,
            cms_id: None,
            content: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_last_modified(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.last_modified = ts;
        self
    }

    pub fn with_page_type(mut self, page_type: PageType) -> Self {
        self.page_type = page_type;
        self
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// A deduplicated page in a working set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// Stable within one working set; assigned in insertion order.
    pub id: u64,
    /// Canonical URL, unique within the working set.
    pub url: String,
    pub title: String,
    pub source_type: SourceType,
    pub page_type: PageType,
    pub priority: Priority,
    pub monetization_status: MonetizationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Set only by the audit orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_audited: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms_id: Option<u64>,
}

impl PageRecord {
    /// Overwrite the classification fields with an analyzer result.
    pub fn apply_score(&mut self, score: ScoreResult) {
        self.priority = score.priority;
        self.page_type = score.page_type;
        self.monetization_status = score.monetization_status;
    }

    /// An opportunity page at the given priority.
    pub fn is_opportunity_at(&self, priority: Priority) -> bool {
        self.priority == priority && self.monetization_status == MonetizationStatus::Opportunity
    }
}
