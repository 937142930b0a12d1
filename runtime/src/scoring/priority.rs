//! Heuristic monetization scorer.
//!
//! `score` is a pure function of `(title, content, rules)`. The page type
//! comes from keyword and structural signals, the monetization status from
//! affiliate links or product-box markup already present in the content,
//! and the priority from both:
//!
//! | priority   | when                                                  |
//! |------------|-------------------------------------------------------|
//! | `critical` | review or comparison, not monetized                   |
//! | `high`     | brand/product mentions, not monetized                 |
//! | `medium`   | how-to or guide, not monetized                        |
//! | `low`      | everything else, including every monetized page       |
//!
//! Pages of a monetizable type and pages mentioning products are
//! opportunities unless already monetized.
//!
//! The first matching row wins, so a page with several signals gets the
//! higher priority.

use crate::map::types::{MonetizationStatus, PageType, Priority, ScoreResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Keyword lists and thresholds driving the scorer.
///
/// Keywords are matched case-insensitively against whitespace-collapsed
/// text padded with a space on each side, so `" vs "` only matches the
/// standalone word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    pub comparison_keywords: Vec<String>,
    pub review_keywords: Vec<String>,
    pub how_to_keywords: Vec<String>,
    /// Substrings of outbound affiliate links (tag parameters, shorteners).
    pub affiliate_link_markers: Vec<String>,
    /// Markup left behind by product-box plugins.
    pub product_box_markers: Vec<String>,
    pub product_mention_keywords: Vec<String>,
    /// Numbered items in the body that make a list post read as a review.
    pub min_numbered_items: usize,
    /// Keyword hits needed to classify from the body when the title is silent.
    pub min_content_hits: usize,
    /// Page types that count as an opportunity when not yet monetized.
    pub monetizable_types: Vec<PageType>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            comparison_keywords: strings(&[
                " vs ",
                " vs. ",
                " versus ",
                " compared",
                "comparison",
                " alternatives",
                " or ",
            ]),
            review_keywords: strings(&[
                "review",
                " best ",
                " top ",
                " tested",
                " rated",
                "hands-on",
                " worth it",
            ]),
            how_to_keywords: strings(&[
                "how to ",
                "guide",
                "tutorial",
                " tips",
                " ways to ",
                "step by step",
                "step-by-step",
                " diy ",
            ]),
            affiliate_link_markers: strings(&[
                "amzn.to/",
                "?tag=",
                "&tag=",
                "&amp;tag=",
                "/go/",
                "/recommends/",
                "rel=\"sponsored",
                "rel=\"nofollow sponsored",
                "shareasale.com",
                "awin1.com",
                "anrdoezrs.net",
                "click.linksynergy.com",
            ]),
            product_box_markers: strings(&[
                "aawp",
                "data-asin",
                "product-box",
                "amazon-product",
                "lasso-",
                "affiliate-box",
                "wp-block-product",
            ]),
            product_mention_keywords: strings(&[
                " price",
                " buy ",
                " deal",
                " coupon",
                " amazon",
                " specs",
                " model ",
                " brand",
            ]),
            min_numbered_items: 3,
            min_content_hits: 2,
            monetizable_types: vec![PageType::Review, PageType::Comparison, PageType::HowTo],
        }
    }
}

fn model_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // WH-1000XM5, RTX 4090, iPhone 15: letters then a 2-5 digit number.
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z]{1,8}[- ]?\d{2,5}[A-Za-z]{0,3}\b").expect("valid regex"))
}

fn numbered_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)(^|<h[1-6][^>]*>|<p[^>]*>)\s*#?\d{1,2}[.):]\s").expect("valid regex")
    })
}

fn list_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "7 Headphones Worth Buying", "Top 10 ..." is caught by the keywords.
    RE.get_or_init(|| Regex::new(r"^\s*\d{1,3}\s+\p{L}").expect("valid regex"))
}

/// Score one page.
pub fn score(title: &str, content: &str, rules: &ScoringRules) -> ScoreResult {
    let title_text = padded(title);
    let content_text = padded(content);

    let page_type = classify_type(title, &title_text, content, &content_text, rules);
    let monetized = is_monetized(&content_text, rules);
    let mentions_products = mentions_products(title, &title_text, &content_text, rules);

    let monetization_status = if monetized {
        MonetizationStatus::Monetized
    } else if mentions_products || rules.monetizable_types.contains(&page_type) {
        MonetizationStatus::Opportunity
    } else {
        MonetizationStatus::None
    };

    let priority = if monetized {
        Priority::Low
    } else if matches!(page_type, PageType::Review | PageType::Comparison) {
        Priority::Critical
    } else if mentions_products {
        Priority::High
    } else if page_type == PageType::HowTo {
        Priority::Medium
    } else {
        Priority::Low
    };

    ScoreResult {
        priority,
        page_type,
        monetization_status,
    }
}

/// Lower-cased, whitespace-collapsed, padded with one space each side.
fn padded(text: &str) -> String {
    let collapsed: Vec<&str> = text.split_whitespace().collect();
    format!(" {} ", collapsed.join(" ").to_lowercase())
}

fn matches_any(text: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
}

fn count_hits(text: &str, keywords: &[String]) -> usize {
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .map(|k| text.matches(&k.to_lowercase()).count())
        .sum()
}

/// Items of a numbered list: `<ol>` entries or lines/headings starting "1.".
fn numbered_items(content: &str) -> usize {
    let lower = content.to_lowercase();
    let ol_items = if lower.contains("<ol") {
        lower.matches("<li").count()
    } else {
        0
    };
    ol_items.max(numbered_line_re().find_iter(content).count())
}

fn classify_type(
    title: &str,
    title_text: &str,
    content: &str,
    content_text: &str,
    rules: &ScoringRules,
) -> PageType {
    if matches_any(title_text, &rules.comparison_keywords) && !is_plain_or(title_text, rules) {
        return PageType::Comparison;
    }
    if matches_any(title_text, &rules.review_keywords) || list_title_re().is_match(title) {
        return PageType::Review;
    }
    if matches_any(title_text, &rules.how_to_keywords) {
        return PageType::HowTo;
    }

    let hits = rules.min_content_hits.max(1);
    if count_hits(content_text, &rules.comparison_keywords) >= hits && !is_plain_or(content_text, rules)
    {
        return PageType::Comparison;
    }
    if count_hits(content_text, &rules.review_keywords) >= hits
        && numbered_items(content) >= rules.min_numbered_items
    {
        return PageType::Review;
    }
    if count_hits(content_text, &rules.how_to_keywords) >= hits {
        return PageType::HowTo;
    }
    PageType::Post
}

/// `" or "` alone is too common to signal a comparison; it needs a second
/// comparison keyword or a product model on each side.
fn is_plain_or(text: &str, rules: &ScoringRules) -> bool {
    let others: Vec<String> = rules
        .comparison_keywords
        .iter()
        .filter(|k| k.trim() != "or")
        .cloned()
        .collect();
    if matches_any(text, &others) {
        return false;
    }
    model_numbers(text) < 2
}

/// Product model tokens, ignoring years such as "Guide 2024".
fn model_numbers(text: &str) -> usize {
    model_number_re()
        .find_iter(text)
        .filter(|m| !looks_like_year(m.as_str()))
        .count()
}

fn looks_like_year(token: &str) -> bool {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    let rest = token.trim_end_matches(|c: char| c.is_ascii_digit());
    digits.len() == 4
        && (digits.starts_with("19") || digits.starts_with("20"))
        && (rest.ends_with(' ') || rest.ends_with('-'))
}

fn is_monetized(content_text: &str, rules: &ScoringRules) -> bool {
    matches_any(content_text, &rules.affiliate_link_markers)
        || matches_any(content_text, &rules.product_box_markers)
}

fn mentions_products(title: &str, title_text: &str, content_text: &str, rules: &ScoringRules) -> bool {
    matches_any(title_text, &rules.product_mention_keywords)
        || count_hits(content_text, &rules.product_mention_keywords) >= rules.min_content_hits.max(1)
        || model_numbers(title) > 0
}
