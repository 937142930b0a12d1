//! Small text utilities shared by the adapters and the scorer.

use regex::{Captures, Regex};
use std::sync::OnceLock;
use url::Url;

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)\s*>")
            .expect("valid regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

fn numeric_entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&#([xX]?)([0-9a-fA-F]{1,7});").expect("valid regex"))
}

/// Human title from a URL path, used when a source offers no title.
///
/// `https://example.com/blog/best-running-shoes.html` → `Best Running Shoes`.
/// The site root yields its host.
pub fn title_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let segment = parsed
        .path_segments()
        .and_then(|segs| segs.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string());

    let Some(segment) = segment else {
        return parsed.host_str().unwrap_or(url).to_string();
    };

    let stem = match segment.rsplit_once('.') {
        Some((stem, ext)) if matches!(ext, "html" | "htm" | "php" | "aspx" | "asp") => stem,
        _ => segment.as_str(),
    };

    let words: Vec<String> = stem
        .replace("%20", " ")
        .split(|c: char| c == '-' || c == '_' || c == '+' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();

    if words.is_empty() {
        parsed.host_str().unwrap_or(url).to_string()
    } else {
        words.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Decode the HTML entities CMS titles commonly carry.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let numeric = numeric_entity_re().replace_all(input, |caps: &Captures| {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    numeric
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&hellip;", "\u{2026}")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
        .replace("&amp;", "&")
}

/// Visible text of an HTML fragment, whitespace-collapsed.
pub fn strip_tags(html: &str) -> String {
    let without_code = script_style_re().replace_all(html, " ");
    let without_tags = tag_re().replace_all(&without_code, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
