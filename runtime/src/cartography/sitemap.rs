//! XML sitemap discovery and parsing.
//!
//! Accepts a bare domain (probing `/sitemap.xml`, then `/sitemap_index.xml`)
//! or a full sitemap URL. Sitemap indexes are followed breadth-first, with a
//! cap on the number of child sitemaps fetched for one discovery.

use crate::acquisition::fetcher::{FetchRequest, PageFetcher};
use crate::cartography::text::title_from_url;
use crate::config::SitemapConfig;
use crate::error::{DiscoveryError, TransportError};
use crate::map::types::{PageType, RawPage, SourceType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::Event;
use std::collections::{HashSet, VecDeque};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// One `<url>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
}

/// Result of parsing one sitemap document.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedSitemap {
    /// `<urlset>` with its page entries.
    UrlSet(Vec<SitemapEntry>),
    /// `<sitemapindex>` with child sitemap locations.
    Index(Vec<String>),
    /// Not a sitemap document (HTML error page, feed, garbage).
    Unknown,
}

/// Sitemap source adapter.
pub struct SitemapAdapter {
    fetcher: PageFetcher,
    max_child_sitemaps: usize,
}

impl SitemapAdapter {
    pub fn new(fetcher: PageFetcher, config: &SitemapConfig) -> Self {
        Self {
            fetcher,
            max_child_sitemaps: config.max_child_sitemaps,
        }
    }

    /// Discover pages from a domain or sitemap URL.
    pub async fn discover(
        &self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawPage>, DiscoveryError> {
        let candidates = sitemap_candidates(target)?;

        let mut root = None;
        for candidate in &candidates {
            match self.fetch(candidate, cancel).await? {
                Some(body) => match parse_sitemap(&body) {
                    ParsedSitemap::Unknown => {
                        debug!(url = %candidate, "response is not a sitemap");
                    }
                    parsed => {
                        root = Some((candidate.clone(), parsed));
                        break;
                    }
                },
                None => continue,
            }
        }

        let Some((root_url, parsed)) = root else {
            return Err(DiscoveryError::NotFound {
                target: target.trim().to_string(),
            });
        };

        let mut entries = Vec::new();
        let mut queue = VecDeque::new();
        let mut seen = HashSet::from([root_url.clone()]);
        absorb(parsed, &mut entries, &mut queue, &mut seen);

        let mut children_fetched = 0usize;
        while let Some(child) = queue.pop_front() {
            if children_fetched >= self.max_child_sitemaps {
                warn!(
                    sitemap = %root_url,
                    limit = self.max_child_sitemaps,
                    skipped = queue.len() + 1,
                    "child sitemap limit reached"
                );
                break;
            }
            children_fetched += 1;

            let Some(body) = self.fetch(&child, cancel).await? else {
                continue;
            };
            match parse_sitemap(&body) {
                ParsedSitemap::Unknown => warn!(url = %child, "child sitemap did not parse"),
                parsed => absorb(parsed, &mut entries, &mut queue, &mut seen),
            }
        }

        if entries.is_empty() {
            return Err(DiscoveryError::EmptyResult { target: root_url });
        }

        info!(
            sitemap = %root_url,
            pages = entries.len(),
            child_sitemaps = children_fetched,
            "sitemap discovery complete"
        );

        Ok(entries.into_iter().map(entry_to_raw_page).collect())
    }

    /// Fetch a sitemap body. `Ok(None)` means unreachable, so the caller
    /// moves on; only cancellation aborts the discovery.
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, DiscoveryError> {
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        let req = FetchRequest::default().with_cancel(cancel.clone());
        match self.fetcher.fetch_text(url, req).await {
            Ok(body) => Ok(Some(body)),
            Err(TransportError::Aborted { .. }) => Err(DiscoveryError::Cancelled),
            Err(e) => {
                debug!(url, error = %e, "sitemap fetch failed");
                Ok(None)
            }
        }
    }
}

fn absorb(
    parsed: ParsedSitemap,
    entries: &mut Vec<SitemapEntry>,
    queue: &mut VecDeque<String>,
    seen: &mut HashSet<String>,
) {
    match parsed {
        ParsedSitemap::UrlSet(mut found) => entries.append(&mut found),
        ParsedSitemap::Index(children) => {
            for child in children {
                if seen.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }
        ParsedSitemap::Unknown => {}
    }
}

fn entry_to_raw_page(entry: SitemapEntry) -> RawPage {
    let title = title_from_url(&entry.loc);
    let last_modified = entry.lastmod.as_deref().and_then(parse_lastmod);
    RawPage::new(entry.loc, SourceType::Sitemap)
        .with_title(title)
        .with_page_type(PageType::Post)
        .with_last_modified(last_modified)
}

/// URLs to try, in order, for a discovery target.
pub fn sitemap_candidates(target: &str) -> Result<Vec<String>, DiscoveryError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(DiscoveryError::invalid(target, "enter a domain or sitemap URL"));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| DiscoveryError::invalid(target, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(DiscoveryError::invalid(target, "expected an http(s) domain or URL"));
    }

    let path = url.path().to_ascii_lowercase();
    if path.ends_with(".xml") || path.contains("sitemap") {
        return Ok(vec![url.to_string()]);
    }

    let base = url.as_str().trim_end_matches('/').to_string();
    Ok(vec![
        format!("{base}/sitemap.xml"),
        format!("{base}/sitemap_index.xml"),
    ])
}

/// Parse a `<urlset>` or `<sitemapindex>` document.
///
/// Only `loc`/`lastmod` elements that are direct children of `<url>` or
/// `<sitemap>` count, so extension elements such as `<image:loc>` are ignored.
pub fn parse_sitemap(xml: &str) -> ParsedSitemap {
    #[derive(PartialEq)]
    enum Root {
        Unset,
        UrlSet,
        Index,
    }

    let mut root = Root::Unset;
    let mut entries = Vec::new();
    let mut children = Vec::new();

    let mut depth = 0usize;
    let mut item_depth: Option<usize> = None;
    let mut current_tag = String::new();
    let mut loc = String::new();
    let mut lastmod: Option<String> = None;

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        let text = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if root == Root::Unset {
                    match name.as_str() {
                        "urlset" => root = Root::UrlSet,
                        "sitemapindex" => root = Root::Index,
                        _ => return ParsedSitemap::Unknown,
                    }
                } else if item_depth.is_none() && depth == 2 && (name == "url" || name == "sitemap") {
                    item_depth = Some(depth);
                    loc.clear();
                    lastmod = None;
                }
                current_tag = name;
                None
            }
            Ok(Event::Text(ref e)) => Some(e.unescape().unwrap_or_default().trim().to_string()),
            Ok(Event::CData(ref e)) => Some(String::from_utf8_lossy(&e[..]).trim().to_string()),
            Ok(Event::End(_)) => {
                if item_depth == Some(depth) {
                    if !loc.is_empty() {
                        match root {
                            Root::UrlSet => entries.push(SitemapEntry {
                                loc: std::mem::take(&mut loc),
                                lastmod: lastmod.take(),
                            }),
                            Root::Index => children.push(std::mem::take(&mut loc)),
                            Root::Unset => {}
                        }
                    }
                    item_depth = None;
                }
                depth = depth.saturating_sub(1);
                current_tag.clear();
                None
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "sitemap XML error, keeping entries parsed so far");
                break;
            }
            _ => None,
        };

        let in_field = item_depth.is_some_and(|d| depth == d + 1);
        if let Some(text) = text.filter(|t| in_field && !t.is_empty()) {
            match current_tag.as_str() {
                "loc" => loc = text,
                "lastmod" => lastmod = Some(text),
                _ => {}
            }
        }
        buf.clear();
    }

    match root {
        Root::UrlSet => ParsedSitemap::UrlSet(entries),
        Root::Index => ParsedSitemap::Index(children),
        Root::Unset => ParsedSitemap::Unknown,
    }
}

/// Parse a W3C datetime `lastmod` value.
pub fn parse_lastmod(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
