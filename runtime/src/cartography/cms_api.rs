//! CMS REST API source (WordPress-compatible `wp/v2` routes).
//!
//! Lists posts page by page until a short page, authenticating with an
//! application password over Basic auth. Listing pages go through the
//! shared TTL cache, scoped by account so two users never share entries.

use crate::acquisition::auth::CmsCredentials;
use crate::acquisition::fetcher::{FetchRequest, PageFetcher};
use crate::cartography::sitemap::parse_lastmod;
use crate::cartography::text::strip_tags;
use crate::error::{DiscoveryError, TransportError};
use crate::map::types::{PageType, RawPage, SourceType};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// `{ "rendered": "..." }` wrapper used by title and content fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

/// One post as returned by the listing and single-post routes.
#[derive(Debug, Clone, Deserialize)]
pub struct CmsPost {
    pub id: u64,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub modified_gmt: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub content: Option<Rendered>,
}

impl CmsPost {
    /// Plain-text title with entities decoded.
    pub fn plain_title(&self) -> String {
        strip_tags(&self.title.rendered)
    }

    /// Rendered HTML body, empty when the route omitted it.
    pub fn content_html(&self) -> &str {
        self.content.as_ref().map_or("", |c| c.rendered.as_str())
    }

    fn into_raw_page(self) -> Option<RawPage> {
        let link = self.link.as_deref().map(str::trim).filter(|l| !l.is_empty())?.to_string();
        let title = self.plain_title();
        let last_modified = self
            .modified_gmt
            .as_deref()
            .or(self.modified.as_deref())
            .and_then(parse_lastmod);
        let page_type = PageType::from_cms_type(self.kind.as_deref().unwrap_or("post"));

        let mut page = RawPage::new(link, SourceType::CmsApi)
            .with_page_type(page_type)
            .with_last_modified(last_modified);
        if !title.is_empty() {
            page = page.with_title(title);
        }
        page.cms_id = Some(self.id);
        page.content = self.content.map(|c| c.rendered).filter(|c| !c.is_empty());
        Some(page)
    }
}

/// Account details from `/users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// CMS-API source adapter.
pub struct CmsApiAdapter {
    fetcher: PageFetcher,
    credentials: CmsCredentials,
    page_size: usize,
}

impl CmsApiAdapter {
    pub fn new(fetcher: PageFetcher, credentials: CmsCredentials, page_size: usize) -> Self {
        Self {
            fetcher,
            credentials,
            page_size: page_size.clamp(1, 100),
        }
    }

    pub fn credentials(&self) -> &CmsCredentials {
        &self.credentials
    }

    fn request(&self, cancel: &CancellationToken) -> FetchRequest {
        FetchRequest::default()
            .scoped(self.credentials.cache_scope(), self.credentials.headers())
            .with_cancel(cancel.clone())
    }

    /// URL of one listing page.
    pub fn listing_url(&self, page: usize) -> String {
        format!(
            "{}/posts?page={}&per_page={}&_embed",
            self.credentials.api_base(),
            page,
            self.page_size
        )
    }

    /// Verify the credentials against `/users/me`.
    pub async fn test_connection(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ConnectionInfo, DiscoveryError> {
        let url = format!("{}/users/me", self.credentials.api_base());
        let body = self
            .fetcher
            .fetch_text(&url, self.request(cancel).fresh(true))
            .await?;
        let info: ConnectionInfo = decode(&url, &body)?;
        info!(user = %info.name, roles = ?info.roles, "CMS connection verified");
        Ok(info)
    }

    /// Fetch a single post with its content.
    pub async fn fetch_post(
        &self,
        id: u64,
        cancel: &CancellationToken,
    ) -> Result<CmsPost, DiscoveryError> {
        let url = format!("{}/posts/{}", self.credentials.api_base(), id);
        let body = self.fetcher.fetch_text(&url, self.request(cancel)).await?;
        decode(&url, &body)
    }

    /// List every post, reporting `(fetched, fetched)` after each page.
    ///
    /// Pagination stops at the first page shorter than the page size. A 400
    /// on a later page is the CMS's "page out of range" reply when the total
    /// is an exact multiple of the page size, and also ends the listing.
    pub async fn discover(
        &self,
        on_progress: &mut dyn FnMut(usize, usize),
        cancel: &CancellationToken,
    ) -> Result<Vec<RawPage>, DiscoveryError> {
        let mut pages = Vec::new();
        let mut fetched = 0usize;
        let mut page = 1usize;

        loop {
            if cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled);
            }

            let url = self.listing_url(page);
            let body = match self.fetcher.fetch_text(&url, self.request(cancel)).await {
                Ok(body) => body,
                Err(TransportError::HttpStatus { status: 400, .. }) if page > 1 => {
                    debug!(page, "listing page out of range, stopping");
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            let posts: Vec<CmsPost> = decode(&url, &body)?;
            let count = posts.len();
            fetched += count;

            for post in posts {
                let id = post.id;
                match post.into_raw_page() {
                    Some(raw) => pages.push(raw),
                    None => warn!(post_id = id, "CMS post has no link, skipping"),
                }
            }

            on_progress(fetched, fetched);
            debug!(page, count, fetched, "fetched CMS listing page");

            if count < self.page_size {
                break;
            }
            page += 1;
        }

        if pages.is_empty() {
            return Err(DiscoveryError::EmptyResult {
                target: self.credentials.api_base().to_string(),
            });
        }

        info!(
            api = %self.credentials.api_base(),
            posts = pages.len(),
            requests = page,
            "CMS discovery complete"
        );
        Ok(pages)
    }
}

fn decode<T: serde::de::DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, DiscoveryError> {
    serde_json::from_str(body).map_err(|e| DiscoveryError::Malformed {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

/// Plain text of a post body, for scoring and display.
pub fn content_text(post: &CmsPost) -> String {
    strip_tags(post.content_html())
}
