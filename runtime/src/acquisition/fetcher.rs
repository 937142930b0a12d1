//! Cache-fronted GET used by the adapters and the audit orchestrator.

use crate::acquisition::http_client::{HttpClient, RequestOptions};
use crate::cartography::normalize::canonicalize_url;
use crate::error::TransportError;
use crate::intelligence::cache::{cache_key, TtlCache};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-call options for [`PageFetcher::fetch_text`].
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub headers: Vec<(String, String)>,
    /// Account identity separating cache entries; never a secret.
    pub scope: String,
    pub cancel: Option<CancellationToken>,
    /// Skip the cache lookup (the fresh body is still stored).
    pub bypass_cache: bool,
}

impl FetchRequest {
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn scoped(mut self, scope: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        self.scope = scope.into();
        self.headers = headers;
        self
    }

    pub fn fresh(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }
}

/// GET bodies through the resilient transport, memoized for a TTL.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: HttpClient,
    cache: Arc<TtlCache<String>>,
    ttl: Duration,
}

impl PageFetcher {
    pub fn new(client: HttpClient, cache: Arc<TtlCache<String>>, ttl: Duration) -> Self {
        Self { client, cache, ttl }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn cache(&self) -> &TtlCache<String> {
        &self.cache
    }

    /// Body of a successful GET, served from cache when fresh.
    ///
    /// Only 2xx bodies are cached; failures always go back to the network
    /// on the next call.
    pub async fn fetch_text(&self, url: &str, req: FetchRequest) -> Result<String, TransportError> {
        let key = Self::key_for(url, &req.scope);

        if !req.bypass_cache {
            if let Some(body) = self.cache.get(&key) {
                debug!(url, "cache hit");
                return Ok(body);
            }
        }

        let mut opts = RequestOptions::get().with_headers(req.headers);
        opts.cancel = req.cancel;
        let resp = self.client.request(url, opts).await?;

        self.cache.set(key, resp.body.clone(), self.ttl);
        Ok(resp.body)
    }

    /// Store a body for `url` as if it had just been fetched.
    pub fn prime(&self, url: &str, scope: &str, body: impl Into<String>) {
        self.cache.set(Self::key_for(url, scope), body.into(), self.ttl);
    }

    /// Drop the cached body for `url` under `scope`.
    pub fn invalidate(&self, url: &str, scope: &str) -> bool {
        self.cache.delete(&Self::key_for(url, scope))
    }

    fn key_for(url: &str, scope: &str) -> String {
        let canonical = canonicalize_url(url).unwrap_or_else(|_| url.to_string());
        cache_key("GET", &canonical, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::http_client::RetryPolicy;

    fn fetcher() -> PageFetcher {
        PageFetcher::new(
            HttpClient::with_client(reqwest::Client::new(), RetryPolicy::default()),
            Arc::new(TtlCache::new()),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_serves_prefilled_cache_without_network() {
        let f = fetcher();
        // Equivalent URL forms share one key.
        let key = PageFetcher::key_for("https://example.invalid/page/", "");
        f.cache().set(key, "<html>cached</html>".to_string(), Duration::from_secs(60));

        let body = f
            .fetch_text(
                "https://EXAMPLE.invalid/page?utm_source=x",
                FetchRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(body, "<html>cached</html>");
    }

    #[tokio::test]
    async fn test_prime_then_fetch() {
        let f = fetcher();
        f.prime("https://example.invalid/p", "", "primed");
        let body = f
            .fetch_text("https://example.invalid/p/", FetchRequest::default())
            .await
            .unwrap();
        assert_eq!(body, "primed");
    }

    #[test]
    fn test_invalidate() {
        let f = fetcher();
        let key = PageFetcher::key_for("https://example.invalid/a", "alice");
        f.cache().set(key, "x".to_string(), Duration::from_secs(60));
        assert!(!f.invalidate("https://example.invalid/a", "bob"));
        assert!(f.invalidate("https://example.invalid/a", "alice"));
    }
}
