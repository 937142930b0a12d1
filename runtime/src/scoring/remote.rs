//! Analyzer backed by an external scoring service.
//!
//! Sends `{"title": .., "content": ..}` as JSON and expects a `ScoreResult`
//! (`{"priority", "pageType", "monetizationStatus"}`) back. The call goes
//! through the resilient transport; scoring has no side effects, so the
//! POST is marked safe to retry.

use crate::acquisition::http_client::{HttpClient, RequestOptions};
use crate::map::types::ScoreResult;
use crate::scoring::analyzer::ContentAnalyzer;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;

/// Content is truncated to this many characters before sending.
const MAX_CONTENT_CHARS: usize = 20_000;

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone)]
pub struct RemoteAnalyzer {
    client: HttpClient,
    endpoint: String,
}

impl RemoteAnalyzer {
    pub fn new(client: HttpClient, endpoint: &str) -> Result<Self> {
        let parsed = url::Url::parse(endpoint)
            .with_context(|| format!("invalid analyzer endpoint: {endpoint}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("analyzer endpoint must be http(s): {endpoint}");
        }
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl ContentAnalyzer for RemoteAnalyzer {
    async fn analyze(&self, title: &str, content: &str) -> Result<ScoreResult> {
        let body = serde_json::to_string(&AnalyzeRequest {
            title,
            content: truncate_chars(content, MAX_CONTENT_CHARS),
        })?;
        let opts = RequestOptions::post_json(body).retry_safe();
        let resp = self
            .client
            .request(&self.endpoint, opts)
            .await
            .context("analyzer request failed")?;
        resp.json::<ScoreResult>()
            .with_context(|| format!("analyzer returned an unexpected body from {}", self.endpoint))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
