//! Resilient HTTP client: per-call deadline, retries with exponential
//! backoff and jitter, caller-controlled cancellation.
//!
//! A logical call gets one deadline. Every attempt and every backoff sleep
//! spends from it, so retries never stretch a call past its timeout.

use crate::config::TransportConfig;
use crate::error::TransportError;
use anyhow::{Context, Result};
use rand::Rng;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Retry and deadline policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Default deadline for a logical call.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            timeout: config.timeout(),
        }
    }

    /// Un-jittered delay before retry `retry` (1-based): `base * 2^(retry-1)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    /// Backoff plus up to 25% random jitter. Never shorter than [`Self::backoff`].
    pub fn jittered_backoff(&self, retry: u32) -> Duration {
        let delay = self.backoff(retry);
        let max_jitter = delay.as_millis() as u64 / 4;
        if max_jitter == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=max_jitter);
        delay + Duration::from_millis(jitter)
    }
}

/// Options for one logical call.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Overrides the policy deadline for this call.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
    /// Allow retrying a non-idempotent method.
    pub retry_unsafe: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
            timeout: None,
            cancel: None,
            retry_unsafe: false,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    /// POST with a JSON body and matching content type.
    pub fn post_json(body: String) -> Self {
        Self {
            method: Method::POST,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Mark a non-idempotent call as safe to repeat.
    pub fn retry_safe(mut self) -> Self {
        self.retry_unsafe = true;
        self
    }

    fn may_retry(&self) -> bool {
        self.retry_unsafe || is_idempotent(&self.method)
    }
}

/// A successful (2xx) response with its body read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Requested URL.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// HTTP client shared by every adapter and the audit orchestrator.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_client(client, RetryPolicy::from_config(config)))
    }

    pub fn with_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET with default options.
    pub async fn get(
        &self,
        url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<HttpResponse, TransportError> {
        let mut opts = RequestOptions::get();
        opts.cancel = cancel.cloned();
        self.request(url, opts).await
    }

    /// Perform one logical call, retrying retryable failures until the retry
    /// budget or the deadline is spent.
    pub async fn request(
        &self,
        url: &str,
        opts: RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        let deadline = Instant::now() + opts.timeout.unwrap_or(self.policy.timeout);
        let cancel = opts.cancel.clone().unwrap_or_default();
        let may_retry = opts.may_retry();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout {
                    url: url.to_string(),
                });
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(TransportError::Aborted { url: url.to_string() });
                }
                r = tokio::time::timeout(remaining, self.send_once(url, &opts)) => match r {
                    Ok(r) => r,
                    Err(_) => Err(TransportError::Timeout { url: url.to_string() }),
                },
            };

            let err = match outcome {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };

            if !may_retry || !err.is_retryable() || attempt > self.policy.max_retries {
                warn!(endpoint = %url, attempt, delay_ms = 0u64, error = %err, "request failed");
                return Err(err);
            }

            let delay = self.policy.jittered_backoff(attempt);
            if Instant::now() + delay >= deadline {
                warn!(
                    endpoint = %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "request failed, no time left for another attempt"
                );
                return Err(TransportError::Timeout {
                    url: url.to_string(),
                });
            }

            warn!(
                endpoint = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "request attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(TransportError::Aborted { url: url.to_string() });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        opts: &RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        let mut req = self.client.request(opts.method.clone(), url);
        for (name, value) in &opts.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &opts.body {
            req = req.body(body.clone());
        }

        let resp = req.send().await.map_err(|e| classify(url, &e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = resp.url().to_string();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.text().await.map_err(|e| classify(url, &e))?;

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

fn classify(url: &str, err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Methods that may be repeated without changing the outcome.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE | Method::TRACE
    )
}
