//! Audit runs: re-fetch every page in a working set and rescore it.
//!
//! Fetches run concurrently up to the configured limit. Results are applied
//! on the caller's task as they arrive, each touching only its own record,
//! and progress is reported after every record whether it was rescored or
//! skipped. A failed page keeps its previous classification.

use crate::acquisition::fetcher::{FetchRequest, PageFetcher};
use crate::audit::progress::{AuditProgress, ProgressObserver};
use crate::cartography::rate_limiter::RateLimiter;
use crate::config::AuditConfig;
use crate::error::{AuditError, TransportError};
use crate::map::types::ScoreResult;
use crate::map::working_set::WorkingSet;
use crate::scoring::analyzer::ContentAnalyzer;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of one orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl AuditState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AuditState::Completed | AuditState::Cancelled | AuditState::Failed
        )
    }
}

/// Outcome of a finished (or cancelled) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub state: AuditState,
    pub total: usize,
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl AuditSummary {
    pub fn progress(&self) -> AuditProgress {
        AuditProgress {
            current: self.processed,
            total: self.total,
        }
    }
}

struct AuditJob {
    position: usize,
    url: String,
    title: String,
}

enum RecordOutcome {
    Scored(ScoreResult),
    Skipped(String),
    Aborted,
}

/// Drives audit runs over a working set.
pub struct AuditOrchestrator {
    fetcher: PageFetcher,
    analyzer: Arc<dyn ContentAnalyzer>,
    concurrency: usize,
    min_delay: Duration,
    bypass_cache: bool,
    state: AuditState,
}

impl AuditOrchestrator {
    pub fn new(fetcher: PageFetcher, analyzer: Arc<dyn ContentAnalyzer>, config: &AuditConfig) -> Self {
        Self {
            fetcher,
            analyzer,
            concurrency: config.concurrency,
            min_delay: Duration::from_millis(config.min_delay_ms),
            bypass_cache: config.bypass_cache,
            state: AuditState::Idle,
        }
    }

    pub fn state(&self) -> AuditState {
        self.state
    }

    /// Audit every record in `set`.
    ///
    /// `total` is fixed to the set size at the start. Progress events carry
    /// `current` = 1, 2, .. in order. Cancellation stops new fetches and
    /// keeps already-updated records; it is reported through the summary
    /// state, not as an error.
    pub async fn run(
        &mut self,
        set: &mut WorkingSet,
        observer: &mut dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<AuditSummary, AuditError> {
        if self.concurrency == 0 {
            self.state = AuditState::Failed;
            return Err(AuditError::ConfigMissing(
                "audit.concurrency must be at least 1".into(),
            ));
        }

        self.state = AuditState::Running;
        let jobs: Vec<AuditJob> = set
            .iter()
            .enumerate()
            .map(|(position, r)| AuditJob {
                position,
                url: r.url.clone(),
                title: r.title.clone(),
            })
            .collect();

        let mut summary = AuditSummary {
            total: jobs.len(),
            ..AuditSummary::default()
        };
        info!(
            pages = summary.total,
            concurrency = self.concurrency,
            analyzer = self.analyzer.name(),
            "audit started"
        );

        let limiter = Arc::new(RateLimiter::new(self.concurrency, self.min_delay));
        let fetcher = self.fetcher.clone();
        let analyzer = Arc::clone(&self.analyzer);
        let bypass_cache = self.bypass_cache;
        let job_cancel = cancel.clone();

        let mut results = stream::iter(jobs)
            .map(move |job| {
                let fetcher = fetcher.clone();
                let analyzer = Arc::clone(&analyzer);
                let limiter = Arc::clone(&limiter);
                let cancel = job_cancel.clone();
                async move {
                    let outcome =
                        audit_one(&job, &fetcher, analyzer.as_ref(), &limiter, bypass_cache, &cancel)
                            .await;
                    (job, outcome)
                }
            })
            .buffer_unordered(self.concurrency);

        let mut state = AuditState::Completed;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    state = AuditState::Cancelled;
                    break;
                }
                next = results.next() => next,
            };
            let Some((job, outcome)) = next else {
                break;
            };

            match outcome {
                RecordOutcome::Scored(score) => {
                    if let Some(record) = set.record_at_mut(job.position) {
                        record.apply_score(score);
                        record.last_audited = Some(Utc::now());
                        summary.updated += 1;
                        debug!(
                            url = %job.url,
                            priority = %score.priority,
                            page_type = ?score.page_type,
                            status = score.monetization_status.as_str(),
                            "page rescored"
                        );
                    }
                }
                RecordOutcome::Skipped(reason) => {
                    summary.skipped += 1;
                    warn!(url = %job.url, error = %reason, "audit skipped page");
                }
                RecordOutcome::Aborted => {
                    state = AuditState::Cancelled;
                    break;
                }
            }

            summary.processed += 1;
            observer.on_progress(summary.processed, summary.total);
        }
        drop(results);

        self.state = state;
        summary.state = state;
        info!(
            state = ?state,
            processed = summary.processed,
            updated = summary.updated,
            skipped = summary.skipped,
            total = summary.total,
            "audit finished"
        );
        Ok(summary)
    }
}

async fn audit_one(
    job: &AuditJob,
    fetcher: &PageFetcher,
    analyzer: &dyn ContentAnalyzer,
    limiter: &RateLimiter,
    bypass_cache: bool,
    cancel: &CancellationToken,
) -> RecordOutcome {
    let Some(_guard) = limiter.acquire(cancel).await else {
        return RecordOutcome::Aborted;
    };

    let req = FetchRequest::default()
        .with_cancel(cancel.clone())
        .fresh(bypass_cache);
    let body = match fetcher.fetch_text(&job.url, req).await {
        Ok(body) => body,
        Err(TransportError::Aborted { .. }) => return RecordOutcome::Aborted,
        Err(e) => return RecordOutcome::Skipped(e.to_string()),
    };

    match analyzer.analyze(&job.title, &body).await {
        Ok(score) => RecordOutcome::Scored(score),
        Err(e) => RecordOutcome::Skipped(format!("{e:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::http_client::{HttpClient, RetryPolicy};
    use crate::intelligence::cache::TtlCache;
    use crate::map::types::{MonetizationStatus, PageType, Priority, RawPage, SourceType};
    use crate::scoring::analyzer::HeuristicAnalyzer;

    fn fetcher() -> PageFetcher {
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_millis(500),
        };
        PageFetcher::new(
            HttpClient::with_client(reqwest::Client::new(), policy),
            Arc::new(TtlCache::new()),
            Duration::from_secs(60),
        )
    }

    fn orchestrator(fetcher: PageFetcher, concurrency: usize) -> AuditOrchestrator {
        let config = AuditConfig {
            concurrency,
            ..AuditConfig::default()
        };
        AuditOrchestrator::new(fetcher, Arc::new(HeuristicAnalyzer::default()), &config)
    }

    #[tokio::test]
    async fn test_rescoring_from_cached_bodies() {
        let fetcher = fetcher();
        let mut set = WorkingSet::new().merge(vec![
            RawPage::new("https://example.invalid/best-kettles", SourceType::Sitemap)
                .with_title("Best Kettles"),
            RawPage::new("https://example.invalid/team-news", SourceType::Sitemap)
                .with_title("Team News"),
        ]);
        // Prefill the cache so no request leaves the process.
        for (url, body) in [
            ("https://example.invalid/best-kettles", "<p>We tested ten kettles.</p>"),
            ("https://example.invalid/team-news", "<p>We moved offices.</p>"),
        ] {
            fetcher.prime(url, "", body);
        }

        let mut seen = Vec::new();
        let mut observer = |c: usize, t: usize| seen.push((c, t));
        let mut audit = orchestrator(fetcher, 2);
        let summary = audit
            .run(&mut set, &mut observer, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.state, AuditState::Completed);
        assert_eq!(audit.state(), AuditState::Completed);
        assert_eq!(summary.updated, 2);
        assert_eq!(seen, vec![(1, 2), (2, 2)]);

        let kettles = set.find_by_url("https://example.invalid/best-kettles").unwrap();
        assert_eq!(kettles.page_type, PageType::Review);
        assert_eq!(kettles.priority, Priority::Critical);
        assert!(kettles.last_audited.is_some());
        let news = set.find_by_url("https://example.invalid/team-news").unwrap();
        assert_eq!(news.monetization_status, MonetizationStatus::None);
    }

    #[tokio::test]
    async fn test_unreachable_pages_are_skipped() {
        // Port 9 refuses connections; with no retries each page fails fast.
        let mut set = WorkingSet::new().merge(vec![
            RawPage::new("http://127.0.0.1:9/a", SourceType::Manual),
            RawPage::new("http://127.0.0.1:9/b", SourceType::Manual),
        ]);
        let before = set.clone();

        let mut events = 0;
        let mut observer = |_: usize, _: usize| events += 1;
        let summary = orchestrator(fetcher(), 5)
            .run(&mut set, &mut observer, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.state, AuditState::Completed);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(events, 2);
        assert_eq!(set.records(), before.records());
    }

    #[tokio::test]
    async fn test_empty_set_completes_without_events() {
        let mut set = WorkingSet::new();
        let mut events = 0;
        let mut observer = |_: usize, _: usize| events += 1;
        let summary = orchestrator(fetcher(), 3)
            .run(&mut set, &mut observer, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.state, AuditState::Completed);
        assert_eq!(summary.total, 0);
        assert_eq!(events, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut set = WorkingSet::new().merge(vec![RawPage::new(
            "https://example.invalid/x",
            SourceType::Manual,
        )]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut observer = |_: usize, _: usize| {};
        let mut audit = orchestrator(fetcher(), 1);
        let summary = audit.run(&mut set, &mut observer, &cancel).await.unwrap();
        assert_eq!(summary.state, AuditState::Cancelled);
        assert_eq!(summary.processed, 0);
        assert_eq!(audit.state(), AuditState::Cancelled);
    }

    #[tokio::test]
    async fn test_zero_concurrency_fails() {
        let mut set = WorkingSet::new();
        let mut observer = |_: usize, _: usize| {};
        let mut audit = orchestrator(fetcher(), 0);
        let err = audit
            .run(&mut set, &mut observer, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::ConfigMissing(_)));
        assert_eq!(audit.state(), AuditState::Failed);
    }
}
