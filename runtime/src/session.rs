//! One caller's discovery and audit session.
//!
//! The session owns the working set and is the single writer to it.
//! Cancellation slots live in a shareable [`OperationSlots`] handle so that
//! another task can cancel (or supersede) an operation that is currently
//! holding the session.

use crate::acquisition::fetcher::PageFetcher;
use crate::acquisition::http_client::HttpClient;
use crate::audit::orchestrator::{AuditOrchestrator, AuditState, AuditSummary};
use crate::audit::progress::{AuditProgress, ProgressObserver};
use crate::cartography::cms_api::{CmsApiAdapter, ConnectionInfo};
use crate::cartography::manual::manual_entry;
use crate::cartography::normalize::site_domain;
use crate::cartography::sitemap::SitemapAdapter;
use crate::config::ScoutConfig;
use crate::error::{AuditError, DiscoveryError};
use crate::intelligence::cache::TtlCache;
use crate::map::snapshot::PersistedState;
use crate::map::types::{PageType, RawPage, SourceType};
use crate::map::working_set::{MergeOutcome, MergeReport, WorkingSet};
use crate::scoring::analyzer::{build_analyzer, ContentAnalyzer, HeuristicAnalyzer};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Operations with last-request-wins cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Discovery,
    Audit,
}

/// One cancellation token per operation kind.
#[derive(Debug, Clone, Default)]
pub struct OperationSlots {
    inner: Arc<Mutex<HashMap<OperationKind, CancellationToken>>>,
}

impl OperationSlots {
    /// Cancel the in-flight operation of `kind`, if any, and hand out a
    /// fresh token for the next one.
    pub fn begin(&self, kind: OperationKind) -> CancellationToken {
        let token = CancellationToken::new();
        let mut slots = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slots.insert(kind, token.clone()) {
            if !previous.is_cancelled() {
                info!(?kind, "superseding in-flight operation");
                previous.cancel();
            }
        }
        token
    }

    /// Cancel the current operation of `kind`. Returns whether one was live.
    pub fn cancel(&self, kind: OperationKind) -> bool {
        let slots = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match slots.get(&kind) {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn cancel_all(&self) {
        let slots = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for token in slots.values() {
            token.cancel();
        }
    }
}

/// Result of one discovery call.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub source: SourceType,
    pub target: String,
    /// Pages the adapter returned.
    pub discovered: usize,
    /// The previous working set belonged to another site and was dropped.
    pub replaced: bool,
    pub merge: MergeReport,
}

/// Working set, target, audit state and the components acting on them.
pub struct ScoutSession {
    config: ScoutConfig,
    fetcher: PageFetcher,
    analyzer: Arc<dyn ContentAnalyzer>,
    initial_scorer: HeuristicAnalyzer,
    working_set: WorkingSet,
    target: Option<String>,
    last_fetched: Option<DateTime<Utc>>,
    audit_state: AuditState,
    last_progress: AuditProgress,
    slots: OperationSlots,
}

impl ScoutSession {
    /// Build every component from one validated configuration.
    pub fn new(config: ScoutConfig) -> Result<Self> {
        config.validate()?;
        let client = HttpClient::new(&config.transport)?;
        let analyzer = build_analyzer(&config, client.clone())?;
        let fetcher = PageFetcher::new(client, Arc::new(TtlCache::new()), config.cache.ttl());
        Ok(Self::with_parts(config, fetcher, analyzer))
    }

    /// Assemble a session from prebuilt parts.
    pub fn with_parts(
        config: ScoutConfig,
        fetcher: PageFetcher,
        analyzer: Arc<dyn ContentAnalyzer>,
    ) -> Self {
        let initial_scorer = HeuristicAnalyzer::new(config.scoring.clone());
        Self {
            config,
            fetcher,
            analyzer,
            initial_scorer,
            working_set: WorkingSet::new(),
            target: None,
            last_fetched: None,
            audit_state: AuditState::Idle,
            last_progress: AuditProgress::default(),
            slots: OperationSlots::default(),
        }
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    pub fn working_set_mut(&mut self) -> &mut WorkingSet {
        &mut self.working_set
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.last_fetched
    }

    pub fn audit_state(&self) -> AuditState {
        self.audit_state
    }

    pub fn last_progress(&self) -> AuditProgress {
        self.last_progress
    }

    /// Shareable cancellation handle.
    pub fn slots(&self) -> OperationSlots {
        self.slots.clone()
    }

    /// Shorthand for `slots().begin(kind)`.
    pub fn begin(&self, kind: OperationKind) -> CancellationToken {
        self.slots.begin(kind)
    }

    /// Discover pages from a domain or sitemap URL.
    ///
    /// On failure the working set is left untouched.
    pub async fn discover_sitemap(
        &mut self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let adapter = SitemapAdapter::new(self.fetcher.clone(), &self.config.sitemap);
        let pages = adapter.discover(target, cancel).await?;
        Ok(self.absorb(target.trim(), SourceType::Sitemap, pages))
    }

    /// Discover posts through the configured CMS API.
    pub async fn discover_cms(
        &mut self,
        on_progress: &mut dyn FnMut(usize, usize),
        cancel: &CancellationToken,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let adapter = self.cms_adapter()?;
        let pages = adapter.discover(on_progress, cancel).await?;
        let target = adapter.credentials().api_base().to_string();
        Ok(self.absorb(&target, SourceType::CmsApi, pages))
    }

    /// Check the configured CMS credentials.
    pub async fn test_cms_connection(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ConnectionInfo, DiscoveryError> {
        self.cms_adapter()?.test_connection(cancel).await
    }

    fn cms_adapter(&self) -> Result<CmsApiAdapter, DiscoveryError> {
        let credentials = self.config.cms.credentials.clone().ok_or_else(|| {
            DiscoveryError::invalid("cms", "CMS credentials are not configured")
        })?;
        credentials
            .validate()
            .map_err(|e| DiscoveryError::invalid("cms", e.to_string()))?;
        Ok(CmsApiAdapter::new(
            self.fetcher.clone(),
            credentials,
            self.config.cms.page_size,
        ))
    }

    /// Add one URL by hand at `position` (front of the list by default).
    ///
    /// Invalid input fails without touching the set; a URL already present
    /// is reported as [`MergeOutcome::Duplicate`].
    pub fn add_manual(
        &mut self,
        input: &str,
        position: Option<usize>,
    ) -> Result<MergeOutcome, DiscoveryError> {
        let raw = manual_entry(input, position.unwrap_or(0))?;
        let outcome = self.working_set.insert_unique(raw);
        match &outcome {
            MergeOutcome::Added(id) => {
                self.score_new_record(*id, "");
                info!(url = %input.trim(), "added page manually");
            }
            MergeOutcome::Duplicate(_) => warn!(url = %input.trim(), "URL already in list"),
            _ => {}
        }
        Ok(outcome)
    }

    /// Re-fetch and rescore every page.
    ///
    /// Take `cancel` from [`Self::begin`] with [`OperationKind::Audit`] so
    /// that starting the next audit stops this one.
    pub async fn run_audit(
        &mut self,
        observer: &mut dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<AuditSummary, AuditError> {
        let mut orchestrator = AuditOrchestrator::new(
            self.fetcher.clone(),
            Arc::clone(&self.analyzer),
            &self.config.audit,
        );

        self.audit_state = AuditState::Running;
        self.last_progress = AuditProgress {
            current: 0,
            total: self.working_set.len(),
        };

        let mut last = self.last_progress;
        let mut tracking = |current: usize, total: usize| {
            last = AuditProgress { current, total };
            observer.on_progress(current, total);
        };
        let result = orchestrator
            .run(&mut self.working_set, &mut tracking, cancel)
            .await;

        self.last_progress = last;
        self.audit_state = orchestrator.state();
        result
    }

    /// Persisted form of the session.
    pub fn snapshot(&self) -> PersistedState {
        PersistedState::new(
            self.target.clone().unwrap_or_default(),
            &self.working_set,
            self.last_fetched,
        )
    }

    /// Replace the session contents with a stored state.
    pub fn restore(&mut self, state: PersistedState) {
        self.slots.cancel_all();
        self.working_set = state.working_set();
        self.target = Some(state.url).filter(|u| !u.is_empty());
        self.last_fetched = state.last_fetched;
        self.audit_state = AuditState::Idle;
        self.last_progress = AuditProgress::default();
    }

    /// Without a discovered target, manual records decide which site the
    /// set belongs to.
    fn is_same_site(&self, target: &str) -> bool {
        let Some(incoming) = site_domain(target) else {
            return false;
        };
        match &self.target {
            Some(current) => site_domain(current).as_deref() == Some(incoming.as_str()),
            None => self
                .working_set
                .iter()
                .all(|r| site_domain(&r.url).as_deref() == Some(incoming.as_str())),
        }
    }

    fn absorb(&mut self, target: &str, source: SourceType, pages: Vec<RawPage>) -> DiscoveryReport {
        let replaced = !self.working_set.is_empty() && !self.is_same_site(target);
        if replaced {
            info!(previous = ?self.target, site = %target, "new site, replacing working set");
            self.working_set.clear();
        }

        let discovered = pages.len();
        let mut merge = MergeReport::default();
        for raw in pages {
            let content = raw.content.clone().unwrap_or_default();
            let outcome = self.working_set.merge_page(raw);
            if let MergeOutcome::Added(id) = outcome {
                self.score_new_record(id, &content);
            }
            merge.record(&outcome);
        }

        self.target = Some(target.to_string());
        self.last_fetched = Some(Utc::now());
        info!(
            ?source,
            site = %target,
            discovered,
            added = merge.added.len(),
            updated = merge.updated.len(),
            total = self.working_set.len(),
            "discovery merged"
        );

        DiscoveryReport {
            source,
            target: target.to_string(),
            discovered,
            replaced,
            merge,
        }
    }

    /// Initial classification with the heuristic rules. The structural
    /// page type is kept unless the scorer recognises a content kind.
    fn score_new_record(&mut self, id: u64, content: &str) {
        let Some(record) = self.working_set.get_mut(id) else {
            return;
        };
        let score = self.initial_scorer.score(&record.title, content);
        record.priority = score.priority;
        record.monetization_status = score.monetization_status;
        if score.page_type != PageType::Post {
            record.page_type = score.page_type;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::http_client::RetryPolicy;
    use crate::map::types::{MonetizationStatus, Priority};
    use crate::map::working_set::FilterTab;
    use std::time::Duration;

    const SITEMAP: &str = r#"<?xml version="1.0"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://shop.invalid/best-air-fryers/</loc></url>
          <url><loc>https://shop.invalid/about</loc></url>
          <url><loc>https://shop.invalid/how-to-clean-an-air-fryer</loc></url>
        </urlset>"#;

    fn session() -> ScoutSession {
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_millis(300),
        };
        let fetcher = PageFetcher::new(
            HttpClient::with_client(reqwest::Client::new(), policy),
            Arc::new(TtlCache::new()),
            Duration::from_secs(60),
        );
        fetcher.prime("https://shop.invalid/sitemap.xml", "", SITEMAP);
        ScoutSession::with_parts(
            ScoutConfig::default(),
            fetcher,
            Arc::new(HeuristicAnalyzer::default()),
        )
    }

    #[tokio::test]
    async fn test_sitemap_discovery_scores_new_records() {
        let mut s = session();
        let report = s
            .discover_sitemap("shop.invalid", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.discovered, 3);
        assert_eq!(report.merge.added.len(), 3);
        assert_eq!(s.working_set().len(), 3);
        assert_eq!(s.target(), Some("shop.invalid"));
        assert!(s.last_fetched().is_some());

        let fryers = s.working_set().find_by_url("https://shop.invalid/best-air-fryers").unwrap();
        assert_eq!(fryers.source_type, SourceType::Sitemap);
        assert_eq!(fryers.page_type, PageType::Review);
        assert_eq!(fryers.priority, Priority::Critical);
        let about = s.working_set().find_by_url("https://shop.invalid/about").unwrap();
        assert_eq!(about.page_type, PageType::Post);
        assert_eq!(about.monetization_status, MonetizationStatus::None);
    }

    #[tokio::test]
    async fn test_rediscovery_of_same_site_is_idempotent() {
        let mut s = session();
        let cancel = CancellationToken::new();
        s.discover_sitemap("shop.invalid", &cancel).await.unwrap();
        let again = s.discover_sitemap("https://shop.invalid/sitemap.xml", &cancel).await.unwrap();
        assert!(!again.replaced);
        assert!(again.merge.added.is_empty());
        assert_eq!(s.working_set().len(), 3);
    }

    #[tokio::test]
    async fn test_other_site_replaces_working_set() {
        let mut s = session();
        let cancel = CancellationToken::new();
        s.discover_sitemap("shop.invalid", &cancel).await.unwrap();
        s.fetcher().prime(
            "https://blog.invalid/sitemap.xml",
            "",
            r#"<urlset><url><loc>https://blog.invalid/hello</loc></url></urlset>"#,
        );
        let report = s.discover_sitemap("blog.invalid", &cancel).await.unwrap();
        assert!(report.replaced);
        assert_eq!(s.working_set().len(), 1);
        assert_eq!(s.target(), Some("blog.invalid"));
    }

    #[tokio::test]
    async fn test_discovery_keeps_manual_pages_of_same_site() {
        let mut s = session();
        s.add_manual("https://shop.invalid/manual-page", None).unwrap();
        let report = s
            .discover_sitemap("shop.invalid", &CancellationToken::new())
            .await
            .unwrap();
        assert!(!report.replaced);
        assert_eq!(s.working_set().len(), 4);
        assert!(s.working_set().find_by_url("https://shop.invalid/manual-page").is_some());
    }

    #[tokio::test]
    async fn test_discovery_replaces_manual_pages_of_other_site() {
        let mut s = session();
        s.add_manual("https://blog.invalid/hello", None).unwrap();
        let report = s
            .discover_sitemap("shop.invalid", &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.replaced);
        assert_eq!(s.working_set().len(), 3);
        assert!(s.working_set().find_by_url("https://blog.invalid/hello").is_none());
    }

    #[test]
    fn test_manual_add_front_and_duplicates() {
        let mut s = session();
        let first = s.add_manual("https://shop.invalid/a", None).unwrap();
        let second = s.add_manual("https://shop.invalid/b", None).unwrap();
        assert!(matches!(first, MergeOutcome::Added(_)));
        assert!(matches!(second, MergeOutcome::Added(_)));
        assert_eq!(s.working_set().records()[0].url, "https://shop.invalid/b");

        let dup = s.add_manual("https://SHOP.invalid/a/", None).unwrap();
        assert!(matches!(dup, MergeOutcome::Duplicate(_)));
        assert_eq!(s.working_set().len(), 2);
    }

    #[test]
    fn test_manual_add_invalid_leaves_set_unchanged() {
        let mut s = session();
        s.add_manual("https://shop.invalid/a", None).unwrap();
        let before = s.working_set().clone();
        let err = s.add_manual("not-a-url", None).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidInput { .. }));
        assert_eq!(s.working_set().records(), before.records());
    }

    #[test]
    fn test_product_mention_page_lands_in_high_tab() {
        let mut s = session();
        s.add_manual("https://shop.invalid/sony-wh-1000xm5-price-drop", None).unwrap();
        s.add_manual("https://shop.invalid/team-retreat", None).unwrap();

        let high = s.working_set().filter(FilterTab::High, "");
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].url, "https://shop.invalid/sony-wh-1000xm5-price-drop");
        assert_eq!(high[0].monetization_status, MonetizationStatus::Opportunity);
        assert_eq!(s.working_set().stats().high, 1);
    }

    #[tokio::test]
    async fn test_superseded_audit_token_stops_audit() {
        let mut s = session();
        s.add_manual("https://shop.invalid/best-kettles", None).unwrap();
        s.fetcher().prime("https://shop.invalid/best-kettles", "", "<p>Ten kettles.</p>");
        let before = s.working_set().records()[0].clone();

        let stale = s.begin(OperationKind::Audit);
        let current = s.begin(OperationKind::Audit);
        let summary = s
            .run_audit(&mut |_: usize, _: usize| {}, &stale)
            .await
            .unwrap();
        assert_eq!(summary.state, AuditState::Cancelled);
        assert_eq!(summary.processed, 0);
        assert_eq!(s.working_set().records()[0], before);

        let summary = s
            .run_audit(&mut |_: usize, _: usize| {}, &current)
            .await
            .unwrap();
        assert_eq!(summary.state, AuditState::Completed);
        assert_eq!(summary.updated, 1);
    }

    #[tokio::test]
    async fn test_cms_without_credentials() {
        let s = session();
        let err = s.test_cms_connection(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidInput { .. }));
    }

    #[test]
    fn test_begin_supersedes_previous_token() {
        let s = session();
        let first = s.begin(OperationKind::Audit);
        let discovery = s.begin(OperationKind::Discovery);
        let second = s.begin(OperationKind::Audit);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!discovery.is_cancelled());

        assert!(s.slots().cancel(OperationKind::Audit));
        assert!(second.is_cancelled());
        assert!(!s.slots().cancel(OperationKind::Audit));
    }

    #[tokio::test]
    async fn test_snapshot_restore() {
        let mut s = session();
        s.discover_sitemap("shop.invalid", &CancellationToken::new())
            .await
            .unwrap();
        let snap = s.snapshot();
        assert_eq!(snap.url, "shop.invalid");
        assert_eq!(snap.posts.len(), 3);

        let mut other = session();
        other.restore(snap.clone());
        assert_eq!(other.target(), Some("shop.invalid"));
        assert_eq!(other.working_set().records(), s.working_set().records());
        assert_eq!(other.snapshot(), snap);
    }

    #[tokio::test]
    async fn test_audit_progress_tracked_on_session() {
        let mut s = session();
        s.add_manual("https://shop.invalid/sony-vs-bose", None).unwrap();
        s.fetcher().prime(
            "https://shop.invalid/sony-vs-bose",
            "",
            r#"<p>Both tested. <a href="https://amzn.to/abc">Check price</a></p>"#,
        );

        let mut events = Vec::new();
        let mut observer = |c: usize, t: usize| events.push((c, t));
        let summary = s
            .run_audit(&mut observer, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.state, AuditState::Completed);
        assert_eq!(events, vec![(1, 1)]);
        assert_eq!(s.audit_state(), AuditState::Completed);
        assert_eq!(s.last_progress(), AuditProgress { current: 1, total: 1 });

        let record = &s.working_set().records()[0];
        assert_eq!(record.monetization_status, MonetizationStatus::Monetized);
        assert_eq!(record.priority, Priority::Low);
        assert!(record.last_audited.is_some());
    }
}
