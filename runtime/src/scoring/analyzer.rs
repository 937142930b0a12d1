//! Content analyzer capability and startup selection.

use crate::acquisition::http_client::HttpClient;
use crate::config::{AnalyzerKind, ScoutConfig};
use crate::error::AuditError;
use crate::map::types::ScoreResult;
use crate::scoring::priority::{score, ScoringRules};
use crate::scoring::remote::RemoteAnalyzer;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Classifies a page from its title and content.
///
/// Implementations must return the same output contract as the heuristic
/// scorer; the audit orchestrator does not care which one it is given.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, title: &str, content: &str) -> Result<ScoreResult>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Keyword/structure scorer. Never fails.
#[derive(Debug, Clone, Default)]
pub struct HeuristicAnalyzer {
    rules: ScoringRules,
}

impl HeuristicAnalyzer {
    pub fn new(rules: ScoringRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Synchronous scoring, used for the initial classification on add.
    pub fn score(&self, title: &str, content: &str) -> ScoreResult {
        score(title, content, &self.rules)
    }
}

#[async_trait]
impl ContentAnalyzer for HeuristicAnalyzer {
    async fn analyze(&self, title: &str, content: &str) -> Result<ScoreResult> {
        Ok(self.score(title, content))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Build the analyzer named by the configuration.
pub fn build_analyzer(
    config: &ScoutConfig,
    client: HttpClient,
) -> Result<Arc<dyn ContentAnalyzer>, AuditError> {
    match config.analyzer.kind {
        AnalyzerKind::Heuristic => Ok(Arc::new(HeuristicAnalyzer::new(config.scoring.clone()))),
        AnalyzerKind::Remote => {
            let endpoint = config.analyzer.endpoint.as_deref().ok_or_else(|| {
                AuditError::ConfigMissing("analyzer.endpoint for the remote analyzer".into())
            })?;
            let remote = RemoteAnalyzer::new(client, endpoint)
                .map_err(|e| AuditError::AnalyzerUnavailable(e.to_string()))?;
            Ok(Arc::new(remote))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::http_client::RetryPolicy;
    use crate::map::types::PageType;

    fn client() -> HttpClient {
        HttpClient::with_client(reqwest::Client::new(), RetryPolicy::default())
    }

    #[tokio::test]
    async fn test_heuristic_analyzer_matches_scorer() {
        let (title, content) = ("Dyson V15 Review", "<p>Suction tested on carpet.</p>");
        let analyzer = HeuristicAnalyzer::default();
        let result = analyzer.analyze(title, content).await.unwrap();
        assert_eq!(result.page_type, PageType::Review);
        assert_eq!(result, score(title, content, &ScoringRules::default()));
    }

    #[test]
    fn test_build_default_is_heuristic() {
        let analyzer = build_analyzer(&ScoutConfig::default(), client()).unwrap();
        assert_eq!(analyzer.name(), "heuristic");
    }

    #[test]
    fn test_build_remote_requires_endpoint() {
        let mut config = ScoutConfig::default();
        config.analyzer.kind = AnalyzerKind::Remote;
        let err = build_analyzer(&config, client()).err().unwrap();
        assert!(matches!(err, AuditError::ConfigMissing(_)));

        config.analyzer.endpoint = Some("https://analyzer.internal/score".into());
        assert_eq!(build_analyzer(&config, client()).unwrap().name(), "remote");
    }
}
