//! Runtime configuration.
//!
//! Loaded once at startup (JSON file plus a few environment overrides), then
//! passed by value or reference into each component constructor. Nothing
//! below the binary reads process state.

use crate::acquisition::auth::CmsCredentials;
use crate::scoring::priority::ScoringRules;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub transport: TransportConfig,
    pub cache: CacheConfig,
    pub sitemap: SitemapConfig,
    pub cms: CmsConfig,
    pub audit: AuditConfig,
    pub scoring: ScoringRules,
    pub analyzer: AnalyzerConfig,
}

/// Retry/timeout policy for the HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Overall deadline for one logical call, retries included.
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            timeout_ms: 15_000,
            user_agent: format!("pagescout/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    /// Upper bound on child sitemaps fetched from one sitemap index tree.
    pub max_child_sitemaps: usize,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            max_child_sitemaps: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    pub credentials: Option<CmsCredentials>,
    pub page_size: usize,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum concurrent page fetches within one audit run.
    pub concurrency: usize,
    /// Minimum spacing between fetch starts.
    pub min_delay_ms: u64,
    /// Skip the TTL cache and always fetch fresh content.
    pub bypass_cache: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            min_delay_ms: 0,
            bypass_cache: false,
        }
    }
}

/// Which content analyzer implementation to build at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalyzerKind {
    #[default]
    Heuristic,
    Remote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub kind: AnalyzerKind,
    /// Endpoint for the remote analyzer.
    pub endpoint: Option<String>,
}

impl ScoutConfig {
    /// Default config location: `~/.pagescout/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".pagescout")
            .join("config.json")
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load from an explicit path, or the default path when it exists, or
    /// defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `PAGESCOUT_CMS_URL`, `PAGESCOUT_CMS_USER` and
    /// `PAGESCOUT_CMS_PASSWORD`. Credentials are only set when all three
    /// are present.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let url = lookup("PAGESCOUT_CMS_URL");
        let user = lookup("PAGESCOUT_CMS_USER");
        let password = lookup("PAGESCOUT_CMS_PASSWORD");
        if let (Some(url), Some(user), Some(password)) = (url, user, password) {
            self.cms.credentials = Some(CmsCredentials::new(url, user, password));
        }
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.transport.timeout_ms == 0 {
            bail!("transport.timeout_ms must be greater than zero");
        }
        if !(1..=20).contains(&self.audit.concurrency) {
            bail!(
                "audit.concurrency must be between 1 and 20 (got {})",
                self.audit.concurrency
            );
        }
        if !(1..=100).contains(&self.cms.page_size) {
            bail!(
                "cms.page_size must be between 1 and 100 (got {})",
                self.cms.page_size
            );
        }
        if self.analyzer.kind == AnalyzerKind::Remote && self.analyzer.endpoint.is_none() {
            bail!("analyzer.endpoint is required when analyzer.kind is \"remote\"");
        }
        if let Some(creds) = &self.cms.credentials {
            creds.validate()?;
        }
        Ok(())
    }
}
