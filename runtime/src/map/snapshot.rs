//! Persisted session state: `{url, posts, lastFetched}`.

use crate::map::types::PageRecord;
use crate::map::working_set::WorkingSet;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the storage layer keeps between sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Discovery target the posts came from.
    pub url: String,
    pub posts: Vec<PageRecord>,
    #[serde(default)]
    pub last_fetched: Option<DateTime<Utc>>,
}

impl PersistedState {
    pub fn new(url: impl Into<String>, set: &WorkingSet, last_fetched: Option<DateTime<Utc>>) -> Self {
        Self {
            url: url.into(),
            posts: set.records().to_vec(),
            last_fetched,
        }
    }

    /// Rebuild the working set; ids keep their stored values.
    pub fn working_set(&self) -> WorkingSet {
        WorkingSet::from_records(self.posts.iter().cloned())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize session state")
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to parse session state")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::types::{RawPage, SourceType};

    fn sample() -> PersistedState {
        let set = WorkingSet::new().merge(vec![
            RawPage::new("https://example.com/a", SourceType::Sitemap),
            RawPage::new("https://example.com/b", SourceType::Sitemap),
        ]);
        PersistedState::new("example.com", &set, Some(Utc::now()))
    }

    #[test]
    fn test_wire_shape() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["url"], "example.com");
        assert_eq!(json["posts"].as_array().unwrap().len(), 2);
        assert!(json["lastFetched"].is_string());
        assert_eq!(json["posts"][0]["sourceType"], "sitemap");
        assert_eq!(json["posts"][0]["monetizationStatus"], "opportunity");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("session.json");
        let state = sample();
        state.save(&path).unwrap();

        let loaded = PersistedState::load(&path).unwrap();
        assert_eq!(loaded, state);
        let set = loaded.working_set();
        assert_eq!(set.len(), 2);
        assert!(set.find_by_url("https://example.com/b").is_some());
    }

    #[test]
    fn test_missing_last_fetched() {
        let state = PersistedState::from_json(r#"{"url": "x.com", "posts": []}"#).unwrap();
        assert!(state.last_fetched.is_none());
    }
}
