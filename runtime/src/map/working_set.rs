//! The working set: ordered, deduplicated page records for one session.
//!
//! Canonical URL (case-insensitive) is the identity key; a working set never
//! holds two records with the same key. Insertion order is preserved for
//! display. Record ids come from a per-set counter, so they mean something
//! only within the set that issued them.

use crate::cartography::normalize::{canonicalize_url, dedup_key};
use crate::cartography::text::title_from_url;
use crate::map::types::{MonetizationStatus, PageRecord, Priority, RawPage};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

/// What happened to one incoming page during a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New record created.
    Added(u64),
    /// Existing record refreshed from an equally or more authoritative source.
    Updated(u64),
    /// Existing record kept as is; the incoming source ranks lower.
    Kept(u64),
    /// Refused because the URL is already present.
    Duplicate(u64),
    /// URL could not be canonicalized.
    Rejected(String),
}

/// Totals from a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: Vec<u64>,
    pub updated: Vec<u64>,
    pub kept: usize,
    pub rejected: usize,
}

impl MergeReport {
    pub(crate) fn record(&mut self, outcome: &MergeOutcome) {
        match outcome {
            MergeOutcome::Added(id) => self.added.push(*id),
            MergeOutcome::Updated(id) => self.updated.push(*id),
            MergeOutcome::Kept(_) | MergeOutcome::Duplicate(_) => self.kept += 1,
            MergeOutcome::Rejected(_) => self.rejected += 1,
        }
    }
}

/// Display filters over a working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterTab {
    #[default]
    All,
    Critical,
    High,
    Medium,
    Low,
    Monetized,
}

impl FromStr for FilterTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(FilterTab::All),
            "critical" => Ok(FilterTab::Critical),
            "high" => Ok(FilterTab::High),
            "medium" => Ok(FilterTab::Medium),
            "low" => Ok(FilterTab::Low),
            "monetized" => Ok(FilterTab::Monetized),
            other => Err(format!(
                "unknown tab {other:?} (expected all, critical, high, medium, low or monetized)"
            )),
        }
    }
}

/// Record counts per filter tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkingSetStats {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub monetized: usize,
}

#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    records: Vec<PageRecord>,
    /// dedup key -> position in `records`
    index: HashMap<String, usize>,
    /// record id -> position in `records`
    positions: HashMap<u64, usize>,
    next_id: u64,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a set from stored records, dropping any duplicate URLs.
    pub fn from_records(records: impl IntoIterator<Item = PageRecord>) -> Self {
        let mut set = Self::new();
        for record in records {
            let key = dedup_key(&record.url);
            if set.index.contains_key(&key) {
                warn!(url = %record.url, "dropping duplicate record while restoring");
                continue;
            }
            set.next_id = set.next_id.max(record.id + 1);
            set.index.insert(key, set.records.len());
            set.positions.insert(record.id, set.records.len());
            set.records.push(record);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<PageRecord> {
        self.records
    }

    pub fn get(&self, id: u64) -> Option<&PageRecord> {
        let &pos = self.positions.get(&id)?;
        self.records.get(pos)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut PageRecord> {
        let &pos = self.positions.get(&id)?;
        self.records.get_mut(pos)
    }

    /// Record with the given URL, after canonicalization.
    pub fn find_by_url(&self, url: &str) -> Option<&PageRecord> {
        let canonical = canonicalize_url(url).ok()?;
        self.index
            .get(&dedup_key(&canonical))
            .map(|&pos| &self.records[pos])
    }

    pub(crate) fn record_at_mut(&mut self, position: usize) -> Option<&mut PageRecord> {
        self.records.get_mut(position)
    }

    /// Remove a record by id.
    pub fn remove(&mut self, id: u64) -> Option<PageRecord> {
        let pos = self.positions.get(&id).copied()?;
        let removed = self.records.remove(pos);
        self.reindex();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
        self.positions.clear();
        self.next_id = 0;
    }

    /// Merge `incoming` into this set and return it.
    pub fn merge(mut self, incoming: impl IntoIterator<Item = RawPage>) -> Self {
        self.merge_in_place(incoming);
        self
    }

    /// Merge `incoming` into this set in place.
    pub fn merge_in_place(&mut self, incoming: impl IntoIterator<Item = RawPage>) -> MergeReport {
        let mut report = MergeReport::default();
        for raw in incoming {
            let outcome = self.merge_page(raw);
            report.record(&outcome);
        }
        debug!(
            added = report.added.len(),
            updated = report.updated.len(),
            kept = report.kept,
            rejected = report.rejected,
            total = self.records.len(),
            "merged pages into working set"
        );
        report
    }

    /// Merge one page.
    ///
    /// On a URL conflict the existing record takes the incoming title and
    /// `last_modified` only when the incoming source is at least as
    /// authoritative. Classification fields are never touched here, so a
    /// monetized record stays monetized.
    pub fn merge_page(&mut self, raw: RawPage) -> MergeOutcome {
        let canonical = match canonicalize_url(&raw.url) {
            Ok(c) => c,
            Err(e) => {
                warn!(url = %raw.url, error = %e, "rejecting page with unusable URL");
                return MergeOutcome::Rejected(raw.url);
            }
        };
        let key = dedup_key(&canonical);

        let Some(&pos) = self.index.get(&key) else {
            return MergeOutcome::Added(self.insert_new(canonical, key, raw));
        };

        let existing = &mut self.records[pos];
        if raw.source.authority() < existing.source_type.authority() {
            return MergeOutcome::Kept(existing.id);
        }

        if let Some(title) = raw.title.filter(|t| !t.trim().is_empty()) {
            existing.title = title;
        }
        if raw.last_modified.is_some() {
            existing.last_modified = raw.last_modified;
        }
        if raw.cms_id.is_some() {
            existing.cms_id = raw.cms_id;
        }
        existing.source_type = raw.source;
        MergeOutcome::Updated(existing.id)
    }

    /// Insert a page only if its URL is not present yet.
    pub fn insert_unique(&mut self, raw: RawPage) -> MergeOutcome {
        let canonical = match canonicalize_url(&raw.url) {
            Ok(c) => c,
            Err(_) => return MergeOutcome::Rejected(raw.url),
        };
        let key = dedup_key(&canonical);
        if let Some(&pos) = self.index.get(&key) {
            return MergeOutcome::Duplicate(self.records[pos].id);
        }
        MergeOutcome::Added(self.insert_new(canonical, key, raw))
    }

    fn insert_new(&mut self, canonical: String, key: String, raw: RawPage) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let title = raw
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_url(&canonical));
        let record = PageRecord {
            id,
            url: canonical,
            title,
            source_type: raw.source,
            page_type: raw.page_type,
            priority: Priority::default(),
            monetization_status: MonetizationStatus::default(),
            last_modified: raw.last_modified,
            last_audited: None,
            cms_id: raw.cms_id,
        };

        match raw.position {
            Some(p) if p < self.records.len() => {
                self.records.insert(p, record);
                self.reindex();
            }
            _ => {
                self.index.insert(key, self.records.len());
                self.positions.insert(id, self.records.len());
                self.records.push(record);
            }
        }
        id
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, r)| (dedup_key(&r.url), pos))
            .collect();
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.id, pos))
            .collect();
    }

    /// Records matching a tab and a case-insensitive title/URL search.
    ///
    /// Priority tabs only show opportunities; the monetized tab shows
    /// monetized pages of any priority.
    pub fn filter(&self, tab: FilterTab, query: &str) -> Vec<&PageRecord> {
        let query = query.trim().to_lowercase();
        self.records
            .iter()
            .filter(|r| match tab {
                FilterTab::All => true,
                FilterTab::Critical => r.is_opportunity_at(Priority::Critical),
                FilterTab::High => r.is_opportunity_at(Priority::High),
                FilterTab::Medium => r.is_opportunity_at(Priority::Medium),
                FilterTab::Low => r.is_opportunity_at(Priority::Low),
                FilterTab::Monetized => r.monetization_status == MonetizationStatus::Monetized,
            })
            .filter(|r| {
                query.is_empty()
                    || r.title.to_lowercase().contains(&query)
                    || r.url.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn stats(&self) -> WorkingSetStats {
        let mut stats = WorkingSetStats {
            total: self.records.len(),
            ..Default::default()
        };
        for r in &self.records {
            match r.monetization_status {
                MonetizationStatus::Monetized => stats.monetized += 1,
                MonetizationStatus::Opportunity => match r.priority {
                    Priority::Critical => stats.critical += 1,
                    Priority::High => stats.high += 1,
                    Priority::Medium => stats.medium += 1,
                    Priority::Low => stats.low += 1,
                },
                MonetizationStatus::None => {}
            }
        }
        stats
    }
}
