use std::time::{Duration, Instant};

use crate::shared::embedding::Embedding;

#[derive(Clone, Debug, PartialEq)]
pub struct FamilyEntry {
    pub name: String,
    pub embedding: Embedding,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CategoryEntry {
    pub embedding: Embedding,
    pub description: String,
}

/// All reference embeddings registered under one category name.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryGroup {
    pub name: String,
    pub entries: Vec<CategoryEntry>,
}

/// Outcome counters for one roster load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub family_loaded: usize,
    pub family_skipped: usize,
    pub category_loaded: usize,
    pub category_skipped: usize,
    pub family_listing_failed: bool,
    pub category_listing_failed: bool,
}

impl LoadReport {
    /// Something was skipped or a listing failed, but a cache was still built.
    pub fn is_partial(&self) -> bool {
        self.family_skipped > 0
            || self.category_skipped > 0
            || self.family_listing_failed
            || self.category_listing_failed
    }
}

/// Immutable snapshot of one user's known identities.
///
/// Built once per load and shared behind an `Arc`; a reload publishes a new
/// snapshot instead of touching this one.
#[derive(Clone, Debug)]
pub struct IdentityCache {
    family: Vec<FamilyEntry>,
    categories: Vec<CategoryGroup>,
    loaded_at: Instant,
    report: LoadReport,
}

impl IdentityCache {
    pub fn new(
        family: Vec<FamilyEntry>,
        categories: Vec<CategoryGroup>,
        loaded_at: Instant,
        report: LoadReport,
    ) -> Self {
        Self {
            family,
            categories,
            loaded_at,
            report,
        }
    }

    pub fn empty(loaded_at: Instant) -> Self {
        Self::new(Vec::new(), Vec::new(), loaded_at, LoadReport::default())
    }

    pub fn family(&self) -> &[FamilyEntry] {
        &self.family
    }

    pub fn categories(&self) -> &[CategoryGroup] {
        &self.categories
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn category_entry_count(&self) -> usize {
        self.categories.iter().map(|g| g.entries.len()).sum()
    }

    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.loaded_at) > ttl
    }
}

/// Accumulates category entries keyed by name, preserving the order in
/// which names first appear.
#[derive(Default)]
pub struct CategoryGroupsBuilder {
    groups: Vec<CategoryGroup>,
}

impl CategoryGroupsBuilder {
    pub fn push(&mut self, name: &str, entry: CategoryEntry) {
        match self.groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.entries.push(entry),
            None => self.groups.push(CategoryGroup {
                name: name.to_string(),
                entries: vec![entry],
            }),
        }
    }

    pub fn build(self) -> Vec<CategoryGroup> {
        self.groups
    }
}
