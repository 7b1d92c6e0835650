use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::recognition::domain::embedding_provider::EmbeddingProvider;
use crate::recognition::domain::identity_cache::{
    CategoryEntry, CategoryGroupsBuilder, FamilyEntry, IdentityCache, LoadReport,
};
use crate::recognition::domain::roster_source::RosterSource;
use crate::shared::embedding::Embedding;

/// Per-user identity caches with time-based expiry.
///
/// Entries are `Arc<IdentityCache>` snapshots. Loads build a complete
/// snapshot outside the lock and swap it in, so readers holding an older
/// `Arc` keep a consistent view.
pub struct CacheTable {
    entries: RwLock<HashMap<String, Arc<IdentityCache>>>,
    roster: Arc<dyn RosterSource>,
    provider: Arc<dyn EmbeddingProvider>,
    ttl: Duration,
}

impl CacheTable {
    pub fn new(
        roster: Arc<dyn RosterSource>,
        provider: Arc<dyn EmbeddingProvider>,
        ttl: Duration,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            roster,
            provider,
            ttl,
        }
    }

    /// Returns the user's cache, reloading it when missing or older than the TTL.
    pub fn get(&self, user_id: &str) -> Arc<IdentityCache> {
        self.get_at(user_id, Instant::now())
    }

    pub fn get_at(&self, user_id: &str, now: Instant) -> Arc<IdentityCache> {
        if let Some(cache) = self.peek(user_id) {
            if !cache.is_expired(now, self.ttl) {
                return cache;
            }
            log::info!("Identity cache for user {user_id} expired, reloading");
        }
        self.load_at(user_id, now)
    }

    /// Returns the cached entry without triggering a load.
    pub fn peek(&self, user_id: &str) -> Option<Arc<IdentityCache>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned()
    }

    /// Rebuilds the user's cache from the roster and publishes it.
    pub fn load(&self, user_id: &str) -> Arc<IdentityCache> {
        self.load_at(user_id, Instant::now())
    }

    fn load_at(&self, user_id: &str, now: Instant) -> Arc<IdentityCache> {
        let cache = Arc::new(self.build(user_id, now));
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), cache.clone());
        cache
    }

    pub fn invalidate(&self, user_id: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user_id)
            .is_some()
    }

    pub fn invalidate_all(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn roster(&self) -> &Arc<dyn RosterSource> {
        &self.roster
    }

    fn build(&self, user_id: &str, now: Instant) -> IdentityCache {
        let mut report = LoadReport::default();

        let family = match self.roster.family(user_id) {
            Ok(records) => records
                .into_iter()
                .filter_map(|record| {
                    match self.encode(&record.image_url) {
                        Some(embedding) => {
                            report.family_loaded += 1;
                            Some(FamilyEntry {
                                name: record.name,
                                embedding,
                            })
                        }
                        None => {
                            log::warn!("Skipping family member {}: reference not encodable", record.name);
                            report.family_skipped += 1;
                            None
                        }
                    }
                })
                .collect(),
            Err(e) => {
                log::warn!("Error fetching family list for user {user_id}: {e}");
                report.family_listing_failed = true;
                Vec::new()
            }
        };

        let mut groups = CategoryGroupsBuilder::default();
        match self.roster.categories(user_id) {
            Ok(records) => {
                for record in records {
                    match self.encode(&record.image_url) {
                        Some(embedding) => {
                            report.category_loaded += 1;
                            groups.push(
                                &record.name,
                                CategoryEntry {
                                    embedding,
                                    description: record.description.unwrap_or_default(),
                                },
                            );
                        }
                        None => {
                            log::warn!("Skipping category {}: reference not encodable", record.name);
                            report.category_skipped += 1;
                        }
                    }
                }
            }
            Err(e) => {
                log::warn!("Error fetching categories for user {user_id}: {e}");
                report.category_listing_failed = true;
            }
        }
        let categories = groups.build();

        log::info!(
            "Loaded {} family members and {} categories for user {user_id}",
            family.len(),
            categories.len()
        );
        IdentityCache::new(family, categories, now, report)
    }

    /// Loads a reference image and extracts its embedding; failures are logged
    /// and reported as `None`.
    fn encode(&self, image_url: &str) -> Option<Embedding> {
        let image = match self.roster.reference_image(image_url) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Failed to load reference image {image_url}: {e}");
                return None;
            }
        };
        match self.provider.encode_reference(&image) {
            Ok(Some(embedding)) => Some(embedding),
            Ok(None) => {
                log::warn!("No face found in reference image {image_url}");
                None
            }
            Err(e) => {
                log::warn!("Failed to encode reference image {image_url}: {e}");
                None
            }
        }
    }
}
