use crate::recognition::domain::identity_cache::IdentityCache;
use crate::shared::constants::{DEFAULT_TOLERANCE, FAMILY_TOLERANCE_MARGIN};
use crate::shared::embedding::Embedding;

/// Which tier a probe face matched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Family(String),
    Category(String),
    Unknown,
}

impl Classification {
    pub fn tier(&self) -> &'static str {
        match self {
            Classification::Family(_) => "family",
            Classification::Category(_) => "category",
            Classification::Unknown => "unknown",
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Classification::Family(name) | Classification::Category(name) => Some(name),
            Classification::Unknown => None,
        }
    }
}

/// Distance bounds per tier. A probe matches when its distance is strictly
/// below the bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchTolerance {
    pub family: f64,
    pub category: f64,
}

impl MatchTolerance {
    /// Family gets the stricter `tolerance - 0.05`.
    pub fn from_base(tolerance: f64) -> Self {
        Self {
            family: tolerance - FAMILY_TOLERANCE_MARGIN,
            category: tolerance,
        }
    }
}

impl Default for MatchTolerance {
    fn default() -> Self {
        Self::from_base(DEFAULT_TOLERANCE)
    }
}

/// Classifies a probe against a user's cache.
///
/// Family entries are scanned in roster order, then category groups in
/// listing order. The first entry under the bound wins even when a later
/// entry would be closer; callers relying on nearest-match semantics must
/// not use this.
pub fn classify(probe: &Embedding, cache: &IdentityCache, tolerance: &MatchTolerance) -> Classification {
    for member in cache.family() {
        if within(probe, &member.embedding, tolerance.family) {
            return Classification::Family(member.name.clone());
        }
    }

    for group in cache.categories() {
        if group
            .entries
            .iter()
            .any(|entry| within(probe, &entry.embedding, tolerance.category))
        {
            return Classification::Category(group.name.clone());
        }
    }

    Classification::Unknown
}

fn within(probe: &Embedding, reference: &Embedding, bound: f64) -> bool {
    match probe.distance(reference) {
        Some(d) => d < bound,
        None => {
            log::debug!(
                "Skipping reference with dimension {} (probe has {})",
                reference.dim(),
                probe.dim()
            );
            false
        }
    }
}
