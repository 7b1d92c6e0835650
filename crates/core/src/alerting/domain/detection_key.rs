use std::fmt;

use crate::recognition::domain::match_engine::Classification;
use crate::shared::constants::UNKNOWN_FINGERPRINT_PREFIX;
use crate::shared::embedding::Embedding;

/// Identity used to deduplicate notifications.
///
/// Unknown faces are keyed by a rounded prefix of their embedding. Two
/// sightings of the same stranger can produce different fingerprints, so
/// unknown-person suppression is best-effort.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DetectionKey {
    Family(String),
    Category(String),
    Unknown(String),
}

impl DetectionKey {
    pub fn new(classification: &Classification, embedding: &Embedding) -> Self {
        match classification {
            Classification::Family(name) => DetectionKey::Family(name.clone()),
            Classification::Category(name) => DetectionKey::Category(name.clone()),
            Classification::Unknown => DetectionKey::Unknown(fingerprint(embedding)),
        }
    }
}

impl fmt::Display for DetectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionKey::Family(name) => write!(f, "family:{name}"),
            DetectionKey::Category(name) => write!(f, "category:{name}"),
            DetectionKey::Unknown(print) => write!(f, "unknown:{print}"),
        }
    }
}

pub fn fingerprint(embedding: &Embedding) -> String {
    embedding
        .values()
        .iter()
        .take(UNKNOWN_FINGERPRINT_PREFIX)
        .map(|v| format!("{v:.2}"))
        .collect::<Vec<_>>()
        .join(",")
}
