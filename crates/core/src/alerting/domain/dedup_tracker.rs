use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::alerting::domain::detection_key::DetectionKey;

/// Per-key notification cooldown.
///
/// Callers check [`should_suppress`](Self::should_suppress) first and call
/// [`record_seen`](Self::record_seen) only for detections they go on to
/// dispatch, so suppressed sightings never extend their own cooldown.
pub struct DedupTracker {
    cooldown: Duration,
    last_seen: Mutex<HashMap<DetectionKey, Instant>>,
}

impl DedupTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn should_suppress(&self, key: &DetectionKey, now: Instant) -> bool {
        self.last_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .is_some_and(|seen| now.saturating_duration_since(*seen) < self.cooldown)
    }

    pub fn record_seen(&self, key: DetectionKey, now: Instant) {
        self.last_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, now);
    }

    /// Forgets every key.
    pub fn reset(&self) {
        self.last_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.last_seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn alice() -> DetectionKey {
        DetectionKey::Family("Alice".into())
    }

    #[test]
    fn test_unseen_key_is_not_suppressed() {
        let tracker = DedupTracker::new(Duration::from_secs(10));
        assert!(!tracker.should_suppress(&alice(), Instant::now()));
    }

    #[rstest]
    #[case::immediately(0, true)]
    #[case::inside_window(9, true)]
    #[case::at_boundary(10, false)]
    #[case::after_window(11, false)]
    fn test_cooldown_window(#[case] elapsed_secs: u64, #[case] suppressed: bool) {
        let tracker = DedupTracker::new(Duration::from_secs(10));
        let t0 = Instant::now();
        tracker.record_seen(alice(), t0);
        let later = t0 + Duration::from_secs(elapsed_secs);
        assert_eq!(tracker.should_suppress(&alice(), later), suppressed);
    }

    #[test]
    fn test_dispatch_suppress_dispatch_scenario() {
        let tracker = DedupTracker::new(Duration::from_secs(10));
        let t0 = Instant::now();
        let mut dispatched = Vec::new();

        for secs in [0, 5, 11] {
            let now = t0 + Duration::from_secs(secs);
            if !tracker.should_suppress(&alice(), now) {
                tracker.record_seen(alice(), now);
                dispatched.push(secs);
            }
        }

        assert_eq!(dispatched, vec![0, 11]);
    }

    #[test]
    fn test_suppressed_check_does_not_extend_cooldown() {
        let tracker = DedupTracker::new(Duration::from_secs(10));
        let t0 = Instant::now();
        tracker.record_seen(alice(), t0);

        assert!(tracker.should_suppress(&alice(), t0 + Duration::from_secs(8)));
        assert!(!tracker.should_suppress(&alice(), t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_keys_are_independent() {
        let tracker = DedupTracker::new(Duration::from_secs(10));
        let t0 = Instant::now();
        tracker.record_seen(alice(), t0);

        assert!(!tracker.should_suppress(&DetectionKey::Family("Bob".into()), t0));
        assert!(!tracker.should_suppress(&DetectionKey::Category("Alice".into()), t0));
    }

    #[test]
    fn test_reset_clears_all_keys() {
        let tracker = DedupTracker::new(Duration::from_secs(10));
        let t0 = Instant::now();
        tracker.record_seen(alice(), t0);
        tracker.record_seen(DetectionKey::Unknown("0.10".into()), t0);
        assert_eq!(tracker.len(), 2);

        tracker.reset();
        assert!(tracker.is_empty());
        assert!(!tracker.should_suppress(&alice(), t0));
    }
}
