use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alerting::domain::dedup_tracker::DedupTracker;
use crate::alerting::domain::detection_event::DetectionEvent;
use crate::alerting::domain::detection_key::DetectionKey;
use crate::alerting::domain::event_dispatcher::EventDispatcher;
use crate::capture::domain::camera_manager::{Acquired, CameraManager, SkipReason};
use crate::recognition::domain::cache_table::CacheTable;
use crate::recognition::domain::match_engine::{classify, MatchTolerance};
use crate::shared::cancel_token::CancelToken;
use crate::shared::settings::DetectionSettings;

/// Timing and throttling knobs for one session's loop.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopOptions {
    pub detect_every: usize,
    pub frame_interval: Duration,
    pub invalid_frame_backoff: Duration,
    pub tolerance: MatchTolerance,
}

impl LoopOptions {
    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self {
            detect_every: settings.detect_every.max(1),
            frame_interval: Duration::from_millis(settings.frame_interval_ms),
            invalid_frame_backoff: Duration::from_millis(settings.invalid_frame_backoff_ms),
            tolerance: MatchTolerance {
                family: settings.family_tolerance,
                category: settings.category_tolerance,
            },
        }
    }
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self::from_settings(&DetectionSettings::default())
    }
}

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// No usable frame this iteration.
    Skipped(SkipReason),
    /// Frame accepted but not on a detection beat.
    Throttled,
    DetectionFailed,
    Detected {
        faces: usize,
        dispatched: usize,
        suppressed: usize,
    },
}

/// The capture, classify, deduplicate and dispatch loop of one session.
///
/// Frames are processed strictly in order. The camera is released when the
/// loop is dropped, whichever way it exits.
pub struct SurveillanceLoop {
    user_id: String,
    camera: CameraManager,
    caches: Arc<CacheTable>,
    dedup: Arc<DedupTracker>,
    dispatcher: Arc<EventDispatcher>,
    cancel: CancelToken,
    options: LoopOptions,
    valid_frames: usize,
}

impl SurveillanceLoop {
    pub fn new(
        user_id: &str,
        camera: CameraManager,
        caches: Arc<CacheTable>,
        dedup: Arc<DedupTracker>,
        dispatcher: Arc<EventDispatcher>,
        cancel: CancelToken,
        options: LoopOptions,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            camera,
            caches,
            dedup,
            dispatcher,
            cancel,
            options,
            valid_frames: 0,
        }
    }

    /// Runs until cancelled, then releases the camera.
    pub fn run(mut self) {
        log::info!("Surveillance loop started for user {}", self.user_id);
        while !self.cancel.is_cancelled() {
            let pause = match self.step(Instant::now()) {
                StepOutcome::Skipped(SkipReason::Cancelled) => break,
                StepOutcome::Skipped(_) => self.options.invalid_frame_backoff,
                _ => self.options.frame_interval,
            };
            if self.cancel.wait(pause) {
                break;
            }
        }
        self.camera.release();
        log::info!("Surveillance loop stopped for user {}", self.user_id);
    }

    /// One iteration without the trailing throttle sleep.
    pub fn step(&mut self, now: Instant) -> StepOutcome {
        let frame = match self.camera.next_frame() {
            Acquired::Frame(frame) => frame,
            Acquired::Skipped(reason) => return StepOutcome::Skipped(reason),
        };

        self.valid_frames += 1;
        if self.valid_frames % self.options.detect_every != 0 {
            return StepOutcome::Throttled;
        }

        let faces = match self.caches.provider().detect(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                return StepOutcome::DetectionFailed;
            }
        };
        let cache = self.caches.get(&self.user_id);

        let mut dispatched = 0;
        let mut suppressed = 0;
        for face in &faces {
            if self.cancel.is_cancelled() {
                break;
            }
            let classification = classify(&face.embedding, &cache, &self.options.tolerance);
            let key = DetectionKey::new(&classification, &face.embedding);
            if self.dedup.should_suppress(&key, now) {
                log::debug!("Suppressing repeat detection {key}");
                suppressed += 1;
                continue;
            }
            self.dedup.record_seen(key, now);
            self.dispatcher.dispatch(DetectionEvent {
                user_id: self.user_id.clone(),
                classification,
                embedding: face.embedding.clone(),
                location: face.location,
                frame: frame.clone(),
            });
            dispatched += 1;
        }

        StepOutcome::Detected {
            faces: faces.len(),
            dispatched,
            suppressed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::domain::event_sink::{DispatchError, EventSink};
    use crate::capture::domain::camera_manager::CameraOptions;
    use crate::capture::domain::capture_device::{CaptureDevice, DeviceOpener};
    use crate::recognition::domain::embedding_provider::EmbeddingProvider;
    use crate::recognition::domain::roster_source::{CategoryRecord, FamilyRecord, RosterSource};
    use crate::shared::embedding::{DetectedFace, Embedding, FaceLocation};
    use crate::shared::error::BoxError;
    use crate::shared::frame::Frame;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // --- Stubs ---

    /// Emits frames whose brightness follows `levels`, then repeats the last.
    struct LevelDevice {
        levels: Vec<u8>,
        pos: usize,
    }

    impl CaptureDevice for LevelDevice {
        fn read(&mut self) -> Result<Frame, BoxError> {
            let v = self.levels[self.pos.min(self.levels.len() - 1)];
            self.pos += 1;
            Ok(Frame::filled(8, 8, [v, v, v], self.pos))
        }
    }

    struct LevelOpener(Vec<u8>);

    impl DeviceOpener for LevelOpener {
        fn open(&self, _index: u32) -> Result<Box<dyn CaptureDevice>, BoxError> {
            Ok(Box::new(LevelDevice {
                levels: self.0.clone(),
                pos: 0,
            }))
        }
    }

    /// Alice's reference is red byte 10; every detected face is Alice.
    struct AliceRoster;

    impl RosterSource for AliceRoster {
        fn family(&self, _user_id: &str) -> Result<Vec<FamilyRecord>, BoxError> {
            Ok(vec![FamilyRecord {
                name: "Alice".into(),
                image_url: "alice".into(),
            }])
        }

        fn categories(&self, _user_id: &str) -> Result<Vec<CategoryRecord>, BoxError> {
            Ok(Vec::new())
        }

        fn reference_image(&self, _image_url: &str) -> Result<Frame, BoxError> {
            Ok(Frame::filled(2, 2, [10, 0, 0], 0))
        }
    }

    struct FixedFaces {
        faces: Vec<Embedding>,
        detect_calls: AtomicUsize,
    }

    impl EmbeddingProvider for FixedFaces {
        fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedFace>, BoxError> {
            self.detect_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .faces
                .iter()
                .map(|embedding| DetectedFace {
                    embedding: embedding.clone(),
                    location: FaceLocation {
                        top: 1,
                        right: 5,
                        bottom: 5,
                        left: 1,
                    },
                })
                .collect())
        }

        fn encode_reference(&self, _image: &Frame) -> Result<Option<Embedding>, BoxError> {
            Ok(Some(Embedding::new(vec![0.0, 0.0])))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        labels: Mutex<Vec<String>>,
    }

    impl EventSink for CountingSink {
        fn deliver(&self, event: &DetectionEvent, _jpeg: &[u8]) -> Result<(), DispatchError> {
            self.labels
                .lock()
                .unwrap()
                .push(event.classification.tier().to_string());
            Ok(())
        }
    }

    struct Harness {
        sink: Arc<CountingSink>,
        provider: Arc<FixedFaces>,
        dedup: Arc<DedupTracker>,
        surveillance: SurveillanceLoop,
    }

    fn harness(levels: Vec<u8>, faces: Vec<Embedding>, detect_every: usize) -> Harness {
        let provider = Arc::new(FixedFaces {
            faces,
            detect_calls: AtomicUsize::new(0),
        });
        let caches = Arc::new(CacheTable::new(
            Arc::new(AliceRoster),
            provider.clone(),
            Duration::from_secs(3600),
        ));
        let sink = Arc::new(CountingSink::default());
        let dedup = Arc::new(DedupTracker::new(Duration::from_secs(10)));
        let cancel = CancelToken::new();
        let camera = CameraManager::new(
            Arc::new(LevelOpener(levels)),
            CameraOptions {
                probe_order: vec![0],
                warmup_reads: 0,
                warmup_pause: Duration::ZERO,
                brightness_floor: 10.0,
                max_read_failures: 3,
                fallback_image: None,
                fallback_width: 8,
                fallback_height: 8,
            },
            cancel.clone(),
        );
        let surveillance = SurveillanceLoop::new(
            "u1",
            camera,
            caches,
            dedup.clone(),
            Arc::new(EventDispatcher::new(sink.clone(), None)),
            cancel,
            LoopOptions {
                detect_every,
                frame_interval: Duration::ZERO,
                invalid_frame_backoff: Duration::ZERO,
                tolerance: MatchTolerance::default(),
            },
        );
        Harness {
            sink,
            provider,
            dedup,
            surveillance,
        }
    }

    fn alice_face() -> Embedding {
        Embedding::new(vec![0.0, 0.0])
    }

    // --- Tests ---

    #[test]
    fn test_detects_on_every_nth_valid_frame() {
        let mut h = harness(vec![100], vec![alice_face()], 3);
        let now = Instant::now();

        let outcomes: Vec<_> = (0..6).map(|_| h.surveillance.step(now)).collect();

        assert_eq!(outcomes[0], StepOutcome::Throttled);
        assert_eq!(outcomes[1], StepOutcome::Throttled);
        assert!(matches!(outcomes[2], StepOutcome::Detected { faces: 1, .. }));
        assert_eq!(outcomes[3], StepOutcome::Throttled);
        assert_eq!(h.provider.detect_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dark_frame_skips_detection_and_dispatch() {
        // First read validates the camera, second is at brightness 5.
        let mut h = harness(vec![100, 5], vec![alice_face()], 1);

        let outcome = h.surveillance.step(Instant::now());

        assert_eq!(outcome, StepOutcome::Skipped(SkipReason::TooDark(5.0)));
        assert_eq!(h.provider.detect_calls.load(Ordering::SeqCst), 0);
        assert!(h.sink.labels.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dark_frames_do_not_count_toward_detection_beat() {
        let mut h = harness(vec![100, 5, 5, 100], vec![alice_face()], 2);
        let now = Instant::now();

        let outcomes: Vec<_> = (0..4).map(|_| h.surveillance.step(now)).collect();

        // Reads: dark, dark, bright (1st valid), bright (2nd valid).
        assert!(matches!(outcomes[0], StepOutcome::Skipped(_)));
        assert!(matches!(outcomes[1], StepOutcome::Skipped(_)));
        assert_eq!(outcomes[2], StepOutcome::Throttled);
        assert!(matches!(outcomes[3], StepOutcome::Detected { .. }));
    }

    #[test]
    fn test_cooldown_scenario_dispatch_suppress_dispatch() {
        let mut h = harness(vec![100], vec![alice_face()], 1);
        let t0 = Instant::now();

        let first = h.surveillance.step(t0);
        let second = h.surveillance.step(t0 + Duration::from_secs(5));
        let third = h.surveillance.step(t0 + Duration::from_secs(11));

        assert_eq!(first, StepOutcome::Detected { faces: 1, dispatched: 1, suppressed: 0 });
        assert_eq!(second, StepOutcome::Detected { faces: 1, dispatched: 0, suppressed: 1 });
        assert_eq!(third, StepOutcome::Detected { faces: 1, dispatched: 1, suppressed: 0 });
        assert_eq!(*h.sink.labels.lock().unwrap(), vec!["family", "family"]);
    }

    #[test]
    fn test_two_faces_same_key_dispatch_once_per_frame() {
        let mut h = harness(vec![100], vec![alice_face(), alice_face()], 1);

        let outcome = h.surveillance.step(Instant::now());

        assert_eq!(outcome, StepOutcome::Detected { faces: 2, dispatched: 1, suppressed: 1 });
    }

    #[test]
    fn test_unknown_and_family_are_keyed_separately() {
        let stranger = Embedding::new(vec![9.0, 9.0]);
        let mut h = harness(vec![100], vec![alice_face(), stranger], 1);

        h.surveillance.step(Instant::now());

        assert_eq!(*h.sink.labels.lock().unwrap(), vec!["family", "unknown"]);
        assert_eq!(h.dedup.len(), 2);
    }

    #[test]
    fn test_run_exits_on_cancel() {
        let h = harness(vec![100], vec![alice_face()], 1);
        let cancel = h.surveillance.cancel.clone();
        let runner = std::thread::spawn(move || h.surveillance.run());

        std::thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        runner.join().unwrap();
    }
}
