use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::capture::domain::capture_device::{CaptureDevice, DeviceOpener};
use crate::capture::domain::fallback_frames::FallbackFrames;
use crate::shared::cancel_token::CancelToken;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::settings::CameraSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquisitionState {
    Probing,
    Warming { index: u32 },
    Validating { index: u32 },
    Ready { index: u32 },
    Fallback,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraOptions {
    pub probe_order: Vec<u32>,
    pub warmup_reads: usize,
    pub warmup_pause: Duration,
    pub brightness_floor: f64,
    pub max_read_failures: usize,
    pub fallback_image: Option<PathBuf>,
    pub fallback_width: u32,
    pub fallback_height: u32,
}

impl CameraOptions {
    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self {
            probe_order: settings.probe_order.clone(),
            warmup_reads: settings.warmup_reads,
            warmup_pause: Duration::from_millis(settings.warmup_pause_ms),
            brightness_floor: settings.brightness_floor,
            max_read_failures: settings.max_read_failures.max(1),
            fallback_image: settings.fallback_image.clone(),
            fallback_width: settings.width,
            fallback_height: settings.height,
        }
    }
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}

/// Owns at most one open capture device and releases it exactly once.
pub struct CameraHandle {
    device: Option<Box<dyn CaptureDevice>>,
    index: u32,
}

impl CameraHandle {
    fn new(index: u32, device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device: Some(device),
            index,
        }
    }

    fn closed() -> Self {
        Self {
            device: None,
            index: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn read(&mut self) -> Result<Frame, BoxError> {
        match self.device.as_mut() {
            Some(device) => device.read(),
            None => Err("camera is not open".into()),
        }
    }

    /// Drops the device. Later calls are no-ops.
    pub fn release(&mut self) {
        if let Some(device) = self.device.take() {
            drop(device);
            log::info!("Camera {} released", self.index);
        }
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Outcome of one [`CameraManager::next_frame`] call.
#[derive(Debug)]
pub enum Acquired {
    Frame(Frame),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    ReadFailed,
    TooDark(f64),
    Cancelled,
}

/// Finds a working camera and yields frames from it, degrading to
/// synthetic frames when none qualifies.
///
/// After `max_read_failures` consecutive read errors in `Ready` the device
/// is released and probing runs once more; a second run of failures enters
/// `Fallback` for the rest of the session.
pub struct CameraManager {
    opener: Arc<dyn DeviceOpener>,
    options: CameraOptions,
    cancel: CancelToken,
    state: AcquisitionState,
    handle: CameraHandle,
    fallback: Option<FallbackFrames>,
    read_failures: usize,
    reacquired: bool,
}

impl CameraManager {
    pub fn new(opener: Arc<dyn DeviceOpener>, options: CameraOptions, cancel: CancelToken) -> Self {
        Self {
            opener,
            options,
            cancel,
            state: AcquisitionState::Probing,
            handle: CameraHandle::closed(),
            fallback: None,
            read_failures: 0,
            reacquired: false,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn is_camera_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Probes the configured indices in order and settles in `Ready` or
    /// `Fallback`. Stays in `Probing` when cancelled mid-probe.
    pub fn acquire(&mut self) -> AcquisitionState {
        self.handle.release();
        self.read_failures = 0;

        for index in self.options.probe_order.clone() {
            if self.cancel.is_cancelled() {
                self.state = AcquisitionState::Probing;
                return self.state;
            }
            self.state = AcquisitionState::Probing;
            log::info!("Trying camera index {index}");
            let device = match self.opener.open(index) {
                Ok(device) => device,
                Err(e) => {
                    log::warn!("Failed to open camera {index}: {e}");
                    continue;
                }
            };
            let mut handle = CameraHandle::new(index, device);

            self.state = AcquisitionState::Warming { index };
            for _ in 0..self.options.warmup_reads {
                if let Err(e) = handle.read() {
                    log::debug!("Warm-up read on camera {index} failed: {e}");
                }
                if self.cancel.wait(self.options.warmup_pause) {
                    self.state = AcquisitionState::Probing;
                    return self.state;
                }
            }

            self.state = AcquisitionState::Validating { index };
            match handle.read() {
                Ok(frame) => {
                    let brightness = frame.mean_brightness();
                    if brightness > self.options.brightness_floor {
                        log::info!("Camera {index} ready (brightness {brightness:.1})");
                        self.handle = handle;
                        self.state = AcquisitionState::Ready { index };
                        return self.state;
                    }
                    log::warn!(
                        "Camera {index} returned a dark frame (brightness {brightness:.1}), trying next"
                    );
                }
                Err(e) => log::warn!("Camera {index} opened but returned no frame: {e}"),
            }
            handle.release();
        }

        self.enter_fallback();
        self.state
    }

    /// Reads one frame, acquiring a camera first when none is held.
    pub fn next_frame(&mut self) -> Acquired {
        if self.cancel.is_cancelled() {
            return Acquired::Skipped(SkipReason::Cancelled);
        }
        if matches!(
            self.state,
            AcquisitionState::Probing
                | AcquisitionState::Warming { .. }
                | AcquisitionState::Validating { .. }
        ) {
            self.acquire();
        }

        match self.state {
            AcquisitionState::Ready { index } => self.read_device(index),
            AcquisitionState::Fallback => match self.fallback.as_mut() {
                Some(frames) => Acquired::Frame(frames.next_frame()),
                None => Acquired::Skipped(SkipReason::ReadFailed),
            },
            _ => Acquired::Skipped(SkipReason::Cancelled),
        }
    }

    /// Releases the camera; the manager re-probes on the next read.
    pub fn release(&mut self) {
        self.handle.release();
        if self.state != AcquisitionState::Fallback {
            self.state = AcquisitionState::Probing;
        }
    }

    fn read_device(&mut self, index: u32) -> Acquired {
        match self.handle.read() {
            Ok(frame) => {
                self.read_failures = 0;
                let brightness = frame.mean_brightness();
                if brightness > self.options.brightness_floor {
                    Acquired::Frame(frame)
                } else {
                    log::debug!("Dropping dark frame from camera {index} (brightness {brightness:.1})");
                    Acquired::Skipped(SkipReason::TooDark(brightness))
                }
            }
            Err(e) => {
                self.read_failures += 1;
                log::warn!(
                    "Failed to read from camera {index} ({}/{}): {e}",
                    self.read_failures,
                    self.options.max_read_failures
                );
                if self.read_failures >= self.options.max_read_failures {
                    self.handle.release();
                    if self.reacquired {
                        self.enter_fallback();
                    } else {
                        self.reacquired = true;
                        log::info!("Re-probing cameras after repeated read failures");
                        self.acquire();
                    }
                }
                Acquired::Skipped(SkipReason::ReadFailed)
            }
        }
    }

    fn enter_fallback(&mut self) {
        log::warn!("No usable camera found, switching to fallback frames");
        self.handle.release();
        self.fallback = Some(FallbackFrames::load(
            self.options.fallback_image.as_deref(),
            self.options.fallback_width,
            self.options.fallback_height,
        ));
        self.state = AcquisitionState::Fallback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // --- Stubs ---

    /// Scripted device; counts drops so tests can assert single release.
    struct FakeDevice {
        script: VecDeque<Result<u8, ()>>,
        steady: Result<u8, ()>,
        released: Arc<AtomicUsize>,
    }

    impl CaptureDevice for FakeDevice {
        fn read(&mut self) -> Result<Frame, BoxError> {
            match self.script.pop_front().unwrap_or(self.steady) {
                Ok(v) => Ok(Frame::filled(4, 4, [v, v, v], 0)),
                Err(()) => Err("read failed".into()),
            }
        }
    }

    impl Drop for FakeDevice {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Clone)]
    struct DeviceSpec {
        script: Vec<Result<u8, ()>>,
        steady: Result<u8, ()>,
    }

    impl DeviceSpec {
        fn steady(value: u8) -> Self {
            Self {
                script: Vec::new(),
                steady: Ok(value),
            }
        }
    }

    /// Maps indices to device specs; unknown indices fail to open.
    struct FakeOpener {
        devices: Mutex<Vec<(u32, DeviceSpec)>>,
        opened: Mutex<Vec<u32>>,
        released: Arc<AtomicUsize>,
    }

    impl FakeOpener {
        fn new(devices: Vec<(u32, DeviceSpec)>) -> Arc<Self> {
            Arc::new(Self {
                devices: Mutex::new(devices),
                opened: Mutex::new(Vec::new()),
                released: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn opened(&self) -> Vec<u32> {
            self.opened.lock().unwrap().clone()
        }

        fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    impl DeviceOpener for FakeOpener {
        fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, BoxError> {
            let devices = self.devices.lock().unwrap();
            let spec = devices
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, s)| s.clone())
                .ok_or("no such device")?;
            self.opened.lock().unwrap().push(index);
            Ok(Box::new(FakeDevice {
                script: spec.script.into_iter().collect(),
                steady: spec.steady,
                released: self.released.clone(),
            }))
        }
    }

    fn options() -> CameraOptions {
        CameraOptions {
            probe_order: vec![0, 1, 2],
            warmup_reads: 2,
            warmup_pause: Duration::ZERO,
            brightness_floor: 10.0,
            max_read_failures: 2,
            fallback_image: None,
            fallback_width: 32,
            fallback_height: 24,
        }
    }

    fn manager(opener: Arc<FakeOpener>) -> CameraManager {
        CameraManager::new(opener, options(), CancelToken::new())
    }

    // --- Tests ---

    #[test]
    fn test_first_bright_device_becomes_ready() {
        let opener = FakeOpener::new(vec![(0, DeviceSpec::steady(120))]);
        let mut m = manager(opener.clone());

        assert_eq!(m.acquire(), AcquisitionState::Ready { index: 0 });
        assert!(m.is_camera_open());
        assert_eq!(opener.released(), 0);
    }

    #[test]
    fn test_open_failure_moves_to_next_index() {
        let opener = FakeOpener::new(vec![(2, DeviceSpec::steady(120))]);
        let mut m = manager(opener.clone());

        assert_eq!(m.acquire(), AcquisitionState::Ready { index: 2 });
        assert_eq!(opener.opened(), vec![2]);
    }

    #[test]
    fn test_dark_device_is_released_and_next_probed() {
        let opener = FakeOpener::new(vec![(0, DeviceSpec::steady(5)), (1, DeviceSpec::steady(80))]);
        let mut m = manager(opener.clone());

        assert_eq!(m.acquire(), AcquisitionState::Ready { index: 1 });
        assert_eq!(opener.released(), 1);
    }

    #[test]
    fn test_brightness_equal_to_floor_is_rejected() {
        let opener = FakeOpener::new(vec![(0, DeviceSpec::steady(10))]);
        let mut m = manager(opener.clone());

        assert_eq!(m.acquire(), AcquisitionState::Fallback);
        assert_eq!(opener.released(), 1);
    }

    #[test]
    fn test_warmup_reads_are_discarded() {
        // Two dark warm-up reads, then a bright validation frame.
        let spec = DeviceSpec {
            script: vec![Ok(0), Err(()), Ok(100)],
            steady: Ok(100),
        };
        let opener = FakeOpener::new(vec![(0, spec)]);
        let mut m = manager(opener);

        assert_eq!(m.acquire(), AcquisitionState::Ready { index: 0 });
    }

    #[test]
    fn test_no_device_enters_fallback_with_sequenced_frames() {
        let opener = FakeOpener::new(vec![]);
        let mut m = manager(opener);

        let first = match m.next_frame() {
            Acquired::Frame(f) => f,
            other => panic!("expected frame, got {other:?}"),
        };
        let second = match m.next_frame() {
            Acquired::Frame(f) => f,
            other => panic!("expected frame, got {other:?}"),
        };
        assert_eq!(m.state(), AcquisitionState::Fallback);
        assert_eq!((first.width(), first.height()), (32, 24));
        assert!(second.index() > first.index());
    }

    #[test]
    fn test_dark_frame_in_ready_is_skipped() {
        let spec = DeviceSpec {
            script: vec![Ok(100), Ok(100), Ok(100), Ok(5)],
            steady: Ok(100),
        };
        let opener = FakeOpener::new(vec![(0, spec)]);
        let mut m = manager(opener);
        m.acquire();

        match m.next_frame() {
            Acquired::Skipped(SkipReason::TooDark(b)) => approx::assert_relative_eq!(b, 5.0),
            other => panic!("expected dark skip, got {other:?}"),
        }
        assert!(matches!(m.next_frame(), Acquired::Frame(_)));
    }

    #[test]
    fn test_repeated_read_failures_reprobe_then_fallback() {
        // Device validates, then fails every read.
        let spec = DeviceSpec {
            script: vec![Ok(100), Ok(100), Ok(100)],
            steady: Err(()),
        };
        let opener = FakeOpener::new(vec![(0, spec)]);
        let mut m = manager(opener.clone());
        m.acquire();

        assert!(matches!(m.next_frame(), Acquired::Skipped(SkipReason::ReadFailed)));
        assert!(matches!(m.next_frame(), Acquired::Skipped(SkipReason::ReadFailed)));
        // Re-probe reopened index 0 with a fresh scripted device.
        assert_eq!(m.state(), AcquisitionState::Ready { index: 0 });
        assert_eq!(opener.opened(), vec![0, 0]);

        assert!(matches!(m.next_frame(), Acquired::Skipped(SkipReason::ReadFailed)));
        assert!(matches!(m.next_frame(), Acquired::Skipped(SkipReason::ReadFailed)));
        assert_eq!(m.state(), AcquisitionState::Fallback);
        assert_eq!(opener.released(), 2);
        assert!(!m.is_camera_open());
    }

    #[test]
    fn test_release_happens_exactly_once_on_drop() {
        let opener = FakeOpener::new(vec![(0, DeviceSpec::steady(120))]);
        let mut m = manager(opener.clone());
        m.acquire();
        m.release();
        m.release();
        drop(m);

        assert_eq!(opener.released(), 1);
    }

    #[test]
    fn test_drop_without_explicit_release_releases_once() {
        let opener = FakeOpener::new(vec![(0, DeviceSpec::steady(120))]);
        let mut m = manager(opener.clone());
        m.acquire();
        drop(m);

        assert_eq!(opener.released(), 1);
    }

    #[test]
    fn test_cancelled_manager_yields_nothing_and_holds_no_device() {
        let opener = FakeOpener::new(vec![(0, DeviceSpec::steady(120))]);
        let cancel = CancelToken::new();
        let mut m = CameraManager::new(opener.clone(), options(), cancel.clone());
        cancel.cancel();

        assert!(matches!(m.next_frame(), Acquired::Skipped(SkipReason::Cancelled)));
        assert_eq!(m.acquire(), AcquisitionState::Probing);
        assert!(opener.opened().is_empty());
    }

    #[test]
    fn test_cancel_during_warmup_releases_device() {
        let opener = FakeOpener::new(vec![(0, DeviceSpec::steady(120))]);
        let cancel = CancelToken::new();
        let mut opts = options();
        opts.warmup_pause = Duration::from_secs(30);
        let mut m = CameraManager::new(opener.clone(), opts, cancel.clone());

        let canceller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                cancel.cancel();
            })
        };
        assert_eq!(m.acquire(), AcquisitionState::Probing);
        canceller.join().unwrap();

        assert_eq!(opener.released(), 1);
        assert!(!m.is_camera_open());
    }
}
