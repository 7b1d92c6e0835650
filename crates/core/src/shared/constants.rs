pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_EMBEDDING_URL: &str = "http://127.0.0.1:8001";
pub const DEFAULT_BACKEND_TOKEN: &str = "system-token";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

pub const DEFAULT_PROBE_ORDER: &[u32] = &[0, 1, 2];
pub const DEFAULT_WARMUP_READS: usize = 5;
pub const DEFAULT_WARMUP_PAUSE_MS: u64 = 100;
pub const DEFAULT_BRIGHTNESS_FLOOR: f64 = 10.0;
pub const DEFAULT_MAX_READ_FAILURES: usize = 3;
pub const DEFAULT_FALLBACK_IMAGE: &str = "test_face.jpg";
pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;
pub const CAPTURE_FPS: u32 = 30;

/// Base matching tolerance; family uses a stricter bound below it.
pub const DEFAULT_TOLERANCE: f64 = 0.6;
pub const FAMILY_TOLERANCE_MARGIN: f64 = 0.05;

pub const DEFAULT_COOLDOWN_SECS: u64 = 10;
pub const DEFAULT_DETECT_EVERY: usize = 3;
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 100;
pub const DEFAULT_INVALID_FRAME_BACKOFF_MS: u64 = 500;

/// One hour.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const ROSTER_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 20;

pub const UNKNOWN_PERSON_LABEL: &str = "Unknown Person";
/// Number of leading embedding components used for the unknown-person dedup key.
pub const UNKNOWN_FINGERPRINT_PREFIX: usize = 5;
pub const JPEG_QUALITY: u8 = 90;
