use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::*;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Concurrency backend that runs a session's capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    #[default]
    Thread,
    Tokio,
}

impl std::str::FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thread" => Ok(Self::Thread),
            "tokio" => Ok(Self::Tokio),
            other => Err(format!("executor must be 'thread' or 'tokio', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub probe_order: Vec<u32>,
    pub warmup_reads: usize,
    pub warmup_pause_ms: u64,
    pub brightness_floor: f64,
    pub max_read_failures: usize,
    pub fallback_image: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            probe_order: DEFAULT_PROBE_ORDER.to_vec(),
            warmup_reads: DEFAULT_WARMUP_READS,
            warmup_pause_ms: DEFAULT_WARMUP_PAUSE_MS,
            brightness_floor: DEFAULT_BRIGHTNESS_FLOOR,
            max_read_failures: DEFAULT_MAX_READ_FAILURES,
            fallback_image: Some(PathBuf::from(DEFAULT_FALLBACK_IMAGE)),
            width: CAPTURE_WIDTH,
            height: CAPTURE_HEIGHT,
            fps: CAPTURE_FPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub cooldown_secs: u64,
    pub detect_every: usize,
    pub family_tolerance: f64,
    pub category_tolerance: f64,
    pub frame_interval_ms: u64,
    pub invalid_frame_backoff_ms: u64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            detect_every: DEFAULT_DETECT_EVERY,
            family_tolerance: DEFAULT_TOLERANCE - FAMILY_TOLERANCE_MARGIN,
            category_tolerance: DEFAULT_TOLERANCE,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            invalid_frame_backoff_ms: DEFAULT_INVALID_FRAME_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend_url: String,
    pub backend_token: String,
    pub embedding_url: String,
    pub telegram: Option<TelegramSettings>,
    pub camera: CameraSettings,
    pub detection: DetectionSettings,
    pub cache_ttl_secs: u64,
    pub dispatch_timeout_secs: u64,
    pub executor: ExecutorKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend_token: DEFAULT_BACKEND_TOKEN.to_string(),
            embedding_url: DEFAULT_EMBEDDING_URL.to_string(),
            telegram: None,
            camera: CameraSettings::default(),
            detection: DetectionSettings::default(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            dispatch_timeout_secs: DEFAULT_DISPATCH_TIMEOUT_SECS,
            executor: ExecutorKind::default(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("EyeOn").join("settings.json"))
    }

    /// Loads the per-user settings file if present, otherwise defaults, then
    /// applies environment overrides.
    pub fn load() -> Result<Self, SettingsError> {
        let base = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        Ok(base.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `BACKEND_URL`, `EMBEDDING_URL`, `TELEGRAM_BOT_TOKEN` and
    /// `TELEGRAM_CHAT_ID` from `lookup`. The Telegram channel is only enabled
    /// when both token and chat id are known.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("BACKEND_URL").filter(|v| !v.is_empty()) {
            self.backend_url = url;
        }
        if let Some(url) = lookup("EMBEDDING_URL").filter(|v| !v.is_empty()) {
            self.embedding_url = url;
        }
        let token = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty());
        let chat = lookup("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty());
        let current = self.telegram.take();
        self.telegram = match (token, chat, current) {
            (Some(bot_token), Some(chat_id), _) => Some(TelegramSettings { bot_token, chat_id }),
            (Some(bot_token), None, Some(t)) => Some(TelegramSettings {
                bot_token,
                chat_id: t.chat_id,
            }),
            (None, Some(chat_id), Some(t)) => Some(TelegramSettings {
                bot_token: t.bot_token,
                chat_id,
            }),
            (_, _, current) => current,
        };
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
            SettingsError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.camera.probe_order.is_empty() {
            return Err(invalid("camera.probe_order", "must list at least one device"));
        }
        if self.detection.detect_every == 0 {
            return Err(invalid("detection.detect_every", "must be >= 1"));
        }
        let d = &self.detection;
        if d.family_tolerance <= 0.0 || d.category_tolerance <= 0.0 {
            return Err(invalid("detection", "tolerances must be positive"));
        }
        if d.family_tolerance > d.category_tolerance {
            return Err(invalid(
                "detection.family_tolerance",
                format!(
                    "{} exceeds category tolerance {}",
                    d.family_tolerance, d.category_tolerance
                ),
            ));
        }
        if self.dispatch_timeout_secs == 0 {
            return Err(invalid("dispatch_timeout_secs", "must be > 0"));
        }
        if !(0.0..=255.0).contains(&self.camera.brightness_floor) {
            return Err(invalid("camera.brightness_floor", "must be within 0-255"));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.detection.cooldown_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}
