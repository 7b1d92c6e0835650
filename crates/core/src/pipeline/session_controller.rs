use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerting::domain::dedup_tracker::DedupTracker;
use crate::alerting::domain::event_dispatcher::EventDispatcher;
use crate::alerting::domain::event_sink::AlertChannel;
use crate::alerting::infrastructure::http_event_sink::HttpEventSink;
use crate::alerting::infrastructure::telegram_alert_channel::TelegramAlertChannel;
use crate::capture::domain::camera_manager::{CameraManager, CameraOptions};
use crate::capture::domain::capture_device::DeviceOpener;
use crate::capture::infrastructure::ffmpeg_capture_device::FfmpegDeviceOpener;
use crate::pipeline::infrastructure::threaded_session_executor::ThreadedSessionExecutor;
use crate::pipeline::infrastructure::tokio_session_executor::TokioSessionExecutor;
use crate::pipeline::session_executor::{SessionExecutor, SessionTask};
use crate::pipeline::surveillance_loop::{LoopOptions, SurveillanceLoop};
use crate::recognition::domain::cache_table::CacheTable;
use crate::recognition::infrastructure::http_embedding_provider::HttpEmbeddingProvider;
use crate::recognition::infrastructure::http_roster_source::HttpRosterSource;
use crate::shared::cancel_token::CancelToken;
use crate::shared::constants::ROSTER_TIMEOUT_SECS;
use crate::shared::error::BoxError;
use crate::shared::settings::{ExecutorKind, Settings, SettingsError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Surveillance already running for user {user_id}")]
    AlreadyRunning { user_id: String },
    #[error("userId required")]
    MissingUserId,
    #[error("failed to spawn surveillance session: {0}")]
    Spawn(#[source] BoxError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to set up {component}: {source}")]
    Setup {
        component: &'static str,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheResponse {
    pub ok: bool,
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeResponse {
    pub success: bool,
    pub faces_detected: usize,
    pub message: String,
}

/// Per-session settings shared by every session the controller starts.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub camera: CameraOptions,
    pub loop_options: LoopOptions,
    pub cooldown: Duration,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            camera: CameraOptions::from_settings(&settings.camera),
            loop_options: LoopOptions::from_settings(&settings.detection),
            cooldown: settings.cooldown(),
        }
    }
}

struct ActiveSession {
    user_id: String,
    cancel: CancelToken,
    dedup: Arc<DedupTracker>,
    task: Box<dyn SessionTask>,
}

/// Owns the single process-wide surveillance session.
///
/// Control calls serialise on one mutex; the capture loop never takes it,
/// so `stop` can hold it while joining the loop.
pub struct SessionController {
    caches: Arc<CacheTable>,
    opener: Arc<dyn DeviceOpener>,
    dispatcher: Arc<EventDispatcher>,
    executor: Box<dyn SessionExecutor>,
    config: SessionConfig,
    session: Mutex<Option<ActiveSession>>,
}

impl SessionController {
    pub fn new(
        caches: Arc<CacheTable>,
        opener: Arc<dyn DeviceOpener>,
        dispatcher: Arc<EventDispatcher>,
        executor: Box<dyn SessionExecutor>,
        config: SessionConfig,
    ) -> Self {
        Self {
            caches,
            opener,
            dispatcher,
            executor,
            config,
            session: Mutex::new(None),
        }
    }

    /// Wires the HTTP, ffmpeg and executor adapters described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, SessionError> {
        settings.validate()?;
        let timeout = settings.dispatch_timeout();

        let roster = HttpRosterSource::new(
            &settings.backend_url,
            &settings.backend_token,
            Duration::from_secs(ROSTER_TIMEOUT_SECS),
        )
        .map_err(|e| setup("roster source", e))?;
        let provider = HttpEmbeddingProvider::new(&settings.embedding_url, timeout)
            .map_err(|e| setup("embedding provider", e))?;
        let caches = Arc::new(CacheTable::new(
            Arc::new(roster),
            Arc::new(provider),
            settings.cache_ttl(),
        ));

        let sink = HttpEventSink::new(&settings.backend_url, timeout)
            .map_err(|e| setup("event sink", e))?;
        let alerts: Option<Arc<dyn AlertChannel>> = match &settings.telegram {
            Some(telegram) => Some(Arc::new(
                TelegramAlertChannel::new(telegram, timeout)
                    .map_err(|e| setup("telegram alerts", e))?,
            )),
            None => {
                log::info!("Telegram not configured, alerts disabled");
                None
            }
        };
        let dispatcher = Arc::new(EventDispatcher::new(Arc::new(sink), alerts));

        let executor: Box<dyn SessionExecutor> = match settings.executor {
            ExecutorKind::Thread => Box::new(ThreadedSessionExecutor::new()),
            ExecutorKind::Tokio => Box::new(
                TokioSessionExecutor::new().map_err(|e| setup("tokio executor", e))?,
            ),
        };
        let opener = Arc::new(FfmpegDeviceOpener::new(
            settings.camera.width,
            settings.camera.height,
            settings.camera.fps,
        ));

        Ok(Self::new(
            caches,
            opener,
            dispatcher,
            executor,
            SessionConfig::from_settings(settings),
        ))
    }

    pub fn caches(&self) -> &Arc<CacheTable> {
        &self.caches
    }

    pub fn start(&self, user_id: &str) -> StartResponse {
        match self.try_start(user_id) {
            Ok(()) => StartResponse {
                success: true,
                message: format!("Surveillance started for user {user_id}"),
            },
            Err(e) => {
                log::warn!("Start rejected: {e}");
                StartResponse {
                    success: false,
                    message: e.to_string(),
                }
            }
        }
    }

    /// Loads the user's identity cache and schedules the capture loop.
    /// Fails without side effects when a session is already active.
    pub fn try_start(&self, user_id: &str) -> Result<(), SessionError> {
        if user_id.is_empty() {
            return Err(SessionError::MissingUserId);
        }
        let mut session = self.lock();
        if let Some(active) = session.as_ref() {
            if !active.task.is_finished() {
                return Err(SessionError::AlreadyRunning {
                    user_id: active.user_id.clone(),
                });
            }
        }
        if let Some(stale) = session.take() {
            log::warn!("Previous session for user {} ended on its own", stale.user_id);
            if let Err(e) = stale.task.join() {
                log::error!("Previous session for user {} failed: {e}", stale.user_id);
            }
        }

        self.caches.load(user_id);

        let cancel = CancelToken::new();
        let dedup = Arc::new(DedupTracker::new(self.config.cooldown));
        let camera = CameraManager::new(
            self.opener.clone(),
            self.config.camera.clone(),
            cancel.clone(),
        );
        let surveillance = SurveillanceLoop::new(
            user_id,
            camera,
            self.caches.clone(),
            dedup.clone(),
            self.dispatcher.clone(),
            cancel.clone(),
            self.config.loop_options.clone(),
        );
        let task = self
            .executor
            .spawn(
                &format!("eyeon-session-{user_id}"),
                Box::new(move || surveillance.run()),
            )
            .map_err(SessionError::Spawn)?;

        *session = Some(ActiveSession {
            user_id: user_id.to_string(),
            cancel,
            dedup,
            task,
        });
        log::info!(
            "Surveillance started for user {user_id} on the {} executor",
            self.executor.name()
        );
        Ok(())
    }

    /// Cancels the running session and waits for it to release the camera.
    /// Safe to call when nothing is running.
    pub fn stop(&self) -> StopResponse {
        let mut session = self.lock();
        if let Some(active) = session.take() {
            active.cancel.cancel();
            if let Err(e) = active.task.join() {
                log::error!("Session for user {} ended abnormally: {e}", active.user_id);
            }
            log::info!("Surveillance stopped for user {}", active.user_id);
        }
        StopResponse {
            status: "stopped".to_string(),
        }
    }

    pub fn status(&self) -> StatusResponse {
        let session = self.lock();
        match session.as_ref() {
            Some(active) if !active.task.is_finished() => StatusResponse {
                running: true,
                user_id: Some(active.user_id.clone()),
            },
            _ => StatusResponse {
                running: false,
                user_id: None,
            },
        }
    }

    /// Drops and rebuilds the user's identity cache.
    pub fn reload(&self, user_id: &str) -> CacheResponse {
        if user_id.is_empty() {
            return cache_response(false, user_id, SessionError::MissingUserId.to_string());
        }
        self.caches.invalidate(user_id);
        let cache = self.caches.load(user_id);
        let report = cache.report();
        if report.family_listing_failed && report.category_listing_failed {
            return cache_response(false, user_id, "Roster unavailable".to_string());
        }
        cache_response(
            true,
            user_id,
            format!(
                "Loaded {} family members and {} categories",
                cache.family().len(),
                cache.categories().len()
            ),
        )
    }

    /// Drops the user's identity cache; also forgets the active session's
    /// cooldowns when that session belongs to the user.
    pub fn clear(&self, user_id: &str) -> CacheResponse {
        if user_id.is_empty() {
            return cache_response(false, user_id, SessionError::MissingUserId.to_string());
        }
        self.caches.invalidate(user_id);
        if let Some(active) = self.lock().as_ref() {
            if active.user_id == user_id {
                active.dedup.reset();
            }
        }
        log::info!("Cleared identity cache for user {user_id}");
        cache_response(true, user_id, "Cache cleared".to_string())
    }

    /// Checks that a reference image can be loaded and contains a face.
    pub fn encode_reference(&self, image_url: &str, user_id: &str) -> EncodeResponse {
        if image_url.is_empty() || user_id.is_empty() {
            return encode_response(false, 0, "image_url and userId required".to_string());
        }
        let image = match self.caches.roster().reference_image(image_url) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Failed to load reference image {image_url}: {e}");
                return encode_response(false, 0, e.to_string());
            }
        };
        match self.caches.provider().detect(&image) {
            Ok(faces) if faces.is_empty() => {
                encode_response(false, 0, "No face detected in image".to_string())
            }
            Ok(faces) => encode_response(true, faces.len(), "Face encoded".to_string()),
            Err(e) => {
                log::warn!("Failed to encode reference image {image_url}: {e}");
                encode_response(false, 0, e.to_string())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn setup(component: &'static str, source: impl Into<BoxError>) -> SessionError {
    SessionError::Setup {
        component,
        source: source.into(),
    }
}

fn cache_response(ok: bool, user_id: &str, message: String) -> CacheResponse {
    CacheResponse {
        ok,
        user_id: user_id.to_string(),
        message,
    }
}

fn encode_response(success: bool, faces_detected: usize, message: String) -> EncodeResponse {
    EncodeResponse {
        success,
        faces_detected,
        message,
    }
}
