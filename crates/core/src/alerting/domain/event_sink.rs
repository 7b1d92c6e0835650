use thiserror::Error;

use crate::alerting::domain::detection_event::DetectionEvent;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to encode detection image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("delivery to {target} failed: {source}")]
    Request {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{target} returned status {status}")]
    Status { target: String, status: u16 },
}

/// Receives every dispatched detection (all tiers).
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &DetectionEvent, jpeg: &[u8]) -> Result<(), DispatchError>;
}

/// Human-facing notifications for unknown persons and category arrivals.
pub trait AlertChannel: Send + Sync {
    fn alert_unknown(&self, jpeg: &[u8]) -> Result<(), DispatchError>;

    fn alert_category(&self, category: &str) -> Result<(), DispatchError>;

    fn send_text(&self, text: &str) -> Result<(), DispatchError>;
}
