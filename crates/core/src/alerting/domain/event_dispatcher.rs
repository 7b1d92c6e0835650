use std::sync::Arc;

use crate::alerting::domain::detection_event::DetectionEvent;
use crate::alerting::domain::event_sink::{AlertChannel, DispatchError, EventSink};
use crate::recognition::domain::match_engine::Classification;
use crate::shared::constants::{JPEG_QUALITY, UNKNOWN_PERSON_LABEL};

const BOX_THICKNESS: u32 = 2;

/// What happened to one dispatched event. `alerted` is `None` when the tier
/// does not alert or no alert channel is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: bool,
    pub alerted: Option<bool>,
}

/// Best-effort delivery of detections to the backend and alert channel.
///
/// Failures are logged and reported, never retried or queued.
pub struct EventDispatcher {
    sink: Arc<dyn EventSink>,
    alerts: Option<Arc<dyn AlertChannel>>,
}

impl EventDispatcher {
    pub fn new(sink: Arc<dyn EventSink>, alerts: Option<Arc<dyn AlertChannel>>) -> Self {
        Self { sink, alerts }
    }

    pub fn dispatch(&self, mut event: DetectionEvent) -> DispatchReport {
        let label = event
            .classification
            .label()
            .unwrap_or(UNKNOWN_PERSON_LABEL)
            .to_string();
        event
            .frame
            .outline(&event.location, box_colour(&event.classification), BOX_THICKNESS);

        let jpeg = match event
            .frame
            .to_jpeg(JPEG_QUALITY)
            .map_err(DispatchError::Encode)
        {
            Ok(jpeg) => jpeg,
            Err(e) => {
                log::warn!("Dropping detection of {label}: {e}");
                return DispatchReport {
                    delivered: false,
                    alerted: None,
                };
            }
        };

        let delivered = match self.sink.deliver(&event, &jpeg) {
            Ok(()) => {
                log::info!(
                    "Detection #{} sent: {} ({label})",
                    event.sequence(),
                    event.classification.tier()
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to deliver detection of {label}: {e}");
                false
            }
        };

        let alerted = self.alert(&event.classification, &jpeg);
        DispatchReport { delivered, alerted }
    }

    fn alert(&self, classification: &Classification, jpeg: &[u8]) -> Option<bool> {
        let channel = self.alerts.as_ref()?;
        let result = match classification {
            Classification::Family(_) => return None,
            Classification::Category(name) => channel.alert_category(name),
            Classification::Unknown => channel.alert_unknown(jpeg),
        };
        match result {
            Ok(()) => Some(true),
            Err(e) => {
                log::warn!("Failed to send {} alert: {e}", classification.tier());
                Some(false)
            }
        }
    }
}

fn box_colour(classification: &Classification) -> [u8; 3] {
    match classification {
        Classification::Family(_) => [0, 200, 0],
        Classification::Category(_) => [0, 120, 255],
        Classification::Unknown => [230, 0, 0],
    }
}
