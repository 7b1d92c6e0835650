use std::time::Duration;

use reqwest::blocking::multipart;

use crate::alerting::domain::detection_event::DetectionEvent;
use crate::alerting::domain::event_sink::{DispatchError, EventSink};
use crate::recognition::domain::match_engine::Classification;

const EVENT_PATH: &str = "/api/fastapi/event";

/// Posts detections to the backend's event endpoint as multipart forms.
pub struct HttpEventSink {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpEventSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DispatchError::Client)?;
        Ok(Self {
            client,
            url: format!("{}{EVENT_PATH}", base_url.trim_end_matches('/')),
        })
    }
}

impl EventSink for HttpEventSink {
    fn deliver(&self, event: &DetectionEvent, jpeg: &[u8]) -> Result<(), DispatchError> {
        let request_error = |source: reqwest::Error| DispatchError::Request {
            target: self.url.clone(),
            source,
        };

        let mut form = multipart::Form::new();
        for (name, value) in event_fields(event) {
            form = form.text(name, value);
        }
        let image = multipart::Part::bytes(jpeg.to_vec())
            .file_name(format!("frame_{}.jpg", event.sequence()))
            .mime_str("image/jpeg")
            .map_err(request_error)?;
        form = form.part("image", image);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(request_error)?;
        if !response.status().is_success() {
            return Err(DispatchError::Status {
                target: self.url.clone(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Text fields of the event form. Unknown persons carry no name field; the
/// backend files them under its default category.
fn event_fields(event: &DetectionEvent) -> Vec<(&'static str, String)> {
    let mut fields = vec![("userId", event.user_id.clone())];
    match &event.classification {
        Classification::Family(name) => fields.push(("familyName", name.clone())),
        Classification::Category(name) => fields.push(("categoryName", name.clone())),
        Classification::Unknown => {}
    }
    fields.push(("faceEncoding", event.embedding.to_json()));
    fields
}
