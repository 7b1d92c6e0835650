use crate::recognition::domain::match_engine::Classification;
use crate::shared::embedding::{Embedding, FaceLocation};
use crate::shared::frame::Frame;

/// One qualifying sighting, built by the capture loop and consumed by the
/// dispatcher.
#[derive(Clone, Debug)]
pub struct DetectionEvent {
    pub user_id: String,
    pub classification: Classification,
    pub embedding: Embedding,
    pub location: FaceLocation,
    pub frame: Frame,
}

impl DetectionEvent {
    /// Capture sequence number of the frame the face was found in.
    pub fn sequence(&self) -> usize {
        self.frame.index()
    }
}
