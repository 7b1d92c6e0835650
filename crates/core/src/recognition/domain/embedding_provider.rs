use crate::shared::embedding::{DetectedFace, Embedding};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Opaque face-embedding capability.
///
/// `detect` returns every face found in a frame (possibly none);
/// `encode_reference` returns the embedding of the first face in a reference
/// image, or `None` when no face is found.
pub trait EmbeddingProvider: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, BoxError>;

    fn encode_reference(&self, image: &Frame) -> Result<Option<Embedding>, BoxError>;
}
