use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::recognition::domain::embedding_provider::EmbeddingProvider;
use crate::shared::constants::JPEG_QUALITY;
use crate::shared::embedding::{DetectedFace, Embedding};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to encode frame for embedding service: {0}")]
    Encode(#[source] image::ImageError),
    #[error("embedding service request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("embedding service {url} returned status {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<DetectedFace>,
}

#[derive(Debug, Deserialize)]
struct EncodeResponse {
    embedding: Option<Embedding>,
}

/// Client for an external face-embedding service.
///
/// Frames are posted as JPEG to `/detect` (all faces with locations) and
/// `/encode` (first face of a reference image).
pub struct HttpEmbeddingProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn post_jpeg<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        frame: &Frame,
    ) -> Result<T, ProviderError> {
        let jpeg = frame.to_jpeg(JPEG_QUALITY).map_err(ProviderError::Encode)?;
        let url = format!("{}{path}", self.base_url);
        let request_error = |source: reqwest::Error| ProviderError::Request {
            url: url.clone(),
            source,
        };
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg)
            .send()
            .map_err(request_error)?;
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                url: url.clone(),
                status: response.status().as_u16(),
            });
        }
        response.json().map_err(request_error)
    }
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, BoxError> {
        let response: DetectResponse = self.post_jpeg("/detect", frame)?;
        Ok(response.faces)
    }

    fn encode_reference(&self, image: &Frame) -> Result<Option<Embedding>, BoxError> {
        let response: EncodeResponse = self.post_jpeg("/encode", image)?;
        Ok(response.embedding.filter(|e| e.dim() > 0))
    }
}
