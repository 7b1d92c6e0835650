use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::recognition::domain::roster_source::{CategoryRecord, FamilyRecord, RosterSource};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read reference image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode reference image {location}: {source}")]
    Decode {
        location: String,
        #[source]
        source: image::ImageError,
    },
}

/// Fetches rosters from the backend's `/api/family/list` and
/// `/api/category/list` endpoints.
///
/// Reference images may be HTTP(S) URLs or local paths (`file://` prefix
/// optional).
pub struct HttpRosterSource {
    client: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl HttpRosterSource {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, RosterError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RosterError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        user_id: &str,
    ) -> Result<Vec<T>, RosterError> {
        let url = format!("{}{path}", self.base_url);
        let request_error = |source: reqwest::Error| RosterError::Request {
            url: url.clone(),
            source,
        };
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("userId", user_id)])
            .send()
            .map_err(request_error)?;
        if !response.status().is_success() {
            return Err(RosterError::Status {
                url: url.clone(),
                status: response.status().as_u16(),
            });
        }
        response.json().map_err(request_error)
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, RosterError> {
        let request_error = |source: reqwest::Error| RosterError::Request {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().map_err(request_error)?;
        if !response.status().is_success() {
            return Err(RosterError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.bytes().map_err(request_error)?.to_vec())
    }
}

impl RosterSource for HttpRosterSource {
    fn family(&self, user_id: &str) -> Result<Vec<FamilyRecord>, BoxError> {
        Ok(self.list("/api/family/list", user_id)?)
    }

    fn categories(&self, user_id: &str) -> Result<Vec<CategoryRecord>, BoxError> {
        Ok(self.list("/api/category/list", user_id)?)
    }

    fn reference_image(&self, image_url: &str) -> Result<Frame, BoxError> {
        let bytes = match image_location(image_url) {
            ImageLocation::Remote(url) => self.fetch_bytes(url)?,
            ImageLocation::Local(path) => std::fs::read(path).map_err(|source| RosterError::Io {
                path: path.to_path_buf(),
                source,
            })?,
        };
        let frame = Frame::decode(&bytes, 0).map_err(|source| RosterError::Decode {
            location: image_url.to_string(),
            source,
        })?;
        Ok(frame)
    }
}

#[derive(Debug, PartialEq)]
enum ImageLocation<'a> {
    Remote(&'a str),
    Local(&'a Path),
}

fn image_location(image_url: &str) -> ImageLocation<'_> {
    if image_url.starts_with("http://") || image_url.starts_with("https://") {
        ImageLocation::Remote(image_url)
    } else {
        ImageLocation::Local(Path::new(
            image_url.strip_prefix("file://").unwrap_or(image_url),
        ))
    }
}
