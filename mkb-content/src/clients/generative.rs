//! Generative microservice client
//!
//! Covers the three generation endpoints plus the secondary image storage:
//!
//! - `POST {api}/generation/{platform}` text generation
//! - `POST {api}/generation/image` image generation
//! - `GET  {api}/generation/image/{id}` generated image download
//! - `GET  {storage}/images/{id}.{ext}` stored image fallback
//!
//! Every request carries its own timeout; the shared `reqwest::Client` has none.

use super::USER_AGENT;
use crate::config::ServiceConfig;
use mkb_common::db::{ContentKind, Platform};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Generative client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Response is not an image: {0}")]
    NotImage(String),
}

impl ClientError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(timeout)
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Raw media bytes fetched from an upstream
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Generative microservice client
#[derive(Debug, Clone)]
pub struct GenerativeClient {
    http_client: reqwest::Client,
    api_base: String,
    storage_base: String,
    text_timeout: Duration,
    image_timeout: Duration,
    media_timeout: Duration,
}

impl GenerativeClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: config.generative_api_url.clone(),
            storage_base: config.generative_storage_url.clone(),
            text_timeout: config.text_timeout,
            image_timeout: config.image_timeout,
            media_timeout: config.media_timeout,
        })
    }

    /// Download URL for a generated image id
    pub fn image_url(&self, id: &str) -> String {
        format!("{}/generation/image/{}", self.api_base, id)
    }

    /// Request caption text for a platform
    ///
    /// Returns the raw JSON body; callers pick the text out with tagged
    /// extraction since the shape varies by provider.
    pub async fn generate_text(
        &self,
        platform: Platform,
        prompt: &str,
        content_kind: ContentKind,
        link_url: Option<&str>,
    ) -> Result<Value, ClientError> {
        let url = format!("{}/generation/{}", self.api_base, platform);
        let body = json!({
            "prompt": prompt,
            "content_type": content_kind.as_str(),
            "link_url": link_url,
        });

        debug!(platform = %platform, "Requesting text generation");
        self.post_json(&url, &body, self.text_timeout).await
    }

    /// Request a single generated image
    pub async fn generate_image(&self, prompt: &str) -> Result<Value, ClientError> {
        let url = format!("{}/generation/image", self.api_base);
        let body = json!({
            "prompt": prompt,
            "sampleCount": 1,
        });

        debug!("Requesting image generation");
        self.post_json(&url, &body, self.image_timeout).await
    }

    /// Download a generated image by id from the primary endpoint
    pub async fn download_image(&self, id: &str) -> Result<FetchedMedia, ClientError> {
        self.fetch_url(&self.image_url(id)).await
    }

    /// Probe the secondary storage for `{id}.{ext}`
    pub async fn fetch_stored_image(&self, id: &str, ext: &str) -> Result<FetchedMedia, ClientError> {
        let url = format!("{}/images/{}.{}", self.storage_base, id, ext);
        self.fetch_url(&url).await
    }

    /// Fetch image bytes from an arbitrary URL
    ///
    /// Succeeds only on a 2xx response with a non-empty body whose content
    /// type is not JSON or text (error pages are not images).
    pub async fn fetch_url(&self, url: &str) -> Result<FetchedMedia, ClientError> {
        let response = self
            .http_client
            .get(url)
            .timeout(self.media_timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.media_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api(status.as_u16(), url.to_string()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(ct) = content_type.as_deref() {
            let ct = ct.to_ascii_lowercase();
            if ct.contains("json") || ct.starts_with("text/") {
                return Err(ClientError::NotImage(format!("{} returned {}", url, ct)));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.media_timeout))?;

        if bytes.is_empty() {
            return Err(ClientError::NotImage(format!("{} returned an empty body", url)));
        }

        debug!(url = %url, bytes = bytes.len(), "Fetched media");

        Ok(FetchedMedia {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        let response = self
            .http_client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(status.as_u16(), error_text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}
