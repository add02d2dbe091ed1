//! Social platform publishing client
//!
//! `POST {social}/posts/{platform}` with either a multipart body carrying the
//! image bytes or a JSON body referencing media by URL.

use super::USER_AGENT;
use crate::config::ServiceConfig;
use crate::extract;
use mkb_common::db::Platform;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Shown to operators when the platform rejects the publishing credential
pub const CREDENTIAL_MISCONFIGURED_MESSAGE: &str =
    "The social platform rejected the publishing credential. Reconnect the platform account \
     or update the configured access token, then retry.";

/// Lowercased body fragments that indicate a credential problem
const CREDENTIAL_MARKERS: &[&str] = &[
    "oauthexception",
    "access token",
    "access_token",
    "invalid token",
    "token expired",
    "error validating",
];

/// Platform error codes for invalid or expired sessions
const CREDENTIAL_ERROR_CODES: &[i64] = &[190, 102];

/// Social client errors
#[derive(Debug, Error)]
pub enum SocialError {
    #[error("Platform rejected the post with status {status}")]
    Rejected { status: u16, body: String },

    #[error("{message}")]
    CredentialMisconfigured {
        status: u16,
        message: String,
        body: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Publish request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Media attached to a publish request
#[derive(Debug, Clone)]
pub enum PublishMedia {
    None,
    /// Image bytes sent as the multipart `image` part
    Upload {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
    /// Publicly reachable image URL sent as `image_url`
    Url(String),
}

/// Platform-specific publish request
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub platform: Platform,
    pub campaign_id: i64,
    pub post_id: i64,
    pub content: String,
    pub link: Option<String>,
    pub media: PublishMedia,
}

impl PublishRequest {
    /// Text fields shared by both body encodings
    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("campaign_id", self.campaign_id.to_string()),
            ("post_id", self.post_id.to_string()),
            (self.platform.content_field(), self.content.clone()),
        ];
        if let Some(link) = self.link.as_deref().filter(|l| !l.trim().is_empty()) {
            fields.push(("link", link.to_string()));
        }
        fields
    }

    /// JSON body; numeric ids stay numbers
    pub fn json_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("campaign_id".to_string(), Value::from(self.campaign_id));
        body.insert("post_id".to_string(), Value::from(self.post_id));
        body.insert(
            self.platform.content_field().to_string(),
            Value::from(self.content.clone()),
        );
        if let Some(link) = self.link.as_deref().filter(|l| !l.trim().is_empty()) {
            body.insert("link".to_string(), Value::from(link));
        }
        if let PublishMedia::Url(url) = &self.media {
            body.insert("image_url".to_string(), Value::from(url.clone()));
        }
        Value::Object(body)
    }
}

/// Social platform publishing client
#[derive(Debug, Clone)]
pub struct SocialClient {
    http_client: reqwest::Client,
    base_url: String,
    service_token: Option<String>,
    timeout: Duration,
}

impl SocialClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, SocialError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SocialError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.social_api_url.clone(),
            service_token: config.social_api_token.clone(),
            timeout: config.publish_timeout,
        })
    }

    /// Authorization header value for a publish call
    ///
    /// Service token first, then the caller's bearer credential unchanged.
    /// Non-bearer caller credentials are not forwarded.
    pub fn authorization(&self, caller_auth: Option<&str>) -> Option<String> {
        if let Some(token) = self.service_token.as_deref() {
            return Some(format!("Bearer {}", token));
        }

        caller_auth
            .map(str::trim)
            .filter(|value| value.starts_with("Bearer ") && value.len() > "Bearer ".len())
            .map(str::to_string)
    }

    /// Send a publish request and return the platform's JSON response
    pub async fn publish(
        &self,
        request: &PublishRequest,
        caller_auth: Option<&str>,
    ) -> Result<Value, SocialError> {
        let url = format!("{}/posts/{}", self.base_url, request.platform);

        let mut builder = self.http_client.post(&url).timeout(self.timeout);

        if let Some(auth) = self.authorization(caller_auth) {
            builder = builder.header(AUTHORIZATION, auth);
        }

        builder = match &request.media {
            PublishMedia::Upload {
                file_name,
                content_type,
                bytes,
            } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(content_type)
                    .map_err(|e| SocialError::Network(e.to_string()))?;

                let form = request
                    .fields()
                    .into_iter()
                    .fold(Form::new(), |form, (name, value)| form.text(name, value))
                    .part("image", part);

                builder.multipart(form)
            }
            PublishMedia::Url(_) | PublishMedia::None => builder.json(&request.json_body()),
        };

        debug!(
            post_id = request.post_id,
            platform = %request.platform,
            multipart = matches!(request.media, PublishMedia::Upload { .. }),
            "Publishing post to social platform"
        );

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SocialError::Timeout(self.timeout)
            } else {
                SocialError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SocialError::Network(e.to_string()))?;

        if !status.is_success() {
            if is_credential_error(&body) {
                warn!(
                    post_id = request.post_id,
                    status = status.as_u16(),
                    "Social platform rejected the publishing credential"
                );
                return Err(SocialError::CredentialMisconfigured {
                    status: status.as_u16(),
                    message: CREDENTIAL_MISCONFIGURED_MESSAGE.to_string(),
                    body,
                });
            }

            return Err(SocialError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| SocialError::Parse(e.to_string()))
    }
}

/// Whether an error body points at a misconfigured platform credential
pub fn is_credential_error(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    if CREDENTIAL_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return true;
    }

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };

    ["error.code", "code"]
        .iter()
        .filter_map(|path| extract::lookup(&value, path).and_then(Value::as_i64))
        .any(|code| CREDENTIAL_ERROR_CODES.contains(&code))
}
