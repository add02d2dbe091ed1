//! Draft generation
//!
//! Fans out to the text and image generation endpoints concurrently and
//! merges whatever comes back into one [`DraftBundle`]. Upstream failures
//! degrade the draft; only request validation fails the call.

use super::captions;
use crate::clients::GenerativeClient;
use crate::extract::{first_string, GENERATED_TEXT_PATHS, IMAGE_URL_PATHS, SAVED_IMAGE_ID_PATHS};
use crate::media::{MediaResolver, Resolution};
use mkb_common::db::{ContentKind, Platform};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Suggested content when text generation produced nothing
pub const PLACEHOLDER_TEXT: &str = "Unable to generate text.";

const MIN_PROMPT_CHARS: usize = 5;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),
}

/// Incoming draft request, as posted by the client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftRequest {
    pub prompt: Option<String>,
    pub platform: Option<String>,
    pub content_type: Option<String>,
    pub link_url: Option<String>,
}

/// Draft request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub prompt: String,
    pub platform: Platform,
    pub content_kind: ContentKind,
    pub link_url: Option<String>,
}

impl DraftRequest {
    pub fn new(prompt: &str, platform: &str, content_type: &str) -> Self {
        Self {
            prompt: Some(prompt.to_string()),
            platform: Some(platform.to_string()),
            content_type: Some(content_type.to_string()),
            link_url: None,
        }
    }

    pub fn with_link(mut self, link_url: &str) -> Self {
        self.link_url = Some(link_url.to_string());
        self
    }

    /// Check shape and platform policy before any upstream call
    pub fn validate(&self) -> Result<ValidDraft, GenerationError> {
        let prompt = self
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| p.chars().count() >= MIN_PROMPT_CHARS)
            .ok_or_else(|| {
                GenerationError::Validation(format!(
                    "prompt is required and must be at least {} characters",
                    MIN_PROMPT_CHARS
                ))
            })?;

        let platform: Platform = self
            .platform
            .as_deref()
            .ok_or_else(|| GenerationError::Validation("platform is required".to_string()))?
            .parse()
            .map_err(|_| {
                GenerationError::Validation(
                    "platform must be one of: facebook, instagram".to_string(),
                )
            })?;

        let content_kind: ContentKind = self
            .content_type
            .as_deref()
            .ok_or_else(|| GenerationError::Validation("content_type is required".to_string()))?
            .parse()
            .map_err(|_| {
                GenerationError::Validation(
                    "content_type must be one of: text, image, video".to_string(),
                )
            })?;

        let link_url = match self.link_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(link) => {
                if !is_http_url(link) {
                    return Err(GenerationError::Validation(
                        "link_url must be a valid http(s) URL".to_string(),
                    ));
                }
                Some(link.to_string())
            }
        };

        if content_kind == ContentKind::Text && !platform.supports_text_only() {
            return Err(GenerationError::Validation(format!(
                "{} does not accept text-only posts. Choose a content type with an image or video.",
                platform
            )));
        }

        Ok(ValidDraft {
            prompt: prompt.to_string(),
            platform,
            content_kind,
            link_url,
        })
    }
}

fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// Merged generation result returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftBundle {
    pub suggested_content: String,
    pub variants: Vec<String>,
    pub default_suggestion: String,
    /// Proxy URL of the cached image, or the raw reference if caching failed
    pub image_preview: Option<String>,
    /// Upstream image reference as returned by the generator
    pub temp_image_url: Option<String>,
    /// True only when an image was produced and cached locally
    pub image_generated: bool,
}

/// Concurrent text + image generation
#[derive(Debug, Clone)]
pub struct GenerationOrchestrator {
    client: GenerativeClient,
    resolver: MediaResolver,
}

impl GenerationOrchestrator {
    pub fn new(client: GenerativeClient, resolver: MediaResolver) -> Self {
        Self { client, resolver }
    }

    /// Validate, generate and assemble a draft
    pub async fn generate(&self, request: &DraftRequest) -> Result<DraftBundle, GenerationError> {
        let draft = request.validate()?;

        info!(
            platform = %draft.platform,
            content_type = %draft.content_kind,
            "Generating draft"
        );

        let text_branch = self.client.generate_text(
            draft.platform,
            &draft.prompt,
            draft.content_kind,
            draft.link_url.as_deref(),
        );

        let image_branch = async {
            if draft.content_kind == ContentKind::Image {
                Some(self.client.generate_image(&draft.prompt).await)
            } else {
                None
            }
        };

        let (text_result, image_result) = tokio::join!(text_branch, image_branch);

        let suggested_content = match text_result {
            Ok(body) => first_string(&body, GENERATED_TEXT_PATHS).unwrap_or_else(|| {
                warn!("Text generation response carried no text");
                PLACEHOLDER_TEXT.to_string()
            }),
            Err(e) => {
                warn!(error = %e, "Text generation failed");
                PLACEHOLDER_TEXT.to_string()
            }
        };

        let temp_image_url = match image_result {
            Some(Ok(body)) => self.image_reference(&body),
            Some(Err(e)) => {
                warn!(error = %e, "Image generation failed");
                None
            }
            None => None,
        };

        let (image_preview, image_generated) = match temp_image_url.as_deref() {
            Some(reference) => match self.resolver.resolve(reference).await {
                Resolution::Local(media) => {
                    debug!(key = %media.key, "Generated image cached");
                    (Some(self.resolver.preview_url(&media.key)), true)
                }
                Resolution::Unresolved { reason, .. } => {
                    warn!(reference = %reference, reason = %reason, "Generated image not cached");
                    (Some(reference.to_string()), false)
                }
            },
            None => (None, false),
        };

        let variants = captions::variants(&draft.prompt, draft.platform, draft.link_url.as_deref());
        let default_suggestion = variants.first().cloned().unwrap_or_default();

        Ok(DraftBundle {
            suggested_content,
            variants,
            default_suggestion,
            image_preview,
            temp_image_url,
            image_generated,
        })
    }

    /// Saved image id (as a download URL) first, then a direct URL
    fn image_reference(&self, body: &Value) -> Option<String> {
        if let Some(id) = first_string(body, SAVED_IMAGE_ID_PATHS) {
            return Some(self.client.image_url(&id));
        }

        let url = first_string(body, IMAGE_URL_PATHS);
        if url.is_none() {
            warn!("Image generation response carried no image reference");
        }
        url
    }
}
