//! Post models shared by the content pipeline

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Social platform a post targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
        }
    }

    /// Whether the platform accepts posts without image or video
    ///
    /// Instagram is photo-centric and rejects text-only posts.
    pub fn supports_text_only(&self) -> bool {
        match self {
            Platform::Facebook => true,
            Platform::Instagram => false,
        }
    }

    /// Payload key the publishing service expects for the post body
    pub fn content_field(&self) -> &'static str {
        match self {
            Platform::Facebook => "message",
            Platform::Instagram => "caption",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            other => Err(Error::InvalidInput(format!("Unsupported platform: {}", other))),
        }
    }
}

/// Kind of content a post carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Video,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Video => "video",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ContentKind::Text),
            "image" => Ok(ContentKind::Image),
            "video" => Ok(ContentKind::Video),
            other => Err(Error::InvalidInput(format!("Unsupported content type: {}", other))),
        }
    }
}

/// Post lifecycle status. `Published` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl FromStr for PostStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            other => Err(Error::InvalidInput(format!("Unknown post status: {}", other))),
        }
    }
}

/// Stored post record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub campaign_id: i64,
    pub title: String,
    pub platform: Platform,
    pub content: String,
    pub content_type: ContentKind,
    /// Media reference: opaque id, local cache path or remote URL
    pub image_path: Option<String>,
    pub link_url: Option<String>,
    pub status: PostStatus,
    /// Platform-assigned identifier, unique across posts once set
    pub meta_post_id: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

/// Fields for creating a draft post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub campaign_id: i64,
    pub title: String,
    pub platform: Platform,
    pub content: String,
    pub content_type: ContentKind,
    pub image_path: Option<String>,
    pub link_url: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
}

impl NewPost {
    /// Minimal draft with no media, link or schedule
    pub fn draft(campaign_id: i64, title: &str, platform: Platform, content: &str) -> Self {
        Self {
            campaign_id,
            title: title.to_string(),
            platform,
            content: content.to_string(),
            content_type: ContentKind::Text,
            image_path: None,
            link_url: None,
            scheduled_at: None,
            created_by: None,
        }
    }
}
