//! Publish coordination
//!
//! `draft --publish--> published`, at most once per post. The platform call
//! happens before any local write; local state is then committed in one
//! guarded statement, so a failed publish never leaves a partial update.
//!
//! Identifier uniqueness is checked twice: a pre-check to fail fast, and the
//! UNIQUE index on `meta_post_id` as the authority when two publishes race.

use super::cleanup::DraftCleaner;
use crate::clients::{PublishMedia, PublishRequest, SocialClient, SocialError};
use crate::db::posts;
use crate::extract::{first_string, PLATFORM_POST_ID_PATHS};
use crate::media::{MediaResolver, Resolution};
use chrono::{DateTime, Utc};
use mkb_common::db::{Post, PostStatus};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

pub const CONFLICT_MESSAGE: &str = "meta_post_id already exists for another post";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Post not found: {0}")]
    NotFound(i64),

    #[error("Post {0} is already published")]
    AlreadyPublished(i64),

    /// Platform refused the post; status and body are passed back unchanged
    #[error("Platform rejected the post with status {status}")]
    Platform { status: u16, body: String },

    #[error("{message}")]
    CredentialMisconfigured {
        status: u16,
        message: String,
        body: String,
    },

    #[error("Social platform unavailable: {0}")]
    Gateway(String),

    #[error("Platform response did not include a post identifier")]
    MissingIdentifier,

    #[error("meta_post_id already exists for another post")]
    Conflict {
        post_id: i64,
        existing_post_id: Option<i64>,
        meta_post_id: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] mkb_common::Error),
}

impl From<SocialError> for PublishError {
    fn from(err: SocialError) -> Self {
        match err {
            SocialError::Rejected { status, body } => PublishError::Platform { status, body },
            SocialError::CredentialMisconfigured {
                status,
                message,
                body,
            } => PublishError::CredentialMisconfigured {
                status,
                message,
                body,
            },
            SocialError::Network(_) | SocialError::Timeout(_) | SocialError::Parse(_) => {
                PublishError::Gateway(err.to_string())
            }
        }
    }
}

/// Result of a successful publish
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub post: Post,
    pub meta_post_id: String,
    pub removed_drafts: Vec<i64>,
    pub platform_response: Value,
}

#[derive(Debug, Clone)]
pub struct PublishCoordinator {
    db: SqlitePool,
    social: SocialClient,
    resolver: MediaResolver,
    cleaner: DraftCleaner,
}

impl PublishCoordinator {
    pub fn new(db: SqlitePool, social: SocialClient, resolver: MediaResolver) -> Self {
        Self {
            cleaner: DraftCleaner::new(db.clone()),
            db,
            social,
            resolver,
        }
    }

    /// Publish a stored draft
    ///
    /// `caller_auth` is the caller's Authorization header, forwarded when no
    /// service credential is configured.
    pub async fn publish(
        &self,
        post_id: i64,
        caller_auth: Option<&str>,
    ) -> Result<PublishOutcome, PublishError> {
        let post = posts::load_post(&self.db, post_id)
            .await?
            .ok_or(PublishError::NotFound(post_id))?;

        if post.is_published() {
            info!(post_id, "Publish skipped, post already published");
            return Err(PublishError::AlreadyPublished(post_id));
        }

        let (media, local_path) = self.prepare_media(&post).await;

        let request = PublishRequest {
            platform: post.platform,
            campaign_id: post.campaign_id,
            post_id: post.id,
            content: post.content.clone(),
            link: post.link_url.clone(),
            media,
        };

        let response = self.social.publish(&request, caller_auth).await?;

        let meta_post_id = first_string(&response, PLATFORM_POST_ID_PATHS).ok_or_else(|| {
            warn!(post_id, response = %response, "Platform response missing post identifier");
            PublishError::MissingIdentifier
        })?;

        if let Some(existing) = posts::find_by_meta_post_id(&self.db, &meta_post_id, post_id).await? {
            warn!(
                post_id,
                existing_post_id = existing,
                meta_post_id = %meta_post_id,
                "Platform identifier already owned by another post"
            );
            return Err(PublishError::Conflict {
                post_id,
                existing_post_id: Some(existing),
                meta_post_id,
            });
        }

        let published_at = Utc::now();
        self.commit(post_id, &meta_post_id, local_path.as_deref(), published_at)
            .await?;

        let mut published = post.clone();
        published.status = PostStatus::Published;
        published.meta_post_id = Some(meta_post_id.clone());
        published.published_at = Some(published_at);
        published.updated_at = published_at;
        if local_path.is_some() {
            published.image_path = local_path;
        }

        info!(post_id, meta_post_id = %meta_post_id, platform = %published.platform, "Post published");

        let removed_drafts = match self.cleaner.cleanup(&published, post.image_path.as_deref()).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(post_id, error = %e, "Draft cleanup failed");
                Vec::new()
            }
        };

        Ok(PublishOutcome {
            post: published,
            meta_post_id,
            removed_drafts,
            platform_response: response,
        })
    }

    /// Record the publish in one guarded statement
    ///
    /// The UNIQUE index on `meta_post_id` is the authority when another post
    /// claimed the identifier after the pre-check.
    async fn commit(
        &self,
        post_id: i64,
        meta_post_id: &str,
        local_path: Option<&str>,
        published_at: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        match posts::commit_publish(&self.db, post_id, meta_post_id, local_path, published_at).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(post_id, "Post was published concurrently");
                Err(PublishError::AlreadyPublished(post_id))
            }
            Err(e) if e.is_unique_violation() => {
                let existing_post_id = posts::find_by_meta_post_id(&self.db, meta_post_id, post_id)
                    .await
                    .unwrap_or_default();
                warn!(
                    post_id,
                    existing_post_id = ?existing_post_id,
                    meta_post_id = %meta_post_id,
                    "Platform identifier claimed concurrently"
                );
                Err(PublishError::Conflict {
                    post_id,
                    existing_post_id,
                    meta_post_id: meta_post_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Media for the publish request plus the local path to record on commit
    ///
    /// Local bytes are uploaded when available; otherwise the platform gets
    /// a public URL for the stored reference.
    async fn prepare_media(&self, post: &Post) -> (PublishMedia, Option<String>) {
        let Some(reference) = post.image_path.as_deref().filter(|r| !r.trim().is_empty()) else {
            return (PublishMedia::None, None);
        };

        match self.resolver.resolve(reference).await {
            Resolution::Local(media) => match media.read().await {
                Ok(bytes) => (
                    PublishMedia::Upload {
                        file_name: media.file_name(),
                        content_type: media.content_type.clone(),
                        bytes,
                    },
                    Some(media.relative_path()),
                ),
                Err(e) => {
                    warn!(post_id = post.id, key = %media.key, error = %e, "Cached media unreadable");
                    (PublishMedia::Url(self.resolver.public_url(reference)), None)
                }
            },
            Resolution::Unresolved { reason, .. } => {
                warn!(
                    post_id = post.id,
                    reference = %reference,
                    reason = %reason,
                    "Media unresolved, publishing by URL"
                );
                (PublishMedia::Url(self.resolver.public_url(reference)), None)
            }
        }
    }
}
