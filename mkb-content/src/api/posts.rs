//! Post create/show endpoints
//!
//! Minimal storage surface for drafts that feed the publish pipeline.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use mkb_common::db::{ContentKind, NewPost, Platform, Post};
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::posts;
use crate::media::Resolution;
use crate::{ApiError, ApiResult, AppState};

const MAX_TITLE_CHARS: usize = 255;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub campaign_id: i64,
    pub title: String,
    pub platform: String,
    pub content: String,
    pub content_type: Option<String>,
    pub image_path: Option<String>,
    /// Temporary upstream image URL, cached locally when `image_path` is empty
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
}

impl CreatePostRequest {
    fn validate(&self) -> ApiResult<NewPost> {
        let title = self.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            return Err(ApiError::Validation(format!(
                "title is required and must be at most {} characters",
                MAX_TITLE_CHARS
            )));
        }

        if self.content.trim().is_empty() {
            return Err(ApiError::Validation("content is required".to_string()));
        }

        let platform: Platform = self
            .platform
            .parse()
            .map_err(|e: mkb_common::Error| ApiError::Validation(e.to_string()))?;

        let content_type = match self.content_type.as_deref().map(str::trim) {
            None | Some("") => ContentKind::Text,
            Some(kind) => kind
                .parse()
                .map_err(|e: mkb_common::Error| ApiError::Validation(e.to_string()))?,
        };

        Ok(NewPost {
            campaign_id: self.campaign_id,
            title: title.to_string(),
            platform,
            content: self.content.clone(),
            content_type,
            image_path: non_blank(self.image_path.as_deref()),
            link_url: non_blank(self.link_url.as_deref()),
            scheduled_at: self.scheduled_at,
            created_by: self.created_by,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// POST /api/posts
///
/// A failed `image_url` download is logged and the post is created without
/// media.
pub async fn create_post(
    State(state): State<AppState>,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let mut new_post = request.validate()?;

    if new_post.image_path.is_none() {
        if let Some(image_url) = non_blank(request.image_url.as_deref()) {
            match state.resolver.resolve(&image_url).await {
                Resolution::Local(media) => new_post.image_path = Some(media.relative_path()),
                Resolution::Unresolved { reason, .. } => {
                    warn!(reference = %image_url, reason = %reason, "Unable to download remote image");
                }
            }
        }
    }

    let post = posts::insert_post(&state.db, &new_post).await?;
    info!(post_id = post.id, campaign_id = post.campaign_id, "Draft created");

    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/posts/:id
pub async fn show_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<Post>> {
    posts::load_post(&state.db, post_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Post {}", post_id)))
}

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/api/posts", post(create_post))
        .route("/api/posts/:id", get(show_post))
}
