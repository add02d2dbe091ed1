//! Generated media proxy
//!
//! Serves cached images by id, fetching and caching them on first request.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::debug;

use crate::media::{MediaCache, Resolution};
use crate::{ApiError, ApiResult, AppState};

/// Cached media never changes for a given id
pub const MEDIA_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// GET /api/v1/marketing/generation/image/:id
pub async fn get_generated_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    MediaCache::validate_key(&id)?;

    let media = match state.resolver.resolve_id(&id).await {
        Resolution::Local(media) => media,
        Resolution::Unresolved { reason, .. } => {
            debug!(key = %id, reason = %reason, "Media unavailable");
            return Err(ApiError::NotFound(format!("Media {}", id)));
        }
    };

    let bytes = media
        .read()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, media.content_type),
            (header::CACHE_CONTROL, MEDIA_CACHE_CONTROL.to_string()),
        ],
        bytes,
    )
        .into_response())
}

pub fn media_routes() -> Router<AppState> {
    Router::new().route(
        "/api/v1/marketing/generation/image/:id",
        get(get_generated_image),
    )
}
