//! Publish endpoint

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::services::PublishOutcome;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub message: String,
    pub data: PublishOutcome,
}

/// POST /api/posts/:id/publish
///
/// The caller's `Authorization` header is handed to the coordinator, which
/// forwards it only when no service credential is configured.
pub async fn publish_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<PublishResponse>> {
    let caller_auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    info!(post_id, "Publish requested");
    let outcome = state.publisher.publish(post_id, caller_auth).await?;

    Ok(Json(PublishResponse {
        success: true,
        message: "Post published".to_string(),
        data: outcome,
    }))
}

pub fn publish_routes() -> Router<AppState> {
    Router::new().route("/api/posts/:id/publish", post(publish_post))
}
