//! Draft generation endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::services::{DraftBundle, DraftRequest};
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct GenerateDraftResponse {
    pub success: bool,
    pub data: DraftBundle,
}

/// POST /api/posts/generate-draft
///
/// Always 200 once the request validates, even if both upstream calls fail;
/// the draft then carries placeholder text and no media.
pub async fn generate_draft(
    State(state): State<AppState>,
    Json(request): Json<DraftRequest>,
) -> ApiResult<Json<GenerateDraftResponse>> {
    let bundle = state.orchestrator.generate(&request).await?;

    Ok(Json(GenerateDraftResponse {
        success: true,
        data: bundle,
    }))
}

pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/api/posts/generate-draft", post(generate_draft))
}
