//! Application state and request helpers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use mkb_common::config::{database_path, media_path, UpstreamConfig};
use mkb_common::db::{NewPost, Post};
use http_body_util::BodyExt;
use mkb_content::{build_router, AppState, ServiceConfig};
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

use super::stub_upstream::StubUpstream;

/// Public base URL the service advertises in tests
pub const PUBLIC_BASE_URL: &str = "http://backend.test";

/// Fresh service over a temporary root folder, wired to a stub upstream
pub struct TestContext {
    /// Keeps the root folder alive for the duration of the test
    pub root: TempDir,
    pub state: AppState,
}

impl TestContext {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn media_dir(&self) -> std::path::PathBuf {
        media_path(self.root.path())
    }
}

/// Build a test context; `social_token` sets the service credential
pub async fn create_test_context(stub: &StubUpstream, social_token: Option<&str>) -> TestContext {
    let root = TempDir::new().unwrap();
    let db = mkb_common::db::init_database(&database_path(root.path()))
        .await
        .unwrap();

    let upstream = UpstreamConfig {
        generative_api_url: stub.generative_api_url(),
        generative_storage_url: stub.storage_url(),
        social_api_url: stub.social_api_url(),
        social_api_token: social_token.map(str::to_string),
        public_base_url: PUBLIC_BASE_URL.to_string(),
        text_timeout_secs: 2,
        image_timeout_secs: 1,
        media_timeout_secs: 2,
        publish_timeout_secs: 2,
    };

    let config = ServiceConfig::from_upstream(&upstream);
    let state = AppState::new(db, config, media_path(root.path())).unwrap();

    TestContext { root, state }
}

/// Insert a draft directly through the repository
pub async fn seed_post(ctx: &TestContext, post: NewPost) -> Post {
    mkb_content::db::posts::insert_post(&ctx.state.db, &post)
        .await
        .unwrap()
}

/// JSON request with an optional Authorization header
pub fn json_request(method: &str, uri: &str, body: Option<Value>, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = body.collect().await.expect("Should read body").to_bytes();
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Send a request through a fresh router, returning status and JSON body
pub async fn send(ctx: &TestContext, request: Request<Body>) -> (StatusCode, Value) {
    let response = ctx.router().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}
