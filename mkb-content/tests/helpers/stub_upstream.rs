//! In-process stand-ins for the generative and social services
//!
//! One axum server on 127.0.0.1:0 serves every upstream route:
//!
//! - `/gen/generation/{platform}` and `/gen/generation/image` (generation)
//! - `/gen/generation/image/{id}` (image download)
//! - `/storage/images/{file}` (secondary storage)
//! - `/social/posts/{platform}` (publishing)
//!
//! Every route counts its calls so tests can assert what was (not) contacted.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Minimal PNG signature followed by filler bytes
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

/// What each stub route returns
#[derive(Debug, Clone)]
pub struct StubBehavior {
    /// Text generation body; None answers 500
    pub text_response: Option<Value>,
    pub text_delay: Option<Duration>,
    /// Image generation body; None answers 500
    pub image_response: Option<Value>,
    pub image_delay: Option<Duration>,
    /// Downloadable images by id: (bytes, content type)
    pub images: HashMap<String, (Vec<u8>, String)>,
    /// Secondary storage files by file name: (bytes, content type)
    pub storage_images: HashMap<String, (Vec<u8>, String)>,
    pub publish_status: u16,
    pub publish_body: String,
    pub publish_delay: Option<Duration>,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            text_response: Some(serde_json::json!({ "generated_text": "Hello" })),
            text_delay: None,
            image_response: None,
            image_delay: None,
            images: HashMap::new(),
            storage_images: HashMap::new(),
            publish_status: 200,
            publish_body: r#"{"success":true,"meta_post_id":"p_1"}"#.to_string(),
            publish_delay: None,
        }
    }
}

impl StubBehavior {
    pub fn with_image(mut self, id: &str, bytes: &[u8], content_type: &str) -> Self {
        self.images
            .insert(id.to_string(), (bytes.to_vec(), content_type.to_string()));
        self
    }

    pub fn with_storage_image(mut self, file_name: &str, bytes: &[u8], content_type: &str) -> Self {
        self.storage_images
            .insert(file_name.to_string(), (bytes.to_vec(), content_type.to_string()));
        self
    }

    pub fn with_publish_response(mut self, status: u16, body: Value) -> Self {
        self.publish_status = status;
        self.publish_body = body.to_string();
        self
    }
}

/// Request captured by the publish route
#[derive(Debug, Clone)]
pub struct CapturedPublish {
    pub platform: String,
    pub authorization: Option<String>,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl CapturedPublish {
    pub fn is_multipart(&self) -> bool {
        self.content_type.starts_with("multipart/form-data")
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("publish body should be JSON")
    }

    pub fn body_contains(&self, needle: &[u8]) -> bool {
        self.body.windows(needle.len()).any(|w| w == needle)
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub text: AtomicUsize,
    pub image: AtomicUsize,
    pub download: AtomicUsize,
    pub storage: AtomicUsize,
    pub publish: AtomicUsize,
}

struct StubState {
    behavior: StubBehavior,
    counters: Arc<Counters>,
    published: Arc<Mutex<Vec<CapturedPublish>>>,
    text_requests: Arc<Mutex<Vec<(String, Value)>>>,
}

/// Running stub server
pub struct StubUpstream {
    pub base_url: String,
    pub counters: Arc<Counters>,
    published: Arc<Mutex<Vec<CapturedPublish>>>,
    text_requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubUpstream {
    pub fn generative_api_url(&self) -> String {
        format!("{}/gen", self.base_url)
    }

    pub fn storage_url(&self) -> String {
        format!("{}/storage", self.base_url)
    }

    pub fn social_api_url(&self) -> String {
        format!("{}/social", self.base_url)
    }

    pub fn text_calls(&self) -> usize {
        self.counters.text.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.counters.image.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.counters.download.load(Ordering::SeqCst)
    }

    pub fn storage_calls(&self) -> usize {
        self.counters.storage.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.counters.publish.load(Ordering::SeqCst)
    }

    pub fn upstream_calls(&self) -> usize {
        self.text_calls()
            + self.image_calls()
            + self.download_calls()
            + self.storage_calls()
            + self.publish_calls()
    }

    /// Publish requests received so far
    pub fn published(&self) -> Vec<CapturedPublish> {
        self.published.lock().unwrap().clone()
    }

    /// Text generation requests received so far: (platform, body)
    pub fn text_requests(&self) -> Vec<(String, Value)> {
        self.text_requests.lock().unwrap().clone()
    }
}

/// Start the stub server with the given behavior
pub async fn start_stub(behavior: StubBehavior) -> StubUpstream {
    let counters = Arc::new(Counters::default());
    let published = Arc::new(Mutex::new(Vec::new()));
    let text_requests = Arc::new(Mutex::new(Vec::new()));

    let state = Arc::new(StubState {
        behavior,
        counters: Arc::clone(&counters),
        published: Arc::clone(&published),
        text_requests: Arc::clone(&text_requests),
    });

    let app = Router::new()
        .route("/gen/generation/image", post(generate_image))
        .route("/gen/generation/image/:id", get(download_image))
        .route("/gen/generation/:platform", post(generate_text))
        .route("/storage/images/:file", get(storage_image))
        .route("/social/posts/:platform", post(publish))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubUpstream {
        base_url: format!("http://{}", addr),
        counters,
        published,
        text_requests,
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

fn json_or_500(body: &Option<Value>) -> Response {
    match body {
        Some(body) => Json(body.clone()).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "generation failed").into_response(),
    }
}

async fn generate_text(
    State(state): State<Arc<StubState>>,
    Path(platform): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.counters.text.fetch_add(1, Ordering::SeqCst);
    state.text_requests.lock().unwrap().push((platform, body));
    pause(state.behavior.text_delay).await;
    json_or_500(&state.behavior.text_response)
}

async fn generate_image(State(state): State<Arc<StubState>>) -> Response {
    state.counters.image.fetch_add(1, Ordering::SeqCst);
    pause(state.behavior.image_delay).await;
    json_or_500(&state.behavior.image_response)
}

async fn download_image(State(state): State<Arc<StubState>>, Path(id): Path<String>) -> Response {
    state.counters.download.fetch_add(1, Ordering::SeqCst);
    match state.behavior.images.get(&id) {
        Some((bytes, content_type)) => {
            ([(header::CONTENT_TYPE, content_type.clone())], bytes.clone()).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "detail": "not found" })),
        )
            .into_response(),
    }
}

async fn storage_image(State(state): State<Arc<StubState>>, Path(file): Path<String>) -> Response {
    state.counters.storage.fetch_add(1, Ordering::SeqCst);
    match state.behavior.storage_images.get(&file) {
        Some((bytes, content_type)) => {
            ([(header::CONTENT_TYPE, content_type.clone())], bytes.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn publish(
    State(state): State<Arc<StubState>>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.counters.publish.fetch_add(1, Ordering::SeqCst);

    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.published.lock().unwrap().push(CapturedPublish {
        platform,
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE).unwrap_or_default(),
        body: body.to_vec(),
    });

    pause(state.behavior.publish_delay).await;

    let status = StatusCode::from_u16(state.behavior.publish_status).unwrap();
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        state.behavior.publish_body.clone(),
    )
        .into_response()
}
