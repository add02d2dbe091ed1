//! Draft generation tests against stub upstream services
//!
//! Tests cover:
//! - Platform policy rejection before any upstream call
//! - Text + image fan-out and merge into a draft bundle
//! - Independent degradation of the text and image branches

mod helpers;

use axum::http::StatusCode;
use helpers::{create_test_context, json_request, send, start_stub, StubBehavior, PNG_BYTES};
use mkb_content::services::generation::PLACEHOLDER_TEXT;
use serde_json::json;
use std::time::Duration;
use tower::util::ServiceExt;

const GENERATE_URI: &str = "/api/posts/generate-draft";

#[tokio::test]
async fn test_photo_centric_platform_rejects_text_without_upstream_call() {
    let stub = start_stub(StubBehavior::default()).await;
    let ctx = create_test_context(&stub, None).await;

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            GENERATE_URI,
            Some(json!({ "prompt": "Intro course", "platform": "instagram", "content_type": "text" })),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(stub.upstream_calls(), 0);
}

#[tokio::test]
async fn test_short_prompt_rejected_without_upstream_call() {
    let stub = start_stub(StubBehavior::default()).await;
    let ctx = create_test_context(&stub, None).await;

    let (status, _) = send(
        &ctx,
        json_request(
            "POST",
            GENERATE_URI,
            Some(json!({ "prompt": "Hi", "platform": "facebook", "content_type": "text" })),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(stub.upstream_calls(), 0);
}

#[tokio::test]
async fn test_intro_course_image_draft() {
    let stub = start_stub(StubBehavior {
        text_response: Some(json!({ "generated_text": "Hello" })),
        image_response: Some(json!({ "saved_images": [{ "id": "img1" }] })),
        ..StubBehavior::default().with_image("img1", PNG_BYTES, "image/png")
    })
    .await;
    let ctx = create_test_context(&stub, None).await;

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            GENERATE_URI,
            Some(json!({ "prompt": "Intro course", "platform": "facebook", "content_type": "image" })),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert_eq!(data["suggested_content"], "Hello");
    assert_eq!(data["variants"].as_array().unwrap().len(), 3);
    assert_eq!(data["default_suggestion"], data["variants"][0]);
    assert_eq!(data["image_generated"], true);
    assert_eq!(
        data["temp_image_url"],
        format!("{}/generation/image/img1", stub.generative_api_url())
    );
    assert_eq!(
        data["image_preview"],
        "http://backend.test/api/v1/marketing/generation/image/img1"
    );
    assert_eq!(stub.text_calls(), 1);
    assert_eq!(stub.image_calls(), 1);
    assert_eq!(stub.download_calls(), 1);

    // The preview resolves to the cached img1 bytes without another fetch
    let response = ctx
        .router()
        .oneshot(json_request(
            "GET",
            "/api/v1/marketing/generation/image/img1",
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], PNG_BYTES);
    assert_eq!(stub.download_calls(), 1);
}

#[tokio::test]
async fn test_image_timeout_keeps_text() {
    let stub = start_stub(StubBehavior {
        text_response: Some(json!({ "payload": { "generated_text": "Fresh caption" } })),
        image_response: Some(json!({ "saved_images": [{ "id": "late" }] })),
        image_delay: Some(Duration::from_secs(3)),
        ..StubBehavior::default()
    })
    .await;
    let ctx = create_test_context(&stub, None).await;

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            GENERATE_URI,
            Some(json!({ "prompt": "Intro course", "platform": "facebook", "content_type": "image" })),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["suggested_content"], "Fresh caption");
    assert_ne!(data["suggested_content"], PLACEHOLDER_TEXT);
    assert_eq!(data["image_generated"], false);
    assert!(data["temp_image_url"].is_null());
    assert!(data["image_preview"].is_null());
}

#[tokio::test]
async fn test_total_upstream_failure_still_returns_draft() {
    let stub = start_stub(StubBehavior {
        text_response: None,
        image_response: None,
        ..StubBehavior::default()
    })
    .await;
    let ctx = create_test_context(&stub, None).await;

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            GENERATE_URI,
            Some(json!({ "prompt": "Intro course", "platform": "instagram", "content_type": "image" })),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["suggested_content"], PLACEHOLDER_TEXT);
    assert_eq!(data["variants"].as_array().unwrap().len(), 3);
    assert!(data["default_suggestion"].as_str().unwrap().starts_with("Intro course"));
    assert_eq!(data["image_generated"], false);
    assert!(data["image_preview"].is_null());
}

#[tokio::test]
async fn test_text_only_draft_skips_image_generation() {
    let stub = start_stub(StubBehavior::default()).await;
    let ctx = create_test_context(&stub, None).await;

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            GENERATE_URI,
            Some(json!({
                "prompt": "Intro course",
                "platform": "facebook",
                "content_type": "text",
                "link_url": "https://example.com/course"
            })),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stub.text_calls(), 1);
    assert_eq!(stub.image_calls(), 0);
    assert!(body["data"]["temp_image_url"].is_null());

    let requests = stub.text_requests();
    assert_eq!(requests.len(), 1);
    let (platform, request_body) = &requests[0];
    assert_eq!(platform, "facebook");
    assert_eq!(request_body["prompt"], "Intro course");
    assert_eq!(request_body["content_type"], "text");
    assert_eq!(request_body["link_url"], "https://example.com/course");
}

#[tokio::test]
async fn test_candidates_shape_and_storage_fallback() {
    let stub = start_stub(StubBehavior {
        text_response: Some(json!({
            "payload": { "candidates": [{ "content": { "parts": [{ "text": "From candidates" }] } }] }
        })),
        image_response: Some(json!({ "saved_images": [{ "id": "stored1" }] })),
        ..StubBehavior::default().with_storage_image("stored1.jpg", b"JPEGDATA", "image/jpeg")
    })
    .await;
    let ctx = create_test_context(&stub, None).await;

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            GENERATE_URI,
            Some(json!({ "prompt": "Intro course", "platform": "facebook", "content_type": "image" })),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["suggested_content"], "From candidates");
    assert_eq!(data["image_generated"], true);

    // Primary download missed, then png was tried before jpg
    assert_eq!(stub.download_calls(), 1);
    assert_eq!(stub.storage_calls(), 2);
    assert!(ctx.media_dir().join("stored1.jpg").exists());
}

#[tokio::test]
async fn test_unresolvable_direct_url_passed_through() {
    let stub = start_stub(StubBehavior {
        image_response: Some(json!({ "image_url": "http://127.0.0.1:9/nowhere.png" })),
        ..StubBehavior::default()
    })
    .await;
    let ctx = create_test_context(&stub, None).await;

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            GENERATE_URI,
            Some(json!({ "prompt": "Intro course", "platform": "facebook", "content_type": "image" })),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["temp_image_url"], "http://127.0.0.1:9/nowhere.png");
    assert_eq!(data["image_preview"], "http://127.0.0.1:9/nowhere.png");
    assert_eq!(data["image_generated"], false);
}
