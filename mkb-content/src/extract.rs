//! Tagged field extraction from heterogeneous upstream JSON
//!
//! Upstream services nest the same logical field under different keys
//! depending on version and provider. Each field gets an ordered list of
//! candidate dotted paths (`payload.candidates.0.content`); the first path that
//! holds a non-null, non-blank value wins.

use serde_json::Value;

/// Generated caption text from the text-generation endpoint
pub const GENERATED_TEXT_PATHS: &[&str] = &[
    "payload.generated_text",
    "payload.candidates.0.content.parts.0.text",
    "text",
    "generated_text",
];

/// Saved image identifier from the image-generation endpoint
pub const SAVED_IMAGE_ID_PATHS: &[&str] = &["saved_images.0.id"];

/// Direct image URL from the image-generation endpoint
pub const IMAGE_URL_PATHS: &[&str] = &["image_url", "url"];

/// Platform-assigned post identifier from the publish endpoint
pub const PLATFORM_POST_ID_PATHS: &[&str] = &[
    "meta_post_id",
    "post_id",
    "id",
    "data.meta_post_id",
    "data.post_id",
    "data.id",
];

/// Look up a dotted path; numeric segments index into arrays
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let pointer = format!("/{}", path.replace('.', "/"));
    value.pointer(&pointer).filter(|v| !v.is_null())
}

/// First candidate path holding a usable scalar, rendered as a string
///
/// Strings must be non-blank. Numbers are accepted because some platforms
/// return numeric post identifiers.
pub fn first_string(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| match lookup(value, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
