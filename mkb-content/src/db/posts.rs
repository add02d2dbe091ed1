//! Post database operations

use chrono::{DateTime, Utc};
use mkb_common::db::{NewPost, Post, PostStatus};
use mkb_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const POST_COLUMNS: &str = r#"
    id, campaign_id, title, platform, content, content_type, image_path, link_url,
    status, meta_post_id, scheduled_at, published_at, created_by, created_at, updated_at
"#;

/// Insert a draft post and return it as stored
pub async fn insert_post(pool: &SqlitePool, post: &NewPost) -> Result<Post> {
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (
            campaign_id, title, platform, content, content_type, image_path, link_url,
            status, scheduled_at, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 'draft', ?, ?, ?, ?)
        "#,
    )
    .bind(post.campaign_id)
    .bind(&post.title)
    .bind(post.platform.as_str())
    .bind(&post.content)
    .bind(post.content_type.as_str())
    .bind(&post.image_path)
    .bind(&post.link_url)
    .bind(post.scheduled_at.map(|t| t.to_rfc3339()))
    .bind(post.created_by)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    load_post(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Post {} missing after insert", id)))
}

/// Load post by id
pub async fn load_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let query = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;

    row.as_ref().map(row_to_post).transpose()
}

/// Id of a post other than `excluding_id` that holds the platform identifier
pub async fn find_by_meta_post_id(
    pool: &SqlitePool,
    meta_post_id: &str,
    excluding_id: i64,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM posts WHERE meta_post_id = ? AND id != ? LIMIT 1",
    )
    .bind(meta_post_id)
    .bind(excluding_id)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Mark a draft published in a single guarded statement
///
/// Identifier, status, timestamps and (when given) the normalised media path
/// are written together or not at all. Returns false when the post was no
/// longer a draft. A duplicate identifier surfaces as a unique violation.
pub async fn commit_publish(
    pool: &SqlitePool,
    id: i64,
    meta_post_id: &str,
    image_path: Option<&str>,
    published_at: DateTime<Utc>,
) -> Result<bool> {
    let published_at = published_at.to_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE posts
        SET meta_post_id = ?,
            status = 'published',
            published_at = ?,
            updated_at = ?,
            image_path = COALESCE(?, image_path)
        WHERE id = ? AND status = 'draft'
        "#,
    )
    .bind(meta_post_id)
    .bind(&published_at)
    .bind(&published_at)
    .bind(image_path)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete drafts superseded by a published post
///
/// Matches drafts in the same campaign and platform whose title, content or
/// media reference equals the published post's. Blank titles/contents and
/// missing media never match. `original_media` is the reference the post held
/// before publishing normalised it, so siblings still pointing at the
/// upstream reference are caught too.
pub async fn delete_superseded_drafts(
    pool: &SqlitePool,
    published: &Post,
    original_media: Option<&str>,
) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        DELETE FROM posts
        WHERE campaign_id = ?
          AND platform = ?
          AND status = 'draft'
          AND id != ?
          AND (
                (? != '' AND title = ?)
             OR (? != '' AND content = ?)
             OR (image_path IS NOT NULL AND (image_path = ? OR image_path = ?))
          )
        RETURNING id
        "#,
    )
    .bind(published.campaign_id)
    .bind(published.platform.as_str())
    .bind(published.id)
    .bind(&published.title)
    .bind(&published.title)
    .bind(&published.content)
    .bind(&published.content)
    .bind(&published.image_path)
    .bind(original_media)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

fn row_to_post(row: &SqliteRow) -> Result<Post> {
    let platform: String = row.get("platform");
    let content_type: String = row.get("content_type");
    let status: String = row.get("status");
    let scheduled_at: Option<String> = row.get("scheduled_at");
    let published_at: Option<String> = row.get("published_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Post {
        id: row.get("id"),
        campaign_id: row.get("campaign_id"),
        title: row.get("title"),
        platform: platform.parse()?,
        content: row.get("content"),
        content_type: content_type.parse()?,
        image_path: row.get("image_path"),
        link_url: row.get("link_url"),
        status: status.parse::<PostStatus>()?,
        meta_post_id: row.get("meta_post_id"),
        scheduled_at: scheduled_at.as_deref().map(parse_timestamp).transpose()?,
        published_at: published_at.as_deref().map(parse_timestamp).transpose()?,
        created_by: row.get("created_by"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", value, e)))
}
