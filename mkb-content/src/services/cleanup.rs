//! Draft supersession cleanup
//!
//! The same logical post is often drafted several times before one variant
//! is published. Once it is, the remaining sibling drafts are removed.

use crate::db::posts;
use mkb_common::db::Post;
use mkb_common::Result;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Removes drafts superseded by a published post
#[derive(Debug, Clone)]
pub struct DraftCleaner {
    db: SqlitePool,
}

impl DraftCleaner {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Delete sibling drafts of `published`, returning their ids
    ///
    /// Only drafts in the same campaign and platform are considered; the
    /// published post and non-draft posts are never touched. Callers treat
    /// an error here as non-fatal.
    pub async fn cleanup(&self, published: &Post, original_media: Option<&str>) -> Result<Vec<i64>> {
        let removed = posts::delete_superseded_drafts(&self.db, published, original_media).await?;

        if removed.is_empty() {
            debug!(post_id = published.id, "No superseded drafts");
        } else {
            info!(
                post_id = published.id,
                removed = ?removed,
                "Removed superseded drafts"
            );
        }

        Ok(removed)
    }
}
