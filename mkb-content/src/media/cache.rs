//! Content-addressed local media cache
//!
//! Files live at `{root}/{key}.{ext}`. Storage is append-only by key: a `put`
//! for a key that is already stored returns the existing path and writes
//! nothing. Concurrent writers of one key serialise on a `.{key}.lock` file,
//! so the first one decides the stored extension and bytes. Generated media is
//! assumed immutable per key; regenerating different bytes under an existing
//! key is not supported.

use mkb_common::config::MEDIA_DIR;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Extensions tried, in order, when only the key is known
pub const CANDIDATE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Extension used when neither the content type nor the bytes identify a format
pub const DEFAULT_EXTENSION: &str = "png";

const MAX_KEY_LEN: usize = 128;

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);
const LOCK_MAX_ATTEMPTS: u32 = 500;

/// Media cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid media key: {0}")]
    InvalidKey(String),

    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cached media item read back from disk
#[derive(Debug, Clone)]
pub struct CachedMedia {
    pub key: String,
    pub path: PathBuf,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Content-addressed blob store on the local filesystem
#[derive(Debug, Clone)]
pub struct MediaCache {
    root: PathBuf,
}

impl MediaCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the cache directory if missing
    pub async fn ensure_root(&self) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Keys are opaque identifiers: ASCII alphanumerics, `-`, `_` and `.`,
    /// never starting with `.`, so they cannot escape the cache directory.
    pub fn validate_key(key: &str) -> Result<(), CacheError> {
        let valid = !key.is_empty()
            && key.len() <= MAX_KEY_LEN
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if valid {
            Ok(())
        } else {
            Err(CacheError::InvalidKey(key.to_string()))
        }
    }

    /// Find the stored file for a key by probing the known extensions
    pub async fn locate(&self, key: &str) -> Result<Option<PathBuf>, CacheError> {
        Self::validate_key(key)?;

        for ext in CANDIDATE_EXTENSIONS {
            let path = self.root.join(format!("{}.{}", key, ext));
            if tokio::fs::try_exists(&path).await? {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.locate(key).await?.is_some())
    }

    /// Store bytes under a key, returning the stored path
    ///
    /// Idempotent: an existing key is left untouched and its path returned.
    pub async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<PathBuf, CacheError> {
        if let Some(existing) = self.locate(key).await? {
            debug!(key = %key, path = %existing.display(), "Media already cached");
            return Ok(existing);
        }

        self.ensure_root().await?;

        let lock = self.acquire_lock(key).await?;
        let result = self.write_new(key, bytes, content_type).await;

        if let Some(lock_path) = lock {
            if let Err(e) = tokio::fs::remove_file(&lock_path).await {
                warn!(path = %lock_path.display(), error = %e, "Failed to release media lock");
            }
        }

        result
    }

    /// Take the per-key write lock, a `.{key}.lock` file created exclusively
    ///
    /// Returns None when the lock stays held past the wait budget (a writer
    /// died holding it); the write then proceeds unguarded.
    async fn acquire_lock(&self, key: &str) -> Result<Option<PathBuf>, CacheError> {
        let lock_path = self.root.join(format!(".{}.lock", key));

        for _ in 0..LOCK_MAX_ATTEMPTS {
            let created = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await;

            match created {
                Ok(_) => return Ok(Some(lock_path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(key = %key, path = %lock_path.display(), "Media lock held too long, writing without it");
        Ok(None)
    }

    /// Write under the lock; a writer that waited finds the winner's file
    async fn write_new(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<PathBuf, CacheError> {
        if let Some(existing) = self.locate(key).await? {
            debug!(key = %key, path = %existing.display(), "Concurrent write of same key, keeping first copy");
            return Ok(existing);
        }

        let ext = extension_for(content_type, bytes);
        let final_path = self.root.join(format!("{}.{}", key, ext));
        let tmp_path = self.root.join(format!(".{}.{}.tmp", key, Uuid::new_v4()));

        tokio::fs::write(&tmp_path, bytes).await?;

        // hard_link refuses to replace an existing file, unlike rename
        let linked = tokio::fs::hard_link(&tmp_path, &final_path).await;

        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            warn!(path = %tmp_path.display(), error = %e, "Failed to remove temp media file");
        }

        match linked {
            Ok(()) => {
                debug!(key = %key, path = %final_path.display(), bytes = bytes.len(), "Media cached");
                Ok(final_path)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(final_path),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a cached item by key
    pub async fn get(&self, key: &str) -> Result<CachedMedia, CacheError> {
        let path = self
            .locate(key)
            .await?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        let bytes = tokio::fs::read(&path).await?;

        Ok(CachedMedia {
            key: key.to_string(),
            content_type: content_type_for_path(&path),
            path,
            bytes,
        })
    }

    /// Find a cached file by the file name component of a local path
    ///
    /// Accepts the forms stored on posts (`media/abc.png`,
    /// `/storage/media/abc.png`) as well as absolute paths into the cache.
    pub async fn find_local(&self, reference: &str) -> Option<PathBuf> {
        let file_name = Path::new(reference.trim()).file_name()?.to_str()?;
        Self::validate_key(file_name).ok()?;

        let path = self.root.join(file_name);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(path),
            _ => None,
        }
    }

    /// Path stored on posts for a cached file: `media/{file name}`
    pub fn relative_path(path: &Path) -> String {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}", MEDIA_DIR, file_name)
    }
}

/// File extension for stored bytes: declared content type first, then
/// content sniffing, then the default image format
pub fn extension_for(content_type: Option<&str>, bytes: &[u8]) -> &'static str {
    if let Some(ext) = content_type.and_then(extension_from_content_type) {
        return ext;
    }

    infer::get(bytes)
        .and_then(|kind| extension_from_content_type(kind.mime_type()))
        .unwrap_or(DEFAULT_EXTENSION)
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Content type for a cached file, from its extension
pub fn content_type_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn cache() -> (TempDir, MediaCache) {
        let dir = TempDir::new().unwrap();
        let cache = MediaCache::new(dir.path().join("media"));
        (dir, cache)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_dir, cache) = cache();

        let path = cache.put("img1", b"PNGDATA", Some("image/png")).await.unwrap();
        assert!(path.ends_with("img1.png"));

        let media = cache.get("img1").await.unwrap();
        assert_eq!(media.bytes, b"PNGDATA");
        assert_eq!(media.content_type, "image/png");
        assert!(cache.exists("img1").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_is_idempotent_and_never_overwrites() {
        let (_dir, cache) = cache();

        let first = cache.put("same", b"first", Some("image/jpeg")).await.unwrap();
        let second = cache.put("same", b"second", Some("image/png")).await.unwrap();

        assert_eq!(first, second);
        assert!(first.ends_with("same.jpg"));
        assert_eq!(cache.get("same").await.unwrap().bytes, b"first");
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (_dir, cache) = cache();
        assert!(matches!(cache.get("nope").await, Err(CacheError::NotFound(_))));
        assert!(!cache.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let (_dir, cache) = cache();

        for key in ["", "../etc", "a/b", "a\\b", ".hidden", "sp ace"] {
            assert!(
                matches!(cache.put(key, b"x", None).await, Err(CacheError::InvalidKey(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(extension_for(Some("image/png"), b""), "png");
        assert_eq!(extension_for(Some("image/jpeg; charset=binary"), b""), "jpg");
        assert_eq!(extension_for(Some("IMAGE/WEBP"), b""), "webp");
        assert_eq!(extension_for(Some("image/gif"), b""), "gif");
    }

    #[test]
    fn test_extension_sniffed_when_content_type_unknown() {
        assert_eq!(extension_for(None, JPEG_MAGIC), "jpg");
        assert_eq!(extension_for(Some("application/octet-stream"), PNG_MAGIC), "png");
    }

    #[test]
    fn test_extension_defaults_to_png() {
        assert_eq!(extension_for(None, b"opaque bytes"), DEFAULT_EXTENSION);
        assert_eq!(extension_for(Some("text/plain"), b"hello"), DEFAULT_EXTENSION);
    }

    #[tokio::test]
    async fn test_concurrent_puts_of_same_key() {
        let (_dir, cache) = cache();
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.put("shared", b"bytes", Some("image/png")).await })
            })
            .collect();

        for handle in handles {
            let path = handle.await.unwrap().unwrap();
            assert!(path.ends_with("shared.png"));
        }

        let mut entries = std::fs::read_dir(cache.root()).unwrap();
        let only = entries.next().unwrap().unwrap();
        assert_eq!(only.file_name(), "shared.png");
        assert!(entries.next().is_none(), "temp files must be cleaned up");
    }

    #[tokio::test]
    async fn test_concurrent_puts_with_different_types_keep_one_file() {
        let (_dir, cache) = cache();
        let cache = Arc::new(cache);

        let jpeg = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.put("k", b"AAAA", Some("image/jpeg")).await })
        };
        let png = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.put("k", b"BBBB", Some("image/png")).await })
        };

        let jpeg_path = jpeg.await.unwrap().unwrap();
        let png_path = png.await.unwrap().unwrap();
        assert_eq!(jpeg_path, png_path);

        let files: Vec<_> = std::fs::read_dir(cache.root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 1, "one file per key, got {:?}", files);

        let stored = cache.get("k").await.unwrap();
        assert_eq!(stored.path, jpeg_path);
        assert!(stored.bytes == b"AAAA" || stored.bytes == b"BBBB");
    }

    #[tokio::test]
    async fn test_put_waits_for_lock_holder() {
        let (_dir, cache) = cache();
        cache.ensure_root().await.unwrap();

        // Another writer holds the lock, stores its copy, then releases it
        let lock_path = cache.root().join(".held.lock");
        std::fs::write(&lock_path, b"").unwrap();

        let release = {
            let lock_path = lock_path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                tokio::fs::remove_file(lock_path).await.unwrap();
            })
        };

        let writer = {
            let root = cache.root().to_path_buf();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                std::fs::write(root.join("held.gif"), b"first").unwrap();
            })
        };

        let path = cache.put("held", b"second", Some("image/png")).await.unwrap();
        release.await.unwrap();
        writer.await.unwrap();

        assert!(path.ends_with("held.gif"));
        assert_eq!(cache.get("held").await.unwrap().bytes, b"first");
        assert!(!lock_path.exists());
    }

    #[tokio::test]
    async fn test_find_local_by_relative_path() {
        let (_dir, cache) = cache();
        let stored = cache.put("abc", b"x", Some("image/gif")).await.unwrap();

        assert_eq!(MediaCache::relative_path(&stored), "media/abc.gif");
        assert_eq!(cache.find_local("media/abc.gif").await, Some(stored.clone()));
        assert_eq!(cache.find_local("/storage/media/abc.gif").await, Some(stored));
        assert!(cache.find_local("media/missing.png").await.is_none());
        assert!(cache.find_local("media/..").await.is_none());
    }
}
