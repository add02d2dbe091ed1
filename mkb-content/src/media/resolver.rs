//! Media reference resolution
//!
//! Turns an upstream image reference (opaque id, absolute URL or local path)
//! into a file in the [`MediaCache`]. Content already cached is never fetched
//! again. Resolution failure is a value ([`Resolution::Unresolved`]), not an
//! error: callers always have a fallback (omit media, or pass a URL through).

use super::cache::{content_type_for_path, MediaCache, CANDIDATE_EXTENSIONS};
use crate::clients::GenerativeClient;
use mkb_common::config::MEDIA_DIR;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extensions tried against the secondary storage, in order
pub const STORAGE_CANDIDATE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Route under which generated images are downloaded (upstream) and served (here)
pub const GENERATION_IMAGE_ROUTE: &str = "/api/v1/marketing/generation/image";

/// Classified media reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    /// Identifier assigned by the generator
    Id(String),
    /// Absolute http(s) URL
    Url(String),
    /// Path into local storage (`media/abc.png`, `/storage/media/abc.png`)
    /// or a bare stored file name (`abc.png`)
    LocalPath(String),
}

impl MediaReference {
    /// Classify a raw reference; blank input yields None
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        let lowered = reference.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Some(MediaReference::Url(reference.to_string()))
        } else if reference.contains('/')
            || reference.contains('\\')
            || has_image_extension(reference)
        {
            Some(MediaReference::LocalPath(reference.replace('\\', "/")))
        } else {
            Some(MediaReference::Id(reference.to_string()))
        }
    }
}

/// A resolved file in the media cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMedia {
    pub key: String,
    pub path: PathBuf,
    pub content_type: String,
}

impl LocalMedia {
    fn from_path(key: &str, path: PathBuf) -> Self {
        Self {
            key: key.to_string(),
            content_type: content_type_for_path(&path),
            path,
        }
    }

    /// Stored file name, `{key}.{ext}`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.key.clone())
    }

    /// Path recorded on posts, relative to the root folder
    pub fn relative_path(&self) -> String {
        MediaCache::relative_path(&self.path)
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// Outcome of resolving a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Local(LocalMedia),
    Unresolved { reference: String, reason: String },
}

impl Resolution {
    fn unresolved(reference: &str, reason: impl Into<String>) -> Self {
        Resolution::Unresolved {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }

    pub fn local(&self) -> Option<&LocalMedia> {
        match self {
            Resolution::Local(media) => Some(media),
            Resolution::Unresolved { .. } => None,
        }
    }

    pub fn into_local(self) -> Option<LocalMedia> {
        match self {
            Resolution::Local(media) => Some(media),
            Resolution::Unresolved { .. } => None,
        }
    }
}

/// Resolves media references into the local cache
#[derive(Debug, Clone)]
pub struct MediaResolver {
    cache: MediaCache,
    client: GenerativeClient,
    public_base_url: String,
}

impl MediaResolver {
    pub fn new(cache: MediaCache, client: GenerativeClient, public_base_url: &str) -> Self {
        Self {
            cache,
            client,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    /// Resolve any reference to a local file
    pub async fn resolve(&self, reference: &str) -> Resolution {
        match MediaReference::parse(reference) {
            Some(MediaReference::Id(id)) => self.resolve_id(&id).await,
            Some(MediaReference::Url(url)) => self.resolve_url(&url).await,
            Some(MediaReference::LocalPath(path)) => self.resolve_local(&path).await,
            None => Resolution::unresolved(reference, "empty media reference"),
        }
    }

    /// Resolve a generator-assigned id
    ///
    /// Order: cache, primary download endpoint, then the secondary storage
    /// tried per extension. The first success is cached under the id.
    pub async fn resolve_id(&self, id: &str) -> Resolution {
        if MediaCache::validate_key(id).is_err() {
            return Resolution::unresolved(id, "invalid media id");
        }

        match self.cache.locate(id).await {
            Ok(Some(path)) => {
                debug!(key = %id, "Media cache hit");
                return Resolution::Local(LocalMedia::from_path(id, path));
            }
            Ok(None) => {}
            Err(e) => return Resolution::unresolved(id, e.to_string()),
        }

        let fetched = match self.client.download_image(id).await {
            Ok(media) => Some(media),
            Err(e) => {
                debug!(key = %id, error = %e, "Primary image download failed, probing storage");
                self.search_storage(id).await
            }
        };

        let Some(media) = fetched else {
            warn!(key = %id, "Generated image not found upstream");
            return Resolution::unresolved(id, "image not available from generator or storage");
        };

        self.store(id, id, &media.bytes, media.content_type.as_deref())
            .await
    }

    async fn search_storage(&self, id: &str) -> Option<crate::clients::FetchedMedia> {
        for ext in STORAGE_CANDIDATE_EXTENSIONS {
            match self.client.fetch_stored_image(id, ext).await {
                Ok(media) => {
                    debug!(key = %id, ext = %ext, "Found image in secondary storage");
                    return Some(media);
                }
                Err(e) => debug!(key = %id, ext = %ext, error = %e, "Storage lookup missed"),
            }
        }
        None
    }

    async fn resolve_url(&self, url: &str) -> Resolution {
        if let Some(id) = id_from_generation_url(url) {
            let resolution = self.resolve_id(&id).await;
            if resolution.local().is_some() || self.is_primary_download(url, &id) {
                return resolution;
            }

            // Same route shape on another host: the URL itself may still serve it
            debug!(key = %id, reference = %url, "Id lookup missed, fetching URL directly");
            return match self.client.fetch_url(url).await {
                Ok(media) => {
                    self.store(url, &id, &media.bytes, media.content_type.as_deref())
                        .await
                }
                Err(e) => {
                    warn!(reference = %url, error = %e, "Remote image download failed");
                    Resolution::unresolved(url, e.to_string())
                }
            };
        }

        let key = url_key(url);
        match self.cache.locate(&key).await {
            Ok(Some(path)) => {
                debug!(key = %key, "Media cache hit for URL");
                return Resolution::Local(LocalMedia::from_path(&key, path));
            }
            Ok(None) => {}
            Err(e) => return Resolution::unresolved(url, e.to_string()),
        }

        match self.client.fetch_url(url).await {
            Ok(media) => {
                self.store(url, &key, &media.bytes, media.content_type.as_deref())
                    .await
            }
            Err(e) => {
                warn!(reference = %url, error = %e, "Remote image download failed");
                Resolution::unresolved(url, e.to_string())
            }
        }
    }

    /// Whether `url` is the download URL `resolve_id` already tried
    fn is_primary_download(&self, url: &str, id: &str) -> bool {
        url.trim().trim_end_matches('/') == self.client.image_url(id)
    }

    async fn resolve_local(&self, path: &str) -> Resolution {
        if let Some(found) = self.cache.find_local(path).await {
            let key = file_stem(&found).unwrap_or_default();
            return Resolution::Local(LocalMedia::from_path(&key, found));
        }

        // Cache files are named `{id}.{ext}`, so the stem doubles as an id
        match file_stem(Path::new(path)) {
            Some(stem) if MediaCache::validate_key(&stem).is_ok() => self.resolve_id(&stem).await,
            _ => Resolution::unresolved(path, "local media not found"),
        }
    }

    async fn store(
        &self,
        reference: &str,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Resolution {
        match self.cache.put(key, bytes, content_type).await {
            Ok(path) => Resolution::Local(LocalMedia::from_path(key, path)),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to cache media");
                Resolution::unresolved(reference, e.to_string())
            }
        }
    }

    /// URL under which this service serves a cached key
    pub fn preview_url(&self, key: &str) -> String {
        format!("{}{}/{}", self.public_base_url, GENERATION_IMAGE_ROUTE, key)
    }

    /// Best-effort public URL for a stored reference
    pub fn public_url(&self, reference: &str) -> String {
        match MediaReference::parse(reference) {
            Some(MediaReference::Url(url)) => url,
            Some(MediaReference::Id(id)) => self.preview_url(&id),
            Some(MediaReference::LocalPath(path)) if !path.contains('/') => {
                format!("{}/storage/{}/{}", self.public_base_url, MEDIA_DIR, path)
            }
            Some(MediaReference::LocalPath(path)) => {
                let path = path.trim_start_matches('/');
                let path = path.strip_prefix("storage/").unwrap_or(path);
                format!("{}/storage/{}", self.public_base_url, path)
            }
            None => reference.to_string(),
        }
    }
}

/// Cache key for a URL: lowercase hex SHA-256 of the URL text
pub fn url_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// Extract `{id}` from any URL whose path ends in `/generation/image/{id}`
///
/// The id is tried against the configured generator first; other hosts are
/// then fetched directly and cached under the same id.
pub fn id_from_generation_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [.., "generation", "image", id] if MediaCache::validate_key(id).is_ok() => {
            Some((*id).to_string())
        }
        _ => None,
    }
}

/// File name ending in one of the cache's image extensions
fn has_image_extension(reference: &str) -> bool {
    Path::new(reference)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| CANDIDATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}
