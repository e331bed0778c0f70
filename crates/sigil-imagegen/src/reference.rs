use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::ReferenceImageError,
    types::{ReferenceImage, ReferenceOrigin},
};

/// Stored object resolved from an opaque reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
}

impl Blob {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Resolves opaque reference keys to stored bytes
pub trait BlobResolver: Send + Sync {
    /// Look up a blob; `None` when the key resolves to nothing
    fn resolve(&self, key: &str) -> Option<Blob>;
}

impl BlobResolver for HashMap<String, Blob> {
    fn resolve(&self, key: &str) -> Option<Blob> {
        self.get(key).cloned()
    }
}

/// Blob store backed by a directory; keys are paths relative to the root
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobResolver for DirectoryBlobStore {
    fn resolve(&self, key: &str) -> Option<Blob> {
        let relative = Path::new(key);
        if key.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            tracing::debug!(key, "rejecting blob key outside the storage root");
            return None;
        }

        let path = self.root.join(relative);
        let bytes = std::fs::read(&path).ok()?;

        Some(Blob {
            key: key.to_owned(),
            bytes,
            content_type: mime_type_for(&path).to_owned(),
            filename: path.file_name().map(|name| name.to_string_lossy().into_owned()),
        })
    }
}

/// Mime type for a file, judged by its extension
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Normalizes stored blobs and local files into reference images
#[derive(Clone, Default)]
pub struct ReferenceImageBuilder {
    resolver: Option<Arc<dyn BlobResolver>>,
}

impl ReferenceImageBuilder {
    pub fn new(resolver: Option<Arc<dyn BlobResolver>>) -> Self {
        Self { resolver }
    }

    /// Resolve opaque references, skipping any that resolve to nothing
    pub fn build(&self, refs: &[String]) -> Result<Vec<ReferenceImage>, ReferenceImageError> {
        let Some(resolver) = self.resolver.as_deref() else {
            if !refs.is_empty() {
                tracing::warn!(reference_count = refs.len(), "no blob resolver configured, skipping references");
            }
            return Ok(Vec::new());
        };

        let mut images = Vec::with_capacity(refs.len());

        for key in refs {
            let Some(blob) = resolver.resolve(key) else {
                tracing::debug!(key = %key, "reference resolved to nothing");
                continue;
            };

            if !blob.is_image() {
                return Err(ReferenceImageError::NotAnImage { key: blob.key });
            }

            images.push(ReferenceImage::encode(
                &blob.bytes,
                blob.content_type,
                blob.filename,
                ReferenceOrigin::ExternalStorage,
            ));
        }

        Ok(images)
    }

    /// Read local files, skipping paths that do not exist
    pub fn build_from_paths(&self, paths: &[PathBuf]) -> Result<Vec<ReferenceImage>, ReferenceImageError> {
        let mut images = Vec::with_capacity(paths.len());

        for path in paths {
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "reference path does not exist");
                continue;
            }

            let bytes = std::fs::read(path).map_err(|source| ReferenceImageError::Io {
                path: path.clone(),
                source,
            })?;

            images.push(ReferenceImage::encode(
                &bytes,
                mime_type_for(path),
                path.file_name().map(|name| name.to_string_lossy().into_owned()),
                ReferenceOrigin::LocalFilesystem,
            ));
        }

        Ok(images)
    }
}
