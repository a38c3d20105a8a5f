//! Object store capability used by the gallery engine.
//!
//! A store accepts bytes under a namespace and hands back a stable,
//! URL-shaped reference of the form
//!
//! ```text
//! <base>/upload/v<version>/<namespace>/<name>.<ext>
//! ```
//!
//! Deletion takes the store's *public id* (`<namespace>/<name>`). The gallery
//! only persists references, so the public id is re-derived from the
//! reference with [`public_id_from_reference`] when an item is deleted.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;

/// Path marker preceding the version segment in every reference.
pub const UPLOAD_MARKER: &str = "/upload/";

const DEFAULT_EXTENSION: &str = "png";

/// An in-memory upload waiting to be written to the store.
#[derive(Debug, Clone)]
pub struct Asset {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl Asset {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
            file_name: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// File extension for the stored object.
    ///
    /// Taken from the content type when it is a known image type, then from
    /// the client file name when that names a known image type, falling back
    /// to `png`.
    pub fn extension(&self) -> String {
        if let Some(ext) = self
            .content_type
            .as_deref()
            .and_then(extension_for_content_type)
        {
            return ext.to_string();
        }

        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| content_type_for_extension(ext).is_some())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Stable reference persisted in the metadata store.
    pub reference: String,
    /// Identifier accepted by [`ObjectStore::delete`].
    pub public_id: String,
}

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object identifier `{0}`")]
    InvalidIdentifier(String),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Blob storage with no query or transaction support.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `asset` under `namespace` and return its reference.
    async fn upload(&self, namespace: &str, asset: Asset) -> Result<StoredObject, ObjectStoreError>;

    /// Remove the object identified by `public_id`.
    async fn delete(&self, public_id: &str) -> Result<(), ObjectStoreError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), ObjectStoreError> {
        Ok(())
    }
}

/// Per-owner namespace for uploaded assets.
pub fn owner_namespace(owner_id: i64) -> String {
    format!("gallery/user_{}", owner_id)
}

/// Derive the deletable public id from a stored reference.
///
/// Takes the path after [`UPLOAD_MARKER`], drops a leading `v<digits>`
/// version segment, and strips the file extension. Returns `None` when the
/// reference carries no marker or nothing remains.
pub fn public_id_from_reference(reference: &str) -> Option<String> {
    let start = reference.find(UPLOAD_MARKER)? + UPLOAD_MARKER.len();
    let mut path = &reference[start..];

    if let Some(cut) = path.find(|c| c == '?' || c == '#') {
        path = &path[..cut];
    }

    if let Some((first, rest)) = path.split_once('/') {
        if is_version_segment(first) {
            path = rest;
        }
    }

    let file_start = path.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    if let Some(dot) = path[file_start..].rfind('.') {
        path = &path[..file_start + dot];
    }

    if path.is_empty() || path.ends_with('/') {
        None
    } else {
        Some(path.to_string())
    }
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Content type served for a stored extension.
///
/// Only raster image types are known; scriptable formats such as SVG are
/// neither stored under their own extension nor served.
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
