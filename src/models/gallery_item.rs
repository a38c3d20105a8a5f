//! Represents one uploaded drawing in a user's gallery.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A single gallery entry.
///
/// The row stores references into the object store, not the image bytes.
/// JSON field names follow the web client (`image_url`, `uploaded_at`).
#[derive(Serialize, Clone, FromRow, Debug, PartialEq)]
pub struct GalleryItem {
    /// Store-assigned row id.
    pub id: i64,

    /// Owning user; never exposed on the wire.
    #[serde(skip_serializing)]
    pub owner_id: i64,

    /// Reference to the viewable asset.
    #[serde(rename = "image_url")]
    pub display_url: String,

    /// Reference to the editable source asset, if one was uploaded.
    pub edit_url: Option<String>,

    /// User-editable display name.
    pub title: Option<String>,

    /// Position within the owner's collection.
    pub order_index: i64,

    #[serde(rename = "uploaded_at")]
    pub created_at: DateTime<Utc>,
}
