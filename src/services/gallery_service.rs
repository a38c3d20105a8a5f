//! src/services/gallery_service.rs
//!
//! GalleryService: lifecycle of gallery items kept across two stores:
//! SQLite for item rows and an [`ObjectStore`] for the image payloads.
//!
//! The stores share no transaction, so each operation fixes an order:
//! - create: object store first, metadata row only once every upload succeeded;
//! - delete: metadata row first (the operation of record), object cleanup
//!   afterwards on a best-effort basis.
//!
//! A blob may therefore outlive its row (leaked upload, failed cleanup) but a
//! row never points at an upload that did not complete.

use crate::models::GalleryItem;
use crate::services::object_store::{
    Asset, ObjectStore, ObjectStoreError, StoredObject, owner_namespace, public_id_from_reference,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Multipart field holding the display image.
pub const GALLERY_IMAGE_FIELD: &str = "galleryImage";
/// Multipart field holding the editable source image.
pub const EDIT_IMAGE_FIELD: &str = "editImage";

pub const MAX_TITLE_LEN: usize = 200;

const ITEM_COLUMNS: &str =
    "id, owner_id, display_url, edit_url, title, order_index, created_at";

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("missing required upload field `{0}`")]
    MissingField(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error("gallery item {0} not found")]
    NotFound(i64),
    #[error("gallery item {0} belongs to another user")]
    Forbidden(i64),
    #[error("upload to object store failed: {0}")]
    Upload(ObjectStoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type GalleryResult<T> = Result<T, GalleryError>;

/// Assets received for a new gallery item.
#[derive(Debug, Default, Clone)]
pub struct UploadRequest {
    pub gallery_image: Option<Asset>,
    pub edit_image: Option<Asset>,
    pub title: Option<String>,
}

/// What a completed create hands back to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedItem {
    pub item: GalleryItem,
    pub display: StoredObject,
    pub edit: Option<StoredObject>,
}

/// Outcome of removing one referenced object after its row is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Deleted { public_id: String },
    Skipped,
    Failed { reason: String },
}

/// Result of a delete: the row is gone, cleanup outcomes are informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub item_id: i64,
    pub display: CleanupOutcome,
    pub edit: CleanupOutcome,
}

/// GalleryService provides the gallery operations, each scoped to one owner:
/// - Create an item (dual upload, then one INSERT)
/// - List items in display order
/// - Rename an item
/// - Delete an item (row, then best-effort object cleanup)
/// - Reorder items
///
/// It holds no per-request state and is cheap to clone.
#[derive(Clone)]
pub struct GalleryService {
    /// Shared SQLite connection pool used for item rows.
    pub db: Arc<SqlitePool>,

    /// Blob storage for image payloads.
    pub objects: Arc<dyn ObjectStore>,
}

impl GalleryService {
    pub fn new(db: Arc<SqlitePool>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { db, objects }
    }

    /// Upload the display (and optional edit) asset, then insert the row.
    ///
    /// Both uploads run concurrently and both are awaited. If either fails no
    /// row is written; a sibling that did succeed is left in the store.
    pub async fn create_item(
        &self,
        owner_id: i64,
        request: UploadRequest,
    ) -> GalleryResult<CreatedItem> {
        let display_asset = request
            .gallery_image
            .ok_or(GalleryError::MissingField(GALLERY_IMAGE_FIELD))?;
        if display_asset.bytes.is_empty() {
            return Err(GalleryError::MissingField(GALLERY_IMAGE_FIELD));
        }
        let edit_asset = request.edit_image.filter(|asset| !asset.bytes.is_empty());
        let title = normalize_title(request.title.as_deref())?;

        let namespace = owner_namespace(owner_id);
        let (display_result, edit_result) = match edit_asset {
            Some(edit_asset) => {
                let (display_upload, edit_upload) = tokio::join!(
                    self.objects.upload(&namespace, display_asset),
                    self.objects.upload(&namespace, edit_asset)
                );
                (display_upload, Some(edit_upload))
            }
            None => (self.objects.upload(&namespace, display_asset).await, None),
        };

        let display_obj = match display_result {
            Ok(stored) => stored,
            Err(err) => {
                if let Some(Ok(orphan)) = &edit_result {
                    warn!(
                        owner_id,
                        public_id = %orphan.public_id,
                        "discarding edit upload after display upload failed"
                    );
                }
                return Err(GalleryError::Upload(err));
            }
        };
        let edit_obj = match edit_result.transpose() {
            Ok(edit_obj) => edit_obj,
            Err(err) => {
                warn!(
                    owner_id,
                    public_id = %display_obj.public_id,
                    "discarding display upload after edit upload failed"
                );
                return Err(GalleryError::Upload(err));
            }
        };

        let insert = sqlx::query_as::<_, GalleryItem>(&format!(
            "INSERT INTO gallery_items (owner_id, display_url, edit_url, title, order_index, created_at)
             SELECT ?, ?, ?, ?, COALESCE(MAX(order_index) + 1, 0), ?
             FROM gallery_items WHERE owner_id = ?
             RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(owner_id)
        .bind(&display_obj.reference)
        .bind(edit_obj.as_ref().map(|stored| stored.reference.as_str()))
        .bind(title)
        .bind(Utc::now())
        .bind(owner_id)
        .fetch_one(&*self.db)
        .await;

        match insert {
            Ok(item) => {
                info!(
                    owner_id,
                    item_id = item.id,
                    order_index = item.order_index,
                    "gallery item created"
                );
                Ok(CreatedItem {
                    item,
                    display: display_obj,
                    edit: edit_obj,
                })
            }
            Err(err) => {
                // Nothing references the fresh uploads yet.
                self.remove_object(Some(&display_obj.reference)).await;
                if let Some(stored) = &edit_obj {
                    self.remove_object(Some(&stored.reference)).await;
                }
                Err(GalleryError::Sqlx(err))
            }
        }
    }

    /// All items of `owner_id`, ascending by `order_index` (ties by id).
    pub async fn list_items(&self, owner_id: i64) -> GalleryResult<Vec<GalleryItem>> {
        let items = sqlx::query_as::<_, GalleryItem>(&format!(
            "SELECT {} FROM gallery_items
             WHERE owner_id = ?
             ORDER BY order_index ASC, id ASC",
            ITEM_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await?;

        Ok(items)
    }

    /// Fetch an item and confirm it belongs to `owner_id`.
    ///
    /// Returns NotFound if no row has this id, Forbidden if another user owns it.
    pub async fn fetch_owned(&self, owner_id: i64, item_id: i64) -> GalleryResult<GalleryItem> {
        let item = sqlx::query_as::<_, GalleryItem>(&format!(
            "SELECT {} FROM gallery_items WHERE id = ?",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(GalleryError::NotFound(item_id))?;

        if item.owner_id != owner_id {
            warn!(owner_id, item_id, "rejected access to another user's gallery item");
            return Err(GalleryError::Forbidden(item_id));
        }
        Ok(item)
    }

    /// Set or clear (blank input) the title of an owned item.
    pub async fn rename_item(
        &self,
        owner_id: i64,
        item_id: i64,
        title: &str,
    ) -> GalleryResult<GalleryItem> {
        let title = normalize_title(Some(title))?;
        let mut item = self.fetch_owned(owner_id, item_id).await?;

        let result =
            sqlx::query("UPDATE gallery_items SET title = ? WHERE id = ? AND owner_id = ?")
                .bind(&title)
                .bind(item_id)
                .bind(owner_id)
                .execute(&*self.db)
                .await?;

        // Deleted between the ownership check and the update.
        if result.rows_affected() == 0 {
            return Err(GalleryError::NotFound(item_id));
        }

        item.title = title;
        Ok(item)
    }

    /// Delete an owned item.
    ///
    /// Succeeds once the row is removed; object-store failures are logged and
    /// reported in the [`DeleteReport`] but never returned as errors.
    pub async fn delete_item(&self, owner_id: i64, item_id: i64) -> GalleryResult<DeleteReport> {
        let item = self.fetch_owned(owner_id, item_id).await?;

        let result = sqlx::query("DELETE FROM gallery_items WHERE id = ? AND owner_id = ?")
            .bind(item_id)
            .bind(owner_id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(GalleryError::NotFound(item_id));
        }

        let (display_outcome, edit_outcome) = tokio::join!(
            self.remove_object(Some(&item.display_url)),
            self.remove_object(item.edit_url.as_deref())
        );
        info!(
            owner_id,
            item_id,
            display = ?display_outcome,
            edit = ?edit_outcome,
            "gallery item deleted"
        );

        Ok(DeleteReport {
            item_id,
            display: display_outcome,
            edit: edit_outcome,
        })
    }

    /// Assign `order_index = position` to each listed id owned by `owner_id`.
    ///
    /// Ids of other owners, or unknown ids, match no row and are skipped.
    /// Items not listed keep their index. Statements are not wrapped in a
    /// transaction: a failure aborts, leaving earlier positions applied.
    /// Returns the number of rows updated.
    pub async fn reorder_items(&self, owner_id: i64, order: &[i64]) -> GalleryResult<u64> {
        let mut updated = 0;
        for (position, item_id) in order.iter().enumerate() {
            let result = sqlx::query(
                "UPDATE gallery_items SET order_index = ? WHERE id = ? AND owner_id = ?",
            )
            .bind(position as i64)
            .bind(item_id)
            .bind(owner_id)
            .execute(&*self.db)
            .await?;

            updated += result.rows_affected();
        }

        if updated < order.len() as u64 {
            info!(
                owner_id,
                requested = order.len(),
                updated,
                "reorder skipped ids not owned by caller"
            );
        }
        Ok(updated)
    }

    /// Best-effort removal of the object behind `reference`.
    async fn remove_object(&self, reference: Option<&str>) -> CleanupOutcome {
        let Some(reference) = reference else {
            return CleanupOutcome::Skipped;
        };

        let Some(public_id) = public_id_from_reference(reference) else {
            warn!(%reference, "cannot derive object id from reference; leaving object in place");
            return CleanupOutcome::Failed {
                reason: "unrecognized reference".into(),
            };
        };

        match self.objects.delete(&public_id).await {
            Ok(()) => CleanupOutcome::Deleted { public_id },
            Err(err) => {
                warn!(%public_id, error = %err, "object store delete failed");
                CleanupOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Trim a title; blank becomes `None`.
fn normalize_title(title: Option<&str>) -> GalleryResult<Option<String>> {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(GalleryError::InvalidInput(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(Some(title.to_string()))
}
