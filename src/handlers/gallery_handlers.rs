//! HTTP handlers for gallery operations.
//!
//! Every route here sits behind the bearer gate, which leaves a verified
//! [`ClaimSet`] in the request extensions. Handlers resolve the owner from it
//! and delegate to `GalleryService`.

use crate::{
    errors::AppError,
    models::{ClaimSet, GalleryItem},
    services::{
        gallery_service::{EDIT_IMAGE_FIELD, GALLERY_IMAGE_FIELD, UploadRequest},
        object_store::Asset,
    },
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{
        Multipart, Query, State,
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Optional multipart text field carrying the initial title.
pub const TITLE_FIELD: &str = "title";

/// `?id=<id>` on rename and delete.
#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub id: Option<String>,
}

impl ItemQuery {
    fn item_id(&self) -> Result<i64, AppError> {
        let raw = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| AppError::bad_request("Missing drawing ID"))?;

        raw.parse::<i64>()
            .map_err(|_| AppError::bad_request(format!("Invalid drawing ID `{}`", raw)))
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameReq {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderReq {
    pub order: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResp {
    pub id: i64,
    pub image_url: String,
    pub edit_url: Option<String>,
    pub order_index: i64,
}

#[derive(Debug, Serialize)]
pub struct ReorderResp {
    pub updated: u64,
}

/// POST `/gallery/upload`: multipart `galleryImage` (required), `editImage`, `title`.
pub async fn upload_drawing(
    State(state): State<AppState>,
    Extension(claims): Extension<ClaimSet>,
    mut multipart: Multipart,
) -> Result<Json<UploadResp>, AppError> {
    let owner_id = claims.owner_id()?;

    let mut request = UploadRequest::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            GALLERY_IMAGE_FIELD | EDIT_IMAGE_FIELD => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;

                let asset = Asset {
                    bytes,
                    content_type,
                    file_name,
                };
                if name == GALLERY_IMAGE_FIELD {
                    request.gallery_image = Some(asset);
                } else {
                    request.edit_image = Some(asset);
                }
            }
            TITLE_FIELD => request.title = Some(field.text().await.map_err(multipart_error)?),
            other => debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let created = state.gallery.create_item(owner_id, request).await?;

    Ok(Json(UploadResp {
        id: created.item.id,
        image_url: created.display.reference,
        edit_url: created.edit.map(|stored| stored.reference),
        order_index: created.item.order_index,
    }))
}

/// GET `/gallery`: the caller's items in display order.
pub async fn list_drawings(
    State(state): State<AppState>,
    Extension(claims): Extension<ClaimSet>,
) -> Result<Json<Vec<GalleryItem>>, AppError> {
    let owner_id = claims.owner_id()?;
    let items = state.gallery.list_items(owner_id).await?;
    Ok(Json(items))
}

/// PATCH `/gallery/rename?id=<id>`: body `{ "title": ... }`.
pub async fn rename_drawing(
    State(state): State<AppState>,
    Extension(claims): Extension<ClaimSet>,
    query: Result<Query<ItemQuery>, QueryRejection>,
    payload: Result<Json<RenameReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = claims.owner_id()?;
    let item_id = item_id_from(query)?;
    let Json(payload) = payload.map_err(|err| AppError::bad_request(err.body_text()))?;

    state
        .gallery
        .rename_item(owner_id, item_id, &payload.title)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE `/gallery/delete?id=<id>`.
pub async fn delete_drawing(
    State(state): State<AppState>,
    Extension(claims): Extension<ClaimSet>,
    query: Result<Query<ItemQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = claims.owner_id()?;
    let item_id = item_id_from(query)?;

    state.gallery.delete_item(owner_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH `/gallery/reorder`: body `{ "order": [id, ...] }`.
pub async fn reorder_drawings(
    State(state): State<AppState>,
    Extension(claims): Extension<ClaimSet>,
    payload: Result<Json<ReorderReq>, JsonRejection>,
) -> Result<Json<ReorderResp>, AppError> {
    let owner_id = claims.owner_id()?;
    let Json(payload) = payload.map_err(|err| AppError::bad_request(err.body_text()))?;

    let updated = state
        .gallery
        .reorder_items(owner_id, &payload.order)
        .await?;
    Ok(Json(ReorderResp { updated }))
}

fn item_id_from(query: Result<Query<ItemQuery>, QueryRejection>) -> Result<i64, AppError> {
    let Query(query) = query.map_err(|err| AppError::bad_request(err.body_text()))?;
    query.item_id()
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}
