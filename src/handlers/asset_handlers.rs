//! Serves payloads of the local object store.
//!
//! References produced by `LocalObjectStore` point at
//! `/upload/v<version>/<public_id>.<ext>`; this handler resolves them back to
//! the stored file and streams it without buffering. Only raster image
//! extensions are served, always with `nosniff` and a sandboxing CSP.

use crate::{
    errors::AppError,
    services::{
        local_store::LocalObjectStore,
        object_store::{
            ObjectStoreError, UPLOAD_MARKER, content_type_for_extension, public_id_from_reference,
        },
    },
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

/// GET `/upload/{*path}`
pub async fn get_asset(
    State(store): State<Arc<LocalObjectStore>>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let content_type = path
        .rsplit_once('.')
        .and_then(|(_, ext)| content_type_for_extension(ext))
        .ok_or_else(|| AppError::not_found("asset not found"))?;
    let reference = format!("{}{}", UPLOAD_MARKER, path);
    let public_id = public_id_from_reference(&reference)
        .ok_or_else(|| AppError::not_found("asset not found"))?;

    let file = store.open(&public_id).await.map_err(|err| match err {
        ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidIdentifier(_) => {
            AppError::not_found("asset not found")
        }
        other => AppError::internal(other.to_string()),
    })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("sandbox; default-src 'none'"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    Ok(response)
}
