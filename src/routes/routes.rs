//! Defines routes for the gallery service.
//!
//! ## Structure
//! - **Public**
//!   - `GET    /healthz`, `GET /readyz`: probes
//!   - `GET    /upload/{*path}`: payloads of the local object store
//!
//! - **Bearer-protected**
//!   - `POST   /gallery/upload`: create item (multipart)
//!   - `GET    /gallery`: list items in display order
//!   - `PATCH  /gallery/rename?id=`: rename item
//!   - `DELETE /gallery/delete?id=`: delete item
//!   - `PATCH  /gallery/reorder`: reassign positions
//!   - `GET    /profile`: claims of the caller

use crate::{
    auth::require_bearer,
    handlers::{
        asset_handlers::get_asset,
        gallery_handlers::{
            delete_drawing, list_drawings, rename_drawing, reorder_drawings, upload_drawing,
        },
        health_handlers::{healthz, readyz},
        profile_handlers::get_profile,
    },
    services::local_store::LocalObjectStore,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, patch, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// HTTP-level knobs that are not part of the handler state.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Upper bound for a whole request body (both images of an upload).
    pub max_upload_bytes: usize,
    /// Browser origin allowed to call the API, if any.
    pub cors_origin: Option<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origin: None,
        }
    }
}

/// Build the API router.
///
/// Gallery and profile routes are wrapped by the bearer gate; handlers behind
/// it find the verified `ClaimSet` in the request extensions.
pub fn routes(state: AppState, options: &HttpOptions) -> Router {
    let protected = Router::new()
        .route("/gallery", get(list_drawings))
        .route(
            "/gallery/upload",
            post(upload_drawing).layer(DefaultBodyLimit::max(options.max_upload_bytes)),
        )
        .route("/gallery/rename", patch(rename_drawing))
        .route("/gallery/delete", delete(delete_drawing))
        .route("/gallery/reorder", patch(reorder_drawings))
        .route("/profile", get(get_profile))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.verifier),
            require_bearer,
        ));

    let mut router = Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if let Some(layer) = options.cors_origin.as_deref().and_then(cors_layer) {
        router = router.layer(layer);
    }
    router
}

/// Routes serving blobs written by the local object store.
pub fn asset_routes(store: Arc<LocalObjectStore>) -> Router {
    Router::new()
        .route("/upload/{*path}", get(get_asset))
        .with_state(store)
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = match HeaderValue::from_str(origin) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("ignoring invalid CORS origin `{}`: {}", origin, err);
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_credentials(true),
    )
}
