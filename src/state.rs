//! Shared router state.

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::services::gallery_service::GalleryService;

/// State handed to every handler. Holds only shared handles; all durable
/// state lives in the stores behind `gallery`.
#[derive(Clone)]
pub struct AppState {
    pub gallery: GalleryService,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(gallery: GalleryService, verifier: Arc<TokenVerifier>) -> Self {
        Self { gallery, verifier }
    }
}
