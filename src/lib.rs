//! Per-user drawing gallery backend.
//!
//! Clients authenticate with HS256 bearer tokens and manage an ordered
//! collection of drawings. Item rows live in SQLite; image payloads live in
//! an object store reached through the [`services::object_store::ObjectStore`]
//! trait.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use auth::{AuthError, TokenVerifier};
pub use models::{ClaimSet, GalleryItem};
pub use services::gallery_service::{GalleryError, GalleryService};
pub use state::AppState;
