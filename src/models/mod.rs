//! Core data models for the gallery service.
//!
//! `GalleryItem` maps to the `gallery_items` table via `sqlx::FromRow`;
//! `ClaimSet` is the decoded identity carried by a bearer token.

pub mod claims;
pub mod gallery_item;

pub use claims::ClaimSet;
pub use gallery_item::GalleryItem;
