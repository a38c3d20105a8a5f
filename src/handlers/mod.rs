pub mod asset_handlers;
pub mod gallery_handlers;
pub mod health_handlers;
pub mod profile_handlers;
