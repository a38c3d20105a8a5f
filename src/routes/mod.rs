#[allow(clippy::module_inception)]
pub mod routes;

pub use routes::{HttpOptions, asset_routes, routes};
