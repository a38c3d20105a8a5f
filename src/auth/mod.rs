//! Stateless bearer-token authentication.

pub mod middleware;
pub mod token;

pub use middleware::require_bearer;
pub use token::{AuthError, TokenVerifier};
