//! Axum middleware guarding the gallery routes.
//!
//! The gate extracts the `Authorization` header, verifies it, and either
//! short-circuits with 401 or stores the [`ClaimSet`] in the request
//! extensions for handlers to take via `Extension<ClaimSet>`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

use super::token::{AuthError, TokenVerifier};
use crate::models::ClaimSet;

/// Reject requests without a valid bearer token.
pub async fn require_bearer(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = authenticate(&verifier, &request)?;
    debug!(subject_id = ?claims.subject_id, "bearer token accepted");

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn authenticate(verifier: &TokenVerifier, request: &Request) -> Result<ClaimSet, AuthError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::MalformedPrefix)?;

    verifier.verify(value)
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        let code = self.code();

        // Forged or substituted tokens are worth a warning; expiry is routine.
        match &self {
            AuthError::SignatureMismatch | AuthError::WrongAlgorithm(_) => {
                warn!(error_type = code, "authentication failed: {}", self);
            }
            _ => debug!(error_type = code, "authentication failed: {}", self),
        }

        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
