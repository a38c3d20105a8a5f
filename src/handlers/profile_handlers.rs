use crate::models::ClaimSet;
use axum::{Extension, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProfileResp {
    pub id: Option<i64>,
    pub email: String,
}

/// GET `/profile`: identity of the bearer, straight from the verified claims.
pub async fn get_profile(Extension(claims): Extension<ClaimSet>) -> Json<ProfileResp> {
    Json(ProfileResp {
        id: claims.subject_id,
        email: claims.email,
    })
}
