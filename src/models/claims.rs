//! Identity claims carried by a verified bearer token.

use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::AuthError;

/// Verified payload of a bearer token.
///
/// Produced only by [`crate::auth::TokenVerifier`]; never persisted. The
/// subject is optional because tokens minted before users were numbered
/// carry only an email, and such tokens must not silently resolve to an owner.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClaimSet {
    /// Numeric user id (`id` on the wire).
    #[serde(
        rename = "id",
        default,
        deserialize_with = "deserialize_subject",
        skip_serializing_if = "Option::is_none"
    )]
    pub subject_id: Option<i64>,

    pub email: String,

    /// Expiry as unix seconds.
    pub exp: i64,
}

impl ClaimSet {
    pub fn new(subject_id: Option<i64>, email: impl Into<String>, exp: i64) -> Self {
        Self {
            subject_id,
            email: email.into(),
            exp,
        }
    }

    /// Resolve the gallery owner for this identity.
    pub fn owner_id(&self) -> Result<i64, AuthError> {
        self.subject_id.ok_or(AuthError::MissingSubject)
    }
}

/// Accepts integral JSON numbers in either integer or float form (`7` or `7.0`).
fn deserialize_subject<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Some(value) = number.as_i64() {
        return Ok(Some(value));
    }

    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() <= i64::MAX as f64 => {
            Ok(Some(value as i64))
        }
        _ => Err(serde::de::Error::custom(format!(
            "subject id `{}` is not an integer",
            number
        ))),
    }
}
