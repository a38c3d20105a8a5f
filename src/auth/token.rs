//! Bearer token verification.
//!
//! Tokens are compact JWTs signed with HMAC-SHA256:
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(HMAC-SHA256(secret, header "." claims))
//! ```
//!
//! Exactly one algorithm is accepted. A token whose header names any other
//! algorithm (`none`, `HS512`, `RS256`, ...) is rejected before its
//! signature is examined, so a key can never be reinterpreted under a
//! different scheme.
//!
//! Verification is a pure function of the token, the server secret and the
//! current time. Nothing is looked up or stored.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::models::ClaimSet;

type HmacSha256 = Hmac<Sha256>;

/// The only signing algorithm accepted by [`TokenVerifier`].
pub const EXPECTED_ALGORITHM: &str = "HS256";

/// Scheme prefix of the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Why a credential was refused.
///
/// Every variant is reported to clients as 401; the distinction exists for
/// logs and tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,

    #[error("authorization header must use the Bearer scheme")]
    MalformedPrefix,

    #[error("token is not a well-formed JWT")]
    MalformedToken,

    #[error("token algorithm `{0}` is not accepted")]
    WrongAlgorithm(String),

    #[error("token signature does not match")]
    SignatureMismatch,

    #[error("token expired at {expired_at} (current time: {now})")]
    Expired { expired_at: i64, now: i64 },

    #[error("token claims are invalid: {0}")]
    InvalidClaims(String),

    #[error("token does not identify a user")]
    MissingSubject,
}

impl AuthError {
    /// Stable machine-readable code used in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedPrefix => "malformed_prefix",
            AuthError::MalformedToken => "malformed_token",
            AuthError::WrongAlgorithm(_) => "wrong_algorithm",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::Expired { .. } => "token_expired",
            AuthError::InvalidClaims(_) => "invalid_claims",
            AuthError::MissingSubject => "missing_subject",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Verifies (and, for operators and tests, issues) HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &EXPECTED_ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Verify an `Authorization` header value against the current time.
    pub fn verify(&self, credential: &str) -> Result<ClaimSet, AuthError> {
        self.verify_at(credential, Utc::now().timestamp())
    }

    /// Verify an `Authorization` header value as of `now` (unix seconds).
    ///
    /// The token is accepted only while `exp > now`.
    pub fn verify_at(&self, credential: &str, now: i64) -> Result<ClaimSet, AuthError> {
        let token = strip_bearer(credential)?;

        let mut segments = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::MalformedToken);
        };

        let header: TokenHeader = URL_SAFE_NO_PAD
            .decode(header_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(AuthError::MalformedToken)?;

        if header.alg != EXPECTED_ALGORITHM {
            return Err(AuthError::WrongAlgorithm(header.alg));
        }

        let provided = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::SignatureMismatch)?;
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        let expected = self.compute_signature(signing_input);

        if !bool::from(provided.as_slice().ct_eq(expected.as_slice())) {
            return Err(AuthError::SignatureMismatch);
        }

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| AuthError::InvalidClaims("claims segment is not base64url".into()))?;
        let claims: ClaimSet = serde_json::from_slice(&claims_json)
            .map_err(|err| AuthError::InvalidClaims(err.to_string()))?;

        if claims.exp <= now {
            return Err(AuthError::Expired {
                expired_at: claims.exp,
                now,
            });
        }

        Ok(claims)
    }

    /// Sign `claims` into a compact token.
    pub fn issue(&self, claims: &ClaimSet) -> Result<String, serde_json::Error> {
        let header = TokenHeader {
            alg: EXPECTED_ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{}.{}", header_b64, claims_b64);
        let signature = URL_SAFE_NO_PAD.encode(self.compute_signature(&signing_input));

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Issue a token for `subject_id` that expires `ttl` from now.
    pub fn issue_for(
        &self,
        subject_id: i64,
        email: &str,
        ttl: Duration,
    ) -> Result<String, serde_json::Error> {
        let exp = (Utc::now() + ttl).timestamp();
        self.issue(&ClaimSet::new(Some(subject_id), email, exp))
    }

    fn compute_signature(&self, signing_input: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Strip the `Bearer ` scheme and surrounding whitespace from a header value.
pub fn strip_bearer(credential: &str) -> Result<&str, AuthError> {
    let token = credential
        .trim_start()
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::MalformedPrefix)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha512;

    const SECRET: &str = "unit-test-secret";
    const NOW: i64 = 1_700_000_000;

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    fn encode_segment(json: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(json).unwrap())
    }

    #[test]
    fn test_round_trip_accepts_valid_token() {
        let verifier = TokenVerifier::new(SECRET);
        let token = verifier
            .issue(&ClaimSet::new(Some(42), "ada@example.com", NOW + 60))
            .unwrap();

        let claims = verifier.verify_at(&bearer(&token), NOW).unwrap();
        assert_eq!(claims.subject_id, Some(42));
        assert_eq!(claims.email, "ada@example.com");
    }

    #[test]
    fn test_expiry_boundary() {
        let verifier = TokenVerifier::new(SECRET);
        let exp = NOW;
        let token = verifier
            .issue(&ClaimSet::new(Some(1), "a@b.c", exp))
            .unwrap();

        assert!(verifier.verify_at(&bearer(&token), exp - 1).is_ok());
        assert_eq!(
            verifier.verify_at(&bearer(&token), exp + 1),
            Err(AuthError::Expired {
                expired_at: exp,
                now: exp + 1
            })
        );
        // exp must be strictly in the future
        assert!(matches!(
            verifier.verify_at(&bearer(&token), exp),
            Err(AuthError::Expired { .. })
        ));
    }

    #[test]
    fn test_other_hmac_algorithm_rejected_with_same_secret() {
        let header = encode_segment(&serde_json::json!({"alg": "HS512", "typ": "JWT"}));
        let claims =
            encode_segment(&serde_json::json!({"id": 1, "email": "a@b.c", "exp": NOW + 60}));
        let signing_input = format!("{}.{}", header, claims);

        let mut mac = Hmac::<Sha512>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        let token = format!("{}.{}", signing_input, signature);

        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(
            verifier.verify_at(&bearer(&token), NOW),
            Err(AuthError::WrongAlgorithm("HS512".into()))
        );
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let header = encode_segment(&serde_json::json!({"alg": "none"}));
        let claims =
            encode_segment(&serde_json::json!({"id": 1, "email": "a@b.c", "exp": NOW + 60}));
        let token = format!("{}.{}.", header, claims);

        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(
            verifier.verify_at(&bearer(&token), NOW),
            Err(AuthError::WrongAlgorithm("none".into()))
        );
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let token = TokenVerifier::new("someone-else")
            .issue(&ClaimSet::new(Some(1), "a@b.c", NOW + 60))
            .unwrap();

        let result = TokenVerifier::new(SECRET).verify_at(&bearer(&token), NOW);
        assert_eq!(result, Err(AuthError::SignatureMismatch));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        let token = verifier
            .issue(&ClaimSet::new(Some(1), "a@b.c", NOW + 60))
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged =
            encode_segment(&serde_json::json!({"id": 2, "email": "a@b.c", "exp": NOW + 60}));
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

        assert_eq!(
            verifier.verify_at(&bearer(&tampered), NOW),
            Err(AuthError::SignatureMismatch)
        );
    }

    #[test]
    fn test_prefix_and_whitespace_handling() {
        let verifier = TokenVerifier::new(SECRET);
        let token = verifier
            .issue(&ClaimSet::new(Some(5), "a@b.c", NOW + 60))
            .unwrap();

        let padded = format!("  Bearer   {}  ", token);
        assert!(verifier.verify_at(&padded, NOW).is_ok());

        assert_eq!(
            verifier.verify_at(&token, NOW),
            Err(AuthError::MalformedPrefix)
        );
        assert_eq!(
            verifier.verify_at(&format!("Basic {}", token), NOW),
            Err(AuthError::MalformedPrefix)
        );
        assert_eq!(
            verifier.verify_at("Bearer    ", NOW),
            Err(AuthError::MissingCredential)
        );
    }

    #[test]
    fn test_structurally_broken_tokens() {
        let verifier = TokenVerifier::new(SECRET);
        for raw in ["abc", "a.b", "a.b.c.d", "!!!.e30.sig"] {
            assert_eq!(
                verifier.verify_at(&bearer(raw), NOW),
                Err(AuthError::MalformedToken),
                "token {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_signed_but_unparseable_claims() {
        let verifier = TokenVerifier::new(SECRET);
        let header = encode_segment(&serde_json::json!({"alg": "HS256"}));
        let claims = URL_SAFE_NO_PAD.encode(b"not json");
        let signing_input = format!("{}.{}", header, claims);
        let signature = URL_SAFE_NO_PAD.encode(verifier.compute_signature(&signing_input));
        let token = format!("{}.{}", signing_input, signature);

        assert!(matches!(
            verifier.verify_at(&bearer(&token), NOW),
            Err(AuthError::InvalidClaims(_))
        ));
    }

    #[test]
    fn test_token_without_subject_still_verifies() {
        let verifier = TokenVerifier::new(SECRET);
        let token = verifier
            .issue(&ClaimSet::new(None, "legacy@example.com", NOW + 60))
            .unwrap();

        let claims = verifier.verify_at(&bearer(&token), NOW).unwrap();
        assert_eq!(claims.owner_id(), Err(AuthError::MissingSubject));
    }
}
