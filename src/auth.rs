use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::routes::ApiError;

/// Authenticated caller, established from a verified bearer token.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Stable identifier issued by the identity provider (`sub` claim).
    pub id: String,
    /// Group claims, carried for audit logging. Authorization scoping uses
    /// only the stable identifier, never mutable claims.
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    groups: Vec<String>,
}

/// Verifier for identity-provider bearer tokens (HS256 shared secret).
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(Principal {
            id: data.claims.sub,
            groups: data.claims.groups,
        })
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("malformed authorization header".to_string()))?;

        state.auth.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "token verification failed");
            ApiError::Unauthorized("invalid bearer token".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        groups: Vec<String>,
        exp: i64,
    }

    fn token(secret: &str, sub: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub: sub.to_string(),
                groups: vec!["uploaders".to_string()],
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn verifies_valid_token() {
        let verifier = TokenVerifier::new("s3cret");
        let principal = verifier.verify(&token("s3cret", "u1", far_future())).unwrap();
        assert_eq!(principal.id, "u1");
        assert_eq!(principal.groups, vec!["uploaders".to_string()]);
    }

    #[test]
    fn rejects_wrong_secret() {
        let verifier = TokenVerifier::new("s3cret");
        assert!(verifier
            .verify(&token("other-secret", "u1", far_future()))
            .is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = TokenVerifier::new("s3cret");
        let expired = chrono::Utc::now().timestamp() - 3600;
        assert!(verifier.verify(&token("s3cret", "u1", expired)).is_err());
    }
}
