use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::{AdminState, ApiErr};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Operator name; recorded as the author of imported records
    pub sub: String,
    /// Unix timestamp expiry
    pub exp: u64,
}

impl Claims {
    pub fn for_operator(operator: impl Into<String>, valid_hours: u64) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        Self {
            sub: operator.into(),
            exp: now + valid_hours * 3600,
        }
    }
}

pub fn encode_jwt(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

fn extract_bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Extractor: the authenticated operator behind a valid Bearer token.
pub struct Operator(pub Claims);

impl Operator {
    pub fn name(&self) -> &str {
        &self.0.sub
    }
}

impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
    AdminState: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AdminState::from_ref(state);

        let token = extract_bearer(parts)
            .ok_or_else(|| ApiErr::unauthorized("Missing or invalid Authorization header"))?;

        let claims = decode_jwt(token, &state.jwt_secret)
            .map_err(|_| ApiErr::unauthorized("Invalid or expired token"))?;

        Ok(Operator(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-jwt-secret-key-32-chars-pad";

    #[test]
    fn token_round_trips() {
        let token = encode_jwt(&Claims::for_operator("alice", 1), SECRET).unwrap();
        let claims = decode_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = encode_jwt(&Claims::for_operator("alice", 1), SECRET).unwrap();
        assert!(decode_jwt(&token, "another-secret-another-secret-xx").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: "alice".into(),
            exp: 1_000,
        };
        let token = encode_jwt(&claims, SECRET).unwrap();
        assert!(decode_jwt(&token, SECRET).is_err());
    }
}
