use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::user::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // email
    pub uid: i32,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

/// Every decoding failure (bad signature, expired, malformed, wrong claims)
/// collapses into this one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid token")]
pub struct InvalidToken;

pub fn create_jwt(
    user_id: i32,
    email: &str,
    role: UserRole,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: email.to_string(),
        uid: user_id,
        role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, InvalidToken> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_create_and_verify_token() {
        let token = create_jwt(42, "ada@example.com", UserRole::Teacher, SECRET, 24).unwrap();
        let claims = verify_jwt(&token, SECRET).unwrap();

        assert_eq!(claims.uid, 42);
        assert_eq!(claims.sub, "ada@example.com");
        assert_eq!(claims.role, UserRole::Teacher);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = create_jwt(1, "a@b.c", UserRole::Student, SECRET, 1).unwrap();
        assert_eq!(verify_jwt(&token, "other-secret").unwrap_err(), InvalidToken);
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let token = create_jwt(1, "a@b.c", UserRole::Student, SECRET, -1).unwrap();
        assert!(verify_jwt(&token, SECRET).is_err());
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(verify_jwt("invalid.token.here", SECRET).is_err());
        assert!(verify_jwt("", SECRET).is_err());
        assert!(verify_jwt("abc", SECRET).is_err());
    }
}
