/*!
 * # Authentication
 *
 * Tokens are issued elsewhere. This module only verifies HS256 bearer tokens and turns their
 * claims into an [`AuthenticatedUser`], which handlers take as an extractor and check against
 * the roles a route allows.
 */

use crate::{entities::UserRole, errors::ServiceError, services::Buyer, AppState};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub exp: i64,
}

/// Caller identity extracted from the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn require_any(&self, roles: &[UserRole]) -> Result<(), ServiceError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "role '{}' may not access this resource",
                self.role
            )))
        }
    }

    pub fn as_buyer(&self) -> Buyer {
        Buyer {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    fn from_claims(claims: Claims) -> Result<Self, ServiceError> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("token subject is not a user id".to_string()))?;
        let role = UserRole::from_str(&claims.role)
            .map_err(|_| ServiceError::Unauthorized(format!("unknown role '{}'", claims.role)))?;
        Ok(Self {
            id,
            name: claims.name,
            email: claims.email,
            role,
        })
    }
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ServiceError::Unauthorized("token expired".to_string())
        }
        _ => ServiceError::Unauthorized("invalid token".to_string()),
    })
}

/// Signs a token for `user`. Used by tooling and tests; production tokens come from the
/// identity service.
pub fn encode_token(
    user: &AuthenticatedUser,
    secret: &str,
    ttl: Duration,
) -> Result<String, ServiceError> {
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role.to_string(),
        exp: (Utc::now() + ttl).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {}", e)))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;
        let claims = decode_token(token, &state.config.jwt_secret)?;
        let user = Self::from_claims(claims)?;
        debug!(user_id = %user.id, role = %user.role, "Authenticated request");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str = "a-test-secret-that-is-long-enough-1234";

    fn user(role: UserRole) -> AuthenticatedUser {
        AuthenticatedUser {
            id: Uuid::new_v4(),
            name: "Mona".into(),
            email: "mona@example.com".into(),
            role,
        }
    }

    #[test]
    fn token_round_trips_identity() {
        let original = user(UserRole::Seller);
        let token = encode_token(&original, SECRET, Duration::minutes(5)).unwrap();
        let decoded = AuthenticatedUser::from_claims(decode_token(&token, SECRET).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn expired_and_foreign_tokens_are_unauthorized() {
        let expired = encode_token(&user(UserRole::User), SECRET, Duration::minutes(-10)).unwrap();
        assert_matches!(decode_token(&expired, SECRET), Err(ServiceError::Unauthorized(_)));

        let token = encode_token(&user(UserRole::User), SECRET, Duration::minutes(5)).unwrap();
        assert_matches!(
            decode_token(&token, "some-other-secret-of-sufficient-length"),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[rstest::rstest]
    #[case(UserRole::User, &[UserRole::User, UserRole::Admin], true)]
    #[case(UserRole::Admin, &[UserRole::User, UserRole::Admin], true)]
    #[case(UserRole::Seller, &[UserRole::User, UserRole::Admin], false)]
    #[case(UserRole::Seller, &[UserRole::Seller, UserRole::Admin], true)]
    #[case(UserRole::User, &[UserRole::Admin], false)]
    fn role_gate(#[case] role: UserRole, #[case] allowed: &[UserRole], #[case] permitted: bool) {
        let result = user(role).require_any(allowed);
        if permitted {
            assert!(result.is_ok());
        } else {
            assert_matches!(result, Err(ServiceError::Forbidden(_)));
        }
    }
}
