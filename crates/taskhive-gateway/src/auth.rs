//! Password hashing, JWT issuance/validation, and the auth middleware.

use axum::extract::State;
use axum::http::StatusCode;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use taskhive_core::error::{Result, TaskHiveError};
use taskhive_core::types::{User, UserRole};

use crate::server::AppState;

/// JWT claims carried in the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub role: String,
    pub exp: usize,
}

/// Hash a password with bcrypt. CPU-bound; call from a blocking thread in
/// async contexts.
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| TaskHiveError::Auth(format!("Hash error: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Issue a signed token for a user.
pub fn create_token(user: &User, secret: &str, ttl_hours: u64) -> Result<String> {
    let exp = chrono::Utc::now() + chrono::Duration::hours(ttl_hours as i64);
    let claims = Claims {
        sub: user.id,
        role: user.role.as_str().to_string(),
        exp: exp.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TaskHiveError::Auth(format!("Token error: {e}")))
}

/// Validate a token and return its claims.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| TaskHiveError::Auth(format!("Invalid token: {e}")))
}

/// The authenticated user, inserted as a request extension by the
/// middleware.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub User);

impl AuthedUser {
    pub fn is_team_lead(&self) -> bool {
        self.0.role == UserRole::TeamLead
    }
}

fn unauthorized() -> axum::response::Response {
    axum::response::Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("Content-Type", "application/json")
        .header("WWW-Authenticate", "Bearer")
        .body(axum::body::Body::from(
            serde_json::json!({"detail": "Invalid or missing access token"}).to_string(),
        ))
        .unwrap()
}

/// Auth middleware — validates `Authorization: Bearer <token>`, re-fetches
/// the user so deleted accounts are rejected, and requires the token role to
/// still match the stored role.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return unauthorized();
    };
    let Ok(claims) = validate_token(token, &state.config.auth.jwt_secret) else {
        return unauthorized();
    };
    let Ok(Some(user)) = state.store.user_by_id(claims.sub) else {
        return unauthorized();
    };
    if user.role.as_str() != claims.role {
        return unauthorized();
    }

    let mut req = req;
    req.extensions_mut().insert(AuthedUser(user));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 42,
            email: "someone@example.com".into(),
            password_hash: String::new(),
            role,
        }
    }

    #[test]
    fn test_password_hash_verify() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("hunter2!", "not-a-hash"));
    }

    #[test]
    fn test_token_round_trip() {
        let u = user(UserRole::TeamLead);
        let token = create_token(&u, "secret", 24).unwrap();
        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "team_lead");
    }

    #[test]
    fn test_token_wrong_secret_rejected() {
        let u = user(UserRole::Developer);
        let token = create_token(&u, "secret", 24).unwrap();
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let u = user(UserRole::Developer);
        let claims = Claims {
            sub: u.id,
            role: u.role.as_str().to_string(),
            exp: (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(validate_token(&token, "secret").is_err());
    }
}
