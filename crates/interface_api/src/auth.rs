//! Authentication and authorization
//!
//! Bearer tokens are HS256 JWTs. Staff and admins manage every invoice; a
//! client token carries the client's id as its subject and may only read
//! that client's invoices.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::ClientId;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID, or client ID for client tokens)
    pub sub: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Returns true if the token holds `role`; admin holds every role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role || r == roles::ADMIN)
    }

    pub fn is_staff(&self) -> bool {
        self.has_role(roles::STAFF)
    }

    /// The client this token speaks for, if it is a client token
    pub fn client_id(&self) -> Option<ClientId> {
        if !self.roles.iter().any(|r| r == roles::CLIENT) {
            return None;
        }
        self.sub.parse().ok()
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing role: {0}")]
    MissingRole(&'static str),
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `subject` - User identifier, or the client id for client tokens
/// * `roles` - Roles granted by the token
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    subject: &str,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let validity = i64::try_from(expiration_secs).map_err(|_| AuthError::InvalidToken)?;
    let exp = now + Duration::seconds(validity);

    let claims = Claims {
        sub: subject.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token and returns its claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Role names carried in tokens
pub mod roles {
    pub const STAFF: &str = "staff";
    pub const ADMIN: &str = "admin";
    pub const CLIENT: &str = "client";
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let token = create_token("alice", vec![roles::STAFF.into()], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.is_staff());
        assert_eq!(claims.client_id(), None);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token("alice", vec![roles::STAFF.into()], SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_admin_is_staff() {
        let claims = Claims {
            sub: "root".into(),
            roles: vec![roles::ADMIN.into()],
            exp: 0,
            iat: 0,
        };
        assert!(claims.is_staff());
    }

    #[test]
    fn test_client_token_names_client() {
        let client_id = ClientId::new_v7();
        let claims = Claims {
            sub: client_id.to_string(),
            roles: vec![roles::CLIENT.into()],
            exp: 0,
            iat: 0,
        };
        assert!(!claims.is_staff());
        assert_eq!(claims.client_id(), Some(client_id));
    }
}
