//! JWT issuing and verification (HS256)
//!
//! Access tokens authenticate API calls; refresh tokens are only accepted by
//! the refresh endpoint. Both carry the theater the user belongs to, so every
//! query can be scoped without an extra lookup.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::Role;
use crate::{Error, Result};

/// Token purpose, carried in the `kind` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub theater_id: i64,
    pub role: Role,
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Signing material plus issuer
#[derive(Clone)]
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtKeys {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a signed token valid for `ttl`
    pub fn issue(
        &self,
        user_id: i64,
        theater_id: i64,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            theater_id,
            role,
            kind,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to encode token: {}", e)))
    }

    /// Decode and validate a token of the expected kind
    ///
    /// Rejects bad signatures, a foreign issuer, expired tokens and tokens of
    /// the other kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| Error::Unauthorized(format!("Invalid token: {}", e)))?;

        if data.claims.kind != expected {
            return Err(Error::Unauthorized("Wrong token type".to_string()));
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-of-sufficient-length";

    #[test]
    fn test_issue_and_verify_access() {
        let keys = JwtKeys::new(SECRET, "stagehand");
        let token = keys
            .issue(7, 3, Role::Staff, TokenKind::Access, Duration::minutes(5))
            .unwrap();
        let claims = keys.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.theater_id, 3);
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.iss, "stagehand");
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let keys = JwtKeys::new(SECRET, "stagehand");
        let token = keys
            .issue(1, 1, Role::Admin, TokenKind::Refresh, Duration::days(1))
            .unwrap();
        assert!(keys.verify(&token, TokenKind::Access).is_err());
        assert!(keys.verify(&token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = JwtKeys::new(SECRET, "stagehand");
        let token = keys
            .issue(1, 1, Role::Admin, TokenKind::Access, Duration::minutes(-5))
            .unwrap();
        let err = keys.verify(&token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let keys = JwtKeys::new(SECRET, "stagehand");
        let other = JwtKeys::new("another-secret-of-enough-length", "stagehand");
        let token = keys
            .issue(1, 1, Role::Viewer, TokenKind::Access, Duration::minutes(5))
            .unwrap();
        assert!(other.verify(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let keys = JwtKeys::new(SECRET, "stagehand");
        let foreign = JwtKeys::new(SECRET, "someone-else");
        let token = foreign
            .issue(1, 1, Role::Viewer, TokenKind::Access, Duration::minutes(5))
            .unwrap();
        assert!(keys.verify(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let keys = JwtKeys::new(SECRET, "stagehand");
        assert!(keys.verify("not.a.token", TokenKind::Access).is_err());
    }
}
