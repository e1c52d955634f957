//! Access and refresh token issuance.
//!
//! Both token kinds are HS256 JWTs signed with separate secrets, so a
//! leaked access secret cannot be used to forge refresh tokens and vice
//! versa. Verification is stateless: there is no revocation list and
//! refresh tokens are not rotated on use, so a stolen refresh token stays
//! valid until its natural expiry.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TokenConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub kind: TokenKind,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("Token is not a {0:?} token")]
    WrongKind(TokenKind),
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

struct KeySet {
    decoding: DecodingKey,
    encoding: EncodingKey,
    ttl_seconds: i64,
}

impl KeySet {
    fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }
}

/// Mints and verifies access/refresh token pairs.
pub struct TokenIssuer {
    access: KeySet,
    refresh: KeySet,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access: KeySet::new(&config.access_secret, config.access_ttl_seconds),
            refresh: KeySet::new(&config.refresh_secret, config.refresh_ttl_seconds),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeySet {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue(&self, user_id: &str, kind: TokenKind) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + keys.ttl_seconds,
            kind,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenKind::Access)?,
            refresh: self.issue(user_id, TokenKind::Refresh)?,
        })
    }

    /// Verify a token against the secret for `kind`.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(
            token,
            &self.keys(kind).decoding,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed(e.to_string()),
        })?;

        if data.claims.kind != kind {
            return Err(TokenError::WrongKind(kind));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_config;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&test_config().tokens)
    }

    #[test]
    fn test_issue_pair_and_verify() {
        let issuer = issuer();
        let pair = issuer.issue_pair("user-1").unwrap();

        let access = issuer.verify(&pair.access, TokenKind::Access).unwrap();
        assert_eq!(access.sub, "user-1");
        assert_eq!(access.exp - access.iat, 30 * 60);

        let refresh = issuer.verify(&pair.refresh, TokenKind::Refresh).unwrap();
        assert_eq!(refresh.sub, "user-1");
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_secrets_are_not_interchangeable() {
        let issuer = issuer();
        let pair = issuer.issue_pair("user-1").unwrap();

        assert_eq!(
            issuer.verify(&pair.access, TokenKind::Refresh).unwrap_err(),
            TokenError::InvalidSignature
        );
        assert_eq!(
            issuer.verify(&pair.refresh, TokenKind::Access).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_expired_token() {
        let mut tokens = test_config().tokens;
        // Past the default 60s validation leeway
        tokens.access_ttl_seconds = -120;
        let issuer = TokenIssuer::new(&tokens);

        let token = issuer.issue("user-1", TokenKind::Access).unwrap();
        assert_eq!(
            issuer.verify(&token, TokenKind::Access).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_garbage_token() {
        let err = issuer().verify("not-a-jwt", TokenKind::Access).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }
}
