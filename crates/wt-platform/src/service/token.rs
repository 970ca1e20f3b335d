//! Token Service
//!
//! Stateless HS256 access and refresh tokens. The two kinds use independent
//! secrets and lifetimes, so a token of one kind never verifies as the other.
//! Expiry is checked against the injected clock rather than the system time.

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Role;
use crate::service::Clock;

/// Identity carried by both token kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub id: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn payload(&self) -> TokenPayload {
        TokenPayload {
            id: self.id.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("malformed token")]
    Malformed,

    #[error("invalid token")]
    Invalid,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Keys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

pub struct TokenService {
    access: Keys,
    refresh: Keys,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: TokenConfig, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        Self {
            access: Keys::new(&config.access_secret, config.access_ttl),
            refresh: Keys::new(&config.refresh_secret, config.refresh_ttl),
            validation,
            clock,
        }
    }

    fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue(&self, payload: &TokenPayload, kind: TokenKind) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let now = self.clock.now();
        let exp = now
            .checked_add_signed(keys.ttl)
            .ok_or_else(|| TokenError::Encoding("token lifetime out of range".to_string()))?;
        let claims = TokenClaims {
            id: payload.id.clone(),
            role: payload.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn issue_access_token(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        self.issue(payload, TokenKind::Access)
    }

    pub fn issue_refresh_token(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        self.issue(payload, TokenKind::Refresh)
    }

    pub fn issue_pair(&self, payload: &TokenPayload) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(payload)?,
            refresh_token: self.issue_refresh_token(payload)?,
        })
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        if token.trim().is_empty() {
            return Err(TokenError::Malformed);
        }

        let data = decode::<TokenClaims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::InvalidSignature
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => TokenError::Malformed,
                _ => TokenError::Invalid,
            })?;

        if self.clock.now().timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::FixedClock;
    use chrono::{TimeZone, Utc};

    fn service() -> (TokenService, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        ));
        let config = TokenConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        };
        (TokenService::new(config, clock.clone()), clock)
    }

    fn payload() -> TokenPayload {
        TokenPayload {
            id: "user-1".to_string(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_round_trip() {
        let (tokens, _) = service();
        let token = tokens.issue_access_token(&payload()).unwrap();
        let claims = tokens.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.payload(), payload());
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_expired_after_ttl() {
        let (tokens, clock) = service();
        let token = tokens.issue_access_token(&payload()).unwrap();

        clock.advance(Duration::minutes(15) + Duration::seconds(1));
        assert_eq!(tokens.verify(&token, TokenKind::Access), Err(TokenError::Expired));

        // Refresh tokens live longer
        let refresh = tokens.issue_refresh_token(&payload()).unwrap();
        clock.advance(Duration::days(1));
        assert!(tokens.verify(&refresh, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_kinds_do_not_cross_verify() {
        let (tokens, _) = service();
        let pair = tokens.issue_pair(&payload()).unwrap();
        assert_eq!(
            tokens.verify(&pair.access_token, TokenKind::Refresh),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            tokens.verify(&pair.refresh_token, TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_garbage_and_empty_are_malformed() {
        let (tokens, _) = service();
        assert_eq!(tokens.verify("", TokenKind::Access), Err(TokenError::Malformed));
        assert_eq!(tokens.verify("abc.def", TokenKind::Access), Err(TokenError::Malformed));
        assert_eq!(
            tokens.verify("not-a-token", TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_claims_compare_by_value() {
        let (tokens, _) = service();
        let token = tokens.issue_access_token(&payload()).unwrap();
        let first = tokens.verify(&token, TokenKind::Access);
        assert_eq!(first, tokens.verify(&token, TokenKind::Access));
        assert!(matches!(first, Ok(ref claims) if claims.id == "user-1"));
    }

    #[test]
    fn test_oversized_lifetime_fails_to_issue() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        ));
        let config = TokenConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            access_ttl: Duration::MAX,
            refresh_ttl: Duration::days(7),
        };
        let tokens = TokenService::new(config, clock);
        assert!(matches!(
            tokens.issue_access_token(&payload()),
            Err(TokenError::Encoding(_))
        ));
    }

    #[test]
    fn test_bearer_extraction() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("abc"), None);
    }
}
