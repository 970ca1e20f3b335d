//! Authentication Gateway
//!
//! Registration, login, token renewal and password change. Every successful
//! operation returns a freshly issued access/refresh pair.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::info;

use crate::domain::{Role, User};
use crate::error::{PlatformError, Result};
use crate::repository::UserRepository;
use crate::service::{
    Clock, PasswordService, TokenError, TokenKind, TokenPair, TokenPayload, TokenService,
};

/// Result of a successful authentication
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub role: Role,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

pub fn is_email_valid(email: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(email))
}

/// Treat absent and blank values the same way
pub(crate) fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn ensure_user_id(id: &str, message: &str) -> Result<()> {
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| PlatformError::validation(message))
}

pub(crate) fn token_failure(err: TokenError) -> PlatformError {
    PlatformError::internal(format!("token issuance failed: {}", err))
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    passwords: Arc<PasswordService>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        passwords: Arc<PasswordService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            tokens,
            passwords,
            clock,
        }
    }

    fn session(&self, user: &User) -> Result<AuthSession> {
        let payload = TokenPayload {
            id: user.id.clone(),
            role: user.role,
        };
        let tokens = self.tokens.issue_pair(&payload).map_err(token_failure)?;
        Ok(AuthSession {
            id: user.id.clone(),
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            role: user.role,
            tokens,
        })
    }

    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession> {
        let fullname = present(input.fullname.as_deref())
            .ok_or_else(|| PlatformError::validation("missing fullname"))?;
        let email = present(input.email.as_deref())
            .ok_or_else(|| PlatformError::validation("missing email"))?
            .trim()
            .to_lowercase();
        if !is_email_valid(&email) {
            return Err(PlatformError::validation("invalid email"));
        }
        let password = present(input.password.as_deref())
            .ok_or_else(|| PlatformError::validation("missing password"))?;
        let role = match present(input.role.as_deref()) {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|_| PlatformError::validation("invalid role"))?,
            None => Role::default(),
        };

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(PlatformError::conflict("email already exists"));
        }

        let hash = self.passwords.hash(password)?;
        let user = User::new(fullname.trim(), email, hash, role, self.clock.now());

        // Unique index catches a concurrent registration with the same email
        if !self.users.insert(&user).await? {
            return Err(PlatformError::conflict("email already exists"));
        }

        info!(user_id = %user.id, role = %user.role, "User registered");
        self.session(&user)
    }

    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> Result<AuthSession> {
        let email = present(email)
            .ok_or_else(|| PlatformError::validation("missing email"))?
            .trim()
            .to_lowercase();
        let password =
            present(password).ok_or_else(|| PlatformError::validation("missing password"))?;

        let user = self.users
            .find_by_email(&email)
            .await?
            .ok_or_else(PlatformError::not_found)?;

        if !self.passwords.verify(password, &user.password) {
            return Err(PlatformError::validation("invalid password"));
        }

        self.session(&user)
    }

    /// Issue a new pair from a valid refresh token.
    ///
    /// The presented token stays valid until it expires.
    pub async fn refresh_token(&self, refresh_token: Option<&str>) -> Result<TokenPair> {
        let token = present(refresh_token)
            .ok_or_else(|| PlatformError::validation("missing refreshToken"))?;

        let claims = self.tokens
            .verify(token, TokenKind::Refresh)
            .map_err(|e| match e {
                TokenError::Expired => PlatformError::unauthorized("refresh token expired"),
                _ => PlatformError::unauthorized("invalid refresh token"),
            })?;

        self.tokens.issue_pair(&claims.payload()).map_err(token_failure)
    }

    pub async fn update_password(
        &self,
        user_id: &str,
        old_password: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<AuthSession> {
        let old_password = present(old_password)
            .ok_or_else(|| PlatformError::validation("missing oldPassword"))?;
        let new_password = present(new_password)
            .ok_or_else(|| PlatformError::validation("missing newPassword"))?;
        ensure_user_id(user_id, "invalid user id")?;

        let mut user = self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(PlatformError::not_found)?;

        if !self.passwords.verify(old_password, &user.password) {
            return Err(PlatformError::validation("invalid old password"));
        }

        let hash = self.passwords.hash(new_password)?;
        let now = self.clock.now();
        if !self.users.update_password(&user.id, &hash, now).await? {
            return Err(PlatformError::not_found());
        }
        user.password = hash;
        user.updated_at = now;

        info!(user_id = %user.id, "Password changed");
        self.session(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryUserRepository;
    use crate::service::{Argon2Config, FixedClock, TokenConfig};
    use crate::error::ErrorKind;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        auth: AuthService,
        tokens: Arc<TokenService>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        ));
        let tokens = Arc::new(TokenService::new(
            TokenConfig {
                access_secret: "access".to_string(),
                refresh_secret: "refresh".to_string(),
                access_ttl: Duration::minutes(15),
                refresh_ttl: Duration::days(7),
            },
            clock.clone(),
        ));
        let passwords = Arc::new(
            PasswordService::new(Argon2Config {
                memory_cost: 1024,
                time_cost: 1,
                parallelism: 1,
            })
            .unwrap(),
        );
        let auth = AuthService::new(
            Arc::new(InMemoryUserRepository::new()),
            tokens.clone(),
            passwords,
            clock.clone(),
        );
        Fixture { auth, tokens, clock }
    }

    fn input(email: &str) -> RegisterInput {
        RegisterInput {
            fullname: Some("Ada Lovelace".to_string()),
            email: Some(email.to_string()),
            password: Some("s3cret".to_string()),
            role: None,
        }
    }

    #[tokio::test]
    async fn test_register_validation_order() {
        let f = fixture();
        let err = f.auth.register(RegisterInput::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "missing fullname");

        let mut bad = input("not-an-email");
        let err = f.auth.register(bad.clone()).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid email");

        bad.email = Some("ada@example.com".to_string());
        bad.password = Some("   ".to_string());
        let err = f.auth.register(bad).await.unwrap_err();
        assert_eq!(err.to_string(), "missing password");
    }

    #[tokio::test]
    async fn test_duplicate_registration_then_login() {
        let f = fixture();
        let session = f.auth.register(input("ada@example.com")).await.unwrap();
        assert_eq!(session.role, Role::Employee);

        let err = f.auth.register(input("ADA@example.com")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "email already exists");

        let login = f.auth.login(Some("ada@example.com"), Some("s3cret")).await.unwrap();
        let claims = f.tokens.verify(&login.tokens.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.id, session.id);
        assert_eq!(claims.role, Role::Employee);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let f = fixture();
        f.auth.register(input("ada@example.com")).await.unwrap();

        let err = f.auth.login(Some("bob@example.com"), Some("x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f.auth.login(Some("ada@example.com"), Some("wrong")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "invalid password");

        let err = f.auth.login(None, Some("x")).await.unwrap_err();
        assert_eq!(err.to_string(), "missing email");
    }

    #[tokio::test]
    async fn test_refresh_token_paths() {
        let f = fixture();
        let session = f.auth.register(input("ada@example.com")).await.unwrap();

        let pair = f.auth.refresh_token(Some(&session.tokens.refresh_token)).await.unwrap();
        assert!(f.tokens.verify(&pair.access_token, TokenKind::Access).is_ok());

        let err = f.auth.refresh_token(Some("garbage")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.to_string(), "invalid refresh token");

        // An access token is not a refresh token
        let err = f.auth.refresh_token(Some(&session.tokens.access_token)).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid refresh token");

        let err = f.auth.refresh_token(None).await.unwrap_err();
        assert_eq!(err.to_string(), "missing refreshToken");

        f.clock.advance(Duration::days(8));
        let err = f.auth.refresh_token(Some(&session.tokens.refresh_token)).await.unwrap_err();
        assert_eq!(err.to_string(), "refresh token expired");
    }

    #[tokio::test]
    async fn test_update_password() {
        let f = fixture();
        let session = f.auth.register(input("ada@example.com")).await.unwrap();

        let err = f.auth
            .update_password(&session.id, Some("wrong"), Some("n3w"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid old password");

        let err = f.auth
            .update_password("not-a-uuid", Some("s3cret"), Some("n3w"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid user id");

        f.auth
            .update_password(&session.id, Some("s3cret"), Some("n3w"))
            .await
            .unwrap();
        assert!(f.auth.login(Some("ada@example.com"), Some("s3cret")).await.is_err());
        assert!(f.auth.login(Some("ada@example.com"), Some("n3w")).await.is_ok());
    }
}
