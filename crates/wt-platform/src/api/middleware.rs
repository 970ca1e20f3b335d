//! API Middleware
//!
//! Bearer-token authentication for Axum handlers.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::PlatformError;
use crate::service::{extract_bearer_token, AuthContext, TokenError, TokenKind, TokenService};

/// Shared state made available to extractors through a request extension
#[derive(Clone)]
pub struct AppState {
    pub token_service: Arc<TokenService>,
}

/// Extractor for authenticated requests.
///
/// Verifies the access token and yields the caller's identity.
pub struct Authenticated(pub AuthContext);

fn invalid_access_token() -> PlatformError {
    PlatformError::unauthorized("invalid access token")
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| PlatformError::unauthorized("Unauthorized"))?;

        let token = header
            .to_str()
            .ok()
            .and_then(extract_bearer_token)
            .ok_or_else(invalid_access_token)?;

        let app_state = parts
            .extensions
            .get::<AppState>()
            .ok_or_else(|| PlatformError::internal("AppState extension missing"))?;

        let claims = app_state
            .token_service
            .verify(token, TokenKind::Access)
            .map_err(|e| match e {
                TokenError::Expired => PlatformError::unauthorized("access token expired"),
                _ => invalid_access_token(),
            })?;

        Ok(Authenticated(claims.into()))
    }
}
