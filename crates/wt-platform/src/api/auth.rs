//! Auth API Endpoints
//!
//! - POST /auth/register - Create an account
//! - POST /auth/login - Password login
//! - POST /auth/refresh-token - Exchange a refresh token for a new pair
//! - PUT /auth/update-password - Change password (authenticated)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::api::common::{ApiResponse, JsonBody};
use crate::api::middleware::Authenticated;
use crate::domain::Role;
use crate::error::PlatformError;
use crate::service::{AuthService, AuthSession, RegisterInput, TokenPair};

/// Registration request
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// `employee` (default) or `admin`
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

/// Authenticated session: public profile plus a fresh token pair
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<AuthSession> for AuthResponse {
    fn from(s: AuthSession) -> Self {
        Self {
            id: s.id,
            fullname: s.fullname,
            email: s.email,
            role: s.role,
            access_token: s.tokens.access_token,
            refresh_token: s.tokens.refresh_token,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(p: TokenPair) -> Self {
        Self {
            access_token: p.access_token,
            refresh_token: p.refresh_token,
        }
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub auth_service: Arc<AuthService>,
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn register(
    State(state): State<AuthState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), PlatformError> {
    let session = state.auth_service
        .register(RegisterInput {
            fullname: req.fullname,
            email: req.email,
            password: req.password,
            role: req.role,
        })
        .await?;

    Ok(ApiResponse::created(session.into()))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Validation error or wrong password"),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn login(
    State(state): State<AuthState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, PlatformError> {
    let session = state.auth_service
        .login(req.email.as_deref(), req.password.as_deref())
        .await?;

    Ok(ApiResponse::ok(session.into()))
}

/// Issue a new token pair from a refresh token
#[utoipa::path(
    post,
    path = "/refresh-token",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPairResponse),
        (status = 400, description = "Missing refresh token"),
        (status = 401, description = "Expired or invalid refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AuthState>,
    JsonBody(req): JsonBody<RefreshTokenRequest>,
) -> Result<Json<ApiResponse<TokenPairResponse>>, PlatformError> {
    let pair = state.auth_service
        .refresh_token(req.refresh_token.as_deref())
        .await?;

    Ok(ApiResponse::ok(pair.into()))
}

/// Change the caller's password
#[utoipa::path(
    put,
    path = "/update-password",
    tag = "auth",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = AuthResponse),
        (status = 400, description = "Validation error or wrong old password"),
        (status = 401, description = "Missing or invalid access token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_password(
    State(state): State<AuthState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<UpdatePasswordRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, PlatformError> {
    let session = state.auth_service
        .update_password(
            &auth.0.user_id,
            req.old_password.as_deref(),
            req.new_password.as_deref(),
        )
        .await?;

    Ok(ApiResponse::ok(session.into()))
}

pub fn auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/update-password", put(update_password))
        .with_state(state)
}
