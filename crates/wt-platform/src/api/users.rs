//! Users API
//!
//! Directory listing for admins and self-service profile endpoints.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::api::common::{ApiResponse, JsonBody};
use crate::api::middleware::Authenticated;
use crate::domain::{ProfileUpdate, User};
use crate::error::PlatformError;
use crate::service::{checks, UserService};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub fullname: String,
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            fullname: u.fullname,
            email: u.email,
        }
    }
}

/// Public profile. Never includes the password hash.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub position: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
}

impl From<User> for UserProfileResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            fullname: u.fullname,
            email: u.email,
            position: u.position,
            phone_number: u.phone_number,
            image_url: u.image_url,
        }
    }
}

/// Profile fields are replaced as a whole; omitted fields are cleared
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub position: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(r: UpdateProfileRequest) -> Self {
        Self {
            position: r.position,
            phone_number: r.phone_number,
            image_url: r.image_url,
        }
    }
}

#[derive(Clone)]
pub struct UsersState {
    pub user_service: Arc<UserService>,
}

/// List all users (admin)
#[utoipa::path(
    get,
    path = "",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = Vec<UserSummary>),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<UsersState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<UserSummary>>>, PlatformError> {
    checks::require_admin(&auth.0)?;

    let users = state.user_service.list().await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

/// Get the caller's profile
#[utoipa::path(
    get,
    path = "/me",
    tag = "users",
    responses(
        (status = 200, description = "Caller profile", body = UserProfileResponse),
        (status = 404, description = "User no longer exists")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<UsersState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<UserProfileResponse>>, PlatformError> {
    let user = state.user_service.me(&auth.0.user_id).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Update the caller's profile and publish the change
#[utoipa::path(
    put,
    path = "/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserProfileResponse),
        (status = 404, description = "User no longer exists")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<UsersState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserProfileResponse>>, PlatformError> {
    let user = state.user_service
        .update_me(&auth.0.user_id, req.into())
        .await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Get a user by id (admin)
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User profile", body = UserProfileResponse),
        (status = 400, description = "Malformed user id"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserProfileResponse>>, PlatformError> {
    checks::require_admin(&auth.0)?;

    let user = state.user_service.get(&id).await?;
    Ok(ApiResponse::ok(user.into()))
}

pub fn users_router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/me", get(get_me).put(update_me))
        .route("/:id", get(get_user))
        .with_state(state)
}
