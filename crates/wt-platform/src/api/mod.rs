//! API Layer
//!
//! REST endpoints for authentication, the user directory, attendance and
//! uploads, composed into a single router.

pub mod common;
pub mod middleware;

pub mod attendances;
pub mod auth;
pub mod openapi;
pub mod uploads;
pub mod users;

use std::sync::Arc;

use axum::{routing::get, Extension, Json, Router};
use utoipa::OpenApi;

use crate::service::{
    AttendanceService, AuthService, BlobStore, ReportService, TokenService, UserService,
};

pub use common::*;
pub use middleware::{AppState, Authenticated};

pub use attendances::{attendances_router, AttendancesState};
pub use auth::{auth_router, AuthState};
pub use openapi::WorktimeApiDoc;
pub use uploads::{uploads_router, UploadsState};
pub use users::{users_router, UsersState};

/// Everything the HTTP surface needs, already wired
#[derive(Clone)]
pub struct PlatformServices {
    pub token_service: Arc<TokenService>,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub attendance_service: Arc<AttendanceService>,
    pub report_service: Arc<ReportService>,
    pub blob_store: Arc<dyn BlobStore>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(WorktimeApiDoc::openapi())
}

/// Build the application router. Transport layers (tracing, CORS) are left
/// to the caller.
pub fn platform_router(services: PlatformServices) -> Router {
    let app_state = AppState {
        token_service: services.token_service,
    };

    Router::new()
        .nest("/auth", auth_router(AuthState {
            auth_service: services.auth_service,
        }))
        .nest("/users", users_router(UsersState {
            user_service: services.user_service,
        }))
        .nest("/attendances", attendances_router(AttendancesState {
            attendance_service: services.attendance_service,
            report_service: services.report_service,
        }))
        .nest("/uploads", uploads_router(UploadsState {
            blob_store: services.blob_store,
        }))
        .route("/health", get(health))
        .route("/api-doc/openapi.json", get(openapi_json))
        .fallback(common::not_found)
        .layer(Extension(app_state))
}
