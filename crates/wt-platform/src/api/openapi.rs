//! OpenAPI Documentation

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Worktime API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Worktime API",
        version = "1.0.0",
        description = "Attendance tracking and identity"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Registration, login and tokens"),
        (name = "users", description = "User directory and profiles"),
        (name = "attendances", description = "Check-in, check-out and reports"),
        (name = "uploads", description = "File uploads")
    ),
    paths(
        super::auth::register,
        super::auth::login,
        super::auth::refresh_token,
        super::auth::update_password,
        super::users::list_users,
        super::users::get_me,
        super::users::update_me,
        super::users::get_user,
        super::attendances::list_my_attendances,
        super::attendances::my_report,
        super::attendances::check_in,
        super::attendances::check_out,
        super::attendances::list_user_attendances,
        super::uploads::upload,
        super::uploads::get_file,
    ),
    components(
        schemas(
            super::auth::RegisterRequest,
            super::auth::LoginRequest,
            super::auth::RefreshTokenRequest,
            super::auth::UpdatePasswordRequest,
            super::auth::AuthResponse,
            super::auth::TokenPairResponse,
            super::users::UserSummary,
            super::users::UserProfileResponse,
            super::users::UpdateProfileRequest,
            super::attendances::CheckInRequest,
            super::attendances::CheckOutRequest,
            super::attendances::AttendanceResponse,
            super::attendances::AttendanceDetailResponse,
            super::attendances::ReportResponse,
            super::uploads::UploadResponse,
            super::common::ApiError,
            crate::domain::Role,
            crate::domain::AttendanceStatus,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct WorktimeApiDoc;
